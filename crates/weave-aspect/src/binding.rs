//! Advice argument binding.
//!
//! A [`BindingPlan`] is computed once per advice method, when its advisor is
//! built. It records which parameter receives the join point, which receives
//! each captured variable, the return value or the thrown error. At call time
//! [`BindingPlan::bind`] assembles the actual argument list by name lookup.
//!
//! Parameter names come from the descriptor's explicit list when given.
//! Otherwise they are discovered in fixed steps:
//!
//! 1. a leading join point parameter binds to the call's join point
//! 2. a declared throwing name binds to the only remaining error-typed slot
//! 3. annotation-typed slots bind to annotation variables named in `@this`,
//!    `@target`, `@within`, `@annotation` and `@args` clauses
//! 4. a declared returning name binds to the only remaining slot
//!
//! Parameters still unbound after discovery are a configuration error;
//! captured expression variables must be named explicitly.

use std::collections::HashMap;

use tracing::debug;
use weave_core::{
    AopConfigError, AopResult, JoinPoint, ProceedingJoinPoint, Throwable, Type, Value,
};

use crate::descriptor::AdviceDescriptor;
use crate::expression::{JoinPointMatch, PointcutParameter};
use crate::metadata::{AdviceArg, AdviceArgs, AdviceMethod};

const THIS_JOIN_POINT: &str = "this_join_point";
const THIS_JOIN_POINT_STATIC_PART: &str = "this_join_point_static_part";

const SINGLE_VALUED_ANNOTATION_DESIGNATORS: [&str; 4] =
    ["@this", "@target", "@within", "@annotation"];

pub(crate) fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Returns whether `name` can name a variable.
pub fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_part)
}

// ============================================================================
// Annotation variable discovery
// ============================================================================

struct PointcutBody {
    consumed: usize,
    text: Option<String>,
}

/// Reads the parenthesized body of the designator at `tokens[start]`, which
/// may span several whitespace-separated tokens.
fn pointcut_body(tokens: &[&str], start: usize) -> PointcutBody {
    let current = tokens[start];
    let body_start = current.find('(');

    if current.ends_with(')') {
        let from = body_start.map_or(0, |i| i + 1);
        let to = current.len() - 1;
        return PointcutBody {
            consumed: 0,
            text: Some(current.get(from..to).unwrap_or_default().to_string()),
        };
    }

    let mut text = String::new();
    if let Some(i) = body_start.filter(|&i| i != current.len() - 1) {
        text.push_str(&current[i + 1..]);
        text.push(' ');
    }

    let mut consumed = 1;
    let mut index = start + 1;
    while index < tokens.len() {
        let token = tokens[index];
        if token == "(" {
            index += 1;
            consumed += 1;
            continue;
        }
        if let Some(last) = token.strip_suffix(')') {
            text.push_str(last);
            return PointcutBody {
                consumed,
                text: Some(text.trim().to_string()),
            };
        }
        text.push_str(token.strip_prefix('(').unwrap_or(token));
        text.push(' ');
        index += 1;
        consumed += 1;
    }
    PointcutBody {
        consumed,
        text: None,
    }
}

/// Collects the variable names bound by annotation designators in
/// `expression`.
pub fn annotation_variable_names(expression: &str) -> Vec<String> {
    let tokens: Vec<&str> = expression.split(' ').filter(|t| !t.is_empty()).collect();
    let mut names = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let designator = token.find('(').map_or(token, |paren| &token[..paren]);

        if SINGLE_VALUED_ANNOTATION_DESIGNATORS.contains(&designator) {
            let body = pointcut_body(&tokens, i);
            i += body.consumed;
            if let Some(name) = body.text.filter(|text| is_variable_name(text)) {
                names.push(name);
            }
        } else if token.starts_with("@args(") || token == "@args" {
            let body = pointcut_body(&tokens, i);
            i += body.consumed;
            if let Some(text) = body.text {
                names.extend(
                    text.split(',')
                        .map(str::trim)
                        .filter(|name| is_variable_name(name))
                        .map(str::to_string),
                );
            }
        }
        i += 1;
    }
    names
}

// ============================================================================
// Binding plan
// ============================================================================

/// The join point flavour bound to the first advice parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSlot {
    JoinPoint,
    ProceedingJoinPoint,
    StaticPart,
}

impl ContextSlot {
    fn of(ty: &Type) -> Option<Self> {
        if *ty == Type::join_point() {
            Some(Self::JoinPoint)
        } else if *ty == Type::proceeding_join_point() {
            Some(Self::ProceedingJoinPoint)
        } else if *ty == Type::static_part() {
            Some(Self::StaticPart)
        } else {
            None
        }
    }

    fn variable_name(self) -> &'static str {
        match self {
            Self::JoinPoint | Self::ProceedingJoinPoint => THIS_JOIN_POINT,
            Self::StaticPart => THIS_JOIN_POINT_STATIC_PART,
        }
    }
}

/// How the call's outcome is offered to [`BindingPlan::bind`].
#[derive(Debug, Clone, Copy)]
pub enum CallOutcome<'a> {
    /// The call has not completed yet.
    Pending,
    /// The call returned; `None` for void.
    Returned(Option<&'a Value>),
    Thrown(&'a Throwable),
}

/// The precomputed mapping from advice parameters to bound values.
#[derive(Debug, Clone)]
pub struct BindingPlan {
    parameter_count: usize,
    context: Option<ContextSlot>,
    bindings: HashMap<String, usize>,
    returning: Option<String>,
    throwing: Option<String>,
    returning_type: Type,
    throwing_type: Type,
    pointcut_parameters: Vec<PointcutParameter>,
}

impl BindingPlan {
    /// Computes the plan for `method` advised by `descriptor`, whose match
    /// expression has been resolved to `expression`.
    pub fn compute(
        method: &AdviceMethod,
        descriptor: &AdviceDescriptor,
        expression: &str,
    ) -> AopResult<Self> {
        let types = method.parameter_types();
        let count = types.len();
        let returning = descriptor.returning_name();
        let throwing = descriptor.throwing_name();

        let required = usize::from(returning.is_some()) + usize::from(throwing.is_some());
        if count < required {
            return Err(AopConfigError::binding(format!(
                "advice method '{method}' has not enough parameters to bind the returning and throwing variables"
            )));
        }

        let context = types.first().and_then(ContextSlot::of);
        if context == Some(ContextSlot::ProceedingJoinPoint)
            && !descriptor.kind.supports_proceeding_join_point()
        {
            return Err(AopConfigError::unsupported(format!(
                "proceeding join point is only supported for around advice, but '{method}' is {} advice",
                descriptor.kind
            )));
        }

        let mut plan = Self {
            parameter_count: count,
            context,
            bindings: HashMap::new(),
            returning: returning.map(str::to_string),
            throwing: throwing.map(str::to_string),
            returning_type: Type::object(),
            throwing_type: Type::object(),
            pointcut_parameters: Vec::new(),
        };
        let offset = usize::from(context.is_some());
        if count == offset && required == 0 {
            return Ok(plan);
        }

        let names = match descriptor.argument_names() {
            Some(mut names) => {
                if let Some(slot) = context.filter(|_| names.len() + 1 == count) {
                    names.insert(0, slot.variable_name().to_string());
                }
                if names.len() != count {
                    return Err(AopConfigError::binding(format!(
                        "expecting to find {count} arguments to bind by name in advice '{method}', but actually found {} arguments",
                        names.len()
                    )));
                }
                names
            }
            None => discover(types, context, returning, throwing, expression)?,
        };

        for (index, name) in names.iter().enumerate().skip(offset) {
            if plan.bindings.insert(name.clone(), index).is_some() {
                return Err(AopConfigError::binding(format!(
                    "argument name '{name}' is bound twice in advice '{method}'"
                )));
            }
        }

        if let Some(name) = returning {
            let index = plan.slot_of(name).ok_or_else(|| {
                AopConfigError::binding(format!(
                    "returning argument name '{name}' was not bound in advice arguments"
                ))
            })?;
            plan.returning_type = types[index].clone();
        }
        if let Some(name) = throwing {
            let index = plan.slot_of(name).ok_or_else(|| {
                AopConfigError::binding(format!(
                    "throwing argument name '{name}' was not bound in advice arguments"
                ))
            })?;
            plan.throwing_type = types[index].clone();
        }

        plan.pointcut_parameters = names
            .iter()
            .enumerate()
            .skip(offset)
            .filter(|(_, name)| Some(name.as_str()) != returning && Some(name.as_str()) != throwing)
            .map(|(index, name)| PointcutParameter::new(name.clone(), types[index].clone()))
            .collect();

        debug!(
            advice = %method,
            bindings = ?plan.bindings,
            "Computed argument bindings"
        );
        Ok(plan)
    }

    fn slot_of(&self, name: &str) -> Option<usize> {
        self.bindings.get(name).copied()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn context(&self) -> Option<ContextSlot> {
        self.context
    }

    /// The type a return value must be assignable to; `object` when unbound.
    pub fn returning_type(&self) -> &Type {
        &self.returning_type
    }

    /// The type a thrown error must be an instance of; `object` when unbound.
    pub fn throwing_type(&self) -> &Type {
        &self.throwing_type
    }

    /// The variables the match expression must capture.
    pub fn pointcut_parameters(&self) -> &[PointcutParameter] {
        &self.pointcut_parameters
    }

    /// Assembles the advice arguments for one call.
    pub fn bind(
        &self,
        join_point: &JoinPoint,
        proceeding: Option<ProceedingJoinPoint>,
        jp_match: Option<&JoinPointMatch>,
        outcome: CallOutcome<'_>,
    ) -> AopResult<AdviceArgs> {
        let mut slots: Vec<Option<AdviceArg>> = vec![None; self.parameter_count];

        match self.context {
            Some(ContextSlot::JoinPoint) => slots[0] = Some(AdviceArg::JoinPoint(join_point.clone())),
            Some(ContextSlot::ProceedingJoinPoint) => {
                slots[0] = proceeding.map(AdviceArg::ProceedingJoinPoint);
            }
            Some(ContextSlot::StaticPart) => {
                slots[0] = Some(AdviceArg::StaticPart(join_point.static_part()));
            }
            None => {}
        }

        if let Some(jp_match) = jp_match {
            for (name, value) in jp_match.bindings() {
                if let Some(index) = self.slot_of(name) {
                    slots[index] = Some(AdviceArg::Value(Some(value.clone())));
                }
            }
        }
        if let (Some(name), CallOutcome::Returned(value)) = (&self.returning, outcome) {
            if let Some(index) = self.slot_of(name) {
                slots[index] = Some(AdviceArg::Value(value.cloned()));
            }
        }
        if let (Some(name), CallOutcome::Thrown(error)) = (&self.throwing, outcome) {
            if let Some(index) = self.slot_of(name) {
                slots[index] = Some(AdviceArg::Error(error.clone()));
            }
        }

        let bound = slots.iter().filter(|slot| slot.is_some()).count();
        if bound != self.parameter_count {
            return Err(AopConfigError::binding(format!(
                "required to bind {} arguments, but only bound {bound} (join point match {} bound in invocation)",
                self.parameter_count,
                if jp_match.is_some() { "was" } else { "was not" }
            )));
        }
        Ok(AdviceArgs::new(slots.into_iter().flatten().collect()))
    }
}

/// Discovers parameter names from types and the declared names.
fn discover(
    types: &[Type],
    context: Option<ContextSlot>,
    returning: Option<&str>,
    throwing: Option<&str>,
    expression: &str,
) -> AopResult<Vec<String>> {
    let mut slots: Vec<Option<String>> = vec![None; types.len()];
    let mut remaining = types.len();
    let mut bind = |slots: &mut Vec<Option<String>>, index: usize, name: &str| {
        slots[index] = Some(name.to_string());
        remaining -= 1;
    };

    if let Some(slot) = context {
        bind(&mut slots, 0, slot.variable_name());
    }

    if let Some(name) = throwing {
        let candidates: Vec<usize> = (0..types.len())
            .filter(|&i| slots[i].is_none() && types[i].is_error())
            .collect();
        match candidates.as_slice() {
            [] => {
                return Err(AopConfigError::binding(format!(
                    "binding of throwing parameter '{name}' could not be completed as no available arguments are error types"
                )));
            }
            [index] => bind(&mut slots, *index, name),
            [first, second, ..] => {
                return Err(AopConfigError::ambiguous(format!(
                    "binding of throwing parameter '{name}' is ambiguous: could be bound to argument {first} or argument {second}"
                )));
            }
        }
    }

    let variables = annotation_variable_names(expression);
    if !variables.is_empty() {
        let annotation_slots: Vec<usize> = (0..types.len())
            .filter(|&i| slots[i].is_none() && types[i].is_annotation())
            .collect();
        match (annotation_slots.as_slice(), variables.as_slice()) {
            ([], _) => {}
            ([index], [name]) => bind(&mut slots, *index, name),
            ([_], _) => {
                return Err(AopConfigError::binding(format!(
                    "found {} candidate annotation binding variables but only one potential argument binding slot",
                    variables.len()
                )));
            }
            (many, _) => {
                return Err(AopConfigError::ambiguous(format!(
                    "found {} potential annotation variable(s), and {} potential argument slots",
                    variables.len(),
                    many.len()
                )));
            }
        }
    }

    if let Some(name) = returning {
        let unbound: Vec<usize> = (0..types.len()).filter(|&i| slots[i].is_none()).collect();
        match unbound.as_slice() {
            [] => {}
            [index] => bind(&mut slots, *index, name),
            many => {
                return Err(AopConfigError::ambiguous(format!(
                    "binding of returning parameter '{name}' is ambiguous, there are {} candidates",
                    many.len()
                )));
            }
        }
    }

    if remaining > 0 {
        return Err(AopConfigError::binding(format!(
            "failed to bind all argument names: {remaining} argument(s) could not be bound; name captured variables with arg_names"
        )));
    }
    Ok(slots.into_iter().flatten().collect())
}
