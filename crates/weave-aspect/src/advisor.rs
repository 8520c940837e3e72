//! Turning aspects into advisors.
//!
//! [`AspectAdvisorFactory::advisors`] walks the advice methods of an aspect,
//! in precedence order, and builds one [`AspectAdvisor`] per method. Argument
//! binding and expression parsing happen here, so a misconfigured aspect
//! fails when it is registered rather than on the first call.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;
use weave_core::framework::is_expose_invocation_advisor;
use weave_core::{
    AopConfigError, AopResult, Advisor, BoxedAdvice, BoxedAdvisor, Pointcut,
    expose_invocation_advisor,
};

use crate::advice::AspectAdvice;
use crate::binding::BindingPlan;
use crate::descriptor::AdviceKind;
use crate::expression::{ExpressionPointcut, PointcutParser};
use crate::instance::{AspectInstanceFactory, LazySingletonAspectInstanceFactory};
use crate::metadata::AdviceMethod;

// ============================================================================
// AspectAdvisor
// ============================================================================

/// An advisor for one advice method of an aspect.
///
/// The pointcut is available immediately. The advice of a lazily instantiated
/// aspect is only created on first use.
pub struct AspectAdvisor {
    kind: AdviceKind,
    declaration_order: usize,
    method: AdviceMethod,
    plan: BindingPlan,
    expression: Arc<ExpressionPointcut>,
    pointcut: Pointcut,
    instances: Arc<dyn AspectInstanceFactory>,
    advice: OnceLock<BoxedAdvice>,
}

impl AspectAdvisor {
    pub fn new(
        kind: AdviceKind,
        declaration_order: usize,
        method: AdviceMethod,
        plan: BindingPlan,
        expression: Arc<ExpressionPointcut>,
        instances: Arc<dyn AspectInstanceFactory>,
    ) -> Self {
        let advisor = Self {
            kind,
            declaration_order,
            method,
            plan,
            pointcut: expression.to_pointcut(),
            expression,
            instances,
            advice: OnceLock::new(),
        };
        if !advisor.is_lazy() {
            advisor.materialize();
        }
        advisor
    }

    fn materialize(&self) -> &BoxedAdvice {
        self.advice.get_or_init(|| {
            debug!(advisor = %self.describe(), "Materializing aspect advice");
            Arc::new(AspectAdvice::new(
                self.kind,
                self.method.clone(),
                self.plan.clone(),
                self.expression.clone(),
                self.instances.clone(),
            ))
        })
    }

    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    /// Position of the advice method within its aspect.
    pub fn declaration_order(&self) -> usize {
        self.declaration_order
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn aspect_name(&self) -> &str {
        self.instances.metadata().name()
    }

    pub fn expression(&self) -> &Arc<ExpressionPointcut> {
        &self.expression
    }

    /// Whether the advice waits for first use.
    pub fn is_lazy(&self) -> bool {
        self.instances.metadata().is_lazily_instantiated()
    }

    /// Whether the advice exists yet.
    pub fn is_advice_materialized(&self) -> bool {
        self.advice.get().is_some()
    }
}

impl Advisor for AspectAdvisor {
    fn pointcut(&self) -> Option<&Pointcut> {
        Some(&self.pointcut)
    }

    fn advice(&self) -> AopResult<BoxedAdvice> {
        Ok(Arc::clone(self.materialize()))
    }

    fn describe(&self) -> String {
        format!(
            "{} advice {}.{} [{}]",
            self.kind,
            self.aspect_name(),
            self.method.name(),
            self.expression.expression()
        )
    }

    fn needs_exposed_invocation(&self) -> bool {
        true
    }
}

impl fmt::Debug for AspectAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectAdvisor")
            .field("kind", &self.kind)
            .field("aspect", &self.aspect_name())
            .field("method", &self.method.name())
            .field("expression", &self.expression.expression())
            .field("lazy", &self.is_lazy())
            .finish()
    }
}

// ============================================================================
// AspectAdvisorFactory
// ============================================================================

/// Builds advisors from aspect metadata.
#[derive(Clone)]
pub struct AspectAdvisorFactory {
    parser: Arc<dyn PointcutParser>,
}

impl AspectAdvisorFactory {
    pub fn new(parser: Arc<dyn PointcutParser>) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> &Arc<dyn PointcutParser> {
        &self.parser
    }

    /// Builds one advisor per advice method, ordered by advice kind and then
    /// by declaration order.
    ///
    /// The instance factory is wrapped so the aspect is instantiated at most
    /// once.
    pub fn advisors(
        &self,
        instances: Arc<dyn AspectInstanceFactory>,
    ) -> AopResult<Vec<BoxedAdvisor>> {
        let metadata = instances.metadata();
        metadata.validate()?;

        let instances: Arc<dyn AspectInstanceFactory> =
            Arc::new(LazySingletonAspectInstanceFactory::new(instances));

        let mut methods: Vec<(usize, &AdviceMethod, AdviceKind)> = instances
            .metadata()
            .methods()
            .iter()
            .enumerate()
            .filter_map(|(order, method)| method.kind().map(|kind| (order, method, kind)))
            .collect();
        methods.sort_by_key(|(_, _, kind)| *kind);

        let mut advisors: Vec<BoxedAdvisor> = Vec::with_capacity(methods.len());
        for (order, method, _) in methods {
            let advisor = self.advisor(method, order, instances.clone())?;
            advisors.push(Arc::new(advisor));
        }

        debug!(
            aspect = instances.metadata().name(),
            advisor_count = advisors.len(),
            lazy = instances.metadata().is_lazily_instantiated(),
            "Built aspect advisors"
        );
        Ok(advisors)
    }

    /// Builds the advisor for a single advice method.
    pub fn advisor(
        &self,
        method: &AdviceMethod,
        declaration_order: usize,
        instances: Arc<dyn AspectInstanceFactory>,
    ) -> AopResult<AspectAdvisor> {
        let descriptor = method.descriptor().ok_or_else(|| {
            AopConfigError::Invalid(format!("method '{method}' is not an advice method"))
        })?;
        descriptor.validate()?;

        let expression = instances
            .metadata()
            .resolve_expression(&descriptor.expression)?;
        let plan = BindingPlan::compute(method, descriptor, &expression)?;
        let pointcut = ExpressionPointcut::new(
            self.parser.as_ref(),
            expression,
            plan.pointcut_parameters().to_vec(),
        )?;

        Ok(AspectAdvisor::new(
            descriptor.kind,
            declaration_order,
            method.clone(),
            plan,
            Arc::new(pointcut),
            instances,
        ))
    }
}

impl fmt::Debug for AspectAdvisorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectAdvisorFactory").finish_non_exhaustive()
    }
}

/// Prepends the invocation-exposing advisor when any advisor in the list
/// needs it and it is not there yet. Returns whether the list changed.
pub fn make_advisor_chain_aspect_capable(advisors: &mut Vec<BoxedAdvisor>) -> bool {
    let needed = advisors.iter().any(|advisor| advisor.needs_exposed_invocation());
    if !needed || advisors.iter().any(is_expose_invocation_advisor) {
        return false;
    }
    advisors.insert(0, expose_invocation_advisor());
    true
}
