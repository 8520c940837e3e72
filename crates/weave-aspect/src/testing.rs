//! A small glob-based expression parser for tests and examples.
//!
//! Real deployments plug in their own [`PointcutParser`]. This one
//! understands a tiny grammar, enough to exercise the aspect engine:
//!
//! ```text
//! expr      := or
//! or        := and ( "||" and )*
//! and       := unary ( "&&" unary )*
//! unary     := "!" unary | "(" expr ")" | primitive
//! primitive := "execution(" [ RetGlob ] TypeGlob "." MethodGlob [ "(..)" ] ")"
//!            | "within(" TypeGlob ")"
//!            | "args(" ( ".." | item ( "," item )* )? ")"
//! ```
//!
//! `execution` matches when the declaring type or the runtime target type,
//! or one of their supertypes, matches `TypeGlob`. `within` matches on the
//! runtime target type only. An `args` item is either a declared parameter
//! name, which captures the argument, `*`, or a type name glob.

use std::sync::Arc;

use weave_core::framework::simple_match;
use weave_core::{AopConfigError, AopResult, JoinPoint, Method, Type, Value};

use crate::expression::{
    JoinPointMatch, PointcutExpression, PointcutParameter, PointcutParser, ShadowMatch,
};

/// Parses the fixture grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobParser;

impl PointcutParser for GlobParser {
    fn parse(
        &self,
        expression: &str,
        parameters: &[PointcutParameter],
    ) -> AopResult<Arc<dyn PointcutExpression>> {
        let mut parser = Parser {
            source: expression,
            rest: expression,
            parameters,
        };
        let root = parser.or()?;
        parser.skip_ws();
        if !parser.rest.is_empty() {
            return Err(parser.error(format!("unexpected trailing input '{}'", parser.rest)));
        }
        for parameter in parameters {
            if !root.captures(&parameter.name) {
                return Err(parser.error(format!("formal unbound in pointcut: {}", parameter.name)));
            }
        }
        Ok(Arc::new(GlobExpression { root }))
    }
}

// ============================================================================
// Syntax tree
// ============================================================================

#[derive(Debug, Clone)]
enum ArgItem {
    Capture(PointcutParameter),
    Any,
    TypeGlob(String),
}

#[derive(Debug, Clone)]
enum Node {
    Execution { type_glob: String, method_glob: String },
    Within(String),
    Args(Option<Vec<ArgItem>>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

fn type_matches(glob: &str, ty: &Type) -> bool {
    ty.ancestors().any(|t| simple_match(glob, t.name()))
}

fn value_matches(glob: &str, value: &Value) -> bool {
    type_matches(glob, value.value_type())
}

impl Node {
    fn captures(&self, name: &str) -> bool {
        match self {
            Node::Args(Some(items)) => items
                .iter()
                .any(|item| matches!(item, ArgItem::Capture(p) if p.name == name)),
            Node::Not(inner) => inner.captures(name),
            Node::And(l, r) | Node::Or(l, r) => l.captures(name) || r.captures(name),
            _ => false,
        }
    }

    fn could_match(&self, ty: &Type) -> bool {
        match self {
            Node::Execution { .. } | Node::Args(_) | Node::Not(_) => true,
            Node::Within(glob) => simple_match(glob, ty.name()),
            Node::And(l, r) => l.could_match(ty) && r.could_match(ty),
            Node::Or(l, r) => l.could_match(ty) || r.could_match(ty),
        }
    }

    fn shadow(&self, method: &Method, target_type: &Type) -> ShadowMatch {
        let known = |matched: bool| {
            if matched {
                ShadowMatch::Always
            } else {
                ShadowMatch::Never
            }
        };
        match self {
            Node::Execution {
                type_glob,
                method_glob,
            } => known(
                (type_matches(type_glob, method.declaring_type())
                    || type_matches(type_glob, target_type))
                    && simple_match(method_glob, method.name()),
            ),
            Node::Within(glob) => known(simple_match(glob, target_type.name())),
            Node::Args(None) => ShadowMatch::Always,
            Node::Args(Some(items)) => {
                if items.len() == method.parameter_count() {
                    ShadowMatch::Maybe
                } else {
                    ShadowMatch::Never
                }
            }
            Node::Not(inner) => match inner.shadow(method, target_type) {
                ShadowMatch::Always => ShadowMatch::Never,
                ShadowMatch::Never => ShadowMatch::Always,
                ShadowMatch::Maybe => ShadowMatch::Maybe,
            },
            Node::And(l, r) => match (l.shadow(method, target_type), r.shadow(method, target_type)) {
                (ShadowMatch::Never, _) | (_, ShadowMatch::Never) => ShadowMatch::Never,
                (ShadowMatch::Always, ShadowMatch::Always) => ShadowMatch::Always,
                _ => ShadowMatch::Maybe,
            },
            Node::Or(l, r) => match (l.shadow(method, target_type), r.shadow(method, target_type)) {
                (ShadowMatch::Always, _) | (_, ShadowMatch::Always) => ShadowMatch::Always,
                (ShadowMatch::Never, ShadowMatch::Never) => ShadowMatch::Never,
                _ => ShadowMatch::Maybe,
            },
        }
    }

    fn eval(&self, jp: &JoinPoint) -> Option<JoinPointMatch> {
        match self {
            Node::Execution { .. } | Node::Within(_) => {
                (self.shadow(jp.signature(), jp.target_type()) == ShadowMatch::Always)
                    .then(JoinPointMatch::new)
            }
            Node::Args(None) => Some(JoinPointMatch::new()),
            Node::Args(Some(items)) => {
                if items.len() != jp.args().len() {
                    return None;
                }
                let mut matched = JoinPointMatch::new();
                for (item, value) in items.iter().zip(jp.args()) {
                    match item {
                        ArgItem::Any => {}
                        ArgItem::TypeGlob(glob) => {
                            if !value_matches(glob, value) {
                                return None;
                            }
                        }
                        ArgItem::Capture(parameter) => {
                            if !parameter.ty.is_assignable_from(value.value_type()) {
                                return None;
                            }
                            matched = matched.bind(parameter.name.clone(), value.clone());
                        }
                    }
                }
                Some(matched)
            }
            Node::Not(inner) => match inner.eval(jp) {
                Some(_) => None,
                None => Some(JoinPointMatch::new()),
            },
            Node::And(l, r) => {
                let left = l.eval(jp)?;
                let right = r.eval(jp)?;
                Some(
                    right
                        .bindings()
                        .fold(left, |acc, (name, value)| acc.bind(name, value.clone())),
                )
            }
            Node::Or(l, r) => l.eval(jp).or_else(|| r.eval(jp)),
        }
    }
}

struct GlobExpression {
    root: Node,
}

impl PointcutExpression for GlobExpression {
    fn could_match(&self, ty: &Type) -> bool {
        self.root.could_match(ty)
    }

    fn match_method(&self, method: &Method, target_type: &Type) -> ShadowMatch {
        self.root.shadow(method, target_type)
    }

    fn match_join_point(&self, join_point: &JoinPoint) -> Option<JoinPointMatch> {
        self.root.eval(join_point)
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    source: &'a str,
    rest: &'a str,
    parameters: &'a [PointcutParameter],
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> AopConfigError {
        AopConfigError::invalid_expression(self.source, reason)
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn or(&mut self) -> AopResult<Node> {
        let mut node = self.and()?;
        while self.eat("||") {
            node = Node::Or(Box::new(node), Box::new(self.and()?));
        }
        Ok(node)
    }

    fn and(&mut self) -> AopResult<Node> {
        let mut node = self.unary()?;
        while self.eat("&&") {
            node = Node::And(Box::new(node), Box::new(self.unary()?));
        }
        Ok(node)
    }

    fn unary(&mut self) -> AopResult<Node> {
        if self.eat("!") {
            return Ok(Node::Not(Box::new(self.unary()?)));
        }
        if self.eat("(") {
            let node = self.or()?;
            if !self.eat(")") {
                return Err(self.error("missing ')'"));
            }
            return Ok(node);
        }
        self.primitive()
    }

    fn primitive(&mut self) -> AopResult<Node> {
        self.skip_ws();
        let rest: &'a str = self.rest;
        let open = rest
            .find('(')
            .ok_or_else(|| self.error(format!("expected a pointcut at '{rest}'")))?;
        let keyword = rest[..open].trim();
        let after = &rest[open + 1..];

        let mut depth = 0usize;
        let close = after
            .char_indices()
            .find(|&(_, c)| match c {
                '(' => {
                    depth += 1;
                    false
                }
                ')' if depth == 0 => true,
                ')' => {
                    depth -= 1;
                    false
                }
                _ => false,
            })
            .map(|(i, _)| i)
            .ok_or_else(|| self.error(format!("unterminated '{keyword}('")))?;
        let body = after[..close].trim();
        self.rest = &after[close + 1..];

        match keyword {
            "execution" => {
                // An optional return type pattern and parameter list are ignored.
                let body = body.strip_suffix("(..)").unwrap_or(body);
                let body = body.rsplit(' ').next().unwrap_or(body);
                let (type_glob, method_glob) = body
                    .rsplit_once('.')
                    .ok_or_else(|| self.error("execution needs 'Type.method'"))?;
                Ok(Node::Execution {
                    type_glob: type_glob.trim().to_string(),
                    method_glob: method_glob.trim().to_string(),
                })
            }
            "within" => Ok(Node::Within(body.to_string())),
            "args" if body == ".." => Ok(Node::Args(None)),
            "args" => {
                let items = body
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| match item {
                        "*" => ArgItem::Any,
                        _ => match self.parameters.iter().find(|p| p.name == item) {
                            Some(parameter) => ArgItem::Capture(parameter.clone()),
                            None => ArgItem::TypeGlob(item.to_string()),
                        },
                    })
                    .collect();
                Ok(Node::Args(Some(items)))
            }
            other => Err(self.error(format!("unsupported pointcut designator '{other}'"))),
        }
    }
}
