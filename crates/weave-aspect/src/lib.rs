//! # Weave Aspect
//!
//! Declarative aspects for the Weave interception core.
//!
//! An aspect is a value plus [`AspectMetadata`]: named pointcuts and advice
//! methods, each marked with an [`AdviceDescriptor`] (kind, match expression,
//! parameter names). [`AspectAdvisorFactory`] turns the metadata into core
//! advisors that can be added to any proxy.
//!
//! Match expressions are evaluated by an external [`PointcutParser`]; this
//! crate only manages them. The `testing` feature ships a small glob-based
//! parser for tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use weave_aspect::prelude::*;
//! use weave_core::prelude::*;
//!
//! let audit = AspectMetadata::new("Audit", Type::new("Audit"))
//!     .pointcut("teaching", "execution(Lecturer.teach*)")
//!     .method(
//!         AdviceMethod::new("log_topic", |_aspect, args| {
//!             tracing::info!(topic = ?args.value(1), "teaching");
//!             Ok(None)
//!         })
//!         .params([Type::join_point(), Type::string()])
//!         .before("teaching() && args(topic)")
//!         .arg_names("topic"),
//!     );
//!
//! let factory = AspectAdvisorFactory::new(Arc::new(my_parser));
//! let mut advisors = factory.advisors(Arc::new(SingletonAspectInstanceFactory::new(
//!     Value::string("audit"),
//!     audit,
//! )))?;
//! make_advisor_chain_aspect_capable(&mut advisors);
//!
//! let proxy = ProxyFactory::new(TargetSource::new(Lecturer))
//!     .advisors(advisors)
//!     .get_proxy();
//! ```

pub mod advice;
pub mod advisor;
pub mod binding;
pub mod descriptor;
pub mod expression;
pub mod instance;
pub mod metadata;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use advice::AspectAdvice;
pub use advisor::{AspectAdvisor, AspectAdvisorFactory, make_advisor_chain_aspect_capable};
pub use binding::{BindingPlan, CallOutcome, ContextSlot, annotation_variable_names, is_variable_name};
pub use descriptor::{AdviceDescriptor, AdviceKind};
pub use expression::{
    ExpressionPointcut, JoinPointMatch, PointcutExpression, PointcutParameter, PointcutParser,
    ShadowMatch, replace_boolean_operators,
};
pub use instance::{
    AspectInstanceFactory, LazySingletonAspectInstanceFactory, SimpleAspectInstanceFactory,
    SingletonAspectInstanceFactory,
};
pub use metadata::{
    AdviceArg, AdviceArgs, AdviceBody, AdviceMethod, AspectMetadata, InstantiationModel,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::advisor::{AspectAdvisorFactory, make_advisor_chain_aspect_capable};
    pub use super::descriptor::{AdviceDescriptor, AdviceKind};
    pub use super::expression::{PointcutParameter, PointcutParser};
    pub use super::instance::{
        AspectInstanceFactory, SimpleAspectInstanceFactory, SingletonAspectInstanceFactory,
    };
    pub use super::metadata::{AdviceArgs, AdviceMethod, AspectMetadata, InstantiationModel};
}
