//! End-to-end weaving through the facade: aspects registered on a `Weaver`,
//! matched by the fixture glob parser, executed through proxies.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tower::ServiceExt;
use weave::aspect::testing::GlobParser;
use weave::prelude::*;
use weave::runtime::config::{AdviceConfig, AspectConfig};
use weave::runtime::RuntimeError;

type Log = Arc<Mutex<Vec<String>>>;

fn lecturer_type() -> Type {
    Type::new("Lecturer")
}

fn fault() -> Type {
    Type::subtype("Fault", &Type::error())
}

fn missed_deadline() -> Type {
    Type::subtype("MissedDeadline", &fault())
}

fn teach() -> Method {
    Method::new(&lecturer_type(), "teach")
        .param(Type::string())
        .returns(Type::string())
}

fn grade() -> Method {
    Method::new(&lecturer_type(), "grade").returns(Type::integer())
}

fn submit() -> Method {
    Method::new(&lecturer_type(), "submit")
}

struct Lecturer {
    calls: Arc<AtomicUsize>,
    log: Log,
}

impl Target for Lecturer {
    fn target_type(&self) -> Type {
        lecturer_type()
    }

    fn invoke(&self, method: &Method, args: &[Value]) -> InvocationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.name() {
            "teach" => {
                let topic = args.first().and_then(Value::as_str).unwrap_or("nothing");
                self.log.lock().push(format!("target:{topic}"));
                Ok(Some(Value::string(format!("lecture on {topic}"))))
            }
            "grade" => Ok(Some(Value::integer(90))),
            "submit" => Err(InvocationError::thrown(missed_deadline(), "late by a day")),
            other => Err(InvocationError::thrown(fault(), format!("no such method {other}"))),
        }
    }
}

struct Fixture {
    weaver: Weaver,
    calls: Arc<AtomicUsize>,
    log: Log,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(WeaveConfig::default())
    }

    fn with_config(config: WeaveConfig) -> Self {
        Self {
            weaver: Weaver::from_config(&config, Arc::new(GlobParser)),
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn proxy(&self) -> Proxy {
        self.weaver.proxy(TargetSource::new(Lecturer {
            calls: self.calls.clone(),
            log: self.log.clone(),
        }))
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().push(entry.into());
}

fn lifecycle_aspect(log: &Log) -> AspectMetadata {
    let (around, before, returned, finally) = (log.clone(), log.clone(), log.clone(), log.clone());
    AspectMetadata::new("Lifecycle", Type::new("Lifecycle"))
        .pointcut("teaching", "execution(Lecturer.teach)")
        // Declared out of precedence order on purpose.
        .method(
            AdviceMethod::new("finally", move |_, _| {
                record(&finally, "after");
                Ok(None)
            })
            .after("teaching()"),
        )
        .method(
            AdviceMethod::new("returned", move |_, args| {
                let result = args.value(0).and_then(Value::as_str).unwrap_or_default();
                record(&returned, format!("after_returning:{result}"));
                Ok(None)
            })
            .param(Type::string())
            .after_returning("teaching()")
            .returning("result"),
        )
        .method(
            AdviceMethod::new("enter", move |_, args| {
                let name = args.join_point(0).map(|jp| jp.signature().name().to_string());
                record(&before, format!("before:{}", name.unwrap_or_default()));
                Ok(None)
            })
            .param(Type::join_point())
            .before("teaching()"),
        )
        .method(
            AdviceMethod::new("wrap", move |_, mut args| {
                record(&around, "around:pre");
                let result = match args.proceeding_join_point(0) {
                    Some(pjp) => pjp.proceed(),
                    None => Ok(None),
                };
                record(&around, "around:post");
                result
            })
            .param(Type::proceeding_join_point())
            .around("teaching()"),
        )
}

#[test]
fn test_advice_runs_in_precedence_order() {
    let fixture = Fixture::new();
    fixture
        .weaver
        .register_singleton(lifecycle_aspect(&fixture.log), Value::string("lifecycle"))
        .unwrap();

    let result = fixture
        .proxy()
        .invoke(&teach(), vec![Value::string("rust")])
        .unwrap();

    assert_eq!(result.as_ref().and_then(Value::as_str), Some("lecture on rust"));
    assert_eq!(
        fixture.entries(),
        vec![
            "around:pre",
            "before:teach",
            "target:rust",
            "after_returning:lecture on rust",
            "after",
            "around:post",
        ]
    );
}

#[test]
fn test_unmatched_method_skips_aspect() {
    let fixture = Fixture::new();
    fixture
        .weaver
        .register_singleton(lifecycle_aspect(&fixture.log), Value::string("lifecycle"))
        .unwrap();

    let result = fixture.proxy().invoke(&grade(), vec![]).unwrap();
    assert_eq!(result.and_then(|v| v.as_integer()), Some(90));
    assert!(fixture.entries().is_empty());
}

#[test]
fn test_binds_join_point_and_captured_argument() {
    let fixture = Fixture::new();
    let log = fixture.log.clone();
    let topics = AspectMetadata::new("Topics", Type::new("Topics")).method(
        AdviceMethod::new("topic", move |_, args| {
            let kind = args.join_point(0).map(JoinPoint::kind).unwrap_or_default();
            let topic = args.value(1).and_then(Value::as_str).unwrap_or_default();
            record(&log, format!("{kind}:{topic}"));
            Ok(None)
        })
        .params([Type::join_point(), Type::string()])
        .before("execution(Lecturer.*) && args(topic)")
        .arg_names("topic"),
    );
    fixture
        .weaver
        .register_singleton(topics, Value::string("topics"))
        .unwrap();

    let proxy = fixture.proxy();
    proxy.invoke(&teach(), vec![Value::string("ownership")]).unwrap();
    // `args(topic)` cannot match a call without arguments.
    proxy.invoke(&grade(), vec![]).unwrap();

    assert_eq!(
        fixture.entries(),
        vec!["method-execution:ownership", "target:ownership"]
    );
}

#[test]
fn test_after_returning_filters_by_returned_type() {
    let fixture = Fixture::new();
    let log = fixture.log.clone();
    let grades = AspectMetadata::new("Grades", Type::new("Grades")).method(
        AdviceMethod::new("graded", move |_, args| {
            let grade = args.value(0).and_then(Value::as_integer).unwrap_or_default();
            record(&log, format!("graded:{grade}"));
            Ok(None)
        })
        .param(Type::integer())
        .after_returning("within(Lecturer)")
        .returning("grade"),
    );
    fixture
        .weaver
        .register_singleton(grades, Value::string("grades"))
        .unwrap();

    let proxy = fixture.proxy();
    proxy.invoke(&teach(), vec![Value::string("traits")]).unwrap();
    proxy.invoke(&grade(), vec![]).unwrap();

    assert_eq!(fixture.entries(), vec!["target:traits", "graded:90"]);
}

#[test]
fn test_after_returning_binds_string_result() {
    let fixture = Fixture::new();
    let log = fixture.log.clone();
    let notes = AspectMetadata::new("Notes", Type::new("Notes")).method(
        AdviceMethod::new("noted", move |_, args| {
            let note = args.value(0).and_then(Value::as_str).unwrap_or_default();
            record(&log, format!("noted:{note}"));
            Ok(None)
        })
        .param(Type::string())
        .after_returning("within(Lecturer)")
        .returning("note"),
    );
    fixture
        .weaver
        .register_singleton(notes, Value::string("notes"))
        .unwrap();

    let proxy = fixture.proxy();
    proxy.invoke(&teach(), vec![Value::string("macros")]).unwrap();
    proxy.invoke(&grade(), vec![]).unwrap();

    assert_eq!(
        fixture.entries(),
        vec!["target:macros", "noted:lecture on macros"]
    );
}

#[test]
fn test_replaced_arguments_reach_later_advice() {
    let fixture = Fixture::new();
    let (around, before, returned) = (fixture.log.clone(), fixture.log.clone(), fixture.log.clone());
    let rewrite = AspectMetadata::new("Rewrite", Type::new("Rewrite"))
        .method(
            AdviceMethod::new("seen", move |_, args| {
                let jp_args: Vec<_> = args
                    .join_point(0)
                    .map(|jp| jp.args().iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                let topic = args.value(1).and_then(Value::as_str).unwrap_or_default();
                record(&before, format!("before:{topic} jp:{jp_args:?}"));
                Ok(None)
            })
            .params([Type::join_point(), Type::string()])
            .before("execution(Lecturer.teach) && args(topic)")
            .arg_names("topic"),
        )
        .method(
            AdviceMethod::new("returned", move |_, args| {
                let topic = args.value(1).and_then(Value::as_str).unwrap_or_default();
                record(&returned, format!("returned:{topic}"));
                Ok(None)
            })
            .params([Type::string(), Type::string()])
            .after_returning("execution(Lecturer.teach) && args(topic)")
            .arg_names("result, topic")
            .returning("result"),
        )
        .method(
            AdviceMethod::new("rewrite", move |_, mut args| {
                record(&around, "around");
                match args.proceeding_join_point(0) {
                    Some(pjp) => pjp.proceed_with(vec![Value::string("changed")]),
                    None => Ok(None),
                }
            })
            .param(Type::proceeding_join_point())
            .around("execution(Lecturer.teach)"),
        );
    fixture
        .weaver
        .register_singleton(rewrite, Value::string("rewrite"))
        .unwrap();

    let result = fixture
        .proxy()
        .invoke(&teach(), vec![Value::string("original")])
        .unwrap();

    assert_eq!(result.as_ref().and_then(Value::as_str), Some("lecture on changed"));
    assert_eq!(
        fixture.entries(),
        vec![
            "around",
            "before:changed jp:[\"changed\"]",
            "target:changed",
            "returned:changed",
        ]
    );
}

#[test]
fn test_after_throwing_sees_error_and_rethrows() {
    let fixture = Fixture::new();
    let (thrown, finally, unrelated) = (fixture.log.clone(), fixture.log.clone(), fixture.log.clone());
    let failures = AspectMetadata::new("Failures", Type::new("Failures"))
        .method(
            AdviceMethod::new("cleanup", move |_, _| {
                record(&finally, "after");
                Ok(None)
            })
            .after("within(Lecturer)"),
        )
        .method(
            AdviceMethod::new("on_fault", move |_, args| {
                let message = args.error(0).map(Throwable::message).unwrap_or_default();
                record(&thrown, format!("after_throwing:{message}"));
                Ok(None)
            })
            .param(fault())
            .after_throwing("within(Lecturer)")
            .throwing("err"),
        )
        .method(
            AdviceMethod::new("on_timeout", move |_, _| {
                record(&unrelated, "timeout");
                Ok(None)
            })
            .param(Type::subtype("Timeout", &Type::error()))
            .after_throwing("within(Lecturer)")
            .throwing("err"),
        );
    fixture
        .weaver
        .register_singleton(failures, Value::string("failures"))
        .unwrap();

    let err = fixture.proxy().invoke(&submit(), vec![]).unwrap_err();

    let thrown = err.as_thrown().expect("thrown error");
    assert_eq!(thrown.error_type(), &missed_deadline());
    assert_eq!(thrown.message(), "late by a day");
    assert_eq!(
        fixture.entries(),
        vec!["after_throwing:late by a day", "after"]
    );
}

#[test]
fn test_around_without_proceed_skips_target() {
    let fixture = Fixture::new();
    let cache = AspectMetadata::new("Cache", Type::new("Cache")).method(
        AdviceMethod::new("cached", |_, _| Ok(Some(Value::string("cached lecture"))))
            .param(Type::proceeding_join_point())
            .around("execution(Lecturer.teach)"),
    );
    fixture
        .weaver
        .register_singleton(cache, Value::string("cache"))
        .unwrap();

    let result = fixture
        .proxy()
        .invoke(&teach(), vec![Value::string("lifetimes")])
        .unwrap();

    assert_eq!(result.as_ref().and_then(Value::as_str), Some("cached lecture"));
    assert_eq!(fixture.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_most_specific_throws_handler_recovers() {
    let fixture = Fixture::new();
    let log = fixture.log.clone();
    fixture.weaver.add_advisor(Arc::new(DefaultPointcutAdvisor::new(Arc::new(
        ThrowsAdvice::new("deadlines")
            .on(&Type::error(), move |ctx| {
                record(&log, format!("error:{}", ctx.error.message()));
                Ok(())
            })
            .recover(&missed_deadline(), |ctx| {
                Ok(Some(Value::string(format!("extension for {}", ctx.method.name()))))
            }),
    ))));

    let result = fixture.proxy().invoke(&submit(), vec![]).unwrap();

    assert_eq!(result.as_ref().and_then(Value::as_str), Some("extension for submit"));
    assert!(fixture.entries().is_empty());
}

#[test]
fn test_chain_is_cached_per_method() {
    let fixture = Fixture::new();
    fixture
        .weaver
        .register_singleton(lifecycle_aspect(&fixture.log), Value::string("lifecycle"))
        .unwrap();
    let proxy = fixture.proxy();
    let config = proxy.config();

    let first = config.interceptors(&teach(), &lecturer_type()).unwrap();
    let second = config.interceptors(&teach(), &lecturer_type()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    // expose + around + before + after + after_returning
    assert_eq!(first.len(), 5);
    assert_eq!(config.cached_chain_count(), 1);

    config.add_advice(advice::around(|invocation| invocation.proceed()));
    let third = config.interceptors(&teach(), &lecturer_type()).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.len(), 6);
}

#[test]
fn test_proxy_as_tower_service() {
    let fixture = Fixture::new();
    fixture
        .weaver
        .register_singleton(lifecycle_aspect(&fixture.log), Value::string("lifecycle"))
        .unwrap();

    let result = tokio_test::block_on(
        fixture
            .proxy()
            .oneshot(MethodCall::new(teach(), vec![Value::string("async")])),
    )
    .unwrap();

    assert_eq!(result.as_ref().and_then(Value::as_str), Some("lecture on async"));
    assert_eq!(fixture.entries().first().map(String::as_str), Some("around:pre"));
}

#[test]
fn test_join_point_is_not_exposed_outside_calls() {
    assert!(matches!(
        current_join_point(),
        Err(InvocationError::NoCurrentInvocation(_))
    ));
}

#[test]
fn test_configuration_retargets_advice() {
    let config = WeaveConfig {
        aspects: vec![AspectConfig {
            name: "Lifecycle".to_string(),
            enabled: true,
            advice: vec![AdviceConfig {
                method: "enter".to_string(),
                descriptor: AdviceDescriptor::before("execution(Lecturer.grade)"),
            }],
        }],
        ..Default::default()
    };
    let fixture = Fixture::with_config(config);
    fixture
        .weaver
        .register_singleton(lifecycle_aspect(&fixture.log), Value::string("lifecycle"))
        .unwrap();

    fixture.proxy().invoke(&grade(), vec![]).unwrap();
    assert_eq!(fixture.entries(), vec!["before:grade"]);
}

#[test]
fn test_unknown_configured_aspect_method_is_rejected() {
    let config = WeaveConfig {
        aspects: vec![AspectConfig {
            name: "Lifecycle".to_string(),
            enabled: true,
            advice: vec![AdviceConfig {
                method: "missing".to_string(),
                descriptor: AdviceDescriptor::before("within(Lecturer)"),
            }],
        }],
        ..Default::default()
    };
    let fixture = Fixture::with_config(config);
    let err = fixture
        .weaver
        .register_singleton(lifecycle_aspect(&fixture.log), Value::string("lifecycle"))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownAdviceMethod { .. }));
}
