//! What hooks can see about the call they intercept
//!
//! Tests cover:
//! - Transparency: return value, arguments and block pass through unchanged
//! - Receiver, method name, arguments, block, return value and raised error
//! - Installation options
//! - Warnings on reading the outcome before the call has finished

mod common;

use std::sync::Arc;

use common::{define_romeo, init_logging, Audience, LINE};
use waylay_engine::{
    block, CallError, ClassDefinition, Frame, Hooks, Installer, MemorySink, Options, Runtime,
    RuntimeConfig, Target, Value,
};

fn install_on_romeo(
    runtime: &Runtime,
    audience: &Audience,
    hooks: Hooks,
    options: Options,
) -> Value {
    let romeo = define_romeo(runtime, audience);
    Installer::for_hooks(runtime, hooks)
        .install(Target::instance_methods(romeo), &["wax_poetic"], options)
        .unwrap();
    runtime.instantiate(romeo)
}

fn runtime_with_sink(config: RuntimeConfig) -> (Runtime, Arc<MemorySink>) {
    init_logging();
    let sink = Arc::new(MemorySink::new());
    let runtime = Runtime::builder()
        .config(config)
        .warning_sink(sink.clone())
        .build();
    (runtime, sink)
}

// ============================================================================
// Transparency
// ============================================================================

#[test]
fn test_return_value_args_and_block_pass_through() {
    init_logging();
    let runtime = Runtime::new();
    let chef = runtime.define_class(ClassDefinition::new("Chef").method(
        "cook",
        |rt: &Runtime, frame: &Frame| {
            let served = frame.yield_block(rt, &[Value::symbol("chunky_bacon")])?;
            Ok(Value::array(vec![frame.arg_or(0, ()), served]))
        },
    ));
    Installer::for_hooks(&runtime, Hooks::new().around(|call| call.run().map(drop)))
        .install(Target::instance_methods(chef), &["cook"], Options::new())
        .unwrap();

    let plate = runtime
        .call_with_block(
            &runtime.instantiate(chef),
            "cook",
            vec![Value::from("eggs")],
            Some(block(|_rt, args| {
                Ok(Value::from(format!("{} with toast", args[0].inspect())))
            })),
        )
        .unwrap();

    assert_eq!(
        plate,
        Value::array(vec![Value::from("eggs"), Value::from(":chunky_bacon with toast")])
    );
}

#[test]
fn test_missing_block_still_raises_through_interceptor() {
    let runtime = Runtime::new();
    let chef = runtime.define_class(ClassDefinition::new("Chef").method(
        "cook",
        |rt: &Runtime, frame: &Frame| frame.yield_block(rt, &[]),
    ));
    Installer::for_hooks(&runtime, Hooks::new())
        .install(Target::instance_methods(chef), &["cook"], Options::new())
        .unwrap();

    let err = runtime.call(&runtime.instantiate(chef), "cook", vec![]).unwrap_err();

    assert_eq!(err.exception().map(|e| e.kind()), Some("LocalJumpError"));
}

// ============================================================================
// Call data
// ============================================================================

#[test]
fn test_hooks_see_receiver_name_and_arguments() {
    init_logging();
    let audience = Audience::new();
    let runtime = Runtime::new();
    let seen = audience.clone();
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new().before(move |call| {
            let name = call
                .receiver()
                .as_object()
                .and_then(|obj| obj.get_field("name"))
                .unwrap_or_default();
            seen.remember(format!("{} is about to {}", name, call.method_name()));
            seen.remember(format!("remembered_lines = {}", call.arguments()[0]));
            seen.remember(format!("block given: {}", call.block().is_some()));
            Ok(())
        }),
        Options::new(),
    );
    romeo
        .as_object()
        .unwrap()
        .set_field("name", Value::from("Romeo Montague"));

    runtime.call(&romeo, "wax_poetic", vec![Value::Bool(true)]).unwrap();

    assert_eq!(
        audience.recall(),
        vec![
            "Romeo Montague is about to wax_poetic",
            "remembered_lines = true",
            "block given: false",
            LINE,
        ]
    );
}

#[test]
fn test_after_sees_return_value() {
    let audience = Audience::new();
    let (runtime, sink) = runtime_with_sink(RuntimeConfig::default());
    let seen = audience.clone();
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new().after(move |call| {
            let said = call.return_value().unwrap_or_default();
            seen.remember(format!("Romeo said {}", said.inspect()));
            Ok(())
        }),
        Options::new(),
    );

    runtime.call(&romeo, "wax_poetic", vec![]).unwrap();

    assert_eq!(audience.recall()[1], format!("Romeo said {:?}", LINE));
    assert!(sink.is_empty());
}

#[test]
fn test_on_exception_sees_raised_error() {
    let audience = Audience::new();
    let (runtime, sink) = runtime_with_sink(RuntimeConfig::default());
    let seen = audience.clone();
    let class = runtime.define_class(
        ClassDefinition::new("Nurse").method("fret", |_rt, _frame| Err(CallError::runtime("panic"))),
    );
    Installer::for_hooks(
        &runtime,
        Hooks::new().on_exception(move |call| {
            let raised = call.raised_error().map(|e| e.to_string()).unwrap_or_default();
            seen.remember(format!("caught {}", raised));
            Ok(())
        }),
    )
    .install(Target::instance_methods(class), &["fret"], Options::new())
    .unwrap();

    let err = runtime.call(&runtime.instantiate(class), "fret", vec![]).unwrap_err();

    assert_eq!(err.to_string(), "panic");
    assert_eq!(audience.recall(), vec!["caught panic"]);
    assert!(sink.is_empty());
}

#[test]
fn test_hooks_see_installation_options() {
    init_logging();
    let audience = Audience::new();
    let runtime = Runtime::new();
    let seen = audience.clone();
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new().after(move |call| {
            let crowd = call.options().get_int("people_on_stage").unwrap_or(1);
            seen.remember(if crowd > 1 { "EXEUNT" } else { "EXIT" });
            Ok(())
        }),
        Options::new().with("people_on_stage", 2),
    );

    runtime.call(&romeo, "wax_poetic", vec![]).unwrap();

    assert_eq!(audience.recall(), vec![LINE, "EXEUNT"]);
}

#[test]
fn test_options_from_json() {
    let options =
        Options::try_from(serde_json::json!({ "people_on_stage": 3, "me": "Tybalt" })).unwrap();

    assert_eq!(options.get_int("people_on_stage"), Some(3));
    assert_eq!(options.get_str("me"), Some("Tybalt"));
}

// ============================================================================
// Early access warnings
// ============================================================================

#[test]
fn test_return_value_in_before_warns_once() {
    let audience = Audience::new();
    let (runtime, sink) = runtime_with_sink(RuntimeConfig::default());
    let seen = audience.clone();
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new().before(move |call| {
            if call.return_value().is_none() {
                seen.remember("nothing yet");
            }
            Ok(())
        }),
        Options::new(),
    );

    runtime.call(&romeo, "wax_poetic", vec![]).unwrap();

    assert_eq!(
        sink.take(),
        vec!["accessing `return_value` of `wax_poetic` from `before`, where it is not yet set"]
    );
    assert!(audience.recalls_in_order(&["nothing yet", LINE]));
}

#[test]
fn test_raised_error_in_around_before_run_warns() {
    let audience = Audience::new();
    let (runtime, sink) = runtime_with_sink(RuntimeConfig::default());
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new().around(|call| {
            let _ = call.raised_error();
            call.run()?;
            // finished by now, so no second warning
            let _ = call.raised_error();
            let _ = call.return_value();
            Ok(())
        }),
        Options::new(),
    );

    runtime.call(&romeo, "wax_poetic", vec![]).unwrap();

    assert_eq!(
        sink.take(),
        vec!["accessing `raised_error` of `wax_poetic` from `around`, where it is not yet set"]
    );
}

#[test]
fn test_early_access_warning_can_be_disabled() {
    let audience = Audience::new();
    let (runtime, sink) = runtime_with_sink(RuntimeConfig {
        warn_on_early_access: false,
        ..RuntimeConfig::default()
    });
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new().before(|call| {
            let _ = call.return_value();
            let _ = call.raised_error();
            Ok(())
        }),
        Options::new(),
    );

    runtime.call(&romeo, "wax_poetic", vec![]).unwrap();

    assert!(sink.is_empty());
}

#[test]
fn test_second_run_warns_and_reuses_outcome() {
    let audience = Audience::new();
    let (runtime, sink) = runtime_with_sink(RuntimeConfig::default());
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new().around(|call| {
            let first = call.run()?;
            let second = call.run()?;
            assert_eq!(first, second);
            Ok(())
        }),
        Options::new(),
    );

    let said = runtime.call(&romeo, "wax_poetic", vec![]).unwrap();

    assert_eq!(said, Value::from(LINE));
    assert_eq!(audience.count(LINE), 1);
    assert_eq!(sink.len(), 1);
    assert!(sink.messages()[0].contains("more than once"));
}

#[test]
fn test_state_seen_from_each_hook() {
    let audience = Audience::new();
    let runtime = Runtime::new();
    let (before, after, around, ensure) = (
        audience.clone(),
        audience.clone(),
        audience.clone(),
        audience.clone(),
    );
    let romeo = install_on_romeo(
        &runtime,
        &audience,
        Hooks::new()
            .before(move |call| {
                before.remember(format!("before {:?}", call.state()));
                Ok(())
            })
            .after(move |call| {
                after.remember(format!("after {:?}", call.state()));
                Ok(())
            })
            .around(move |call| {
                call.run()?;
                around.remember(format!("around {:?}", call.state()));
                Ok(())
            })
            .ensure(move |call| {
                ensure.remember(format!("ensure {:?}", call.state()));
                Ok(())
            }),
        Options::new(),
    );

    runtime.call(&romeo, "wax_poetic", vec![]).unwrap();

    assert_eq!(
        audience.recall(),
        vec![
            "before AroundRunning",
            LINE,
            "after Finished",
            "around Finished",
            "ensure Finished",
        ]
    );
}
