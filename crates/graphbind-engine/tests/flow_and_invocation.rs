//! Integration tests for flow activation, instrumentation and descriptor
//! argument invocation

mod common;

use std::sync::Arc;

use common::{scene, TestGraph};
use graphbind_engine::{
    BindContext, DebugEvent, DebugRecorder, EngineOptions, Initializer, MemberRef,
    MultiArgInvocation,
};
use graphbind_sdk::{
    BindError, Callable, FlowOutcome, FlowPort, FlowState, NodeId, ParamMode, ParamSig, Signature,
    Type, Value, VariableContainer, VariableScope,
};

#[test]
fn test_out_parameter_written_back_into_argument_descriptor() {
    let scene = scene(EngineOptions::default());
    let graph = TestGraph::default();
    graph.locals.declare("remainder", Type::I32, Value::I32(-1));
    let ctx = BindContext::new(&scene.engine, &graph);

    let divide = MemberRef::function(
        "Divide",
        &Signature::new(vec![Type::I32, Type::I32, Type::I32], Type::I32),
    );
    let mut call = MultiArgInvocation::new(
        divide,
        vec![
            MemberRef::inline_value(Value::I32(17)),
            MemberRef::inline_value(Value::I32(5)),
            MemberRef::variable(VariableScope::Local, "remainder", &Type::I32),
        ],
    );

    assert_eq!(call.get(&ctx).unwrap(), Value::I32(3));
    assert_eq!(graph.locals.get_variable("remainder").unwrap(), Value::I32(2));
}

#[test]
fn test_out_parameter_of_function_held_in_variable() {
    let scene = scene(EngineOptions::default());
    let graph = TestGraph::default();
    let sig = Signature {
        params: vec![
            ParamSig::new(Type::I32),
            ParamSig::with_mode(Type::I32, ParamMode::Out),
        ],
        ret: Type::I32,
    };
    let split = Callable::new(sig.clone(), |args| {
        args[1] = Value::I32(99);
        Ok(args[0].clone())
    });
    graph
        .locals
        .declare("typed", Type::function(sig.clone()), Value::Function(split.clone()));
    graph.locals.declare("untyped", Type::OBJECT, Value::Function(split));
    graph.locals.declare("out", Type::I32, Value::I32(0));
    let ctx = BindContext::new(&scene.engine, &graph);

    for (name, ty) in [("typed", Type::function(sig)), ("untyped", Type::OBJECT)] {
        graph.locals.set_variable("out", Value::I32(0)).unwrap();
        let mut call = MultiArgInvocation::new(
            MemberRef::variable(VariableScope::Local, name, &ty),
            vec![
                MemberRef::inline_value(Value::I32(1)),
                MemberRef::variable(VariableScope::Local, "out", &Type::I32),
            ],
        );
        assert_eq!(call.get(&ctx).unwrap(), Value::I32(1));
        assert_eq!(graph.locals.get_variable("out").unwrap(), Value::I32(99), "{}", name);
    }
}

#[test]
fn test_out_parameter_placeholder_argument() {
    let scene = scene(EngineOptions::default());
    let graph = TestGraph::default();
    let ctx = BindContext::new(&scene.engine, &graph);

    let divide = MemberRef::function(
        "Divide",
        &Signature::new(vec![Type::I32, Type::I32, Type::I32], Type::I32),
    );
    let mut call = MultiArgInvocation::new(
        divide,
        vec![
            MemberRef::inline_value(Value::I32(5)),
            MemberRef::inline_value(Value::I32(2)),
            MemberRef::none(),
        ],
    );
    // The unassigned placeholder cannot take the result; the call still runs
    assert_eq!(call.get(&ctx).unwrap(), Value::I32(2));
}

#[test]
fn test_invocation_errors_propagate() {
    let scene = scene(EngineOptions::default());
    let graph = TestGraph::default();
    let ctx = BindContext::new(&scene.engine, &graph);

    let divide = MemberRef::function(
        "Divide",
        &Signature::new(vec![Type::I32, Type::I32, Type::I32], Type::I32),
    );
    let mut call = MultiArgInvocation::new(
        divide,
        vec![
            MemberRef::inline_value(Value::I32(1)),
            MemberRef::inline_value(Value::I32(0)),
            MemberRef::none(),
        ],
    )
    .with_initializer(Initializer::new());
    assert!(matches!(call.get(&ctx), Err(BindError::Argument(_))));
}

#[test]
fn test_flow_ports() {
    let scene = scene(EngineOptions::default());
    let graph = TestGraph::default();
    let ctx = BindContext::new(&scene.engine, &graph);

    let mut entry = MemberRef::flow_node(NodeId(1));
    let mut reset = MemberRef::flow_input(NodeId(2), "reset");
    let mut extra = MemberRef::flow_input_extended(NodeId(2), "branch");

    assert!(entry.activate_flow_node(&ctx).unwrap().is_finished());
    reset.activate_flow_node(&ctx).unwrap();
    extra.activate_flow_node(&ctx).unwrap();

    let activations = graph.nodes.activations.borrow();
    assert_eq!(
        *activations,
        vec![
            (NodeId(1), FlowPort::Entry),
            (NodeId(2), FlowPort::Input("reset".to_string())),
            (NodeId(2), FlowPort::Extended("branch".to_string())),
        ]
    );
}

#[test]
fn test_flow_targets_are_not_readable() {
    let scene = scene(EngineOptions::default());
    let graph = TestGraph::default();
    let ctx = BindContext::new(&scene.engine, &graph);

    let mut entry = MemberRef::flow_node(NodeId(1));
    assert!(!entry.can_get(&ctx));
    assert!(matches!(entry.get(&ctx), Err(BindError::Unsupported { .. })));
    assert!(matches!(entry.invoke(&ctx, &mut []), Err(BindError::Unsupported { .. })));
    assert_eq!(entry.target_type(&ctx).unwrap(), Type::VOID);
}

#[test]
fn test_invoke_flow_on_plain_target_finishes() {
    let scene = scene(EngineOptions::default());
    let graph = TestGraph::default();
    let ctx = BindContext::new(&scene.engine, &graph);

    let mut answer = MemberRef::function("Answer", &Signature::new(Vec::new(), Type::I32));
    assert!(matches!(
        answer.invoke_flow(&ctx, &mut []).unwrap(),
        FlowOutcome::Finished
    ));
    assert!(matches!(
        answer.activate_flow_node(&ctx),
        Err(BindError::Unsupported { .. })
    ));
}

#[test]
fn test_debug_hooks_record_operations_and_suspended_flow() {
    let recorder = Arc::new(DebugRecorder::new(8));
    let mut scene = scene(EngineOptions::debugging());
    scene.engine = scene.engine.with_hooks(recorder.clone());
    let graph = TestGraph::default();
    graph.instance.declare("score", Type::I32, Value::I32(0));
    let handle = graph.nodes.suspend_on(NodeId(9));
    let ctx = BindContext::new(&scene.engine, &graph).with_node(NodeId(4));

    let mut score = MemberRef::variable(VariableScope::Instance, "score", &Type::I32);
    score.set(&ctx, Value::I32(3)).unwrap();
    score.get(&ctx).unwrap();

    let records = recorder.records(NodeId(4), "score");
    assert_eq!(records.len(), 2);
    assert!(matches!(&records[0].event, DebugEvent::Set(Value::I32(3))));
    assert!(matches!(&records[1].event, DebugEvent::Get(Value::I32(3))));

    let mut wait = MemberRef::flow_node(NodeId(9));
    let outcome = wait.activate_flow_node(&ctx).unwrap();
    assert!(!outcome.is_finished());
    assert!(matches!(
        recorder.latest(NodeId(9), "entry").map(|r| r.event),
        Some(DebugEvent::Flow(FlowState::Suspended))
    ));

    handle.finish();
    assert!(matches!(
        recorder.latest(NodeId(9), "entry").map(|r| r.event),
        Some(DebugEvent::Flow(FlowState::Finished))
    ));
}

#[test]
fn test_instrumented_engine_records_with_configured_capacity() {
    let scene = scene(EngineOptions {
        debug_records_per_slot: 2,
        ..EngineOptions::debugging()
    });
    let graph = TestGraph::default();
    graph.instance.declare("score", Type::I32, Value::I32(0));
    let ctx = BindContext::new(&scene.engine, &graph).with_node(NodeId(5));

    let mut score = MemberRef::variable(VariableScope::Instance, "score", &Type::I32);
    for i in 1..=3 {
        score.set(&ctx, Value::I32(i)).unwrap();
    }

    let recorder = scene.engine.recorder().unwrap().clone();
    let records = recorder.records(NodeId(5), "score");
    assert_eq!(records.len(), 2);
    assert!(matches!(&records[1].event, DebugEvent::Set(Value::I32(3))));
    assert!(scene.engine.with_hooks(recorder).recorder().is_none());
}

#[test]
fn test_hooks_are_silent_without_instrumentation() {
    let recorder = Arc::new(DebugRecorder::new(8));
    let mut scene = scene(EngineOptions::default());
    scene.engine = scene.engine.with_hooks(recorder.clone());
    let graph = TestGraph::default();
    graph.instance.declare("score", Type::I32, Value::I32(0));
    let ctx = BindContext::new(&scene.engine, &graph).with_node(NodeId(4));

    let mut score = MemberRef::variable(VariableScope::Instance, "score", &Type::I32);
    score.get(&ctx).unwrap();
    assert!(recorder.records(NodeId(4), "score").is_empty());
}
