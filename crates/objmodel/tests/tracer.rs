//! Tests for lookup tracing: each resolution step is reported through `LookupTracer`.

use objmodel::{
    Args, BuiltinType, ClassBuilder, DescriptorKind, RecordingTracer, ResolvedBy, Runtime, StderrTracer, TraceEvent,
    Value,
};
use pretty_assertions::assert_eq;

fn traced_runtime() -> (Runtime, RecordingTracer) {
    let tracer = RecordingTracer::new();
    let rt = Runtime::new().with_tracer(tracer.clone());
    (rt, tracer)
}

#[test]
fn class_creation_reports_mro() {
    let (mut rt, tracer) = traced_runtime();
    let a = ClassBuilder::new("A").build(&mut rt).unwrap();
    ClassBuilder::new("B").base(a).build(&mut rt).unwrap();

    assert_eq!(
        tracer.events(),
        vec![
            TraceEvent::ClassCreated {
                name: "A".to_owned(),
                mro: vec!["A".to_owned(), "object".to_owned()],
            },
            TraceEvent::ClassCreated {
                name: "B".to_owned(),
                mro: vec!["B".to_owned(), "A".to_owned(), "object".to_owned()],
            },
        ]
    );
}

/// One read per precedence step, in order.
#[test]
fn every_instance_step_is_reported() {
    let (mut rt, tracer) = traced_runtime();
    let getter = rt.function("data", |_, _| Ok(Value::Int(1)));
    let prop = rt.property(Some(getter), None, None);
    let method = rt.function("method", |_, _| Ok(Value::None));
    let hook = rt.function("__getattr__", |_, _| Ok(Value::from("dynamic")));
    let a = ClassBuilder::new("A")
        .attr("data", prop)
        .attr("method", method)
        .attr("plain", Value::Int(2))
        .attr("__getattr__", hook)
        .build(&mut rt)
        .unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();
    rt.setattr(&obj, "own", Value::Int(3)).unwrap();
    tracer.clear();

    for name in ["data", "own", "method", "plain", "synthesized"] {
        rt.getattr(&obj, name).unwrap();
    }
    assert_eq!(
        tracer.resolved_steps(),
        vec![
            ResolvedBy::DataDescriptor,
            ResolvedBy::InstanceValue,
            ResolvedBy::NonDataDescriptor,
            ResolvedBy::ClassValue,
            ResolvedBy::FallbackHook,
        ]
    );
}

#[test]
fn descriptor_gets_and_misses_are_reported() {
    let (mut rt, tracer) = traced_runtime();
    let method = rt.function("m", |_, _| Ok(Value::None));
    let a = ClassBuilder::new("A").attr("m", method).build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();
    tracer.clear();

    rt.getattr(&obj, "m").unwrap();
    rt.getattr(&obj, "nope").unwrap_err();
    assert_eq!(
        tracer.events(),
        vec![
            TraceEvent::DescriptorGet {
                name: "m".to_owned(),
                kind: DescriptorKind::NonData,
            },
            TraceEvent::Resolved {
                owner: "A".to_owned(),
                name: "m".to_owned(),
                by: ResolvedBy::NonDataDescriptor,
            },
            TraceEvent::NotFound {
                owner: "A".to_owned(),
                name: "nope".to_owned(),
            },
        ]
    );
}

#[test]
fn type_level_steps_are_reported() {
    let (mut rt, tracer) = traced_runtime();
    let type_ = rt.builtin(BuiltinType::Type);
    let meta = ClassBuilder::new("Meta")
        .base(type_)
        .attr("meta_plain", Value::Int(1))
        .build(&mut rt)
        .unwrap();
    let a = ClassBuilder::new("A")
        .metaclass(meta)
        .attr("own", Value::Int(2))
        .build(&mut rt)
        .unwrap();
    tracer.clear();

    for name in ["__name__", "own", "meta_plain"] {
        rt.getattr(&a, name).unwrap();
    }
    assert_eq!(
        tracer.resolved_steps(),
        vec![
            ResolvedBy::MetaDataDescriptor,
            ResolvedBy::ClassValue,
            ResolvedBy::MetaValue,
        ]
    );
}

#[test]
fn super_lookups_are_reported() {
    let (mut rt, tracer) = traced_runtime();
    let a = ClassBuilder::new("A").attr("x", Value::Int(1)).build(&mut rt).unwrap();
    let b = ClassBuilder::new("B").base(a).build(&mut rt).unwrap();
    let obj = rt.call(&b, Args::new()).unwrap();
    tracer.clear();

    assert_eq!(rt.super_getattr(&obj, &b, "x").unwrap(), Value::Int(1));
    assert_eq!(tracer.resolved_steps(), vec![ResolvedBy::Super]);
}

#[test]
fn events_render_for_humans() {
    let event = TraceEvent::Resolved {
        owner: "A".to_owned(),
        name: "x".to_owned(),
        by: ResolvedBy::InstanceValue,
    };
    assert_eq!(event.to_string(), "A.x <- InstanceValue");
    let event = TraceEvent::DescriptorGet {
        name: "p".to_owned(),
        kind: DescriptorKind::Data,
    };
    assert_eq!(event.to_string(), "p: calling data descriptor get");
}

/// The stderr tracer sees the same events; lookups behave the same with it installed.
#[test]
fn stderr_tracer_does_not_change_results() {
    for tracer in [StderrTracer::new(), StderrTracer::quiet()] {
        let mut rt = Runtime::new().with_tracer(tracer);
        let getter = rt.function("p", |_, _| Ok(Value::Int(7)));
        let prop = rt.property(Some(getter), None, None);
        let hook = rt.function("__getattr__", |_, args| Ok(args[1].clone()));
        let a = ClassBuilder::new("A")
            .attr("p", prop)
            .attr("__getattr__", hook)
            .build(&mut rt)
            .unwrap();
        let obj = rt.call(&a, Args::new()).unwrap();

        assert_eq!(rt.getattr(&obj, "p").unwrap(), Value::Int(7));
        assert_eq!(rt.getattr(&obj, "missing").unwrap(), Value::from("missing"));
        assert!(rt.getattr(&a, "missing").is_err());
        assert!(rt.collect_garbage(&[]) >= 5, "class, instance and accessors are unrooted");
    }
}
