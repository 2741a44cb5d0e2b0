//! Tests for attribute reads on classes themselves, and for the builtin
//! descriptor kinds (`function`, `staticmethod`, `classmethod`, `property`).

use objmodel::{Args, BuiltinType, ClassBuilder, ResolvedBy, RunError, Runtime, Value};
use pretty_assertions::assert_eq;
use smallvec::smallvec;

fn metaclass(rt: &mut Runtime, name: &str) -> Value {
    let type_ = rt.builtin(BuiltinType::Type);
    ClassBuilder::new(name).base(type_).build(rt).unwrap()
}

/// Returns the class name of argument 0, used as a classmethod body.
fn name_of_first(rt: &mut Runtime) -> Value {
    rt.function("name_of", |rt, args| {
        let name = rt.class_name(&args[0]).unwrap_or("?").to_owned();
        Ok(Value::from(name))
    })
}

#[test]
fn metaclass_attributes_are_visible_on_class_only() {
    let mut rt = Runtime::new();
    let meta = metaclass(&mut rt, "Meta");
    rt.setattr(&meta, "tag", Value::from("meta")).unwrap();
    let a = ClassBuilder::new("A").metaclass(meta).build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();

    assert_eq!(rt.getattr(&a, "tag").unwrap(), Value::from("meta"));
    let err = rt.getattr(&obj, "tag").unwrap_err();
    assert_eq!(err.to_string(), "AttributeError: 'A' object has no attribute 'tag'");
}

#[test]
fn class_attribute_beats_metaclass_plain_value() {
    let mut rt = Runtime::new();
    let meta = metaclass(&mut rt, "Meta");
    rt.setattr(&meta, "x", Value::Int(1)).unwrap();
    let a = ClassBuilder::new("A")
        .metaclass(meta)
        .attr("x", Value::Int(2))
        .build(&mut rt)
        .unwrap();
    assert_eq!(rt.getattr(&a, "x").unwrap(), Value::Int(2));
}

#[test]
fn metaclass_data_descriptor_beats_class_attribute() {
    let mut rt = Runtime::new();
    let getter = rt.function("y", |_, _| Ok(Value::from("meta property")));
    let prop = rt.property(Some(getter), None, None);
    let type_ = rt.builtin(BuiltinType::Type);
    let meta = ClassBuilder::new("Meta").base(type_).attr("y", prop).build(&mut rt).unwrap();
    let a = ClassBuilder::new("A")
        .metaclass(meta)
        .attr("y", Value::Int(5))
        .build(&mut rt)
        .unwrap();
    assert_eq!(rt.getattr(&a, "y").unwrap(), Value::from("meta property"));
}

#[test]
fn metaclass_method_binds_to_the_class() {
    let mut rt = Runtime::new();
    let describe = name_of_first(&mut rt);
    let type_ = rt.builtin(BuiltinType::Type);
    let meta = ClassBuilder::new("Meta")
        .base(type_)
        .attr("describe", describe)
        .build(&mut rt)
        .unwrap();
    let a = ClassBuilder::new("A").metaclass(meta).build(&mut rt).unwrap();
    assert_eq!(rt.call_method(&a, "describe", Args::new()).unwrap(), Value::from("A"));
}

#[test]
fn metaclass_getattr_hook_handles_class_misses() {
    let mut rt = Runtime::new();
    let hook = rt.function("__getattr__", |rt, args| {
        let cls = rt.class_name(&args[0]).unwrap_or("?").to_owned();
        let name = args[1].as_str().unwrap_or("?").to_owned();
        Ok(Value::from(format!("{cls}.{name}")))
    });
    let type_ = rt.builtin(BuiltinType::Type);
    let meta = ClassBuilder::new("Meta")
        .base(type_)
        .attr("__getattr__", hook)
        .build(&mut rt)
        .unwrap();
    let a = ClassBuilder::new("A").metaclass(meta).build(&mut rt).unwrap();
    assert_eq!(rt.getattr(&a, "anything").unwrap(), Value::from("A.anything"));

    // the hook is on the metaclass, so instances do not see it
    let obj = rt.call(&a, Args::new()).unwrap();
    assert!(matches!(
        rt.getattr(&obj, "anything"),
        Err(RunError::AttributeNotFound { .. })
    ));
}

#[test]
fn missing_class_attribute_names_type_object() {
    let mut rt = Runtime::new();
    let a = ClassBuilder::new("A").build(&mut rt).unwrap();
    let err = rt.getattr(&a, "q").unwrap_err();
    assert_eq!(err.to_string(), "AttributeError: type object 'A' has no attribute 'q'");
}

// =============================================================================
// Builtin descriptors
// =============================================================================

#[test]
fn name_and_class_are_builtin_data_descriptors() {
    let mut rt = Runtime::new();
    let a = ClassBuilder::new("A").attr("__name__", Value::from("shadow")).build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();

    // type.__name__ is a data descriptor on the metatype, so it beats the namespace
    assert_eq!(rt.getattr(&a, "__name__").unwrap(), Value::from("A"));
    // instances do not see the metatype, only the namespace entry
    assert_eq!(rt.getattr(&obj, "__name__").unwrap(), Value::from("shadow"));

    assert_eq!(rt.getattr(&obj, "__class__").unwrap(), a);
    assert_eq!(rt.getattr(&a, "__class__").unwrap(), rt.builtin(BuiltinType::Type));
}

#[test]
fn function_on_class_is_returned_unbound() {
    let mut rt = Runtime::new();
    let func = rt.function("f", |_, args| Ok(Value::Int(i64::try_from(args.len()).unwrap_or(-1))));
    let a = ClassBuilder::new("A").attr("f", func.clone()).build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();

    assert_eq!(rt.getattr(&a, "f").unwrap(), func);
    let bound = rt.getattr(&obj, "f").unwrap();
    assert_eq!(rt.type_name(&bound), "method");
    assert_eq!(rt.call(&bound, smallvec![Value::None]).unwrap(), Value::Int(2));
}

#[test]
fn staticmethod_unwraps_everywhere() {
    let mut rt = Runtime::new();
    let func = rt.function("add", |_, args| {
        Ok(Value::Int(args[0].as_int().unwrap_or(0) + args[1].as_int().unwrap_or(0)))
    });
    let wrapped = rt.staticmethod(func.clone());
    let a = ClassBuilder::new("A").attr("add", wrapped).build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();

    assert_eq!(rt.getattr(&a, "add").unwrap(), func);
    assert_eq!(rt.getattr(&obj, "add").unwrap(), func);
    let sum = rt.call_method(&obj, "add", smallvec![Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(sum, Value::Int(5));
}

#[test]
fn classmethod_binds_to_the_owner() {
    let mut rt = Runtime::new();
    let func = name_of_first(&mut rt);
    let wrapped = rt.classmethod(func);
    let a = ClassBuilder::new("A").attr("which", wrapped).build(&mut rt).unwrap();
    let b = ClassBuilder::new("B").base(a.clone()).build(&mut rt).unwrap();
    let obj = rt.call(&b, Args::new()).unwrap();

    assert_eq!(rt.call_method(&a, "which", Args::new()).unwrap(), Value::from("A"));
    assert_eq!(rt.call_method(&b, "which", Args::new()).unwrap(), Value::from("B"));
    assert_eq!(rt.call_method(&obj, "which", Args::new()).unwrap(), Value::from("B"));
}

#[test]
fn property_on_class_returns_the_property() {
    let mut rt = Runtime::new();
    let getter = rt.function("size", |_, _| Ok(Value::Int(3)));
    let prop = rt.property(Some(getter), None, None);
    let a = ClassBuilder::new("A").attr("size", prop.clone()).build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();

    assert_eq!(rt.getattr(&a, "size").unwrap(), prop);
    assert_eq!(rt.getattr(&obj, "size").unwrap(), Value::Int(3));
}

#[test]
fn property_without_getter_is_unreadable() {
    let mut rt = Runtime::new();
    let setter = rt.function("secret", |_, _| Ok(Value::None));
    let prop = rt.property(None, Some(setter), None);
    let a = ClassBuilder::new("A").attr("secret", prop).build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();

    let err = rt.getattr(&obj, "secret").unwrap_err();
    assert_eq!(
        err.to_string(),
        "AttributeError: property 'secret' of 'A' object has no getter"
    );
}

/// A user descriptor read through the class gets no instance and the class as owner.
#[test]
fn user_descriptor_type_level_access() {
    let tracer = objmodel::RecordingTracer::new();
    let mut rt = Runtime::new().with_tracer(tracer.clone());
    let get = rt.function("__get__", |rt, args| {
        assert!(args[1].is_none());
        let owner = rt.class_name(&args[2]).unwrap_or("?").to_owned();
        Ok(Value::from(owner))
    });
    let desc_cls = ClassBuilder::new("Desc").attr("__get__", get).build(&mut rt).unwrap();
    let desc = rt.call(&desc_cls, Args::new()).unwrap();
    let a = ClassBuilder::new("A").attr("d", desc).build(&mut rt).unwrap();
    let b = ClassBuilder::new("B").base(a).build(&mut rt).unwrap();

    tracer.clear();
    assert_eq!(rt.getattr(&b, "d").unwrap(), Value::from("B"));
    assert_eq!(tracer.resolved_steps(), vec![ResolvedBy::NonDataDescriptor]);
}

#[test]
fn calling_type_with_one_argument_returns_its_type() {
    let mut rt = Runtime::new();
    let type_ = rt.builtin(BuiltinType::Type);
    let a = ClassBuilder::new("A").build(&mut rt).unwrap();
    let obj = rt.call(&a, Args::new()).unwrap();
    assert_eq!(rt.call(&type_, smallvec![obj]).unwrap(), a);
    assert_eq!(
        rt.call(&type_, smallvec![Value::Int(1)]).unwrap(),
        rt.builtin(BuiltinType::Int)
    );
}
