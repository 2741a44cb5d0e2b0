//! Tests for class creation: C3 linearization, base validation and metaclass selection.

use objmodel::{BuiltinType, ClassBuilder, ExcType, ResourceLimits, RunError, Runtime, Value};
use pretty_assertions::assert_eq;

fn class(rt: &mut Runtime, name: &str, bases: &[&Value]) -> Value {
    ClassBuilder::new(name)
        .bases(bases.iter().map(|&base| base.clone()))
        .build(rt)
        .unwrap()
}

#[test]
fn class_without_bases_derives_from_object() {
    let mut rt = Runtime::new();
    let a = class(&mut rt, "A", &[]);
    assert_eq!(rt.mro_names(&a).unwrap(), ["A", "object"]);
    assert_eq!(rt.bases(&a).unwrap(), vec![rt.builtin(BuiltinType::Object)]);
}

/// `K1(A, B)` puts A before B, `K2(B, A)` the reverse, and `(K1, K2)` cannot be linearized.
#[test]
fn diamond_orders_follow_declaration() {
    let mut rt = Runtime::new();
    let o = class(&mut rt, "O", &[]);
    let a = class(&mut rt, "A", &[&o]);
    let b = class(&mut rt, "B", &[&o]);
    let k1 = class(&mut rt, "K1", &[&a, &b]);
    let k2 = class(&mut rt, "K2", &[&b, &a]);

    assert_eq!(rt.mro_names(&k1).unwrap(), ["K1", "A", "B", "O", "object"]);
    assert_eq!(rt.mro_names(&k2).unwrap(), ["K2", "B", "A", "O", "object"]);

    let err = ClassBuilder::new("Z").base(k1).base(k2).build(&mut rt).unwrap_err();
    assert_eq!(
        err,
        RunError::InconsistentHierarchy {
            bases: vec!["K1".to_owned(), "K2".to_owned()]
        }
    );
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

/// The classic C3 example: every MRO starts with the class, ends with `object`
/// and lists each ancestor once.
#[test]
fn larger_hierarchy_linearizes_monotonically() {
    let mut rt = Runtime::new();
    let a = class(&mut rt, "A", &[]);
    let b = class(&mut rt, "B", &[]);
    let c = class(&mut rt, "C", &[]);
    let d = class(&mut rt, "D", &[]);
    let e = class(&mut rt, "E", &[]);
    let k1 = class(&mut rt, "K1", &[&a, &b, &c]);
    let k2 = class(&mut rt, "K2", &[&d, &b, &e]);
    let k3 = class(&mut rt, "K3", &[&d, &a]);
    let z = class(&mut rt, "Z", &[&k1, &k2, &k3]);

    let mro = rt.mro_names(&z).unwrap();
    assert_eq!(
        mro,
        ["Z", "K1", "K2", "K3", "D", "A", "B", "C", "E", "object"]
    );

    let mut unique = mro.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), mro.len());
}

#[test]
fn base_listed_before_its_subclass_is_inconsistent() {
    let mut rt = Runtime::new();
    let a = class(&mut rt, "A", &[]);
    let b = class(&mut rt, "B", &[&a]);
    let err = ClassBuilder::new("C").base(a).base(b).build(&mut rt).unwrap_err();
    assert_eq!(err.kind(), "InconsistentHierarchy");
}

#[test]
fn duplicate_base_is_rejected() {
    let mut rt = Runtime::new();
    let a = class(&mut rt, "A", &[]);
    let err = ClassBuilder::new("B").base(a.clone()).base(a).build(&mut rt).unwrap_err();
    assert_eq!(err, RunError::DuplicateBase { name: "A".to_owned() });
    assert_eq!(err.to_string(), "TypeError: duplicate base class A");
}

/// A class whose bases cannot be linearized is never allocated.
#[test]
fn failed_class_is_not_allocated() {
    let mut rt = Runtime::new();
    let a = class(&mut rt, "A", &[]);
    let before = rt.heap_stats();
    assert!(ClassBuilder::new("B").base(a.clone()).base(a).build(&mut rt).is_err());
    assert_eq!(rt.heap_stats(), before);
}

#[test]
fn bases_must_be_classes() {
    let mut rt = Runtime::new();
    let err = ClassBuilder::new("A").base(Value::Int(1)).build(&mut rt).unwrap_err();
    assert_eq!(err, ExcType::type_error("bases must be types, not 'int'"));
}

#[test]
fn sealed_builtins_cannot_be_subclassed() {
    let mut rt = Runtime::new();
    let int = rt.builtin(BuiltinType::Int);
    let err = ClassBuilder::new("MyInt").base(int.clone()).build(&mut rt).unwrap_err();
    assert_eq!(err, ExcType::type_error("type 'int' is not an acceptable base type"));

    let err = rt.call(&int, Default::default()).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

#[test]
fn mro_length_limit_is_enforced() {
    let mut rt = Runtime::new().with_limits(ResourceLimits::new().max_mro_length(4));
    let a = class(&mut rt, "A", &[]);
    let b = class(&mut rt, "B", &[&a]);
    // C, B, A, object fits; D, C, B, A, object does not
    let c = class(&mut rt, "C", &[&b]);
    let err = ClassBuilder::new("D").base(c).build(&mut rt).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

// =============================================================================
// Metaclasses
// =============================================================================

#[test]
fn explicit_metaclass_becomes_type_of_class() {
    let mut rt = Runtime::new();
    let type_ = rt.builtin(BuiltinType::Type);
    let meta = class(&mut rt, "Meta", &[&type_]);
    let a = ClassBuilder::new("A").metaclass(meta.clone()).build(&mut rt).unwrap();
    assert_eq!(rt.type_of(&a), meta);

    // subclasses inherit the most derived metaclass
    let b = class(&mut rt, "B", &[&a]);
    assert_eq!(rt.type_of(&b), meta);
    assert!(rt.isinstance(&b, &type_).unwrap());
}

#[test]
fn more_derived_base_metaclass_wins() {
    let mut rt = Runtime::new();
    let type_ = rt.builtin(BuiltinType::Type);
    let meta = class(&mut rt, "Meta", &[&type_]);
    let sub_meta = class(&mut rt, "SubMeta", &[&meta]);
    let a = ClassBuilder::new("A").metaclass(meta.clone()).build(&mut rt).unwrap();
    let b = ClassBuilder::new("B").metaclass(sub_meta.clone()).build(&mut rt).unwrap();

    let c = class(&mut rt, "C", &[&a, &b]);
    assert_eq!(rt.type_of(&c), sub_meta);

    // an explicit but less derived metaclass is overridden by the bases
    let d = ClassBuilder::new("D").base(b).metaclass(meta).build(&mut rt).unwrap();
    assert_eq!(rt.type_of(&d), sub_meta);
}

#[test]
fn unrelated_metaclasses_conflict() {
    let mut rt = Runtime::new();
    let type_ = rt.builtin(BuiltinType::Type);
    let meta1 = class(&mut rt, "Meta1", &[&type_]);
    let meta2 = class(&mut rt, "Meta2", &[&type_]);
    let a = ClassBuilder::new("A").metaclass(meta1).build(&mut rt).unwrap();
    let b = ClassBuilder::new("B").metaclass(meta2).build(&mut rt).unwrap();

    let err = ClassBuilder::new("C").base(a).base(b).build(&mut rt).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert!(err.to_string().contains("metaclass conflict"), "{err}");
}

#[test]
fn metaclass_must_derive_from_type() {
    let mut rt = Runtime::new();
    let plain = class(&mut rt, "Plain", &[]);
    let err = ClassBuilder::new("A").metaclass(plain).build(&mut rt).unwrap_err();
    assert_eq!(err, ExcType::type_error("metaclass 'Plain' is not a subclass of 'type'"));
}

#[test]
fn subtype_checks_follow_the_mro() {
    let mut rt = Runtime::new();
    let a = class(&mut rt, "A", &[]);
    let b = class(&mut rt, "B", &[&a]);
    let c = class(&mut rt, "C", &[]);
    let obj = rt.call(&b, Default::default()).unwrap();

    assert!(rt.issubclass(&b, &a).unwrap());
    assert!(rt.issubclass(&b, &b).unwrap());
    assert!(!rt.issubclass(&a, &b).unwrap());
    assert!(rt.isinstance(&obj, &a).unwrap());
    assert!(!rt.isinstance(&obj, &c).unwrap());
    assert!(rt.isinstance(&obj, &rt.builtin(BuiltinType::Object)).unwrap());
    assert!(rt.issubclass(&obj, &a).is_err());
}
