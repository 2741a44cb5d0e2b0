//! Heap object types: classes, instances, callables and builtin descriptors.

pub(crate) mod class;
pub(crate) mod dict;
pub(crate) mod function;

pub(crate) use class::{ClassObject, Instance};
pub(crate) use dict::Dict;
pub use function::{Args, NativeFn, arg_at};
pub(crate) use function::{BoundMethod, ClassMethod, NativeFunction, Property, StaticMethod};
