//! Callables and the builtin descriptor wrappers.
//!
//! - [`NativeFunction`]: a Rust closure; a non-data descriptor that binds to instances.
//! - [`BoundMethod`]: a function paired with its receiver.
//! - [`StaticMethod`] / [`ClassMethod`]: non-data wrappers that unwrap or bind to the owner.
//! - [`Property`]: a data descriptor with optional getter, setter and deleter.

use std::{fmt, rc::Rc};

use smallvec::SmallVec;

use crate::{
    exception::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    value::Value,
};

/// Positional arguments passed to a callable.
pub type Args = SmallVec<[Value; 4]>;

/// Signature of every native callable.
///
/// Closures may re-enter the runtime (read attributes, call other functions).
/// Heap references captured by a closure are invisible to the collector, so
/// keep them rooted when calling [`Runtime::collect_garbage`].
pub type NativeFn = Rc<dyn Fn(&mut Runtime, Args) -> RunResult<Value>>;

/// Returns positional argument `index`, or a TypeError naming `func` when too few were passed.
pub fn arg_at<'a>(args: &'a Args, index: usize, func: &str) -> RunResult<&'a Value> {
    args.get(index).ok_or_else(|| {
        ExcType::type_error(format!(
            "{func}() missing required positional argument (expected at least {}, got {})",
            index + 1,
            args.len()
        ))
    })
}

/// A function implemented in Rust.
pub(crate) struct NativeFunction {
    name: String,
    func: NativeFn,
}

impl NativeFunction {
    #[must_use]
    pub fn new(name: impl Into<String>, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a shared handle to the closure so it can run without borrowing the heap.
    #[must_use]
    pub fn func(&self) -> NativeFn {
        Rc::clone(&self.func)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A callable bound to a receiver; calling it prepends the receiver to the arguments.
#[derive(Debug, Clone)]
pub(crate) struct BoundMethod {
    func: Value,
    receiver: Value,
}

impl BoundMethod {
    #[must_use]
    pub fn new(func: Value, receiver: Value) -> Self {
        Self { func, receiver }
    }

    #[must_use]
    pub fn func(&self) -> &Value {
        &self.func
    }

    #[must_use]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StaticMethod {
    func: Value,
}

impl StaticMethod {
    #[must_use]
    pub fn new(func: Value) -> Self {
        Self { func }
    }

    #[must_use]
    pub fn func(&self) -> &Value {
        &self.func
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ClassMethod {
    func: Value,
}

impl ClassMethod {
    #[must_use]
    pub fn new(func: Value) -> Self {
        Self { func }
    }

    #[must_use]
    pub fn func(&self) -> &Value {
        &self.func
    }
}

/// A `property` data descriptor.
///
/// `name` defaults to the getter's name and is otherwise filled in when the
/// property is placed in a class namespace. It only shows up in error messages.
#[derive(Debug, Clone, Default)]
pub(crate) struct Property {
    name: Option<String>,
    fget: Option<Value>,
    fset: Option<Value>,
    fdel: Option<Value>,
}

impl Property {
    #[must_use]
    pub fn new(name: Option<String>, fget: Option<Value>, fset: Option<Value>, fdel: Option<Value>) -> Self {
        Self {
            name,
            fget,
            fset,
            fdel,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Records the attribute name the property was bound to, unless already set.
    pub fn set_name(&mut self, name: &str) {
        if self.name.is_none() {
            self.name = Some(name.to_owned());
        }
    }

    #[must_use]
    pub fn fget(&self) -> Option<&Value> {
        self.fget.as_ref()
    }

    #[must_use]
    pub fn fset(&self) -> Option<&Value> {
        self.fset.as_ref()
    }

    #[must_use]
    pub fn fdel(&self) -> Option<&Value> {
        self.fdel.as_ref()
    }

    pub fn collect_ref_ids(&self, work_list: &mut Vec<HeapId>) {
        for accessor in [&self.fget, &self.fset, &self.fdel].into_iter().flatten() {
            if let Value::Ref(id) = accessor {
                work_list.push(*id);
            }
        }
    }
}
