//! The [`Runtime`]: owner of the heap, the builtin types and the tracer.
//!
//! Attribute access lives in `attr.rs` and the descriptor protocol in
//! `descriptor.rs`; both extend `Runtime` with further `impl` blocks.

use smallvec::smallvec;

use crate::{
    builtins::{BuiltinType, Builtins},
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId, HeapStats},
    resource::ResourceLimits,
    tracer::{LookupTracer, NoopTracer},
    types::{
        Args, ClassMethod, ClassObject, Dict, Instance, NativeFn, NativeFunction, Property, StaticMethod, arg_at,
        class::{as_class, class_name, compute_c3_mro, is_subclass, mro_lookup},
    },
    value::Value,
};

/// Declarative description of a class, turned into a class object by [`build`](Self::build).
///
/// ```
/// use objmodel::{ClassBuilder, Runtime, Value};
///
/// let mut rt = Runtime::new();
/// let base = ClassBuilder::new("Base").attr("x", Value::Int(1)).build(&mut rt).unwrap();
/// let cls = ClassBuilder::new("Derived").base(base).build(&mut rt).unwrap();
/// assert_eq!(rt.mro_names(&cls).unwrap(), ["Derived", "Base", "object"]);
/// ```
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    bases: Vec<Value>,
    metaclass: Option<Value>,
    attrs: Vec<(String, Value)>,
    instance_dict: bool,
}

impl ClassBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            metaclass: None,
            attrs: Vec::new(),
            instance_dict: true,
        }
    }

    /// Appends a direct base. Declaration order decides MRO precedence.
    #[must_use]
    pub fn base(mut self, base: Value) -> Self {
        self.bases.push(base);
        self
    }

    #[must_use]
    pub fn bases(mut self, bases: impl IntoIterator<Item = Value>) -> Self {
        self.bases.extend(bases);
        self
    }

    /// Requests an explicit metatype; it must be `type` or a subclass of it.
    #[must_use]
    pub fn metaclass(mut self, metaclass: Value) -> Self {
        self.metaclass = Some(metaclass);
        self
    }

    /// Adds a class-level attribute. Later entries with the same name win.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.push((name.into(), value));
        self
    }

    /// Whether instances get a free-form value store (default `true`).
    ///
    /// Instances still get one when any base provides it.
    #[must_use]
    pub fn instance_dict(mut self, enabled: bool) -> Self {
        self.instance_dict = enabled;
        self
    }

    /// Creates the class.
    ///
    /// # Errors
    /// `DuplicateBase` / `InconsistentHierarchy` when the bases cannot be
    /// linearized, `TypeError` for bad bases or a metaclass conflict, and any
    /// error raised by a `__set_name__` hook.
    pub fn build(self, rt: &mut Runtime) -> RunResult<Value> {
        rt.create_class(self)
    }
}

/// How `call` dispatches, decided while the heap is borrowed.
enum CallPlan {
    Native(NativeFn),
    Bound { func: Value, receiver: Value },
    Delegate(Value),
    Instantiate(HeapId),
    DunderCall(Value),
    NotCallable,
}

/// An object model instance: heap, builtin types, limits and tracer.
///
/// Every operation goes through `&mut Runtime`; native callables receive it
/// back so descriptors and hooks can re-enter attribute resolution.
#[derive(Debug)]
pub struct Runtime {
    pub(crate) heap: Heap,
    builtins: Builtins,
    limits: ResourceLimits,
    pub(crate) tracer: Box<dyn LookupTracer>,
    /// Current nesting of `call`, checked against `max_recursion_depth`.
    depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime with the builtin types, default limits and no tracing.
    #[must_use]
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let builtins = Builtins::bootstrap(&mut heap);
        let mut rt = Self {
            heap,
            builtins,
            limits: ResourceLimits::default(),
            tracer: Box::new(NoopTracer),
            depth: 0,
        };
        rt.install_builtin_descriptors();
        rt
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: impl LookupTracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Installs `object.__class__` and `type.__name__`, both getter-only properties.
    fn install_builtin_descriptors(&mut self) {
        let class_getter = self.function("__class__", |rt, args| {
            let obj = arg_at(&args, 0, "__class__")?;
            Ok(rt.type_of(obj))
        });
        let class_prop = self.property(Some(class_getter), None, None);
        let name_getter = self.function("__name__", |rt, args| {
            let cls = arg_at(&args, 0, "__name__")?;
            let id = rt.expect_class(cls, "__name__ requires a type")?;
            Ok(Value::from(class_name(&rt.heap, id)))
        });
        let name_prop = self.property(Some(name_getter), None, None);

        for (builtin, name, prop) in [
            (BuiltinType::Object, "__class__", class_prop),
            (BuiltinType::Type, "__name__", name_prop),
        ] {
            if let HeapData::ClassObject(cls) = self.heap.get_mut(self.builtins.get(builtin)) {
                cls.namespace_mut().set(name, prop);
            }
        }
    }

    // ========================================================================
    // Value construction
    // ========================================================================

    pub(crate) fn alloc(&mut self, data: HeapData) -> Value {
        Value::Ref(self.heap.allocate(data))
    }

    /// Wraps a Rust closure as a `function` object.
    ///
    /// Functions are non-data descriptors: read through an instance they bind to
    /// it and the instance becomes the first argument.
    pub fn function<F>(&mut self, name: &str, func: F) -> Value
    where
        F: Fn(&mut Self, Args) -> RunResult<Value> + 'static,
    {
        let func: NativeFn = std::rc::Rc::new(func);
        self.alloc(HeapData::Function(NativeFunction::new(name, func)))
    }

    pub fn staticmethod(&mut self, func: Value) -> Value {
        self.alloc(HeapData::StaticMethod(StaticMethod::new(func)))
    }

    pub fn classmethod(&mut self, func: Value) -> Value {
        self.alloc(HeapData::ClassMethod(ClassMethod::new(func)))
    }

    /// Creates a `property` data descriptor from optional accessors.
    ///
    /// The property takes its name from the getter when it is a function, and
    /// otherwise from the attribute it is first stored under.
    pub fn property(&mut self, fget: Option<Value>, fset: Option<Value>, fdel: Option<Value>) -> Value {
        let name = fget.as_ref().and_then(|getter| match getter {
            Value::Ref(id) => match self.heap.get_if_live(*id) {
                Some(HeapData::Function(func)) => Some(func.name().to_owned()),
                _ => None,
            },
            _ => None,
        });
        self.alloc(HeapData::Property(Property::new(name, fget, fset, fdel)))
    }

    // ========================================================================
    // Class creation
    // ========================================================================

    /// Creates a class from a builder: resolves the metatype, linearizes the
    /// bases, allocates the class and runs `__set_name__` hooks.
    pub(crate) fn create_class(&mut self, builder: ClassBuilder) -> RunResult<Value> {
        let ClassBuilder {
            name,
            bases,
            metaclass,
            attrs,
            instance_dict,
        } = builder;

        for (_, value) in &attrs {
            self.check_live(value)?;
        }
        let mut base_ids = Vec::with_capacity(bases.len().max(1));
        for base in &bases {
            let id = self.expect_class(base, "bases must be types")?;
            if let Some(cls) = as_class(&self.heap, id)
                && cls.is_sealed()
            {
                return Err(ExcType::type_error(format!(
                    "type '{}' is not an acceptable base type",
                    cls.name()
                )));
            }
            base_ids.push(id);
        }
        if base_ids.is_empty() {
            base_ids.push(self.builtins.get(BuiltinType::Object));
        }

        let metaclass_id = self.calculate_metaclass(metaclass.as_ref(), &base_ids)?;
        let mro_tail = compute_c3_mro(&self.heap, &base_ids, &self.limits)?;

        let has_dict = instance_dict
            || base_ids
                .iter()
                .any(|&id| as_class(&self.heap, id).is_some_and(ClassObject::instance_has_dict));

        for (attr_name, value) in &attrs {
            if let Value::Ref(id) = value
                && let HeapData::Property(prop) = self.heap.get_mut(*id)
            {
                prop.set_name(attr_name);
            }
        }
        let namespace: Dict = attrs.iter().cloned().collect();

        let class_id = self.heap.allocate(HeapData::ClassObject(ClassObject::new(
            name, metaclass_id, namespace, base_ids, has_dict,
        )));
        let mut mro = Vec::with_capacity(mro_tail.len() + 1);
        mro.push(class_id);
        mro.extend(mro_tail);
        if let HeapData::ClassObject(cls) = self.heap.get_mut(class_id) {
            cls.set_mro(mro);
        }
        self.trace_class_created(class_id);

        let class = Value::Ref(class_id);
        for (attr_name, value) in attrs {
            let hook = mro_lookup(&self.heap, self.type_id_of(&value), "__set_name__");
            if let Some((hook, _)) = hook {
                self.call(&hook, smallvec![value, class.clone(), Value::from(attr_name)])?;
            }
        }
        Ok(class)
    }

    /// Picks the most derived metatype among the explicit one (default `type`)
    /// and the metatypes of every base.
    fn calculate_metaclass(&self, explicit: Option<&Value>, bases: &[HeapId]) -> RunResult<HeapId> {
        let type_id = self.builtins.get(BuiltinType::Type);
        let mut winner = match explicit {
            Some(meta) => {
                let id = self.expect_class(meta, "metaclass must be a type")?;
                if !is_subclass(&self.heap, id, type_id) {
                    return Err(ExcType::type_error(format!(
                        "metaclass '{}' is not a subclass of 'type'",
                        class_name(&self.heap, id)
                    )));
                }
                id
            }
            None => type_id,
        };
        for &base in bases {
            let base_meta = self.type_id_of(&Value::Ref(base));
            if is_subclass(&self.heap, winner, base_meta) {
                continue;
            }
            if is_subclass(&self.heap, base_meta, winner) {
                winner = base_meta;
                continue;
            }
            return Err(ExcType::type_error(
                "metaclass conflict: the metaclass of a derived class must be a (non-strict) subclass \
                 of the metaclasses of all its bases",
            ));
        }
        Ok(winner)
    }

    fn trace_class_created(&mut self, class_id: HeapId) {
        let Some(cls) = as_class(&self.heap, class_id) else { return };
        let mro: Vec<&str> = cls.mro().iter().map(|&id| class_name(&self.heap, id)).collect();
        self.tracer.on_class_created(cls.name(), &mro);
    }

    // ========================================================================
    // Type queries
    // ========================================================================

    #[must_use]
    pub fn builtin(&self, builtin: BuiltinType) -> Value {
        Value::Ref(self.builtins.get(builtin))
    }

    pub(crate) fn type_id_of(&self, value: &Value) -> HeapId {
        let builtin = match value {
            Value::None => BuiltinType::NoneType,
            Value::Bool(_) => BuiltinType::Bool,
            Value::Int(_) => BuiltinType::Int,
            Value::Str(_) => BuiltinType::Str,
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::ClassObject(cls) => return cls.metaclass(),
                HeapData::Instance(inst) => return inst.class_id(),
                HeapData::Function(_) => BuiltinType::Function,
                HeapData::BoundMethod(_) => BuiltinType::Method,
                HeapData::StaticMethod(_) => BuiltinType::StaticMethod,
                HeapData::ClassMethod(_) => BuiltinType::ClassMethod,
                HeapData::Property(_) => BuiltinType::Property,
            },
        };
        self.builtins.get(builtin)
    }

    /// Returns the dynamic type of any value. The type of a class is its metatype.
    ///
    /// # Panics
    /// Panics when `value` refers to an object freed by [`collect_garbage`](Self::collect_garbage);
    /// check [`is_live`](Self::is_live) first for handles kept across a collection.
    #[must_use]
    pub fn type_of(&self, value: &Value) -> Value {
        Value::Ref(self.type_id_of(value))
    }

    /// Returns the name of `value`'s type.
    ///
    /// # Panics
    /// Same as [`type_of`](Self::type_of).
    #[must_use]
    pub fn type_name(&self, value: &Value) -> &str {
        class_name(&self.heap, self.type_id_of(value))
    }

    /// Returns the name of `class`, or `None` when it is not a live class.
    #[must_use]
    pub fn class_name(&self, class: &Value) -> Option<&str> {
        match self.heap.get_if_live(class.ref_id()?)? {
            HeapData::ClassObject(cls) => Some(cls.name()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_class(&self, value: &Value) -> bool {
        self.class_name(value).is_some()
    }

    pub(crate) fn expect_class(&self, value: &Value, message: &str) -> RunResult<HeapId> {
        self.check_live(value)?;
        match value.ref_id() {
            Some(id) if as_class(&self.heap, id).is_some() => Ok(id),
            _ => Err(ExcType::type_error(format!(
                "{message}, not '{}'",
                self.type_name(value)
            ))),
        }
    }

    /// Returns the resolution order of `class`, starting with `class` itself.
    pub fn mro(&self, class: &Value) -> RunResult<Vec<Value>> {
        let id = self.expect_class(class, "mro() requires a type")?;
        Ok(self.class(id).mro().iter().copied().map(Value::Ref).collect())
    }

    /// Returns the names along the resolution order of `class`.
    pub fn mro_names(&self, class: &Value) -> RunResult<Vec<String>> {
        let id = self.expect_class(class, "mro() requires a type")?;
        Ok(self
            .class(id)
            .mro()
            .iter()
            .map(|&base| class_name(&self.heap, base).to_owned())
            .collect())
    }

    /// Returns the direct bases of `class` in declaration order.
    pub fn bases(&self, class: &Value) -> RunResult<Vec<Value>> {
        let id = self.expect_class(class, "__bases__ requires a type")?;
        Ok(self.class(id).bases().iter().copied().map(Value::Ref).collect())
    }

    fn class(&self, id: HeapId) -> &ClassObject {
        match self.heap.get(id) {
            HeapData::ClassObject(cls) => cls,
            other => panic!("expected a class object, found {}", <&'static str>::from(other)),
        }
    }

    pub(crate) fn is_builtin(&self, id: HeapId) -> bool {
        self.builtins.ids().contains(&id)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Calls `callable` with positional arguments.
    ///
    /// Handles functions, bound methods, static methods, classes (instantiation)
    /// and instances whose class defines `__call__`.
    ///
    /// # Errors
    /// `TypeError` for uncallable values, `RecursionError` when calls nest deeper
    /// than `max_recursion_depth`, `RuntimeError` when the callable or an argument
    /// was freed, and whatever the callee raises.
    pub fn call(&mut self, callable: &Value, args: Args) -> RunResult<Value> {
        self.check_live(callable)?;
        for arg in &args {
            self.check_live(arg)?;
        }
        if self.depth >= self.limits.max_recursion_depth {
            return Err(ExcType::recursion_error());
        }
        self.depth += 1;
        let result = self.call_inner(callable, args);
        self.depth -= 1;
        result
    }

    fn call_inner(&mut self, callable: &Value, args: Args) -> RunResult<Value> {
        let plan = match callable {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Function(func) => CallPlan::Native(func.func()),
                HeapData::BoundMethod(method) => CallPlan::Bound {
                    func: method.func().clone(),
                    receiver: method.receiver().clone(),
                },
                HeapData::StaticMethod(sm) => CallPlan::Delegate(sm.func().clone()),
                HeapData::ClassObject(_) => CallPlan::Instantiate(*id),
                HeapData::Instance(inst) => match mro_lookup(&self.heap, inst.class_id(), "__call__") {
                    Some((method, _)) => CallPlan::DunderCall(method),
                    None => CallPlan::NotCallable,
                },
                HeapData::ClassMethod(_) | HeapData::Property(_) => CallPlan::NotCallable,
            },
            _ => CallPlan::NotCallable,
        };

        match plan {
            CallPlan::Native(func) => func(self, args),
            CallPlan::Bound { func, receiver } => {
                let mut full = Args::with_capacity(args.len() + 1);
                full.push(receiver);
                full.extend(args);
                self.call(&func, full)
            }
            CallPlan::Delegate(func) => self.call(&func, args),
            CallPlan::Instantiate(class_id) => self.instantiate(class_id, args),
            CallPlan::DunderCall(method) => {
                let owner = self.type_id_of(callable);
                let bound = self.bind_class_value(method, Some(callable), owner, "__call__")?;
                self.call(&bound, args)
            }
            CallPlan::NotCallable => Err(ExcType::type_error_not_callable(self.type_name(callable))),
        }
    }

    /// Creates an instance of `class_id` and runs its `__init__`.
    fn instantiate(&mut self, class_id: HeapId, args: Args) -> RunResult<Value> {
        let type_id = self.builtins.get(BuiltinType::Type);
        if class_id == type_id && args.len() == 1 {
            return Ok(self.type_of(&args[0]));
        }
        let cls = self.class(class_id);
        if cls.is_sealed() {
            return Err(ExcType::type_error(format!("cannot create '{}' instances", cls.name())));
        }
        if is_subclass(&self.heap, class_id, type_id) {
            return Err(ExcType::type_error(format!(
                "cannot create classes by calling '{}'; use ClassBuilder",
                cls.name()
            )));
        }
        let attrs = cls.instance_has_dict().then(Dict::new);
        let instance = self.alloc(HeapData::Instance(Instance::new(class_id, attrs)));

        match mro_lookup(&self.heap, class_id, "__init__") {
            Some((init, _)) => {
                let bound = self.bind_class_value(init, Some(&instance), class_id, "__init__")?;
                let ret = self.call(&bound, args)?;
                if !ret.is_none() {
                    return Err(ExcType::type_error(format!(
                        "__init__() should return None, not '{}'",
                        self.type_name(&ret)
                    )));
                }
            }
            None if !args.is_empty() => {
                return Err(ExcType::type_error(format!(
                    "{}() takes no arguments",
                    class_name(&self.heap, class_id)
                )));
            }
            None => {}
        }
        Ok(instance)
    }

    // ========================================================================
    // Subtype checks
    // ========================================================================

    /// Returns true when `class` appears in the MRO of `value`'s type.
    pub fn isinstance(&self, value: &Value, class: &Value) -> RunResult<bool> {
        self.check_live(value)?;
        let class_id = self.expect_class(class, "isinstance() arg 2 must be a type")?;
        Ok(is_subclass(&self.heap, self.type_id_of(value), class_id))
    }

    /// Returns true when `base` appears in the MRO of `class`.
    pub fn issubclass(&self, class: &Value, base: &Value) -> RunResult<bool> {
        let class_id = self.expect_class(class, "issubclass() arg 1 must be a class")?;
        let base_id = self.expect_class(base, "issubclass() arg 2 must be a class")?;
        Ok(is_subclass(&self.heap, class_id, base_id))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Short Python-style rendering of a value, for reports and messages.
    #[must_use]
    pub fn repr(&self, value: &Value) -> String {
        match value {
            Value::None => "None".to_owned(),
            Value::Bool(true) => "True".to_owned(),
            Value::Bool(false) => "False".to_owned(),
            Value::Int(n) => n.to_string(),
            Value::Str(s) => format!("'{s}'"),
            Value::Ref(id) => match self.heap.get_if_live(*id) {
                None => "<freed object>".to_owned(),
                Some(HeapData::ClassObject(cls)) => format!("<class '{}'>", cls.name()),
                Some(HeapData::Instance(inst)) => format!("<{} object>", class_name(&self.heap, inst.class_id())),
                Some(HeapData::Function(func)) => format!("<function {}>", func.name()),
                Some(HeapData::BoundMethod(method)) => format!(
                    "<bound method {} of {}>",
                    self.repr(method.func()),
                    self.repr(method.receiver())
                ),
                Some(HeapData::StaticMethod(sm)) => format!("<staticmethod({})>", self.repr(sm.func())),
                Some(HeapData::ClassMethod(cm)) => format!("<classmethod({})>", self.repr(cm.func())),
                Some(HeapData::Property(prop)) => format!("<property '{}'>", prop.name()),
            },
        }
    }

    /// Returns the value store of an instance or the namespace of a class, in
    /// insertion order.
    ///
    /// # Errors
    /// `TypeError` when `value` has no value store, `RuntimeError` when it was freed.
    pub fn vars(&self, value: &Value) -> RunResult<Vec<(String, Value)>> {
        self.check_live(value)?;
        let store = match value {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::ClassObject(cls) => Some(cls.namespace()),
                HeapData::Instance(inst) => inst.attrs(),
                _ => None,
            },
            _ => None,
        };
        match store {
            Some(dict) => Ok(dict.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect()),
            None => Err(ExcType::type_error("vars() argument must have __dict__ attribute")),
        }
    }

    // ========================================================================
    // Garbage collection
    // ========================================================================

    /// Frees every heap object unreachable from the builtin types and `roots`.
    ///
    /// Returns the number of freed objects. Values captured inside native
    /// closures are not traced, so pass them in `roots` if they must survive.
    /// Handles to freed objects stay stale even after their slot is reused:
    /// public operations reject them with `RuntimeError("object already freed")`.
    pub fn collect_garbage(&mut self, roots: &[Value]) -> usize {
        let mut work_list = self.builtins.ids().to_vec();
        work_list.extend(roots.iter().filter_map(Value::ref_id));
        let freed = self.heap.collect_garbage(work_list);
        self.tracer.on_collect(freed);
        freed
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Returns true when `value` still refers to a live object (always true for primitives).
    #[must_use]
    pub fn is_live(&self, value: &Value) -> bool {
        value.ref_id().is_none_or(|id| self.heap.get_if_live(id).is_some())
    }

    /// Rejects handles to objects reclaimed by a collection.
    pub(crate) fn check_live(&self, value: &Value) -> RunResult<()> {
        if self.is_live(value) {
            Ok(())
        } else {
            Err(ExcType::freed_object())
        }
    }
}
