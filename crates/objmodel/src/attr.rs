//! Attribute resolution, assignment and deletion.
//!
//! # Instance reads
//!
//! For a non-class object `obj` with type `T`, `getattr(obj, name)` runs:
//!
//! 1. look `name` up along `T`'s MRO (the class-level value)
//! 2. class-level data descriptor: `get(descr, obj, T)`
//! 3. `obj`'s own value store
//! 4. class-level non-data descriptor: `get(descr, obj, T)`
//! 5. class-level plain value
//! 6. `__getattr__` anywhere in `T`'s MRO: `hook(obj, name)`
//! 7. `AttributeNotFound`
//!
//! # Class reads
//!
//! For a class `C` with metatype `M`, the metatype's data descriptors come
//! first, then `C`'s own MRO (descriptors see no instance and `C` as owner),
//! then `M`'s non-data descriptors and plain values, then `M.__getattr__`.
//!
//! Nothing is cached: every read walks the live namespaces. Errors raised by a
//! descriptor or hook propagate unchanged and never fall through to a later step.

use smallvec::smallvec;

use crate::{
    descriptor::DescriptorKind,
    exception::{ExcType, RunResult},
    heap::{HeapData, HeapId},
    runtime::Runtime,
    tracer::ResolvedBy,
    types::{
        Args,
        class::{as_class, class_name, mro_lookup, mro_lookup_in},
    },
    value::Value,
};

fn check_name(name: &str) -> RunResult<()> {
    if name.is_empty() {
        return Err(ExcType::ValueError.msg("attribute name must not be empty"));
    }
    Ok(())
}

impl Runtime {
    /// Reads `obj.<name>`.
    ///
    /// # Errors
    /// `AttributeNotFound` when no lookup step produced a value, `ValueError` for
    /// an empty name, `RuntimeError` when `obj` was freed by a collection, and any
    /// error raised by a descriptor or `__getattr__` hook.
    pub fn getattr(&mut self, obj: &Value, name: &str) -> RunResult<Value> {
        check_name(name)?;
        self.check_live(obj)?;
        match self.class_id(obj) {
            Some(class_id) => self.type_getattribute(class_id, name),
            None => self.object_getattribute(obj, name),
        }
    }

    /// Returns whether `obj.<name>` can be read.
    ///
    /// Only `AttributeError`s count as "missing"; every other error propagates.
    pub fn hasattr(&mut self, obj: &Value, name: &str) -> RunResult<bool> {
        match self.getattr(obj, name) {
            Ok(_) => Ok(true),
            Err(err) if err.exc_type() == ExcType::AttributeError => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Calls the attribute `name` of `obj` with `args`, the way `obj.name(*args)` would.
    pub fn call_method(&mut self, obj: &Value, name: &str, args: Args) -> RunResult<Value> {
        let method = self.getattr(obj, name)?;
        self.call(&method, args)
    }

    fn object_getattribute(&mut self, obj: &Value, name: &str) -> RunResult<Value> {
        let type_id = self.type_id_of(obj);
        let class_attr = mro_lookup(&self.heap, type_id, name).map(|(value, _)| value);
        let kind = class_attr.as_ref().map(|value| self.classify(value));

        if let Some(descr) = &class_attr
            && kind == Some(DescriptorKind::Data)
        {
            self.tracer.on_descriptor_get(name, DescriptorKind::Data);
            let value = self.descriptor_get_by_id(descr, Some(obj), type_id)?;
            self.trace_resolved(type_id, name, ResolvedBy::DataDescriptor);
            return Ok(value);
        }

        if let Some(value) = self.instance_value(obj, name) {
            self.trace_resolved(type_id, name, ResolvedBy::InstanceValue);
            return Ok(value);
        }

        if let Some(value) = class_attr {
            if kind == Some(DescriptorKind::NonData) {
                self.tracer.on_descriptor_get(name, DescriptorKind::NonData);
                let value = self.descriptor_get_by_id(&value, Some(obj), type_id)?;
                self.trace_resolved(type_id, name, ResolvedBy::NonDataDescriptor);
                return Ok(value);
            }
            self.trace_resolved(type_id, name, ResolvedBy::ClassValue);
            return Ok(value);
        }

        if let Some((hook, _)) = mro_lookup(&self.heap, type_id, "__getattr__") {
            self.tracer.on_fallback(class_name(&self.heap, type_id), name);
            let value = self.call_getattr_hook(hook, obj, type_id, name)?;
            self.trace_resolved(type_id, name, ResolvedBy::FallbackHook);
            return Ok(value);
        }

        let owner = format!("'{}' object", class_name(&self.heap, type_id));
        self.tracer.on_not_found(class_name(&self.heap, type_id), name);
        Err(ExcType::attribute_not_found(owner, name))
    }

    fn type_getattribute(&mut self, class_id: HeapId, name: &str) -> RunResult<Value> {
        let class = Value::Ref(class_id);
        let meta_id = self.type_id_of(&class);
        let meta_attr = mro_lookup(&self.heap, meta_id, name).map(|(value, _)| value);
        let meta_kind = meta_attr.as_ref().map(|value| self.classify(value));

        if let Some(descr) = &meta_attr
            && meta_kind == Some(DescriptorKind::Data)
        {
            self.tracer.on_descriptor_get(name, DescriptorKind::Data);
            let value = self.descriptor_get_by_id(descr, Some(&class), meta_id)?;
            self.trace_resolved(meta_id, name, ResolvedBy::MetaDataDescriptor);
            return Ok(value);
        }

        if let Some((value, _)) = mro_lookup(&self.heap, class_id, name) {
            let (value, by) = match self.classify(&value) {
                DescriptorKind::Plain => (value, ResolvedBy::ClassValue),
                kind => {
                    self.tracer.on_descriptor_get(name, kind);
                    let value = self.descriptor_get_by_id(&value, None, class_id)?;
                    let by = if kind == DescriptorKind::Data {
                        ResolvedBy::DataDescriptor
                    } else {
                        ResolvedBy::NonDataDescriptor
                    };
                    (value, by)
                }
            };
            self.trace_resolved(class_id, name, by);
            return Ok(value);
        }

        if let Some(value) = meta_attr {
            if meta_kind == Some(DescriptorKind::NonData) {
                self.tracer.on_descriptor_get(name, DescriptorKind::NonData);
                let value = self.descriptor_get_by_id(&value, Some(&class), meta_id)?;
                self.trace_resolved(meta_id, name, ResolvedBy::MetaNonDataDescriptor);
                return Ok(value);
            }
            self.trace_resolved(meta_id, name, ResolvedBy::MetaValue);
            return Ok(value);
        }

        if let Some((hook, _)) = mro_lookup(&self.heap, meta_id, "__getattr__") {
            self.tracer.on_fallback(class_name(&self.heap, class_id), name);
            let value = self.call_getattr_hook(hook, &class, meta_id, name)?;
            self.trace_resolved(class_id, name, ResolvedBy::FallbackHook);
            return Ok(value);
        }

        let owner = format!("type object '{}'", class_name(&self.heap, class_id));
        self.tracer.on_not_found(class_name(&self.heap, class_id), name);
        Err(ExcType::attribute_not_found(owner, name))
    }

    /// Invokes a `__getattr__` hook as `hook(obj, name)`, binding it like any
    /// other class-level value first.
    fn call_getattr_hook(&mut self, hook: Value, obj: &Value, owner: HeapId, name: &str) -> RunResult<Value> {
        let bound = self.bind_class_value(hook, Some(obj), owner, "__getattr__")?;
        self.call(&bound, smallvec![Value::from(name)])
    }

    /// Reads `name` from `obj`'s own value store, if it has one.
    fn instance_value(&self, obj: &Value, name: &str) -> Option<Value> {
        match self.heap.get(obj.ref_id()?) {
            HeapData::Instance(inst) => inst.attrs()?.get(name).cloned(),
            _ => None,
        }
    }

    fn class_id(&self, value: &Value) -> Option<HeapId> {
        let id = value.ref_id()?;
        as_class(&self.heap, id).map(|_| id)
    }

    fn trace_resolved(&mut self, owner: HeapId, name: &str, by: ResolvedBy) {
        self.tracer.on_resolved(class_name(&self.heap, owner), name, by);
    }

    // ========================================================================
    // Assignment and deletion
    // ========================================================================

    /// Performs `obj.<name> = value`.
    ///
    /// A class-level data descriptor's `set` wins; otherwise the value lands in
    /// the instance store (or the class namespace when `obj` is a class).
    ///
    /// # Errors
    /// `AttributeError` for objects without a value store, read-only properties
    /// and immutable builtin types; anything a descriptor's `set` raises.
    pub fn setattr(&mut self, obj: &Value, name: &str, value: Value) -> RunResult<()> {
        check_name(name)?;
        self.check_live(obj)?;
        self.check_live(&value)?;
        if let Some(class_id) = self.class_id(obj) {
            return self.type_setattr(class_id, name, value);
        }

        let type_id = self.type_id_of(obj);
        if let Some(descr) = self.data_descriptor(type_id, name) {
            return self.descriptor_set(&descr, obj, value);
        }

        let type_name = class_name(&self.heap, type_id).to_owned();
        if let Some(id) = obj.ref_id()
            && let HeapData::Instance(inst) = self.heap.get_mut(id)
        {
            return match inst.attrs_mut() {
                Some(attrs) => {
                    attrs.set(name, value);
                    Ok(())
                }
                None => Err(ExcType::attribute_error_no_dict(&type_name, name)),
            };
        }
        Err(ExcType::attribute_error(type_name, name))
    }

    /// Performs `del obj.<name>`.
    pub fn delattr(&mut self, obj: &Value, name: &str) -> RunResult<()> {
        check_name(name)?;
        self.check_live(obj)?;
        if let Some(class_id) = self.class_id(obj) {
            return self.type_delattr(class_id, name);
        }

        let type_id = self.type_id_of(obj);
        if let Some(descr) = self.data_descriptor(type_id, name) {
            return self.descriptor_delete(&descr, obj);
        }

        let removed = match obj.ref_id().map(|id| self.heap.get_mut(id)) {
            Some(HeapData::Instance(inst)) => inst.attrs_mut().and_then(|attrs| attrs.delete(name)),
            _ => None,
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(ExcType::attribute_error(class_name(&self.heap, type_id), name)),
        }
    }

    fn type_setattr(&mut self, class_id: HeapId, name: &str, value: Value) -> RunResult<()> {
        if self.is_builtin(class_id) {
            return Err(ExcType::type_error(format!(
                "cannot set '{name}' attribute of immutable type '{}'",
                class_name(&self.heap, class_id)
            )));
        }
        let class = Value::Ref(class_id);
        let meta_id = self.type_id_of(&class);
        if let Some(descr) = self.data_descriptor(meta_id, name) {
            return self.descriptor_set(&descr, &class, value);
        }
        if let HeapData::ClassObject(cls) = self.heap.get_mut(class_id) {
            cls.namespace_mut().set(name, value);
        }
        Ok(())
    }

    fn type_delattr(&mut self, class_id: HeapId, name: &str) -> RunResult<()> {
        if self.is_builtin(class_id) {
            return Err(ExcType::type_error(format!(
                "cannot delete '{name}' attribute of immutable type '{}'",
                class_name(&self.heap, class_id)
            )));
        }
        let class = Value::Ref(class_id);
        let meta_id = self.type_id_of(&class);
        if let Some(descr) = self.data_descriptor(meta_id, name) {
            return self.descriptor_delete(&descr, &class);
        }
        let removed = match self.heap.get_mut(class_id) {
            HeapData::ClassObject(cls) => cls.namespace_mut().delete(name),
            _ => None,
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(ExcType::AttributeError.msg(format!(
                "type object '{}' has no attribute '{name}'",
                class_name(&self.heap, class_id)
            ))),
        }
    }

    /// Returns the class-level value for `name` when it intercepts writes and deletes.
    fn data_descriptor(&self, type_id: HeapId, name: &str) -> Option<Value> {
        let (descr, _) = mro_lookup(&self.heap, type_id, name)?;
        self.descriptor_caps(&descr).is_data().then_some(descr)
    }

    // ========================================================================
    // super()
    // ========================================================================

    /// Reads `super(start, obj).<name>`: looks `name` up along the MRO strictly
    /// after `start`.
    ///
    /// With an instance, the MRO is that of its type and descriptors bind to the
    /// instance. With a class that is a subclass of `start`, the class's own MRO
    /// is used and descriptors see no instance.
    ///
    /// # Errors
    /// `TypeError` when `obj` is neither an instance nor a subclass of `start`;
    /// `AttributeError` naming `super` on a miss.
    pub fn super_getattr(&mut self, obj: &Value, start: &Value, name: &str) -> RunResult<Value> {
        check_name(name)?;
        self.check_live(obj)?;
        let start_id = self.expect_class(start, "super() argument 1 must be a type")?;

        let class_bound = self
            .class_id(obj)
            .filter(|&id| as_class(&self.heap, id).is_some_and(|cls| cls.is_subclass_of(id, start_id)));
        let (owner, instance) = match class_bound {
            Some(id) => (id, None),
            None => {
                if !self.isinstance(obj, start)? {
                    return Err(ExcType::type_error(
                        "super(type, obj): obj must be an instance or subtype of type",
                    ));
                }
                (self.type_id_of(obj), Some(obj))
            }
        };

        let found = as_class(&self.heap, owner).and_then(|cls| {
            let mro = cls.mro();
            let after = mro.iter().position(|&id| id == start_id)? + 1;
            mro_lookup_in(&self.heap, &mro[after..], name)
        });
        let Some((value, _)) = found else {
            return Err(ExcType::AttributeError.msg(format!("'super' object has no attribute '{name}'")));
        };

        let value = self.bind_class_value(value, instance, owner, name)?;
        self.trace_resolved(owner, name, ResolvedBy::Super);
        Ok(value)
    }
}
