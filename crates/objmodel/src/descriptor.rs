//! The descriptor protocol.
//!
//! Whether a class-level value is a descriptor is decided once per lookup by
//! [`Runtime::descriptor_caps`], which reports the read/write/delete operations
//! the value's type exposes. [`DescriptorKind`] folds those into the three cases
//! attribute resolution branches on:
//! - data descriptors (`get` plus `set` or `delete`) beat the instance store
//! - non-data descriptors (`get` only) yield to the instance store
//! - everything else is a plain value
//!
//! Builtin descriptors (`function`, `staticmethod`, `classmethod`, `property`)
//! are handled natively; any other value is a descriptor when its type's MRO
//! defines `__get__`, `__set__` or `__delete__`.

use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use strum::{Display, IntoStaticStr};

use crate::{
    exception::{ExcType, RunResult},
    heap::{HeapData, HeapId},
    runtime::Runtime,
    types::{
        BoundMethod,
        class::{mro_has_attr, mro_lookup},
    },
    value::Value,
};

/// Operations a value exposes when found at class level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorCaps {
    pub get: bool,
    pub set: bool,
    pub delete: bool,
}

impl DescriptorCaps {
    /// Classifies the value for read precedence.
    ///
    /// A value with `set`/`delete` but no `get` reads as a plain value, but still
    /// intercepts writes and deletes.
    #[must_use]
    pub fn kind(self) -> DescriptorKind {
        match (self.get, self.set || self.delete) {
            (true, true) => DescriptorKind::Data,
            (true, false) => DescriptorKind::NonData,
            (false, _) => DescriptorKind::Plain,
        }
    }

    #[must_use]
    pub fn is_data(self) -> bool {
        self.set || self.delete
    }
}

/// Read-precedence class of a class-level value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
pub enum DescriptorKind {
    #[strum(serialize = "data")]
    Data,
    #[strum(serialize = "non-data")]
    NonData,
    #[strum(serialize = "plain")]
    Plain,
}

/// What `descriptor_get` has to do, decided while the heap is borrowed.
enum GetPlan {
    BindInstance,
    BindOwner(Value),
    Unwrap(Value),
    ReturnSelf,
    CallGetter(Value),
    MissingGetter(String),
    DunderGet(Value),
    Plain,
}

impl Runtime {
    /// Reports which descriptor operations `value` exposes. A freed object exposes none.
    #[must_use]
    pub fn descriptor_caps(&self, value: &Value) -> DescriptorCaps {
        if let Value::Ref(id) = value {
            let Some(data) = self.heap.get_if_live(*id) else {
                return DescriptorCaps::default();
            };
            match data {
                HeapData::Function(_) | HeapData::StaticMethod(_) | HeapData::ClassMethod(_) => {
                    return DescriptorCaps {
                        get: true,
                        set: false,
                        delete: false,
                    };
                }
                HeapData::Property(_) => {
                    return DescriptorCaps {
                        get: true,
                        set: true,
                        delete: true,
                    };
                }
                HeapData::BoundMethod(_) => return DescriptorCaps::default(),
                HeapData::ClassObject(_) | HeapData::Instance(_) => {}
            }
        }
        let type_id = self.type_id_of(value);
        DescriptorCaps {
            get: mro_has_attr(&self.heap, type_id, "__get__"),
            set: mro_has_attr(&self.heap, type_id, "__set__"),
            delete: mro_has_attr(&self.heap, type_id, "__delete__"),
        }
    }

    /// Classifies `value` as a data descriptor, non-data descriptor or plain value.
    #[must_use]
    pub fn classify(&self, value: &Value) -> DescriptorKind {
        self.descriptor_caps(value).kind()
    }

    /// Runs a descriptor's read operation: `get(descr, instance_or_none, owner)`.
    ///
    /// `instance` is `None` for type-level access, in which case `owner` is the
    /// type itself. Errors raised by the descriptor propagate unchanged.
    pub fn descriptor_get(&mut self, descr: &Value, instance: Option<&Value>, owner: &Value) -> RunResult<Value> {
        self.check_live(descr)?;
        if let Some(instance) = instance {
            self.check_live(instance)?;
        }
        let owner_id = self.expect_class(owner, "descriptor owner must be a type")?;
        self.descriptor_get_by_id(descr, instance, owner_id)
    }

    pub(crate) fn descriptor_get_by_id(
        &mut self,
        descr: &Value,
        instance: Option<&Value>,
        owner: HeapId,
    ) -> RunResult<Value> {
        let plan = match descr {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Function(_) => match instance {
                    Some(_) => GetPlan::BindInstance,
                    None => GetPlan::ReturnSelf,
                },
                HeapData::StaticMethod(sm) => GetPlan::Unwrap(sm.func().clone()),
                HeapData::ClassMethod(cm) => GetPlan::BindOwner(cm.func().clone()),
                HeapData::Property(prop) => match (instance, prop.fget()) {
                    (None, _) => GetPlan::ReturnSelf,
                    (Some(_), Some(fget)) => GetPlan::CallGetter(fget.clone()),
                    (Some(_), None) => GetPlan::MissingGetter(prop.name().to_owned()),
                },
                HeapData::BoundMethod(_) => GetPlan::Plain,
                HeapData::ClassObject(_) | HeapData::Instance(_) => self.dunder_plan(descr, "__get__"),
            },
            _ => self.dunder_plan(descr, "__get__"),
        };

        match plan {
            GetPlan::BindInstance => {
                let receiver = instance.cloned().unwrap_or(Value::None);
                Ok(self.alloc(HeapData::BoundMethod(BoundMethod::new(descr.clone(), receiver))))
            }
            GetPlan::BindOwner(func) => Ok(self.alloc(HeapData::BoundMethod(BoundMethod::new(func, Value::Ref(owner))))),
            GetPlan::Unwrap(func) => Ok(func),
            GetPlan::ReturnSelf | GetPlan::Plain => Ok(descr.clone()),
            GetPlan::CallGetter(fget) => {
                let inst = instance.cloned().unwrap_or(Value::None);
                self.call(&fget, smallvec![inst])
            }
            GetPlan::MissingGetter(name) => Err(ExcType::attribute_error_property(
                &name,
                self.type_name(instance.unwrap_or(&Value::None)),
                "getter",
            )),
            GetPlan::DunderGet(get) => {
                let inst = instance.cloned().unwrap_or(Value::None);
                self.call(&get, smallvec![descr.clone(), inst, Value::Ref(owner)])
            }
        }
    }

    /// Runs a descriptor's write operation for `instance.<name> = value`.
    pub(crate) fn descriptor_set(&mut self, descr: &Value, instance: &Value, value: Value) -> RunResult<()> {
        if let Value::Ref(id) = descr
            && let HeapData::Property(prop) = self.heap.get(*id)
        {
            let Some(fset) = prop.fset().cloned() else {
                let name = prop.name().to_owned();
                return Err(ExcType::attribute_error_property(&name, self.type_name(instance), "setter"));
            };
            self.call(&fset, smallvec![instance.clone(), value])?;
            return Ok(());
        }
        match self.dunder_plan(descr, "__set__") {
            GetPlan::DunderGet(set) => {
                self.call(&set, smallvec![descr.clone(), instance.clone(), value])?;
                Ok(())
            }
            _ => Err(ExcType::AttributeError.msg("__set__")),
        }
    }

    /// Runs a descriptor's delete operation for `del instance.<name>`.
    pub(crate) fn descriptor_delete(&mut self, descr: &Value, instance: &Value) -> RunResult<()> {
        if let Value::Ref(id) = descr
            && let HeapData::Property(prop) = self.heap.get(*id)
        {
            let Some(fdel) = prop.fdel().cloned() else {
                let name = prop.name().to_owned();
                return Err(ExcType::attribute_error_property(&name, self.type_name(instance), "deleter"));
            };
            self.call(&fdel, smallvec![instance.clone()])?;
            return Ok(());
        }
        match self.dunder_plan(descr, "__delete__") {
            GetPlan::DunderGet(delete) => {
                self.call(&delete, smallvec![descr.clone(), instance.clone()])?;
                Ok(())
            }
            _ => Err(ExcType::AttributeError.msg("__delete__")),
        }
    }

    /// Binds a value found at class level: descriptors run their `get`, plain
    /// values are returned as they are.
    pub(crate) fn bind_class_value(
        &mut self,
        value: Value,
        instance: Option<&Value>,
        owner: HeapId,
        name: &str,
    ) -> RunResult<Value> {
        let kind = self.classify(&value);
        if kind == DescriptorKind::Plain {
            return Ok(value);
        }
        self.tracer.on_descriptor_get(name, kind);
        self.descriptor_get_by_id(&value, instance, owner)
    }

    /// Finds a user-level descriptor method (`__get__`, `__set__`, `__delete__`)
    /// on the type of `descr`.
    fn dunder_plan(&self, descr: &Value, dunder: &str) -> GetPlan {
        let type_id = self.type_id_of(descr);
        match mro_lookup(&self.heap, type_id, dunder) {
            Some((method, _)) => GetPlan::DunderGet(method),
            None => GetPlan::Plain,
        }
    }
}
