//! The builtin type lattice created when a [`Runtime`](crate::Runtime) starts.
//!
//! `object` is the universal root and `type` is the metatype of every class,
//! including itself. The remaining builtins give every primitive and every
//! builtin heap object a type, so `type_of` is total.

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
    heap::{Heap, HeapData, HeapId},
    types::{ClassObject, Dict},
};

/// Builtin types, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter, EnumCount)]
pub enum BuiltinType {
    #[strum(serialize = "object")]
    Object,
    #[strum(serialize = "type")]
    Type,
    #[strum(serialize = "NoneType")]
    NoneType,
    #[strum(serialize = "int")]
    Int,
    /// Subclass of `int`, as in Python.
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "str")]
    Str,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "method")]
    Method,
    #[strum(serialize = "property")]
    Property,
    #[strum(serialize = "staticmethod")]
    StaticMethod,
    #[strum(serialize = "classmethod")]
    ClassMethod,
}

impl BuiltinType {
    /// The builtin this type derives from; `None` only for `object`.
    fn base(self) -> Option<Self> {
        match self {
            Self::Object => None,
            Self::Bool => Some(Self::Int),
            _ => Some(Self::Object),
        }
    }
}

/// Heap ids of the builtin types, indexed by [`BuiltinType`].
#[derive(Debug, Clone)]
pub(crate) struct Builtins {
    ids: [HeapId; BuiltinType::COUNT],
}

impl Builtins {
    /// Allocates the builtin classes into an empty heap.
    ///
    /// `object` and `type` reference each other (`type(object) is type`,
    /// `type.__bases__ == (object,)`), so both start with a placeholder
    /// metaclass that is patched once `type` exists.
    pub fn bootstrap(heap: &mut Heap) -> Self {
        let mut ids = [HeapId::PLACEHOLDER; BuiltinType::COUNT];

        let object_id = heap.allocate(HeapData::ClassObject(ClassObject::new(
            BuiltinType::Object.to_string(),
            HeapId::PLACEHOLDER,
            Dict::new(),
            Vec::new(),
            false,
        )));
        let type_id = heap.allocate(HeapData::ClassObject(ClassObject::new(
            BuiltinType::Type.to_string(),
            HeapId::PLACEHOLDER,
            Dict::new(),
            vec![object_id],
            true,
        )));
        for (id, mro) in [(object_id, vec![object_id]), (type_id, vec![type_id, object_id])] {
            if let HeapData::ClassObject(cls) = heap.get_mut(id) {
                cls.set_metaclass(type_id);
                cls.set_mro(mro);
            }
        }
        ids[BuiltinType::Object as usize] = object_id;
        ids[BuiltinType::Type as usize] = type_id;

        for builtin in BuiltinType::iter().skip(2) {
            let Some(base) = builtin.base() else { continue };
            let base_id = ids[base as usize];
            let mut cls = ClassObject::new(builtin.to_string(), type_id, Dict::new(), vec![base_id], false);
            cls.seal();
            let id = heap.allocate(HeapData::ClassObject(cls));
            let mut mro = vec![id];
            if let HeapData::ClassObject(base_cls) = heap.get(base_id) {
                mro.extend_from_slice(base_cls.mro());
            }
            if let HeapData::ClassObject(cls) = heap.get_mut(id) {
                cls.set_mro(mro);
            }
            ids[builtin as usize] = id;
        }

        Self { ids }
    }

    #[must_use]
    pub fn get(&self, builtin: BuiltinType) -> HeapId {
        self.ids[builtin as usize]
    }

    /// All builtin ids; these are always garbage collection roots.
    #[must_use]
    pub fn ids(&self) -> &[HeapId] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::class::{as_class, class_name, is_subclass};

    #[test]
    fn object_and_type_reference_each_other() {
        let mut heap = Heap::new();
        let builtins = Builtins::bootstrap(&mut heap);
        let object_id = builtins.get(BuiltinType::Object);
        let type_id = builtins.get(BuiltinType::Type);

        let object = as_class(&heap, object_id).unwrap();
        assert_eq!(object.metaclass(), type_id);
        assert_eq!(object.mro(), &[object_id]);
        let type_cls = as_class(&heap, type_id).unwrap();
        assert_eq!(type_cls.metaclass(), type_id);
        assert_eq!(type_cls.mro(), &[type_id, object_id]);
    }

    #[test]
    fn bool_derives_from_int() {
        let mut heap = Heap::new();
        let builtins = Builtins::bootstrap(&mut heap);
        let bool_id = builtins.get(BuiltinType::Bool);
        let mro: Vec<&str> = as_class(&heap, bool_id)
            .unwrap()
            .mro()
            .iter()
            .map(|&id| class_name(&heap, id))
            .collect();
        assert_eq!(mro, vec!["bool", "int", "object"]);
        assert!(is_subclass(&heap, bool_id, builtins.get(BuiltinType::Object)));
        assert!(as_class(&heap, bool_id).unwrap().is_sealed());
    }
}
