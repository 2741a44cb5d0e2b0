//! Class objects, instances and C3 linearization.
//!
//! `ClassObject` is a Type: it is itself an instance of its metaclass, carries
//! its direct bases, its MRO and a namespace of shared attributes.
//! `Instance` is an ordinary object: a class reference plus an optional
//! attribute store.
//!
//! # Attribute Access
//!
//! The namespace helpers here only walk MROs; the precedence rules between
//! descriptors, instance stores and the fallback hook live in `attr.rs`.

use ahash::AHashSet;

use super::Dict;
use crate::{
    exception::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    resource::ResourceLimits,
    value::Value,
};

/// A class object (a Type).
#[derive(Debug)]
pub(crate) struct ClassObject {
    name: String,
    /// Metaclass (usually `type`).
    metaclass: HeapId,
    /// Class namespace containing class attributes and method definitions.
    namespace: Dict,
    /// Direct base classes, in declaration order. Empty only for `object`.
    bases: Vec<HeapId>,
    /// Method Resolution Order computed by C3 linearization.
    /// Includes this class itself as the first entry and `object` as the last.
    mro: Vec<HeapId>,
    /// Whether instances of this class carry a value store.
    instance_has_dict: bool,
    /// Builtin leaf types (`int`, `function`, ...) can neither be subclassed nor
    /// instantiated: their values are not `Instance`s.
    sealed: bool,
}

impl ClassObject {
    /// Creates a class object. `mro` is usually empty here and filled in by
    /// [`set_mro`](Self::set_mro) once the class's own heap id is known.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        metaclass: HeapId,
        namespace: Dict,
        bases: Vec<HeapId>,
        instance_has_dict: bool,
    ) -> Self {
        Self {
            name: name.into(),
            metaclass,
            namespace,
            bases,
            mro: Vec::new(),
            instance_has_dict,
            sealed: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn metaclass(&self) -> HeapId {
        self.metaclass
    }

    /// Replaces the metaclass; only used while bootstrapping `object` and `type`,
    /// which reference each other.
    pub fn set_metaclass(&mut self, metaclass: HeapId) {
        self.metaclass = metaclass;
    }

    #[must_use]
    pub fn namespace(&self) -> &Dict {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Dict {
        &mut self.namespace
    }

    #[must_use]
    pub fn bases(&self) -> &[HeapId] {
        &self.bases
    }

    /// Returns the MRO. The first element is always this class itself.
    #[must_use]
    pub fn mro(&self) -> &[HeapId] {
        &self.mro
    }

    pub fn set_mro(&mut self, mro: Vec<HeapId>) {
        self.mro = mro;
    }

    #[must_use]
    pub fn instance_has_dict(&self) -> bool {
        self.instance_has_dict
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Checks if this class (identified by `self_id`) is a subclass of `other_id`.
    ///
    /// A class is considered a subclass of itself.
    #[must_use]
    pub fn is_subclass_of(&self, self_id: HeapId, other_id: HeapId) -> bool {
        self_id == other_id || self.mro.contains(&other_id)
    }

    pub fn collect_ref_ids(&self, work_list: &mut Vec<HeapId>) {
        work_list.push(self.metaclass);
        work_list.extend_from_slice(&self.bases);
        work_list.extend_from_slice(&self.mro);
        self.namespace.collect_ref_ids(work_list);
    }
}

/// An instance of a user-defined class (or of `object`).
#[derive(Debug)]
pub(crate) struct Instance {
    class_id: HeapId,
    /// `None` when the class forbids a free-form value store.
    attrs: Option<Dict>,
}

impl Instance {
    #[must_use]
    pub fn new(class_id: HeapId, attrs: Option<Dict>) -> Self {
        Self { class_id, attrs }
    }

    #[must_use]
    pub fn class_id(&self) -> HeapId {
        self.class_id
    }

    #[must_use]
    pub fn attrs(&self) -> Option<&Dict> {
        self.attrs.as_ref()
    }

    pub fn attrs_mut(&mut self) -> Option<&mut Dict> {
        self.attrs.as_mut()
    }

    pub fn collect_ref_ids(&self, work_list: &mut Vec<HeapId>) {
        work_list.push(self.class_id);
        if let Some(attrs) = &self.attrs {
            attrs.collect_ref_ids(work_list);
        }
    }
}

/// Returns the class object stored at `id`, or `None` if `id` is not a class.
pub(crate) fn as_class(heap: &Heap, id: HeapId) -> Option<&ClassObject> {
    match heap.get(id) {
        HeapData::ClassObject(cls) => Some(cls),
        _ => None,
    }
}

/// Looks up `name` along the MRO of `class_id`, returning the value and the class
/// whose namespace held it.
///
/// Reads the namespaces live on every call; nothing is cached.
pub(crate) fn mro_lookup(heap: &Heap, class_id: HeapId, name: &str) -> Option<(Value, HeapId)> {
    let cls = as_class(heap, class_id)?;
    mro_lookup_in(heap, cls.mro(), name)
}

/// Looks up `name` in the namespaces of `mro`, in order.
pub(crate) fn mro_lookup_in(heap: &Heap, mro: &[HeapId], name: &str) -> Option<(Value, HeapId)> {
    mro.iter().find_map(|&base_id| {
        as_class(heap, base_id)
            .and_then(|base| base.namespace().get(name))
            .map(|value| (value.clone(), base_id))
    })
}

/// Checks if `name` exists anywhere along the MRO of `class_id`.
pub(crate) fn mro_has_attr(heap: &Heap, class_id: HeapId, name: &str) -> bool {
    as_class(heap, class_id).is_some_and(|cls| {
        cls.mro()
            .iter()
            .any(|&base_id| as_class(heap, base_id).is_some_and(|base| base.namespace().has(name)))
    })
}

/// Returns true when `sub` is `sup` or has `sup` in its MRO.
pub(crate) fn is_subclass(heap: &Heap, sub: HeapId, sup: HeapId) -> bool {
    as_class(heap, sub).is_some_and(|cls| cls.is_subclass_of(sub, sup))
}

// ============================================================================
// C3 Linearization
// ============================================================================

/// Computes the C3 linearization of a new class's ancestors.
///
/// The C3 algorithm merges the MROs of all base classes with the list of bases
/// to produce a consistent method resolution order, the same algorithm CPython
/// has used since 2.3.
///
/// The result excludes the new class itself: it has no heap id yet, and a class
/// whose hierarchy cannot be linearized is never allocated. The caller prepends
/// the new id. Since the class does not exist yet it also cannot list itself as
/// a base.
///
/// # Errors
/// - `DuplicateBase` if a base appears twice in `bases`.
/// - `InconsistentHierarchy` if no head can be chosen during the merge.
/// - `TypeError` if a base is not a class or a resource limit is exceeded.
pub(crate) fn compute_c3_mro(heap: &Heap, bases: &[HeapId], limits: &ResourceLimits) -> RunResult<Vec<HeapId>> {
    let mut seen = AHashSet::with_capacity(bases.len());
    for &base_id in bases {
        if !seen.insert(base_id) {
            return Err(RunError::DuplicateBase {
                name: class_name(heap, base_id).to_owned(),
            });
        }
    }

    // Collect the MROs of all base classes
    let mut linearizations: Vec<Vec<HeapId>> = Vec::with_capacity(bases.len() + 1);
    for &base_id in bases {
        let Some(base) = as_class(heap, base_id) else {
            return Err(ExcType::type_error("bases must be types"));
        };
        if base.mro().len() > limits.max_inheritance_depth {
            return Err(ExcType::type_error(format!(
                "inheritance chain too deep (maximum depth {})",
                limits.max_inheritance_depth
            )));
        }
        linearizations.push(base.mro().to_vec());
    }
    // Add the list of bases itself as the last sequence to merge
    linearizations.push(bases.to_vec());

    let mut result = Vec::new();
    loop {
        linearizations.retain(|l| !l.is_empty());
        if linearizations.is_empty() {
            break;
        }

        // A good head is one that does not appear in the tail of any list
        let found = linearizations
            .iter()
            .map(|lin| lin[0])
            .find(|candidate| !linearizations.iter().any(|other| other[1..].contains(candidate)));

        let Some(next) = found else {
            return Err(RunError::InconsistentHierarchy {
                bases: bases.iter().map(|&id| class_name(heap, id).to_owned()).collect(),
            });
        };
        result.push(next);
        for lin in &mut linearizations {
            if lin.first() == Some(&next) {
                lin.remove(0);
            }
        }

        // +1 for the class being created
        if result.len() + 1 > limits.max_mro_length {
            return Err(ExcType::type_error("MRO exceeds maximum length"));
        }
    }

    Ok(result)
}

/// Returns the class name stored at `id`, or `"?"` for non-classes.
pub(crate) fn class_name(heap: &Heap, id: HeapId) -> &str {
    as_class(heap, id).map_or("?", ClassObject::name)
}
