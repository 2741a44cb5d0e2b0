use std::collections::BTreeMap;

use strum::IntoStaticStr;

use crate::types::{BoundMethod, ClassMethod, ClassObject, Instance, NativeFunction, Property, StaticMethod};

/// Unique identifier for values stored inside the heap arena.
///
/// Carries the generation of its slot, so a handle kept across a collection
/// that recycled the slot no longer matches the object now stored there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapId {
    index: usize,
    generation: u32,
}

impl HeapId {
    /// Id used while bootstrapping `object` and `type`, which reference each other.
    /// Never handed out by [`Heap::allocate`].
    pub(crate) const PLACEHOLDER: Self = Self {
        index: usize::MAX,
        generation: 0,
    };

    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.index
    }

    /// Returns the generation of the slot when this id was handed out.
    #[inline]
    #[must_use]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Everything that has identity in the object model.
#[derive(Debug, IntoStaticStr)]
pub(crate) enum HeapData {
    ClassObject(ClassObject),
    Instance(Instance),
    Function(NativeFunction),
    BoundMethod(BoundMethod),
    StaticMethod(StaticMethod),
    ClassMethod(ClassMethod),
    Property(Property),
}

impl HeapData {
    /// Pushes every heap id this object references onto `work_list`.
    fn collect_child_ids(&self, work_list: &mut Vec<HeapId>) {
        match self {
            Self::ClassObject(cls) => cls.collect_ref_ids(work_list),
            Self::Instance(inst) => inst.collect_ref_ids(work_list),
            // closures are opaque to the collector
            Self::Function(_) => {}
            Self::BoundMethod(method) => {
                work_list.extend(method.func().ref_id());
                work_list.extend(method.receiver().ref_id());
            }
            Self::StaticMethod(sm) => work_list.extend(sm.func().ref_id()),
            Self::ClassMethod(cm) => work_list.extend(cm.func().ref_id()),
            Self::Property(prop) => prop.collect_ref_ids(work_list),
        }
    }
}

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` for deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Number of free (recycled) slots available for reuse.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
    /// Live objects keyed by `HeapData` variant name ("ClassObject", "Instance", ...).
    pub objects_by_type: BTreeMap<&'static str, usize>,
}

/// One arena slot. The generation is bumped every time the slot is freed.
#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    data: Option<HeapData>,
}

/// Arena owning every object with identity.
///
/// Objects stay alive until a [`collect_garbage`](Self::collect_garbage) pass
/// finds them unreachable from the roots it is given. Freed slots are reused
/// under a new generation, so stale ids fail [`get_if_live`](Self::get_if_live).
#[derive(Debug, Default)]
pub(crate) struct Heap {
    entries: Vec<Slot>,
    free_list: Vec<usize>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new heap entry, reusing a freed slot when one is available.
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.entries[index];
            slot.data = Some(data);
            HeapId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.entries.len();
            self.entries.push(Slot {
                generation: 0,
                data: Some(data),
            });
            HeapId { index, generation: 0 }
        }
    }

    /// Returns the heap data stored at the given ID.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the value has already been freed.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        self.get_if_live(id).expect("Heap::get: object already freed")
    }

    /// Returns the heap data if the slot still holds the object `id` was issued for.
    #[must_use]
    pub fn get_if_live(&self, id: HeapId) -> Option<&HeapData> {
        let slot = self.entries.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_ref()
    }

    /// Returns a mutable reference to the heap data stored at the given ID.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the value has already been freed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        self.entries
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_mut())
            .expect("Heap::get_mut: object already freed")
    }

    /// Mark-and-sweep collection: frees every entry not reachable from `roots`.
    ///
    /// Stale roots are ignored. Returns the number of freed entries.
    pub fn collect_garbage(&mut self, roots: Vec<HeapId>) -> usize {
        // Mark phase: Vec<bool> instead of a set, indices are dense
        let mut reachable: Vec<bool> = vec![false; self.entries.len()];
        let mut work_list = roots;

        while let Some(id) = work_list.pop() {
            let idx = id.index;
            if idx >= reachable.len() || reachable[idx] {
                continue;
            }
            if let Some(data) = self.get_if_live(id) {
                reachable[idx] = true;
                data.collect_child_ids(&mut work_list);
            }
        }

        // Sweep phase
        let mut freed = 0;
        for (idx, slot) in self.entries.iter_mut().enumerate() {
            if !reachable[idx] && slot.data.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(idx);
                freed += 1;
            }
        }
        freed
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type = BTreeMap::new();
        for data in self.entries.iter().filter_map(|slot| slot.data.as_ref()) {
            let name: &'static str = data.into();
            *objects_by_type.entry(name).or_insert(0) += 1;
        }
        let live_objects = objects_by_type.values().sum();
        HeapStats {
            live_objects,
            free_slots: self.free_list.len(),
            total_slots: self.entries.len(),
            objects_by_type,
        }
    }
}
