//! Instance store.
//!
//! Instances live in a slab of slots. A freed slot goes onto a free list and is
//! reused by the next allocation with its generation bumped, so a handle kept past
//! `free` is detected as stale instead of silently pointing at a new instance.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    exception::{ErrorKind, RunResult},
    resource::{ResourceError, ResourceTracker},
    types::{ClassId, Instance},
};

/// Handle to an instance in the instance store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    /// Returns the raw slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the generation of the slot this handle was issued for.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    instance: Option<Instance>,
}

/// Snapshot of instance store state at a point in time.
///
/// `instances_by_class` uses `BTreeMap` for deterministic iteration order, which makes
/// snapshots suitable for display and comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of live instances.
    pub live_instances: usize,
    /// Number of free (recycled) slots available for reuse.
    pub free_slots: usize,
    /// Total slot capacity (live + free).
    pub total_slots: usize,
    /// Live instances per owner class.
    pub instances_by_class: BTreeMap<ClassId, usize>,
    /// Resource tracker allocation count, if the tracker records it.
    pub tracker_allocations: Option<usize>,
    /// Resource tracker memory usage in bytes, if the tracker records it.
    pub tracker_memory_bytes: Option<usize>,
}

/// Slab of instances plus the resource tracker that accounts for them.
#[derive(Debug)]
pub(crate) struct Heap<T: ResourceTracker> {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    tracker: T,
}

impl<T: ResourceTracker> Heap<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            tracker,
        }
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Allocates a new instance, reusing a freed slot when one is available.
    pub fn allocate(&mut self, instance: Instance) -> Result<InstanceId, ResourceError> {
        self.tracker.on_allocate(|| instance.estimate_size())?;

        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.instance = Some(instance);
            InstanceId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| ResourceError::Allocation {
                limit: u32::MAX as usize,
                count: self.slots.len() + 1,
            })?;
            self.slots.push(Slot {
                generation: 0,
                instance: Some(instance),
            });
            InstanceId { index, generation: 0 }
        };
        Ok(id)
    }

    /// Returns the instance behind `id`, or `InstanceNotFound` for stale handles.
    pub fn get(&self, id: InstanceId) -> RunResult<&Instance> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.instance.as_ref())
            .ok_or_else(|| ErrorKind::instance_not_found(id))
    }

    pub fn get_mut(&mut self, id: InstanceId) -> RunResult<&mut Instance> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.instance.as_mut())
            .ok_or_else(|| ErrorKind::instance_not_found(id))
    }

    /// Writes an attribute on an instance, charging the tracker for new keys.
    pub fn set_attr(&mut self, id: InstanceId, name: &str, value: crate::Value) -> RunResult<()> {
        let is_new = !self.get(id)?.attributes().contains_key(name);
        if is_new {
            self.tracker.on_container_insert(|| Instance::attribute_size(name))?;
        }
        self.get_mut(id)?.set_attr(name, value);
        Ok(())
    }

    /// Frees an instance and returns it. The slot becomes reusable.
    pub fn free(&mut self, id: InstanceId) -> RunResult<Instance> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .ok_or_else(|| ErrorKind::instance_not_found(id))?;
        let instance = slot.instance.take().ok_or_else(|| ErrorKind::instance_not_found(id))?;
        self.free_list.push(id.index);
        self.tracker.on_free(|| instance.estimate_size());
        Ok(instance)
    }

    pub fn stats(&self) -> HeapStats {
        let mut instances_by_class = BTreeMap::new();
        for instance in self.slots.iter().filter_map(|slot| slot.instance.as_ref()) {
            *instances_by_class.entry(instance.owner_class()).or_insert(0) += 1;
        }
        HeapStats {
            live_instances: instances_by_class.values().sum(),
            free_slots: self.free_list.len(),
            total_slots: self.slots.len(),
            instances_by_class,
            tracker_allocations: self.tracker.allocation_count(),
            tracker_memory_bytes: self.tracker.current_memory_bytes(),
        }
    }
}
