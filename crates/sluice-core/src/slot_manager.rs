/*! Persistent storage slot allocation.
 *
 * Every storage field gets a run of 32-byte slots. Allocation is first-fit starting at the
 * high-water mark, so slot order follows declaration order and the same declarations
 * always produce the same layout.
 */

use crate::contract::IRStruct;
use crate::types::Type;
use crate::{Result, SluiceError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u64,
    pub count: u64,
}

impl SlotRange {
    pub fn end(&self) -> u64 {
        self.start + self.count
    }

    pub fn contains(&self, slot: u64) -> bool {
        slot >= self.start && slot < self.end()
    }
}

/// Slot request for a non-struct variable.
#[derive(Debug, Clone, Copy)]
pub struct SlotRequest<'a> {
    pub ty: &'a Type,
    pub length: Option<u32>,
}

impl<'a> SlotRequest<'a> {
    pub fn new(ty: &'a Type) -> Self {
        let length = match ty {
            Type::Array { length, .. } => *length,
            _ => None,
        };
        Self { ty, length }
    }

    /// Scalars, mappings and dynamic arrays take one slot; static arrays one per element.
    pub fn slot_count(&self) -> u64 {
        match (self.ty, self.length) {
            (Type::Array { length: Some(_), .. }, Some(n)) => u64::from(n).max(1),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotManager {
    next_available_slot: u64,
    allocated_slots: BTreeSet<u64>,
    variable_slots: IndexMap<String, SlotRange>,
    slot_variables: BTreeMap<u64, String>,
}

impl SlotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start_slot: u64) -> Self {
        let mut manager = Self::new();
        manager.reset(start_slot);
        manager
    }

    pub fn allocate_slot(&mut self, name: &str, request: SlotRequest<'_>) -> Result<u64> {
        self.allocate(name, request.slot_count())
    }

    pub fn allocate_struct_slots(&mut self, name: &str, ty: &Type, template: &IRStruct) -> Result<u64> {
        debug_assert_eq!(ty.struct_name(), Some(template.name.as_str()));
        self.allocate(name, template.slot_count())
    }

    fn allocate(&mut self, name: &str, count: u64) -> Result<u64> {
        if let Some(existing) = self.variable_slots.get(name) {
            return Err(SluiceError::SlotCollision {
                name: name.to_string(),
                slot: existing.start,
            });
        }

        let start = self.first_fit(count);
        let range = SlotRange { start, count };
        for slot in start..range.end() {
            self.allocated_slots.insert(slot);
            self.slot_variables.insert(slot, name.to_string());
        }
        self.variable_slots.insert(name.to_string(), range);
        if range.end() > self.next_available_slot {
            self.next_available_slot = range.end();
        }

        debug!(variable = name, slot = start, count, "allocated storage slots");
        Ok(start)
    }

    fn first_fit(&self, count: u64) -> u64 {
        let mut candidate = self.next_available_slot;
        loop {
            match (candidate..candidate + count).find(|slot| self.allocated_slots.contains(slot)) {
                Some(taken) => candidate = taken + 1,
                None => return candidate,
            }
        }
    }

    /// Marks slots as used without binding them to a variable.
    pub fn reserve(&mut self, slots: impl IntoIterator<Item = u64>) {
        self.allocated_slots.extend(slots);
    }

    pub fn slot_for_variable(&self, name: &str) -> Result<u64> {
        self.variable_slots
            .get(name)
            .map(|range| range.start)
            .ok_or_else(|| SluiceError::UnallocatedVariable(name.to_string()))
    }

    pub fn range_for_variable(&self, name: &str) -> Option<SlotRange> {
        self.variable_slots.get(name).copied()
    }

    pub fn variable_for_slot(&self, slot: u64) -> Option<&str> {
        self.slot_variables.get(&slot).map(String::as_str)
    }

    pub fn is_allocated(&self, slot: u64) -> bool {
        self.allocated_slots.contains(&slot)
    }

    pub fn next_available_slot(&self) -> u64 {
        self.next_available_slot
    }

    /// Allocations in the order they were made.
    pub fn allocations(&self) -> impl Iterator<Item = (&str, SlotRange)> {
        self.variable_slots
            .iter()
            .map(|(name, range)| (name.as_str(), *range))
    }

    /// Folds another layout (an inherited contract's) into this one.
    pub fn merge(&mut self, other: &SlotManager) -> Result<()> {
        for (name, range) in &other.variable_slots {
            if let Some(existing) = self.variable_slots.get(name) {
                if existing != range {
                    return Err(SluiceError::MergeConflict {
                        name: name.clone(),
                        left: existing.start,
                        right: range.start,
                    });
                }
            }
            for slot in range.start..range.end() {
                if let Some(owner) = self.slot_variables.get(&slot) {
                    if owner != name {
                        return Err(SluiceError::SlotCollision {
                            name: name.clone(),
                            slot,
                        });
                    }
                }
            }
        }

        for (name, range) in &other.variable_slots {
            self.variable_slots.entry(name.clone()).or_insert(*range);
            for slot in range.start..range.end() {
                self.slot_variables.insert(slot, name.clone());
            }
        }
        self.allocated_slots
            .extend(other.allocated_slots.iter().copied());
        self.next_available_slot = self.next_available_slot.max(other.next_available_slot);
        Ok(())
    }

    pub fn reset(&mut self, start_slot: u64) {
        self.next_available_slot = start_slot;
        self.allocated_slots.clear();
        self.variable_slots.clear();
        self.slot_variables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::IRStructField;

    fn three_word_struct() -> IRStruct {
        IRStruct {
            name: "Triple".into(),
            fields: (0..3)
                .map(|i| IRStructField {
                    name: format!("f{}", i),
                    ty: Type::Uint256,
                    offset: i * 32,
                })
                .collect(),
            size: 96,
        }
    }

    #[test]
    fn test_first_fit_after_two_slots() {
        let mut slots = SlotManager::new();
        slots.reserve([0, 1]);
        let slot = slots.allocate_slot("x", SlotRequest::new(&Type::Uint256)).unwrap();
        assert_eq!(slot, 2);
    }

    #[test]
    fn test_first_fit_skips_fragmented_run() {
        let mut slots = SlotManager::new();
        slots.reserve([0, 2]);
        let template = three_word_struct();
        let slot = slots
            .allocate_struct_slots("t", &Type::Struct("Triple".into()), &template)
            .unwrap();
        assert_eq!(slot, 3);
        assert_eq!(slots.range_for_variable("t"), Some(SlotRange { start: 3, count: 3 }));
        assert_eq!(slots.next_available_slot(), 6);

        // scanning resumes at the high-water mark; the hole at 1 stays free
        let single = slots.allocate_slot("y", SlotRequest::new(&Type::Bool)).unwrap();
        assert_eq!(single, 6);
        assert!(!slots.is_allocated(1));
    }

    #[test]
    fn test_collision_is_fatal() {
        let mut slots = SlotManager::new();
        slots.allocate_slot("x", SlotRequest::new(&Type::Uint256)).unwrap();
        let err = slots
            .allocate_slot("x", SlotRequest::new(&Type::Uint256))
            .unwrap_err();
        assert_eq!(
            err,
            SluiceError::SlotCollision {
                name: "x".into(),
                slot: 0
            }
        );
    }

    #[test]
    fn test_lookup_both_directions() {
        let mut slots = SlotManager::new();
        slots.allocate_slot("a", SlotRequest::new(&Type::Uint256)).unwrap();
        let arr = Type::parse("StaticArray<U256, 3>").unwrap();
        slots.allocate_slot("arr", SlotRequest::new(&arr)).unwrap();

        assert_eq!(slots.slot_for_variable("arr").unwrap(), 1);
        assert_eq!(slots.variable_for_slot(3), Some("arr"));
        assert_eq!(slots.variable_for_slot(4), None);
        assert!(matches!(
            slots.slot_for_variable("missing"),
            Err(SluiceError::UnallocatedVariable(_))
        ));
    }

    #[test]
    fn test_merge_takes_union_and_max() {
        let mut parent = SlotManager::new();
        parent.allocate_slot("owner", SlotRequest::new(&Type::Address)).unwrap();
        parent.allocate_slot("total", SlotRequest::new(&Type::Uint256)).unwrap();

        let mut child = SlotManager::new();
        child.merge(&parent).unwrap();
        let slot = child.allocate_slot("count", SlotRequest::new(&Type::Uint256)).unwrap();
        assert_eq!(slot, 2);
        assert_eq!(child.variable_for_slot(0), Some("owner"));

        child.merge(&parent).unwrap();
        assert_eq!(child.next_available_slot(), 3);
    }

    #[test]
    fn test_merge_conflict() {
        let mut left = SlotManager::new();
        left.allocate_slot("a", SlotRequest::new(&Type::Uint256)).unwrap();
        left.allocate_slot("b", SlotRequest::new(&Type::Uint256)).unwrap();

        let mut right = SlotManager::new();
        right.allocate_slot("b", SlotRequest::new(&Type::Uint256)).unwrap();

        assert!(matches!(
            left.merge(&right),
            Err(SluiceError::MergeConflict { left: 1, right: 0, .. })
        ));
    }

    #[test]
    fn test_reset_starts_fresh() {
        let mut slots = SlotManager::new();
        slots.allocate_slot("a", SlotRequest::new(&Type::Uint256)).unwrap();
        slots.reset(10);
        assert_eq!(slots.allocate_slot("a", SlotRequest::new(&Type::Uint256)).unwrap(), 10);
        assert!(!slots.is_allocated(0));
    }
}
