//! Fixed capacity handle tables for keys, authorization and transport
//! sessions.

use serde::Deserialize;
use serde::Serialize;

use crate::rc::TpmRc;

/// High byte of every handle issued for a table, so that key, session and
/// transport handles never alias each other.
pub(crate) mod base {
    pub const KEY: u32 = 0x0100_0000;
    pub const AUTH: u32 = 0x0200_0000;
    pub const TRANS: u32 = 0x0300_0000;
}

const HANDLE_INDEX_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot<T> {
    handle: u32,
    value: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HandleTable<T> {
    base: u32,
    last: u32,
    slots: Vec<Option<Slot<T>>>,
}

impl<T> HandleTable<T> {
    pub fn new(base: u32, capacity: usize) -> HandleTable<T> {
        HandleTable {
            base,
            last: 0,
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn free_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn has_space(&self) -> bool {
        self.free_slots() != 0
    }

    pub fn handles(&self) -> Vec<u32> {
        self.slots.iter().flatten().map(|s| s.handle).collect()
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: u32) -> Option<&T> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.handle == handle)
            .map(|s| &s.value)
    }

    pub fn get_mut(&mut self, handle: u32) -> Option<&mut T> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|s| s.handle == handle)
            .map(|s| &mut s.value)
    }

    /// Store `value` under a fresh handle, or fail with `TPM_RESOURCES` when
    /// the table is full.
    pub fn insert(&mut self, value: T) -> Result<u32, TpmRc> {
        let index = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(TpmRc::RESOURCES)?;

        let handle = loop {
            self.last = self.last.wrapping_add(1) & HANDLE_INDEX_MASK;
            let candidate = self.base | self.last;
            if self.last != 0 && !self.contains(candidate) {
                break candidate;
            }
        };

        self.slots[index] = Some(Slot { handle, value });
        Ok(handle)
    }

    pub fn remove(&mut self, handle: u32) -> Option<T> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| matches!(s, Some(s) if s.handle == handle))?;
        slot.take().map(|s| s.value)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(s) if !keep(&s.value)) {
                *slot = None;
            }
        }
    }

    pub fn clear(&mut self) {
        self.retain(|_| false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_reused_slots_get_new_handles() {
        let mut table = HandleTable::new(base::AUTH, 2);
        let a = table.insert('a').unwrap();
        let b = table.insert('b').unwrap();
        assert_ne!(a, b);
        assert_eq!(a & 0xFF00_0000, base::AUTH);
        assert_eq!(table.insert('c'), Err(TpmRc::RESOURCES));

        assert_eq!(table.remove(a), Some('a'));
        assert_eq!(table.free_slots(), 1);
        let c = table.insert('c').unwrap();
        assert_ne!(c, a);
        assert_eq!(table.get(c), Some(&'c'));
        assert_eq!(table.get(a), None);
    }

    #[test]
    fn retain_and_clear() {
        let mut table = HandleTable::new(base::KEY, 4);
        for v in 0..4 {
            table.insert(v).unwrap();
        }
        table.retain(|v| v % 2 == 0);
        assert_eq!(table.free_slots(), 2);
        table.clear();
        assert!(table.handles().is_empty());
    }
}
