//! Process-lifetime, fixed-capacity table mapping small integer handles to
//! FCB identifiers. Not persisted; the host gateway's handles only make
//! sense within one mount's process lifetime.

use uuid::Uuid;

use crate::error::{Error, Result};

/// A handle returned by [`OpenTable::add`]; an index into the table.
pub type Handle = usize;

pub struct OpenTable {
    slots: Vec<Option<Uuid>>,
}

impl OpenTable {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![None; capacity] }
    }

    /// Finds a free slot, stores `fcb_id`, and returns its handle.
    /// `Error::TooManyOpen` if the table is full.
    pub fn add(&mut self, fcb_id: Uuid) -> Result<Handle> {
        let slot = self.slots.iter().position(|s| s.is_none()).ok_or(Error::TooManyOpen)?;
        self.slots[slot] = Some(fcb_id);
        Ok(slot)
    }

    /// Returns the FCB id stored at `handle`. Callers re-read the FCB from
    /// the KV store afterwards to pick up metadata changed via other
    /// handles — this table never caches a snapshot.
    pub fn get(&self, handle: Handle) -> Result<Uuid> {
        self.slots.get(handle).copied().flatten().ok_or(Error::BadHandle)
    }

    /// Frees `handle`. Returns `Error::BadHandle` if it wasn't in use.
    pub fn remove(&mut self, handle: Handle) -> Result<()> {
        let slot = self.slots.get_mut(handle).ok_or(Error::BadHandle)?;
        if slot.take().is_none() {
            return Err(Error::BadHandle);
        }
        Ok(())
    }

    /// Linear scan: is any handle currently pointing at `id`?
    pub fn is_open(&self, id: Uuid) -> bool {
        self.slots.iter().any(|s| *s == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::new_id;

    #[test]
    fn add_then_get_round_trips() {
        let mut table = OpenTable::new(4);
        let id = new_id();
        let handle = table.add(id).unwrap();
        assert_eq!(table.get(handle).unwrap(), id);
        assert!(table.is_open(id));
    }

    #[test]
    fn remove_frees_the_slot() {
        let mut table = OpenTable::new(4);
        let id = new_id();
        let handle = table.add(id).unwrap();
        table.remove(handle).unwrap();
        assert!(matches!(table.get(handle), Err(Error::BadHandle)));
        assert!(!table.is_open(id));
    }

    #[test]
    fn removing_an_unused_handle_errors() {
        let mut table = OpenTable::new(4);
        assert!(matches!(table.remove(0), Err(Error::BadHandle)));
    }

    #[test]
    fn full_table_rejects_new_entries() {
        let mut table = OpenTable::new(1);
        table.add(new_id()).unwrap();
        assert!(matches!(table.add(new_id()), Err(Error::TooManyOpen)));
    }

    #[test]
    fn out_of_range_handle_is_bad_handle() {
        let table = OpenTable::new(2);
        assert!(matches!(table.get(99), Err(Error::BadHandle)));
    }
}
