//! Directory content: a header (item count, free-list head) followed by an
//! array of fixed-size slots, stored as the directory FCB's own file
//! content via the block engine. Free slots form an intrusive singly-linked
//! stack rooted at `first_free`, so removal and re-use are both O(1).

use uuid::Uuid;

use crate::block;
use crate::config::MountConfig;
use crate::error::{Error, Result};
use crate::fcb::Fcb;
use crate::kv::KvStore;
use crate::layout::{DirSlot, DirSlotCodec, RawDirHeader, DIR_HEADER_SIZE};

fn codec(config: &MountConfig) -> DirSlotCodec {
    DirSlotCodec::new(config.max_name)
}

fn read_header(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &Fcb) -> Result<RawDirHeader> {
    let mut buf = [0u8; DIR_HEADER_SIZE];
    block::read_data(kv, config, dir_fcb, &mut buf, 0)?;
    Ok(*bytemuck::from_bytes(&buf))
}

fn write_header(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &mut Fcb, header: RawDirHeader, now: i64) -> Result<()> {
    block::write_data(kv, config, dir_fcb, bytemuck::bytes_of(&header), 0, now)
}

fn slot_offset(config: &MountConfig, slot_idx: usize) -> u64 {
    (DIR_HEADER_SIZE + slot_idx * codec(config).slot_size()) as u64
}

fn read_slot(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &Fcb, slot_idx: usize) -> Result<DirSlot> {
    let c = codec(config);
    let mut buf = vec![0u8; c.slot_size()];
    block::read_data(kv, config, dir_fcb, &mut buf, slot_offset(config, slot_idx))?;
    Ok(c.decode(&buf))
}

fn write_slot(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &mut Fcb, slot_idx: usize, slot: &DirSlot, now: i64) -> Result<()> {
    let c = codec(config);
    let mut buf = vec![0u8; c.slot_size()];
    c.encode(slot, &mut buf);
    block::write_data(kv, config, dir_fcb, &buf, slot_offset(config, slot_idx), now)
}

/// Writes the initial `{items: 0, first_free: -1}` header as a brand-new
/// directory's entire content.
pub fn init_empty(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &mut Fcb) -> Result<()> {
    let header = RawDirHeader { items: 0, first_free: -1 };
    write_header(kv, config, dir_fcb, header, dir_fcb.ctime)
}

/// Adds an entry for `target_id` under `name`. Reuses the head of the free
/// list if one exists; otherwise appends a new slot, failing with
/// `Error::TooLarge` (and writing nothing) if that would push the
/// directory's byte length past the mount's cap.
pub fn add_entry(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &mut Fcb, target_id: Uuid, name: &str, now: i64) -> Result<()> {
    if name.len() > config.max_name - 1 {
        return Err(Error::TooLarge);
    }

    let mut header = read_header(kv, config, dir_fcb)?;

    let slot_idx = if header.first_free >= 0 {
        header.first_free as usize
    } else {
        let candidate = header.items as usize;
        let required_size = slot_offset(config, candidate) + codec(config).slot_size() as u64;
        if required_size > config.max_size() {
            return Err(Error::TooLarge);
        }
        candidate
    };

    if header.first_free >= 0 {
        let reused = read_slot(kv, config, dir_fcb, slot_idx)?;
        header.first_free = reused.next_free;
    } else {
        header.items += 1;
    }

    let new_slot = DirSlot { name: name.to_string(), fcb_id: target_id, next_free: -1, used: true };
    write_slot(kv, config, dir_fcb, slot_idx, &new_slot, now)?;
    write_header(kv, config, dir_fcb, header, now)?;

    Ok(())
}

/// Removes the entry named `name`. The freed slot becomes the new free-list
/// head; `items` is never shrunk (slot indices stay stable for other
/// entries).
pub fn remove_entry(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &mut Fcb, name: &str, now: i64) -> Result<()> {
    let mut header = read_header(kv, config, dir_fcb)?;

    for slot_idx in 0..header.items as usize {
        let slot = read_slot(kv, config, dir_fcb, slot_idx)?;
        if slot.used && slot.name == name {
            let freed = DirSlot::free(header.first_free);
            write_slot(kv, config, dir_fcb, slot_idx, &freed, now)?;
            header.first_free = slot_idx as i32;
            write_header(kv, config, dir_fcb, header, now)?;
            return Ok(());
        }
    }

    Err(Error::NoEntry)
}

/// Loads the directory's content once and returns an owned, non-restartable
/// iterator over its used slots in physical order.
pub fn iterate(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &Fcb) -> Result<DirIter> {
    let header = read_header(kv, config, dir_fcb)?;
    let mut slots = Vec::with_capacity(header.items as usize);
    for slot_idx in 0..header.items as usize {
        let slot = read_slot(kv, config, dir_fcb, slot_idx)?;
        if slot.used {
            slots.push(slot);
        }
    }
    Ok(DirIter { slots: slots.into_iter() })
}

/// Counts used slots — equivalent to `iterate(..).count()` but doesn't
/// require the caller to hold onto the iterator.
pub fn len(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &Fcb) -> Result<usize> {
    Ok(iterate(kv, config, dir_fcb)?.count())
}

/// Scans for an exact, case-sensitive, byte-wise name match.
pub fn find(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &Fcb, name: &str) -> Result<Option<Uuid>> {
    for slot in iterate(kv, config, dir_fcb)? {
        if slot.name == name {
            return Ok(Some(slot.fcb_id));
        }
    }
    Ok(None)
}

/// A single-pass iterator over a directory's used slots, loaded once from a
/// snapshot of its content. Not restartable; must be dropped before the
/// directory is mutated again within the same gateway call.
pub struct DirIter {
    slots: std::vec::IntoIter<DirSlot>,
}

impl Iterator for DirIter {
    type Item = DirSlot;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.next()
    }
}
