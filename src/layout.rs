//! Byte-exact, platform-local persisted layouts. Fixed-size records (the FCB,
//! the directory header) are `#[repr(C)]` `Pod` structs decoded with a
//! straight `bytemuck` cast. Records whose size depends on a mount's
//! [`crate::config::MountConfig`] (directory slots, the index block) cannot
//! be compile-time-sized arrays, so they get explicit encode/decode helpers
//! instead of a derive; they are still fixed-stride and byte-exact for a
//! given mount.

use bytemuck::{Pod, Zeroable};
use uuid::Uuid;

/// `mode` type bits, POSIX-flavored (matches `S_IFDIR`/`S_IFREG`).
pub const TYPE_MASK: u32 = 0o170_000;
pub const TYPE_REGULAR: u32 = 0o100_000;
pub const TYPE_DIRECTORY: u32 = 0o040_000;

pub const PERM_MASK: u32 = 0o007_777;

/// On-disk File Control Block. Field order is chosen so the struct has no
/// interior padding (the two 16-byte UUID arrays and three `i64` timestamps
/// come first, keeping every subsequent `u32` naturally aligned), not to
/// mirror the field order in prose documentation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RawFcb {
    pub id: [u8; 16],
    pub data: [u8; 16],
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
}

impl RawFcb {
    pub fn id(&self) -> Uuid {
        Uuid::from_bytes(self.id)
    }

    pub fn data(&self) -> Uuid {
        Uuid::from_bytes(self.data)
    }

    pub fn is_directory(&self) -> bool {
        self.mode & TYPE_MASK == TYPE_DIRECTORY
    }

    pub fn is_regular(&self) -> bool {
        self.mode & TYPE_MASK == TYPE_REGULAR
    }
}

/// On-disk directory header: item count and free-list head.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RawDirHeader {
    pub items: i32,
    pub first_free: i32,
}

pub const DIR_HEADER_SIZE: usize = core::mem::size_of::<RawDirHeader>();

/// A decoded directory slot. `used == false` means only `next_free` is
/// meaningful (it is the next link in the free-list stack).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSlot {
    pub name: String,
    pub fcb_id: Uuid,
    pub next_free: i32,
    pub used: bool,
}

impl DirSlot {
    pub fn free(next_free: i32) -> Self {
        Self { name: String::new(), fcb_id: Uuid::nil(), next_free, used: false }
    }
}

/// Computes byte strides for directory slots and index-block entries given a
/// mount's configured `max_name`. One instance is cheap to construct and is
/// threaded through the directory engine instead of a global constant.
#[derive(Debug, Clone, Copy)]
pub struct DirSlotCodec {
    max_name: usize,
}

impl DirSlotCodec {
    pub fn new(max_name: usize) -> Self {
        Self { max_name }
    }

    /// `name` bytes + 16-byte fcb_id + 4-byte next_free + 1-byte used flag.
    pub fn slot_size(&self) -> usize {
        self.max_name + 16 + 4 + 1
    }

    pub fn encode(&self, slot: &DirSlot, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.slot_size());
        let name_field = &mut out[..self.max_name];
        name_field.fill(0);
        name_field[..slot.name.len()].copy_from_slice(slot.name.as_bytes());

        let fcb_off = self.max_name;
        out[fcb_off..fcb_off + 16].copy_from_slice(slot.fcb_id.as_bytes());

        let next_free_off = fcb_off + 16;
        out[next_free_off..next_free_off + 4].copy_from_slice(&slot.next_free.to_le_bytes());

        out[next_free_off + 4] = slot.used as u8;
    }

    pub fn decode(&self, buf: &[u8]) -> DirSlot {
        debug_assert_eq!(buf.len(), self.slot_size());
        let name_field = &buf[..self.max_name];
        let nul = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
        let name = String::from_utf8_lossy(&name_field[..nul]).into_owned();

        let fcb_off = self.max_name;
        let fcb_id = Uuid::from_slice(&buf[fcb_off..fcb_off + 16]).expect("slot fcb_id is 16 bytes");

        let next_free_off = fcb_off + 16;
        let next_free = i32::from_le_bytes(buf[next_free_off..next_free_off + 4].try_into().unwrap());

        let used = buf[next_free_off + 4] != 0;

        DirSlot { name, fcb_id, next_free, used }
    }
}

/// Encodes/decodes the index block: a flat array of 16-byte block
/// identifiers, `max_blocks` entries wide, addressed by block index.
#[derive(Debug, Clone, Copy)]
pub struct IndexBlockCodec {
    max_blocks: usize,
}

impl IndexBlockCodec {
    pub fn new(max_blocks: usize) -> Self {
        Self { max_blocks }
    }

    pub fn byte_len(&self) -> usize {
        self.max_blocks * 16
    }

    pub fn read_entry(&self, buf: &[u8], idx: usize) -> Uuid {
        let off = idx * 16;
        Uuid::from_slice(&buf[off..off + 16]).expect("index entry is 16 bytes")
    }

    pub fn write_entry(&self, buf: &mut [u8], idx: usize, id: Uuid) {
        let off = idx * 16;
        buf[off..off + 16].copy_from_slice(id.as_bytes());
    }
}
