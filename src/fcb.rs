//! Create/update/read/delete of files and directories; nlink management and
//! the deferred-delete rule for unlinked-but-open files.

use uuid::Uuid;

use crate::block;
use crate::config::MountConfig;
use crate::dir;
use crate::error::{Error, Result};
use crate::ident::new_id;
use crate::kv::KvStore;
use crate::layout::{RawFcb, TYPE_DIRECTORY, TYPE_REGULAR};

/// An in-memory copy of one FCB. Never held across a KV round-trip that
/// could race with another handle to the same file; callers re-read via
/// [`read`] whenever freshness matters (see the open-file table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fcb {
    pub id: Uuid,
    pub data: Uuid,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl Fcb {
    pub fn is_directory(&self) -> bool {
        self.mode & crate::layout::TYPE_MASK == TYPE_DIRECTORY
    }

    pub fn is_regular(&self) -> bool {
        self.mode & crate::layout::TYPE_MASK == TYPE_REGULAR
    }

    /// Exposed crate-wide so callers like the permission checker can read
    /// the byte-level triad without duplicating field layout knowledge.
    pub(crate) fn to_raw(&self) -> RawFcb {
        RawFcb {
            id: *self.id.as_bytes(),
            data: *self.data.as_bytes(),
            size: self.size,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            nlink: self.nlink,
        }
    }

    fn from_raw(raw: &RawFcb) -> Self {
        Self {
            id: raw.id(),
            data: raw.data(),
            mode: raw.mode,
            uid: raw.uid,
            gid: raw.gid,
            nlink: raw.nlink,
            size: raw.size,
            atime: raw.atime,
            mtime: raw.mtime,
            ctime: raw.ctime,
        }
    }
}

fn new_fcb(kv: &dyn KvStore, config: &MountConfig, type_bit: u32, mode: u32, uid: u32, gid: u32, now: i64) -> Result<Fcb> {
    let data = block::new_index_block(kv, config)?;
    Ok(Fcb {
        id: new_id(),
        data,
        mode: type_bit | (mode & crate::layout::PERM_MASK),
        uid,
        gid,
        nlink: 0,
        size: 0,
        atime: now,
        mtime: now,
        ctime: now,
    })
}

/// Creates a regular file's FCB and an empty index block, and persists both.
/// `nlink` starts at 0; the caller links it into a directory to make it
/// reachable (see [`link`]).
pub fn create_file(kv: &dyn KvStore, config: &MountConfig, mode: u32, uid: u32, gid: u32, now: i64) -> Result<Fcb> {
    let fcb = new_fcb(kv, config, TYPE_REGULAR, mode, uid, gid, now)?;
    update(kv, &fcb)?;
    Ok(fcb)
}

/// Creates a directory's FCB, an empty index block, and writes the initial
/// `{items: 0, first_free: -1}` header as its content.
pub fn create_directory(kv: &dyn KvStore, config: &MountConfig, mode: u32, uid: u32, gid: u32, now: i64) -> Result<Fcb> {
    let mut fcb = new_fcb(kv, config, TYPE_DIRECTORY, mode, uid, gid, now)?;
    dir::init_empty(kv, config, &mut fcb)?;
    update(kv, &fcb)?;
    Ok(fcb)
}

/// Persists the in-memory FCB. Time fields are the caller's responsibility.
pub fn update(kv: &dyn KvStore, fcb: &Fcb) -> Result<()> {
    let raw = fcb.to_raw();
    kv.write(&fcb.id, bytemuck::bytes_of(&raw)).map_err(|e| Error::Internal(e.to_string()))
}

/// Loads an FCB from the KV store by id.
pub fn read(kv: &dyn KvStore, id: Uuid) -> Result<Fcb> {
    let mut buf = vec![0u8; core::mem::size_of::<RawFcb>()];
    kv.read(&id, &mut buf).map_err(|_| Error::NoEntry)?;
    let raw: &RawFcb = bytemuck::from_bytes(&buf);
    Ok(Fcb::from_raw(raw))
}

/// Deletes every data block, the index block, and the FCB itself. Callers
/// must ensure the FCB is unreachable (nlink == 0, not open) before calling.
pub fn remove(kv: &dyn KvStore, config: &MountConfig, fcb: &Fcb) -> Result<()> {
    block::free_all_blocks(kv, config, fcb)?;
    kv.delete(&fcb.data).map_err(|e| Error::Internal(e.to_string()))?;
    kv.delete(&fcb.id).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(())
}

/// Adds a directory entry for `file` under `name` in `dir`, then increments
/// `file.nlink` and persists it.
pub fn link(kv: &dyn KvStore, config: &MountConfig, dir_fcb: &mut Fcb, file: &mut Fcb, name: &str, now: i64) -> Result<()> {
    dir::add_entry(kv, config, dir_fcb, file.id, name, now)?;
    update(kv, dir_fcb)?;
    file.nlink += 1;
    file.ctime = now;
    update(kv, file)
}

/// Removes the directory entry for `name`, decrements `file.nlink`, and —
/// if the link count reached zero and no open handle references the file —
/// deletes the FCB and its data. `still_open` is the open-file table's
/// answer to "is this FCB id in any open slot".
pub fn unlink(
    kv: &dyn KvStore,
    config: &MountConfig,
    dir_fcb: &mut Fcb,
    file: &mut Fcb,
    name: &str,
    now: i64,
    still_open: bool,
) -> Result<()> {
    dir::remove_entry(kv, config, dir_fcb, name, now)?;
    update(kv, dir_fcb)?;

    if file.nlink > 0 {
        file.nlink -= 1;
        file.ctime = now;
        update(kv, file)?;
    }

    if file.nlink == 0 && !still_open {
        remove(kv, config, file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemKv;

    #[test]
    fn create_file_starts_unlinked() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let fcb = create_file(&kv, &config, 0o644, 1000, 1000, 1).unwrap();
        assert_eq!(fcb.nlink, 0);
        assert!(fcb.is_regular());
    }

    #[test]
    fn create_directory_has_header_sized_content() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let dir_fcb = create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        assert_eq!(dir_fcb.size, crate::layout::DIR_HEADER_SIZE as u64);
        assert!(dir_fcb.is_directory());
    }

    #[test]
    fn link_then_unlink_restores_zero_nlink_and_frees_fcb() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let mut root = create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        let mut file = create_file(&kv, &config, 0o644, 0, 0, 1).unwrap();

        link(&kv, &config, &mut root, &mut file, "a", 2).unwrap();
        assert_eq!(file.nlink, 1);
        assert!(kv.exists(&file.id).unwrap());

        unlink(&kv, &config, &mut root, &mut file, "a", 3, false).unwrap();
        assert_eq!(file.nlink, 0);
        assert!(!kv.exists(&file.id).unwrap());
        assert!(!kv.exists(&file.data).unwrap());
    }

    #[test]
    fn unlink_while_open_keeps_fcb_alive() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let mut root = create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        let mut file = create_file(&kv, &config, 0o644, 0, 0, 1).unwrap();

        link(&kv, &config, &mut root, &mut file, "a", 2).unwrap();
        unlink(&kv, &config, &mut root, &mut file, "a", 3, true).unwrap();

        assert_eq!(file.nlink, 0);
        assert!(kv.exists(&file.id).unwrap());
    }
}
