//! The POSIX-flavored entry points a host filesystem bridge calls into.
//! Each method locks the whole mount for its duration and is a thin policy
//! layer over the resolver, FCB lifecycle, directory engine, and block I/O
//! engine — no method here re-implements any of their logic.

use uuid::Uuid;

use crate::block;
use crate::dir;
use crate::error::{Error, Result};
use crate::fcb::{self, Fcb};
use crate::layout;
use crate::mount::{now, Mount, MountInner};
use crate::open_table::Handle;
use crate::path::Path;
use crate::perm::{self, Identity, OpenFlags};
use crate::resolver;

/// One directory entry as seen by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub fcb_id: Uuid,
}

/// Every gateway op below except resolving `/` itself needs a basename to
/// act on; the root path has none.
fn require_name(path: &Path) -> Result<String> {
    path.file_name().ok_or(Error::NotPermitted)
}

impl Mount {
    /// Returns the resolved FCB's metadata. No state change.
    pub fn getattr(&self, path: &Path, identity: &Identity) -> Result<Fcb> {
        let inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, .. } = &*inner;
        let resolved = resolver::resolve(kv.as_ref(), config, *root_id, path, identity)?;
        log::debug!("getattr {} -> {}", path, resolved.file.id);
        Ok(resolved.file)
    }

    /// Lists a directory's entries through an already-open handle.
    pub fn readdir(&self, handle: Handle) -> Result<Vec<DirEntry>> {
        let inner = self.inner.lock().unwrap();
        let MountInner { kv, config, open_table, .. } = &*inner;
        let fcb_id = open_table.get(handle)?;
        let dir_fcb = fcb::read(kv.as_ref(), fcb_id)?;
        if !dir_fcb.is_directory() {
            return Err(Error::NotDirectory);
        }
        let entries = dir::iterate(kv.as_ref(), config, &dir_fcb)?
            .map(|slot| DirEntry { name: slot.name, fcb_id: slot.fcb_id })
            .collect();
        Ok(entries)
    }

    /// Opens an existing regular file, checking `flags` against the caller's
    /// rights.
    pub fn open(&self, path: &Path, identity: &Identity, flags: OpenFlags) -> Result<Handle> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, open_table } = &mut *inner;
        let resolved = resolver::resolve(kv.as_ref(), config, *root_id, path, identity)?;
        if !resolved.file.is_regular() {
            return Err(Error::NotDirectory);
        }
        for access in flags.required_access() {
            if !perm::check(&resolved.file.to_raw(), identity, access) {
                return Err(Error::NoAccess);
            }
        }
        let handle = open_table.add(resolved.file.id)?;
        log::debug!("open {} -> handle {}", path, handle);
        Ok(handle)
    }

    /// Opens an existing directory for `readdir`.
    pub fn opendir(&self, path: &Path, identity: &Identity) -> Result<Handle> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, open_table } = &mut *inner;
        let resolved = resolver::resolve(kv.as_ref(), config, *root_id, path, identity)?;
        if !resolved.file.is_directory() {
            return Err(Error::NotDirectory);
        }
        if !perm::can_execute(&resolved.file.to_raw(), identity) {
            return Err(Error::NoAccess);
        }
        let handle = open_table.add(resolved.file.id)?;
        Ok(handle)
    }

    /// Creates a new regular file under `path`'s parent and opens it.
    pub fn create(&self, path: &Path, identity: &Identity, mode: u32) -> Result<(Handle, Fcb)> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, open_table } = &mut *inner;
        let kv = kv.as_ref();

        let name = require_name(path)?;
        let parent_resolved = resolver::resolve(kv, config, *root_id, &path.parent(), identity)?;
        if !parent_resolved.file.is_directory() {
            return Err(Error::NotDirectory);
        }
        if !perm::can_write(&parent_resolved.file.to_raw(), identity) {
            return Err(Error::NoAccess);
        }
        if dir::find(kv, config, &parent_resolved.file, &name)?.is_some() {
            return Err(Error::Exists);
        }

        let mut parent = parent_resolved.file;
        let mut file = fcb::create_file(kv, config, mode, identity.uid, identity.gid, now())?;
        fcb::link(kv, config, &mut parent, &mut file, &name, now())?;

        let handle = open_table.add(file.id)?;
        log::debug!("create {} -> {}", path, file.id);
        Ok((handle, file))
    }

    /// Creates a new directory under `path`'s parent. Unlike `create`, the
    /// new directory is not opened.
    pub fn mkdir(&self, path: &Path, identity: &Identity, mode: u32) -> Result<Fcb> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, .. } = &mut *inner;
        let kv = kv.as_ref();

        let name = require_name(path)?;
        let parent_resolved = resolver::resolve(kv, config, *root_id, &path.parent(), identity)?;
        if !parent_resolved.file.is_directory() {
            return Err(Error::NotDirectory);
        }
        if !perm::can_write(&parent_resolved.file.to_raw(), identity) {
            return Err(Error::NoAccess);
        }
        if dir::find(kv, config, &parent_resolved.file, &name)?.is_some() {
            return Err(Error::Exists);
        }

        let mut parent = parent_resolved.file;
        let mut new_dir = fcb::create_directory(kv, config, mode, identity.uid, identity.gid, now())?;
        fcb::link(kv, config, &mut parent, &mut new_dir, &name, now())?;

        log::debug!("mkdir {} -> {}", path, new_dir.id);
        Ok(new_dir)
    }

    /// Reads up to `buf.len()` bytes at `offset` through `handle`, clamped
    /// to the file's current size. Returns the number of bytes actually
    /// read; 0 at or past end-of-file.
    pub fn read(&self, handle: Handle, buf: &mut [u8], offset: u64) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        let MountInner { kv, config, open_table, .. } = &*inner;
        let fcb_id = open_table.get(handle)?;
        let file = fcb::read(kv.as_ref(), fcb_id)?;

        if offset >= file.size {
            return Ok(0);
        }
        let readable = (file.size - offset).min(buf.len() as u64) as usize;
        block::read_data(kv.as_ref(), config, &file, &mut buf[..readable], offset)?;
        Ok(readable)
    }

    /// Writes `buf` at `offset` through `handle`, growing the file if
    /// needed. Clamps the write length so the file never exceeds the
    /// mount's size cap; fails outright if `offset` is already at the cap.
    pub fn write(&self, handle: Handle, buf: &[u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, open_table, .. } = &mut *inner;
        let kv = kv.as_ref();
        let fcb_id = open_table.get(handle)?;
        let mut file = fcb::read(kv, fcb_id)?;

        let max_size = config.max_size();
        if offset >= max_size {
            return Err(Error::TooLarge);
        }
        let writable = ((max_size - offset) as usize).min(buf.len());

        block::write_data(kv, config, &mut file, &buf[..writable], offset, now())?;
        fcb::update(kv, &file)?;
        Ok(writable)
    }

    /// Truncates (or extends with zero-fill) the file at `path` to `size`.
    pub fn truncate(&self, path: &Path, identity: &Identity, size: u64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, .. } = &mut *inner;
        let kv = kv.as_ref();
        let resolved = resolver::resolve(kv, config, *root_id, path, identity)?;
        if !resolved.file.is_regular() {
            return Err(Error::NotDirectory);
        }
        if !perm::can_write(&resolved.file.to_raw(), identity) {
            return Err(Error::NoAccess);
        }
        let mut file = resolved.file;
        block::truncate_to(kv, config, &mut file, size, now())?;
        fcb::update(kv, &file)
    }

    /// Changes `path`'s mode bits. Only the owner may do this; the type
    /// bits in `mode` are ignored (only permission bits are applied).
    pub fn chmod(&self, path: &Path, identity: &Identity, mode: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, .. } = &mut *inner;
        let kv = kv.as_ref();
        let resolved = resolver::resolve(kv, config, *root_id, path, identity)?;
        if !perm::is_owner(&resolved.file.to_raw(), identity) {
            return Err(Error::NotPermitted);
        }
        let mut file = resolved.file;
        file.mode = (file.mode & layout::TYPE_MASK) | (mode & layout::PERM_MASK);
        file.ctime = now();
        fcb::update(kv, &file)
    }

    /// Changes `path`'s owner uid/gid. The core imposes no further policy;
    /// a host gateway may restrict this to root itself.
    pub fn chown(&self, path: &Path, identity: &Identity, uid: u32, gid: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, .. } = &mut *inner;
        let kv = kv.as_ref();
        let resolved = resolver::resolve(kv, config, *root_id, path, identity)?;
        let mut file = resolved.file;
        file.uid = uid;
        file.gid = gid;
        file.ctime = now();
        fcb::update(kv, &file)
    }

    /// Sets `path`'s access and modify times explicitly.
    pub fn utime(&self, path: &Path, identity: &Identity, atime: i64, mtime: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, .. } = &mut *inner;
        let kv = kv.as_ref();
        let resolved = resolver::resolve(kv, config, *root_id, path, identity)?;
        if !perm::can_write(&resolved.file.to_raw(), identity) {
            return Err(Error::NoAccess);
        }
        let mut file = resolved.file;
        file.atime = atime;
        file.mtime = mtime;
        fcb::update(kv, &file)
    }

    /// Adds a hard link to an existing regular file under a new name.
    pub fn link(&self, source: &Path, dest: &Path, identity: &Identity) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, .. } = &mut *inner;
        let kv = kv.as_ref();

        let src_resolved = resolver::resolve(kv, config, *root_id, source, identity)?;
        if src_resolved.file.is_directory() {
            return Err(Error::NotPermitted);
        }

        let dest_name = require_name(dest)?;
        let dest_parent_resolved = resolver::resolve(kv, config, *root_id, &dest.parent(), identity)?;
        if !dest_parent_resolved.file.is_directory() {
            return Err(Error::NotDirectory);
        }
        if !perm::can_write(&dest_parent_resolved.file.to_raw(), identity) {
            return Err(Error::NoAccess);
        }
        if dir::find(kv, config, &dest_parent_resolved.file, &dest_name)?.is_some() {
            return Err(Error::Exists);
        }

        let mut dest_parent = dest_parent_resolved.file;
        let mut file = src_resolved.file;
        fcb::link(kv, config, &mut dest_parent, &mut file, &dest_name, now())
    }

    /// Removes a regular file's directory entry, deleting it once its link
    /// count reaches zero and no handle has it open.
    pub fn unlink(&self, path: &Path, identity: &Identity) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, open_table } = &mut *inner;
        let kv = kv.as_ref();

        let name = require_name(path)?;
        let resolved = resolver::resolve(kv, config, *root_id, path, identity)?;
        if resolved.file.is_directory() {
            return Err(Error::NotPermitted);
        }
        if !perm::can_write(&resolved.parent.to_raw(), identity) {
            return Err(Error::NoAccess);
        }

        let mut parent = resolved.parent;
        let mut file = resolved.file;
        let still_open = open_table.is_open(file.id);
        fcb::unlink(kv, config, &mut parent, &mut file, &name, now(), still_open)
    }

    /// Removes an empty directory's entry.
    pub fn rmdir(&self, path: &Path, identity: &Identity) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, open_table } = &mut *inner;
        let kv = kv.as_ref();

        let name = require_name(path)?;
        let resolved = resolver::resolve(kv, config, *root_id, path, identity)?;
        if !resolved.file.is_directory() {
            return Err(Error::NotDirectory);
        }
        if dir::len(kv, config, &resolved.file)? != 0 {
            return Err(Error::NotEmpty);
        }
        if !perm::can_write(&resolved.parent.to_raw(), identity) {
            return Err(Error::NoAccess);
        }

        let mut parent = resolved.parent;
        let mut target = resolved.file;
        let still_open = open_table.is_open(target.id);
        fcb::unlink(kv, config, &mut parent, &mut target, &name, now(), still_open)
    }

    /// Moves `source` to `dest`, replacing any existing entry at `dest`
    /// first. When both paths share a parent directory, mutates a single
    /// in-memory copy of it so the second mutation doesn't clobber the
    /// first with a stale re-read.
    pub fn rename(&self, source: &Path, dest: &Path, identity: &Identity) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, root_id, open_table } = &mut *inner;
        let kv = kv.as_ref();
        let now = now();

        let src_name = require_name(source)?;
        let dest_name = require_name(dest)?;

        let src_resolved = resolver::resolve(kv, config, *root_id, source, identity)?;
        let dest_parent_resolved = resolver::resolve(kv, config, *root_id, &dest.parent(), identity)?;

        if !dest_parent_resolved.file.is_directory() {
            return Err(Error::NotDirectory);
        }
        if !perm::can_write(&src_resolved.parent.to_raw(), identity)
            || !perm::can_write(&dest_parent_resolved.file.to_raw(), identity)
        {
            return Err(Error::NoAccess);
        }

        let same_directory = src_resolved.parent.id == dest_parent_resolved.file.id;
        let mut src_parent = src_resolved.parent;
        let mut dest_parent = if same_directory { src_parent.clone() } else { dest_parent_resolved.file };

        if let Some(existing_id) = dir::find(kv, config, &dest_parent, &dest_name)? {
            let mut existing = fcb::read(kv, existing_id)?;
            let still_open = open_table.is_open(existing.id);
            fcb::unlink(kv, config, &mut dest_parent, &mut existing, &dest_name, now, still_open)?;
        }

        let file = src_resolved.file;
        dir::remove_entry(kv, config, &mut src_parent, &src_name, now)?;
        dir::add_entry(kv, config, &mut dest_parent, file.id, &dest_name, now)?;

        if same_directory {
            fcb::update(kv, &dest_parent)?;
        } else {
            fcb::update(kv, &src_parent)?;
            fcb::update(kv, &dest_parent)?;
        }

        Ok(())
    }

    /// Closes a handle opened by [`Mount::open`] or [`Mount::opendir`],
    /// triggering deferred deletion if it was the last handle on an
    /// unlinked file.
    pub fn release(&self, handle: Handle) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let MountInner { kv, config, open_table, .. } = &mut *inner;
        let kv = kv.as_ref();

        let fcb_id = open_table.get(handle)?;
        open_table.remove(handle)?;

        let file = fcb::read(kv, fcb_id)?;
        if file.nlink == 0 && !open_table.is_open(fcb_id) {
            fcb::remove(kv, config, &file)?;
        }
        Ok(())
    }

    /// Closes a handle opened by [`Mount::opendir`]. Directories are never
    /// unlinked while a handle to them is open in practice (rmdir requires
    /// empty + writable parent), but the deferred-delete check is uniform.
    pub fn releasedir(&self, handle: Handle) -> Result<()> {
        self.release(handle)
    }
}
