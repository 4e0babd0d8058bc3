//! Owns the KV handle, the root identifier, the open-file table, and the
//! mount-wide exclusive lock every gateway call is threaded through.

use std::sync::Mutex;

use uuid::Uuid;

use crate::config::MountConfig;
use crate::error::{Error, Result};
use crate::fcb;
use crate::ident::ROOT_OBJECT_KEY;
use crate::kv::KvStore;
use crate::open_table::OpenTable;

pub(crate) struct MountInner {
    pub(crate) kv: Box<dyn KvStore>,
    pub(crate) config: MountConfig,
    pub(crate) root_id: Uuid,
    pub(crate) open_table: OpenTable,
}

/// The single entry point a host gateway holds onto. Every operation locks
/// the whole mount for its duration — see §5's single-threaded-cooperative
/// scheduling model.
pub struct Mount {
    pub(crate) inner: Mutex<MountInner>,
}

impl Mount {
    /// Opens (or formats) a mount backed by `kv`. If the well-known root
    /// object is absent, creates the root directory, forces its `nlink` to
    /// 1 so normal unlink traffic can never collect it, and persists the
    /// root object. Otherwise loads the existing root id.
    pub fn new(kv: Box<dyn KvStore>, config: MountConfig) -> Result<Self> {
        config.validate().map_err(|e| Error::Internal(e.to_string()))?;

        let root_id = if kv.exists(&ROOT_OBJECT_KEY).map_err(|e| Error::Internal(e.to_string()))? {
            let mut buf = [0u8; 16];
            kv.read(&ROOT_OBJECT_KEY, &mut buf).map_err(|e| Error::Internal(e.to_string()))?;
            let id = Uuid::from_bytes(buf);
            log::debug!("mount: loaded existing root {}", id);
            id
        } else {
            let mut root = fcb::create_directory(kv.as_ref(), &config, 0o755, 0, 0, now())?;
            root.nlink = 1;
            fcb::update(kv.as_ref(), &root)?;
            kv.write(&ROOT_OBJECT_KEY, root.id.as_bytes()).map_err(|e| Error::Internal(e.to_string()))?;
            log::debug!("mount: formatted fresh root {}", root.id);
            root.id
        };

        Ok(Self {
            inner: Mutex::new(MountInner {
                kv,
                config,
                root_id,
                open_table: OpenTable::new(config.max_open_files),
            }),
        })
    }
}

/// Seconds since the UNIX epoch, clamped to 0 on a clock before it (never
/// happens outside of test harnesses with a mocked clock).
pub(crate) fn now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemKv;

    #[test]
    fn fresh_mount_formats_a_root_with_nlink_one() {
        let mount = Mount::new(Box::new(MemKv::new()), MountConfig::default()).unwrap();
        let inner = mount.inner.lock().unwrap();
        let root = fcb::read(inner.kv.as_ref(), inner.root_id).unwrap();
        assert_eq!(root.nlink, 1);
        assert!(root.is_directory());
    }

    #[test]
    fn fresh_mount_persists_the_root_object_pointer() {
        let mount = Mount::new(Box::new(MemKv::new()), MountConfig::default()).unwrap();
        let inner = mount.inner.lock().unwrap();

        let mut buf = [0u8; 16];
        inner.kv.read(&ROOT_OBJECT_KEY, &mut buf).unwrap();
        assert_eq!(Uuid::from_bytes(buf), inner.root_id);
    }
}
