//! Walks the tree from root, enforcing directory-type and execute
//! permission at each step, and returns the leaf FCB alongside its
//! containing directory.

use uuid::Uuid;

use crate::config::MountConfig;
use crate::dir;
use crate::error::{Error, Result};
use crate::fcb::{self, Fcb};
use crate::kv::KvStore;
use crate::path::Path;
use crate::perm::{self, Identity};

/// The outcome of a successful resolve: the leaf and its containing
/// directory. For `/` both fields are the root FCB.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub parent: Fcb,
    pub file: Fcb,
}

/// Resolves `path` against `root_id`, enforcing execute permission on every
/// directory traversed. A missing intermediate component and a missing leaf
/// both surface as `Error::NoEntry` — the resolver doesn't need a separate
/// variant, since §7's public error taxonomy collapses them already.
pub fn resolve(kv: &dyn KvStore, config: &MountConfig, root_id: Uuid, path: &Path, identity: &Identity) -> Result<Resolved> {
    let root = fcb::read(kv, root_id)?;
    let tokens: Vec<String> = path.components().collect();

    if tokens.is_empty() {
        log::trace!("resolve: {} -> root", path);
        return Ok(Resolved { parent: root.clone(), file: root });
    }

    let mut current = root;
    let mut parent = current.clone();

    for token in tokens.iter() {
        if !current.is_directory() {
            log::trace!("resolve: {} not a directory while matching {:?}", current.id, token);
            return Err(Error::NoEntry);
        }
        if !perm::can_execute(&current.to_raw(), identity) {
            log::warn!("resolve: {} denied search on {:?}", identity.uid, current.id);
            return Err(Error::NoAccess);
        }

        parent = current.clone();

        match dir::find(kv, config, &current, token)? {
            Some(child_id) => {
                current = fcb::read(kv, child_id)?;
            }
            None => {
                log::trace!("resolve: {:?} missing under {}", token, parent.id);
                return Err(Error::NoEntry);
            }
        }
    }

    log::debug!("resolve: {} -> {}", path, current.id);
    Ok(Resolved { parent, file: current })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemKv;

    fn identity(uid: u32, gid: u32) -> Identity {
        Identity { uid, gid }
    }

    #[test]
    fn root_alone_resolves_to_itself() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let root = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();

        let resolved = resolve(&kv, &config, root.id, &Path::new("/").unwrap(), &identity(0, 0)).unwrap();
        assert_eq!(resolved.parent.id, root.id);
        assert_eq!(resolved.file.id, root.id);
    }

    #[test]
    fn nested_path_resolves_parent_and_leaf() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let mut root = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        let mut d = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        fcb::link(&kv, &config, &mut root, &mut d, "d", 2).unwrap();
        let mut f = fcb::create_file(&kv, &config, 0o644, 0, 0, 2).unwrap();
        fcb::link(&kv, &config, &mut d, &mut f, "f", 3).unwrap();

        let resolved = resolve(&kv, &config, root.id, &Path::new("/d/f").unwrap(), &identity(0, 0)).unwrap();
        assert_eq!(resolved.parent.id, d.id);
        assert_eq!(resolved.file.id, f.id);
    }

    #[test]
    fn missing_leaf_is_no_entry() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let root = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();

        let result = resolve(&kv, &config, root.id, &Path::new("/nope").unwrap(), &identity(0, 0));
        assert!(matches!(result, Err(Error::NoEntry)));
    }

    #[test]
    fn missing_intermediate_directory_is_no_entry() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let root = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();

        let result = resolve(&kv, &config, root.id, &Path::new("/nope/leaf").unwrap(), &identity(0, 0));
        assert!(matches!(result, Err(Error::NoEntry)));
    }

    #[test]
    fn traversal_without_execute_is_no_access() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let mut root = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        let mut p = fcb::create_directory(&kv, &config, 0o600, 1, 1, 1).unwrap();
        fcb::link(&kv, &config, &mut root, &mut p, "p", 2).unwrap();

        let result = resolve(&kv, &config, root.id, &Path::new("/p/any").unwrap(), &identity(2, 2));
        assert!(matches!(result, Err(Error::NoAccess)));
    }

    #[test]
    fn equivalent_paths_resolve_to_the_same_fcb() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let mut root = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        let mut a = fcb::create_directory(&kv, &config, 0o755, 0, 0, 1).unwrap();
        fcb::link(&kv, &config, &mut root, &mut a, "a", 2).unwrap();
        let mut b = fcb::create_file(&kv, &config, 0o644, 0, 0, 2).unwrap();
        fcb::link(&kv, &config, &mut a, &mut b, "b", 3).unwrap();

        let direct = resolve(&kv, &config, root.id, &Path::new("/a/b").unwrap(), &identity(0, 0)).unwrap();
        let doubled = resolve(&kv, &config, root.id, &Path::new("/a//b").unwrap(), &identity(0, 0)).unwrap();
        assert_eq!(direct.file.id, doubled.file.id);
    }
}
