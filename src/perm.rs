//! UNIX permission checks: which triad applies to a caller, and how open
//! flags map onto required rights.

use crate::layout::RawFcb;

/// Caller identity supplied by the host gateway for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

/// The flag bits a host's `open`/`create` call passes in, abstracted away
/// from any particular OS's numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self { read: true, write: false }
    }

    pub fn write_only() -> Self {
        Self { read: false, write: true }
    }

    pub fn read_write() -> Self {
        Self { read: true, write: true }
    }

    /// Rights this flag set requires of the target file.
    pub fn required_access(&self) -> Vec<Access> {
        let mut access = Vec::with_capacity(2);
        // Mirrors the O_RDONLY/O_WRONLY/O_RDWR mapping: no bit set behaves
        // like O_RDONLY on a typical host.
        if self.write {
            access.push(Access::Write);
        }
        if self.read || !self.write {
            access.push(Access::Read);
        }
        access
    }
}

fn triad_bits(fcb: &RawFcb, identity: &Identity) -> u32 {
    let perms = fcb.mode & 0o777;
    if identity.uid == fcb.uid {
        (perms >> 6) & 0o7
    } else if identity.gid == fcb.gid {
        (perms >> 3) & 0o7
    } else {
        perms & 0o7
    }
}

/// Checks a single access kind against the FCB's owner/group/other triad,
/// selected by the first matching rule: owner, then group, then other.
pub fn check(fcb: &RawFcb, identity: &Identity, access: Access) -> bool {
    let bits = triad_bits(fcb, identity);
    let required = match access {
        Access::Read => 0o4,
        Access::Write => 0o2,
        Access::Execute => 0o1,
    };
    bits & required != 0
}

pub fn can_read(fcb: &RawFcb, identity: &Identity) -> bool {
    check(fcb, identity, Access::Read)
}

pub fn can_write(fcb: &RawFcb, identity: &Identity) -> bool {
    check(fcb, identity, Access::Write)
}

pub fn can_execute(fcb: &RawFcb, identity: &Identity) -> bool {
    check(fcb, identity, Access::Execute)
}

/// Only the owner may change `mode`; chown is left to host policy.
pub fn is_owner(fcb: &RawFcb, identity: &Identity) -> bool {
    identity.uid == fcb.uid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{RawFcb, TYPE_REGULAR};

    fn fcb_with_mode(mode: u32, uid: u32, gid: u32) -> RawFcb {
        RawFcb {
            id: [0; 16],
            data: [0; 16],
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            mode: TYPE_REGULAR | mode,
            uid,
            gid,
            nlink: 1,
        }
    }

    #[test]
    fn owner_uses_owner_triad() {
        let fcb = fcb_with_mode(0o600, 1, 1);
        let owner = Identity { uid: 1, gid: 1 };
        assert!(can_read(&fcb, &owner));
        assert!(can_write(&fcb, &owner));
    }

    #[test]
    fn group_member_uses_group_triad() {
        let fcb = fcb_with_mode(0o640, 1, 2);
        let group_member = Identity { uid: 5, gid: 2 };
        assert!(can_read(&fcb, &group_member));
        assert!(!can_write(&fcb, &group_member));
    }

    #[test]
    fn stranger_uses_other_triad() {
        let fcb = fcb_with_mode(0o604, 1, 2);
        let stranger = Identity { uid: 9, gid: 9 };
        assert!(can_read(&fcb, &stranger));
        assert!(!can_write(&fcb, &stranger));
    }

    #[test]
    fn owner_match_takes_priority_over_group_match() {
        // uid matches owner AND gid matches group: owner triad wins.
        let fcb = fcb_with_mode(0o604, 1, 1);
        let identity = Identity { uid: 1, gid: 1 };
        assert!(can_read(&fcb, &identity));
    }

    #[test]
    fn open_flags_map_to_required_access() {
        assert_eq!(OpenFlags::read_only().required_access(), vec![Access::Read]);
        assert_eq!(OpenFlags::write_only().required_access(), vec![Access::Write]);
        assert_eq!(OpenFlags::read_write().required_access(), vec![Access::Write, Access::Read]);
    }

    #[test]
    fn only_owner_may_chmod() {
        let fcb = fcb_with_mode(0o666, 1, 1);
        assert!(is_owner(&fcb, &Identity { uid: 1, gid: 1 }));
        assert!(!is_owner(&fcb, &Identity { uid: 2, gid: 1 }));
    }
}
