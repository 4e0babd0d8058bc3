//! POSIX-style filesystem core whose persistent state lives entirely behind
//! an external key-value store. Hands a host filesystem bridge a `Mount`
//! with `getattr`/`readdir`/`open`/`create`/`read`/`write`/... methods; the
//! bridge supplies caller identity and translates host callbacks into these
//! calls.
//!
//! The core does not open sockets, spawn threads, or talk to any particular
//! host filesystem API (FUSE, NFS, ...) — it only needs a [`kv::KvStore`]
//! implementation and a caller-identity struct per call.

pub mod block;
pub mod config;
pub mod dir;
pub mod error;
pub mod fcb;
pub mod gateway;
pub mod ident;
pub mod kv;
pub mod layout;
pub mod mount;
pub mod open_table;
pub mod path;
pub mod perm;
pub mod resolver;

pub use config::MountConfig;
pub use error::{Error, Result};
pub use fcb::Fcb;
pub use gateway::DirEntry;
pub use kv::{KvStore, MemKv};
pub use mount::Mount;
pub use open_table::Handle;
pub use path::Path;
pub use perm::{Identity, OpenFlags};
