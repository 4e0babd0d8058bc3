use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

/// Errors a KV backend can report. Anything here is fatal to the core
/// operation in progress and surfaces to callers as `Error::Internal`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("no object stored under this key")]
    NotFound,
    #[error("stored value is smaller than the requested read size")]
    ShortRead,
    #[error("backend I/O error: {0}")]
    Backend(String),
}

/// The narrow interface the core consumes from an external key-value store.
/// Keys are 16-byte identifiers; values are opaque byte buffers. No
/// transactions, no ordering guarantees beyond per-key read-your-writes.
pub trait KvStore: Send {
    /// Fills `buffer` from the value stored at `key`. Requires the stored
    /// value to have at least `buffer.len()` bytes; excess trailing bytes in
    /// the stored value (if any) are ignored.
    fn read(&self, key: &Uuid, buffer: &mut [u8]) -> Result<(), KvError>;

    /// Stores `bytes` at `key`, replacing any previous value.
    fn write(&self, key: &Uuid, bytes: &[u8]) -> Result<(), KvError>;

    /// Removes the value at `key`. Not an error if the key was already absent.
    fn delete(&self, key: &Uuid) -> Result<(), KvError>;

    /// Reports whether a value is currently stored at `key`.
    fn exists(&self, key: &Uuid) -> Result<bool, KvError>;
}

/// Volatile, process-local `KvStore`. Useful for tests and for hosts that
/// want a throwaway mount; nothing here survives the process.
#[derive(Default)]
pub struct MemKv {
    objects: Mutex<HashMap<Uuid, Vec<u8>>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live objects; exposed for tests asserting on leak-free
    /// delete paths (e.g. deferred deletion on the last `release`).
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

impl KvStore for MemKv {
    fn read(&self, key: &Uuid, buffer: &mut [u8]) -> Result<(), KvError> {
        let objects = self.objects.lock().unwrap();
        let value = objects.get(key).ok_or(KvError::NotFound)?;
        if value.len() < buffer.len() {
            return Err(KvError::ShortRead);
        }
        buffer.copy_from_slice(&value[..buffer.len()]);
        Ok(())
    }

    fn write(&self, key: &Uuid, bytes: &[u8]) -> Result<(), KvError> {
        self.objects.lock().unwrap().insert(*key, bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &Uuid) -> Result<(), KvError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn exists(&self, key: &Uuid) -> Result<bool, KvError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let kv = MemKv::new();
        let key = Uuid::new_v4();
        kv.write(&key, b"hello").unwrap();
        let mut buf = [0u8; 5];
        kv.read(&key, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn missing_key_is_not_found() {
        let kv = MemKv::new();
        let mut buf = [0u8; 4];
        assert_eq!(kv.read(&Uuid::new_v4(), &mut buf), Err(KvError::NotFound));
    }

    #[test]
    fn short_stored_value_is_rejected() {
        let kv = MemKv::new();
        let key = Uuid::new_v4();
        kv.write(&key, b"ab").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(kv.read(&key, &mut buf), Err(KvError::ShortRead));
    }

    #[test]
    fn delete_then_exists_is_false() {
        let kv = MemKv::new();
        let key = Uuid::new_v4();
        kv.write(&key, b"x").unwrap();
        assert!(kv.exists(&key).unwrap());
        kv.delete(&key).unwrap();
        assert!(!kv.exists(&key).unwrap());
    }
}
