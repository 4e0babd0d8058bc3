//! Maps (offset, length) read/write windows onto the block array addressed
//! through an FCB's index block, including grow/shrink with zero-fill.

use uuid::Uuid;

use crate::config::MountConfig;
use crate::error::{Error, Result};
use crate::fcb::Fcb;
use crate::ident::new_id;
use crate::kv::KvStore;
use crate::layout::IndexBlockCodec;

fn index_codec(config: &MountConfig) -> IndexBlockCodec {
    IndexBlockCodec::new(config.max_blocks)
}

fn blocks_for_size(config: &MountConfig, size: u64) -> usize {
    (size as usize).div_ceil(config.block_size)
}

fn read_index(kv: &dyn KvStore, config: &MountConfig, fcb: &Fcb) -> Result<Vec<u8>> {
    let codec = index_codec(config);
    let mut buf = vec![0u8; codec.byte_len()];
    kv.read(&fcb.data, &mut buf).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(buf)
}

fn write_index(kv: &dyn KvStore, fcb: &Fcb, index: &[u8]) -> Result<()> {
    kv.write(&fcb.data, index).map_err(|e| Error::Internal(e.to_string()))
}

fn block_key(kv: &dyn KvStore, codec: &IndexBlockCodec, index: &[u8], block_idx: usize) -> Uuid {
    let _ = kv;
    codec.read_entry(index, block_idx)
}

fn read_block(kv: &dyn KvStore, config: &MountConfig, key: Uuid) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; config.block_size];
    kv.read(&key, &mut buf).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(buf)
}

fn write_block(kv: &dyn KvStore, key: Uuid, bytes: &[u8]) -> Result<()> {
    kv.write(&key, bytes).map_err(|e| Error::Internal(e.to_string()))
}

/// Copies `[offset, offset + buf.len())` of `fcb`'s content into `buf`.
/// Precondition: `offset + buf.len() <= fcb.size` (enforced by the caller,
/// typically the gateway, which clamps `buf`'s length to the readable range).
pub fn read_data(kv: &dyn KvStore, config: &MountConfig, fcb: &Fcb, buf: &mut [u8], offset: u64) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    debug_assert!(offset + buf.len() as u64 <= fcb.size);

    let codec = index_codec(config);
    let index = read_index(kv, config, fcb)?;

    let block_size = config.block_size as u64;
    let first_block = (offset / block_size) as usize;
    let last_block = ((offset + buf.len() as u64 - 1) / block_size) as usize;

    let mut written = 0usize;
    for block_idx in first_block..=last_block {
        let key = block_key(kv, &codec, &index, block_idx);
        let block = read_block(kv, config, key)?;

        let block_start = block_idx as u64 * block_size;
        let in_block_start = if block_idx == first_block { (offset - block_start) as usize } else { 0 };
        let in_block_end = if block_idx == last_block {
            (offset + buf.len() as u64 - block_start) as usize
        } else {
            config.block_size
        };

        let chunk_len = in_block_end - in_block_start;
        buf[written..written + chunk_len].copy_from_slice(&block[in_block_start..in_block_end]);
        written += chunk_len;
    }

    Ok(())
}

/// Overwrites `[offset, offset + buf.len())`, growing the file first (with
/// zero-fill) if the write extends past the current size. Bytes before
/// `offset` are preserved via read-modify-write on partial blocks.
pub fn write_data(
    kv: &dyn KvStore,
    config: &MountConfig,
    fcb: &mut Fcb,
    buf: &[u8],
    offset: u64,
    now: i64,
) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }

    let required_size = offset + buf.len() as u64;
    if required_size > fcb.size {
        truncate_to(kv, config, fcb, required_size, now)?;
    }

    let codec = index_codec(config);
    let index = read_index(kv, config, fcb)?;

    let block_size = config.block_size as u64;
    let first_block = (offset / block_size) as usize;
    let last_block = ((offset + buf.len() as u64 - 1) / block_size) as usize;

    let mut consumed = 0usize;
    for block_idx in first_block..=last_block {
        let key = block_key(kv, &codec, &index, block_idx);

        let block_start = block_idx as u64 * block_size;
        let in_block_start = if block_idx == first_block { (offset - block_start) as usize } else { 0 };
        let in_block_end = if block_idx == last_block {
            (offset + buf.len() as u64 - block_start) as usize
        } else {
            config.block_size
        };
        let chunk_len = in_block_end - in_block_start;

        // Sub-range write: read-modify-write so untouched bytes survive.
        let mut block = if in_block_start == 0 && in_block_end == config.block_size {
            vec![0u8; config.block_size]
        } else {
            read_block(kv, config, key)?
        };

        block[in_block_start..in_block_end].copy_from_slice(&buf[consumed..consumed + chunk_len]);
        write_block(kv, key, &block)?;

        consumed += chunk_len;
    }

    fcb.mtime = now;
    Ok(())
}

/// Grows or shrinks the file to exactly `new_size`, zero-filling new blocks
/// on growth and deleting tail blocks on shrink. Rewrites the index block
/// and the FCB's `size`/`mtime`.
pub fn truncate_to(kv: &dyn KvStore, config: &MountConfig, fcb: &mut Fcb, new_size: u64, now: i64) -> Result<()> {
    let max_size = config.max_size();
    if new_size > max_size {
        return Err(Error::TooLarge);
    }

    let codec = index_codec(config);
    let mut index = read_index(kv, config, fcb)?;

    let old_blocks = blocks_for_size(config, fcb.size);
    let new_blocks = blocks_for_size(config, new_size);

    if new_blocks > old_blocks {
        let zero_block = vec![0u8; config.block_size];
        for block_idx in old_blocks..new_blocks {
            let key = new_id();
            write_block(kv, key, &zero_block)?;
            codec.write_entry(&mut index, block_idx, key);
        }
    } else if new_blocks < old_blocks {
        for block_idx in new_blocks..old_blocks {
            let key = codec.read_entry(&index, block_idx);
            kv.delete(&key).map_err(|e| Error::Internal(e.to_string()))?;
            codec.write_entry(&mut index, block_idx, Uuid::nil());
        }
    }

    write_index(kv, fcb, &index)?;

    fcb.size = new_size;
    fcb.mtime = now;
    Ok(())
}

/// Deletes every data block the index references, for `FCB` removal.
pub fn free_all_blocks(kv: &dyn KvStore, config: &MountConfig, fcb: &Fcb) -> Result<()> {
    let codec = index_codec(config);
    let index = read_index(kv, config, fcb)?;
    let used_blocks = blocks_for_size(config, fcb.size);
    for block_idx in 0..used_blocks {
        let key = codec.read_entry(&index, block_idx);
        kv.delete(&key).map_err(|e| Error::Internal(e.to_string()))?;
    }
    Ok(())
}

/// Allocates and persists a fresh, all-zero index block, for a brand-new FCB.
pub fn new_index_block(kv: &dyn KvStore, config: &MountConfig) -> Result<Uuid> {
    let id = new_id();
    let codec = index_codec(config);
    let empty = vec![0u8; codec.byte_len()];
    kv.write(&id, &empty).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemKv;
    use crate::layout::TYPE_REGULAR;

    fn fresh_fcb(kv: &dyn KvStore, config: &MountConfig) -> Fcb {
        let data = new_index_block(kv, config).unwrap();
        Fcb {
            id: new_id(),
            data,
            mode: TYPE_REGULAR | 0o644,
            uid: 1000,
            gid: 1000,
            nlink: 1,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let kv = MemKv::new();
        let config = MountConfig::default();
        let mut fcb = fresh_fcb(&kv, &config);

        write_data(&kv, &config, &mut fcb, b"abc", 0, 1).unwrap();
        assert_eq!(fcb.size, 3);

        let mut buf = [0u8; 3];
        read_data(&kv, &config, &fcb, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn grow_across_block_boundary_zero_fills() {
        let kv = MemKv::new();
        let mut config = MountConfig::default();
        config.block_size = 16_384;
        let mut fcb = fresh_fcb(&kv, &config);

        let payload = vec![b'X'; 20_000];
        write_data(&kv, &config, &mut fcb, &payload, 10_000, 1).unwrap();
        assert_eq!(fcb.size, 30_000);

        let mut one = [0u8; 1];
        read_data(&kv, &config, &fcb, &mut one, 10_000).unwrap();
        assert_eq!(one, [b'X']);

        read_data(&kv, &config, &fcb, &mut one, 0).unwrap();
        assert_eq!(one, [0]);
    }

    #[test]
    fn shrink_deletes_tail_blocks() {
        let kv = MemKv::new();
        let mut config = MountConfig::default();
        config.block_size = 16;
        let mut fcb = fresh_fcb(&kv, &config);

        write_data(&kv, &config, &mut fcb, &vec![1u8; 40], 0, 1).unwrap();
        let before = kv.object_count();

        truncate_to(&kv, &config, &mut fcb, 5, 2).unwrap();
        assert_eq!(fcb.size, 5);
        assert!(kv.object_count() < before);
    }

    #[test]
    fn partial_block_write_preserves_surrounding_bytes() {
        let kv = MemKv::new();
        let mut config = MountConfig::default();
        config.block_size = 16;
        let mut fcb = fresh_fcb(&kv, &config);

        write_data(&kv, &config, &mut fcb, b"0123456789abcdef", 0, 1).unwrap();
        write_data(&kv, &config, &mut fcb, b"XY", 4, 2).unwrap();

        let mut buf = [0u8; 16];
        read_data(&kv, &config, &fcb, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"0123XY6789abcdef");
    }

    #[test]
    fn truncate_past_max_size_fails() {
        let kv = MemKv::new();
        let mut config = MountConfig::default();
        config.block_size = 1;
        config.max_blocks = 4;
        let mut fcb = fresh_fcb(&kv, &config);

        assert!(matches!(truncate_to(&kv, &config, &mut fcb, 5, 1), Err(Error::TooLarge)));
    }
}
