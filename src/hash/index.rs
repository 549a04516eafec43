// Fingerprint index over fixed-size source blocks.
//
// The source is cut into non-overlapping blocks of `block_size` bytes (the
// last block may be shorter) and each block's rolling hash is filed under a
// bucket. Buckets are singly linked chains through `next`; blocks are linked
// in reverse so that walking a chain visits offsets in ascending order.
// Lookups filter by the exact hash, but equal hashes do not imply equal
// bytes: callers verify candidates against the source.

use super::rolling::{HashCfg, RollingHash};

/// Chain terminator / empty bucket.
const NIL: u32 = 0;

/// One indexed source block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFingerprint {
    pub hash: u32,
    pub offset: u64,
    pub len: u32,
}

/// Immutable block index over one source buffer.
#[derive(Debug, Clone)]
pub struct FingerprintIndex {
    block_size: usize,
    source_len: u64,
    cfg: HashCfg,
    /// Bucket -> first block number + 1 (`NIL` when empty).
    heads: Vec<u32>,
    /// Block number -> next block number + 1 in the same bucket.
    next: Vec<u32>,
    hashes: Vec<u32>,
}

impl FingerprintIndex {
    /// Index `source` in blocks of `block_size` bytes. An empty source gives
    /// an empty index.
    ///
    /// # Panics
    /// If `block_size` is zero.
    pub fn build(source: &[u8], block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        let max_blocks = (u32::MAX - 1) as usize;
        let mut blocks = source.len().div_ceil(block_size);
        if blocks > max_blocks {
            log::warn!(
                "source of {} bytes has more than {max_blocks} blocks; indexing a prefix only",
                source.len()
            );
            blocks = max_blocks;
        }

        let cfg = HashCfg::new(blocks);
        let full = RollingHash::new(block_size);
        let mut hashes = Vec::with_capacity(blocks);
        for i in 0..blocks {
            let start = i * block_size;
            let end = (start + block_size).min(source.len());
            let block = &source[start..end];
            let hash = if block.len() == block_size {
                full.checksum(block)
            } else {
                RollingHash::new(block.len()).checksum(block)
            };
            hashes.push(hash);
        }

        let mut heads = vec![NIL; if blocks == 0 { 0 } else { cfg.size }];
        let mut next = vec![NIL; blocks];
        for i in (0..blocks).rev() {
            let bucket = cfg.bucket(hashes[i]);
            next[i] = heads[bucket];
            heads[bucket] = i as u32 + 1;
        }

        log::trace!(
            "indexed {} bytes: {blocks} blocks of {block_size}, {} buckets",
            source.len(),
            heads.len()
        );

        Self {
            block_size,
            source_len: source.len() as u64,
            cfg,
            heads,
            next,
            hashes,
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of indexed blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Fingerprint of block number `block`.
    pub fn fingerprint(&self, block: usize) -> BlockFingerprint {
        let offset = (block * self.block_size) as u64;
        let len = (self.source_len - offset).min(self.block_size as u64) as u32;
        BlockFingerprint {
            hash: self.hashes[block],
            offset,
            len,
        }
    }

    /// The final block when it is shorter than `block_size`.
    pub fn short_tail(&self) -> Option<BlockFingerprint> {
        let last = self.len().checked_sub(1)?;
        let fp = self.fingerprint(last);
        ((fp.len as usize) < self.block_size).then_some(fp)
    }

    /// Blocks whose hash equals `hash`, ascending by offset.
    pub fn lookup(&self, hash: u32) -> Lookup<'_> {
        let cursor = if self.heads.is_empty() {
            NIL
        } else {
            self.heads[self.cfg.bucket(hash)]
        };
        Lookup {
            index: self,
            hash,
            cursor,
        }
    }
}

/// Iterator over the blocks sharing one hash.
pub struct Lookup<'a> {
    index: &'a FingerprintIndex,
    hash: u32,
    cursor: u32,
}

impl Iterator for Lookup<'_> {
    type Item = BlockFingerprint;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor != NIL {
            let block = (self.cursor - 1) as usize;
            self.cursor = self.index.next[block];
            if self.index.hashes[block] == self.hash {
                return Some(self.index.fingerprint(block));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_empty_index() {
        let index = FingerprintIndex::build(b"", 16);
        assert!(index.is_empty());
        assert_eq!(index.lookup(0).count(), 0);
        assert!(index.short_tail().is_none());
    }

    #[test]
    fn blocks_cover_source() {
        let source: Vec<u8> = (0..100u8).collect();
        let index = FingerprintIndex::build(&source, 16);
        assert_eq!(index.len(), 7);
        let tail = index.short_tail().unwrap();
        assert_eq!((tail.offset, tail.len), (96, 4));
        assert_eq!(index.fingerprint(2).offset, 32);
        assert_eq!(index.fingerprint(2).len, 16);
    }

    #[test]
    fn lookup_finds_each_block() {
        let source: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
        let index = FingerprintIndex::build(&source, 16);
        let rh = RollingHash::new(16);
        for block in 0..index.len() - 1 {
            let offset = block * 16;
            let hash = rh.checksum(&source[offset..]);
            assert!(
                index.lookup(hash).any(|fp| fp.offset == offset as u64),
                "block {block} not found"
            );
        }
    }

    #[test]
    fn duplicates_come_back_in_offset_order() {
        let source = b"ABCDEFGHABCDEFGHABCDEFGHxyz".to_vec();
        let index = FingerprintIndex::build(&source, 8);
        let hash = RollingHash::new(8).checksum(b"ABCDEFGH");
        let offsets: Vec<u64> = index.lookup(hash).map(|fp| fp.offset).collect();
        assert_eq!(offsets, [0, 8, 16]);
    }

    #[test]
    fn exact_source_multiple_has_no_short_tail() {
        let index = FingerprintIndex::build(&[7u8; 64], 16);
        assert_eq!(index.len(), 4);
        assert!(index.short_tail().is_none());
    }
}
