// Rolling block hash and byte-run comparison.
//
// The block hash is an Adler-style pair of 16-bit sums over permuted input
// bytes. Permuting through a fixed table spreads low-entropy input (text,
// zero runs) across the hash space before summing. The hash of a window
// can be slid one byte to the right in constant time.
//
// Match extension compares eight bytes at a time via u64 XOR.

// ---------------------------------------------------------------------------
// Permutation table
// ---------------------------------------------------------------------------

/// Byte -> 16-bit value table, filled from a fixed splitmix64 sequence.
const PERMUTE: [u16; 256] = build_permute_table();

const fn build_permute_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut state: u64 = 0x6F78_6970_6174_6368;
    let mut i = 0;
    while i < 256 {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        table[i] = (z >> 48) as u16;
        i += 1;
    }
    table
}

// ---------------------------------------------------------------------------
// Rolling hash
// ---------------------------------------------------------------------------

/// Rolling hash over a fixed window width.
#[derive(Debug, Clone, Copy)]
pub struct RollingHash {
    width: usize,
    width_u32: u32,
}

impl RollingHash {
    pub fn new(width: usize) -> Self {
        debug_assert!(width > 0);
        Self {
            width,
            width_u32: width as u32,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Hash of `base[..width]`.
    #[inline]
    pub fn checksum(&self, base: &[u8]) -> u32 {
        debug_assert!(base.len() >= self.width);
        let mut low: u32 = 0;
        let mut high: u32 = 0;
        for &b in &base[..self.width] {
            low = low.wrapping_add(PERMUTE[b as usize] as u32);
            high = high.wrapping_add(low);
        }
        ((high & 0xFFFF) << 16) | (low & 0xFFFF)
    }

    /// Slide the window one byte: drop `base[0]`, take in `base[width]`.
    #[inline(always)]
    pub fn update(&self, old: u32, base: &[u8]) -> u32 {
        debug_assert!(base.len() > self.width);
        let old_c = PERMUTE[base[0] as usize] as u32;
        let new_c = PERMUTE[base[self.width] as usize] as u32;

        let low = old.wrapping_sub(old_c).wrapping_add(new_c) & 0xFFFF;
        let high = (old >> 16)
            .wrapping_sub(old_c.wrapping_mul(self.width_u32))
            .wrapping_add(low)
            & 0xFFFF;

        (high << 16) | low
    }
}

// ---------------------------------------------------------------------------
// Bucket index computation
// ---------------------------------------------------------------------------

/// Hash table geometry.
#[derive(Clone, Debug)]
pub struct HashCfg {
    /// Number of buckets (power of 2).
    pub size: usize,
    /// `32 - log2(size)`.
    pub shift: u32,
    /// `size - 1`.
    pub mask: u32,
}

impl HashCfg {
    /// Geometry for roughly `slots` entries: the largest power of two not
    /// above `slots` (minimum 4 buckets), so chains average one to two
    /// entries.
    pub fn new(slots: usize) -> Self {
        let bits = size_hashtable_bits(slots);
        let size = 1usize << bits;
        Self {
            size,
            shift: 32 - bits,
            mask: (size as u32) - 1,
        }
    }

    /// Fold a hash into `0..size`.
    #[inline(always)]
    pub fn bucket(&self, hash: u32) -> usize {
        ((hash >> self.shift) ^ (hash & self.mask)) as usize
    }
}

fn size_hashtable_bits(slots: usize) -> u32 {
    const MAX_BITS: u32 = 28;
    for i in 3..=MAX_BITS {
        if slots < (1 << i) {
            return i - 1;
        }
    }
    MAX_BITS
}

// ---------------------------------------------------------------------------
// Match extension
// ---------------------------------------------------------------------------

#[inline(always)]
fn word(chunk: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(chunk);
    u64::from_le_bytes(buf)
}

/// Number of equal leading bytes of `s1` and `s2`, looking at most `n`.
#[inline]
pub fn forward_match(s1: &[u8], s2: &[u8], n: usize) -> usize {
    let n = n.min(s1.len()).min(s2.len());
    let (s1, s2) = (&s1[..n], &s2[..n]);
    let mut i = 0;
    for (a, b) in s1.chunks_exact(8).zip(s2.chunks_exact(8)) {
        let xor = word(a) ^ word(b);
        if xor != 0 {
            return i + (xor.trailing_zeros() / 8) as usize;
        }
        i += 8;
    }
    while i < n && s1[i] == s2[i] {
        i += 1;
    }
    i
}

/// Number of equal trailing bytes of `s1[..n]` and `s2[..n]`.
#[inline]
pub fn backward_match(s1: &[u8], s2: &[u8], n: usize) -> usize {
    let n = n.min(s1.len()).min(s2.len());
    let (s1, s2) = (&s1[..n], &s2[..n]);
    let mut matched = 0;
    for (a, b) in s1.rchunks_exact(8).zip(s2.rchunks_exact(8)) {
        let xor = word(a) ^ word(b);
        if xor != 0 {
            return matched + (xor.leading_zeros() / 8) as usize;
        }
        matched += 8;
    }
    while matched < n && s1[n - matched - 1] == s2[n - matched - 1] {
        matched += 1;
    }
    matched
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
