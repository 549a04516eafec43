// Greedy block matcher.
//
// The target is scanned left to right with a rolling hash as wide as the
// index's blocks. At each position the candidates sharing the hash are
// verified and extended forward, and backward into the pending literal run
// (never into bytes an earlier match already covers). The longest match
// wins, ties going to the lowest source start. Matches shorter than
// `min_match` are dropped and the scan moves on by one byte.
//
// A fixed-size block grid cannot see the source's short final block while
// rolling a full-width hash, so the end of the target gets one extra lookup
// against that block.

use super::config::MatcherConfig;
use super::index::FingerprintIndex;
use super::rolling::{self, RollingHash};

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

/// `target[target_pos..target_pos + len] == source[source_pos..source_pos + len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub target_pos: usize,
    pub len: usize,
    pub source_pos: u64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    target_pos: usize,
    source_pos: usize,
    len: usize,
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Finds copies of source bytes in target windows.
///
/// Owns the source index, which is built once and reused for every window.
pub struct Matcher<'s> {
    source: &'s [u8],
    index: FingerprintIndex,
    hash: RollingHash,
    config: MatcherConfig,
    min_match: usize,
}

impl<'s> Matcher<'s> {
    /// Index `source` for matching.
    ///
    /// `block_size` and `min_match` must be non-zero.
    pub fn new(
        source: &'s [u8],
        block_size: usize,
        min_match: usize,
        config: MatcherConfig,
    ) -> Self {
        debug_assert!(min_match > 0);
        Self {
            source,
            index: FingerprintIndex::build(source, block_size),
            hash: RollingHash::new(block_size),
            config,
            min_match,
        }
    }

    /// Matches in `target`, ascending and non-overlapping.
    ///
    /// Every byte not covered by a match is a literal.
    pub fn find_matches(&self, target: &[u8]) -> Vec<Match> {
        let mut matches = Vec::new();
        if self.index.is_empty() || target.is_empty() {
            return matches;
        }

        let width = self.hash.width();
        let n = target.len();
        let mut lit_start = 0usize;

        if n >= width {
            let mut pos = 0usize;
            let mut hash = self.hash.checksum(target);
            while pos + width <= n {
                if let Some(best) = self.best_candidate(target, pos, lit_start, hash)
                    && best.len >= self.min_match
                {
                    matches.push(Match {
                        target_pos: best.target_pos,
                        len: best.len,
                        source_pos: best.source_pos as u64,
                    });
                    pos = best.target_pos + best.len;
                    lit_start = pos;
                    if pos + width <= n {
                        hash = self.hash.checksum(&target[pos..]);
                    }
                    continue;
                }
                if pos + width < n {
                    hash = self.hash.update(hash, &target[pos..]);
                }
                pos += 1;
            }
        }

        if let Some(tail) = self.lookup_tail(target, lit_start) {
            matches.push(tail);
        }
        matches
    }

    /// Longest verified match through `target[pos..]` among the blocks with
    /// `hash`, scanning at most `max_chain` of them.
    fn best_candidate(
        &self,
        target: &[u8],
        pos: usize,
        lit_start: usize,
        hash: u32,
    ) -> Option<Candidate> {
        let n = target.len();
        let ceiling = (pos - lit_start) + (n - pos);
        let mut best: Option<Candidate> = None;

        for fp in self.index.lookup(hash).take(self.config.max_chain) {
            let cand = fp.offset as usize;
            let fwd = rolling::forward_match(&self.source[cand..], &target[pos..], n - pos);
            let back_max = (pos - lit_start).min(cand);
            let back = rolling::backward_match(
                &self.source[cand - back_max..cand],
                &target[pos - back_max..pos],
                back_max,
            );
            let found = Candidate {
                target_pos: pos - back,
                source_pos: cand - back,
                len: back + fwd,
            };
            let better = match best {
                None => found.len > 0,
                Some(b) => {
                    found.len > b.len || (found.len == b.len && found.source_pos < b.source_pos)
                }
            };
            if better {
                best = Some(found);
                if found.len == ceiling {
                    break;
                }
            }
        }
        best
    }

    /// Try the source's short final block against the end of the target.
    fn lookup_tail(&self, target: &[u8], lit_start: usize) -> Option<Match> {
        let tail = self.index.short_tail()?;
        let len = tail.len as usize;
        let n = target.len();
        if len < self.min_match || n - lit_start < len {
            return None;
        }

        let t = n - len;
        let s = tail.offset as usize;
        if RollingHash::new(len).checksum(&target[t..]) != tail.hash
            || target[t..] != self.source[s..s + len]
        {
            return None;
        }

        let back_max = (t - lit_start).min(s);
        let back = rolling::backward_match(
            &self.source[s - back_max..s],
            &target[t - back_max..t],
            back_max,
        );
        Some(Match {
            target_pos: t - back,
            len: len + back,
            source_pos: (s - back) as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
