// Match list -> instruction list.
//
// The matcher reports where copies start and end; everything between them
// is literal. This pass turns that into the instruction stream:
//   - gaps become Inserts
//   - copies continuing the previous copy's source run are coalesced
//   - a copy whose encoding is not smaller than its length becomes literal
//   - adjacent literals are merged into one Insert
//
// Copy costs are measured the way the serializer will encode them: the
// first copy relative to the window's source base, later ones relative to
// the end of the previous copy.

use crate::format::encoder::SourceRange;
use crate::format::instruction::Instruction;
use crate::hash::matching::Match;

/// Extra passes allowed when demoting copies moves the window base.
const MAX_BASE_PASSES: usize = 2;

/// Build the instruction stream for `target` from `matches`.
///
/// `matches` must be ascending and non-overlapping, each verifying against
/// the source. The returned instructions cover `target` exactly.
pub fn optimize<'t>(matches: &[Match], target: &'t [u8]) -> Vec<Instruction<'t>> {
    let mut base = matches
        .iter()
        .filter(|m| m.len > 0)
        .map(|m| m.source_pos)
        .min()
        .unwrap_or(0);
    let mut out = build(matches, target, base);

    // Demoting the lowest copy raises the base the window is framed with.
    for _ in 0..MAX_BASE_PASSES {
        match SourceRange::covering(&out) {
            Some(range) if range.offset != base => {
                base = range.offset;
                out = build(matches, target, base);
            }
            _ => break,
        }
    }
    out
}

fn build<'t>(matches: &[Match], target: &'t [u8], base: u64) -> Vec<Instruction<'t>> {
    let mut out: Vec<Instruction<'t>> = Vec::with_capacity(matches.len() * 2 + 1);
    let mut lit_start = 0usize;
    let mut cursor = base;

    for m in matches {
        if m.len == 0 {
            continue;
        }
        debug_assert!(m.target_pos >= lit_start, "matches overlap or are unsorted");

        let len = m.len as u64;
        let copy = Instruction::Copy {
            offset: m.source_pos,
            len,
        };
        if copy.encoded_len(cursor) >= m.len {
            // Cheaper as literal; leave it in the pending run.
            continue;
        }

        if m.target_pos > lit_start {
            out.push(Instruction::Insert {
                data: &target[lit_start..m.target_pos],
            });
        }
        match out.last_mut() {
            Some(Instruction::Copy { offset, len: prev }) if *offset + *prev == m.source_pos => {
                *prev += len;
            }
            _ => out.push(copy),
        }
        cursor = m.source_pos + len;
        lit_start = m.target_pos + m.len;
    }

    if lit_start < target.len() {
        out.push(Instruction::Insert {
            data: &target[lit_start..],
        });
    }

    debug_assert_eq!(
        out.iter().map(Instruction::target_len).sum::<u64>(),
        target.len() as u64,
        "instruction list does not cover the target"
    );
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn m(target_pos: usize, len: usize, source_pos: u64) -> Match {
        Match {
            target_pos,
            len,
            source_pos,
        }
    }

    fn total_len(insts: &[Instruction<'_>]) -> u64 {
        insts.iter().map(Instruction::target_len).sum()
    }

    #[test]
    fn gaps_become_inserts() {
        let target = b"ab0123456789xyz";
        let opt = optimize(&[m(2, 10, 100)], target);
        assert_eq!(
            opt,
            [
                Instruction::Insert { data: b"ab" },
                Instruction::Copy {
                    offset: 100,
                    len: 10
                },
                Instruction::Insert { data: b"xyz" },
            ]
        );
    }

    #[test]
    fn contiguous_copies_coalesce() {
        let target = [0u8; 20];
        let opt = optimize(&[m(0, 10, 50), m(10, 10, 60)], &target);
        assert_eq!(opt, [Instruction::Copy { offset: 50, len: 20 }]);
    }

    #[test]
    fn separated_copies_stay_apart() {
        let target = [0u8; 20];
        let opt = optimize(&[m(0, 10, 50), m(10, 10, 500)], &target);
        assert_eq!(opt.len(), 2);

        // A literal between two copies also prevents coalescing.
        let target = [0u8; 21];
        let opt = optimize(&[m(0, 10, 50), m(11, 10, 60)], &target);
        assert_eq!(opt.len(), 3);
        assert!(matches!(opt[1], Instruction::Insert { data } if data.len() == 1));
    }

    #[test]
    fn unprofitable_copy_becomes_literal() {
        // A two-byte copy costs at least three bytes, and the demoted bytes
        // merge with the literals around them.
        let target = b"abcdefgh";
        let opt = optimize(&[m(3, 2, 1_000_000)], target);
        assert_eq!(opt, [Instruction::Insert { data: target }]);
    }

    #[test]
    fn first_copy_is_priced_from_the_window_base() {
        // The later copy at offset 0 sets the window base, so the short copy
        // at a high offset costs a three-byte offset delta and is not worth
        // keeping.
        let target: Vec<u8> = (0..40u8).collect();
        let opt = optimize(&[m(0, 4, 1_000_000), m(10, 20, 0)], &target);
        assert_eq!(
            opt,
            [
                Instruction::Insert {
                    data: &target[..10]
                },
                Instruction::Copy { offset: 0, len: 20 },
                Instruction::Insert {
                    data: &target[30..]
                },
            ]
        );
    }

    #[test]
    fn base_moves_when_lowest_copy_is_demoted() {
        // The copy at offset 5 is too short to keep; the base then rises to
        // the remaining copy, which serializes with a zero offset delta.
        let target = [7u8; 64];
        let opt = optimize(&[m(0, 2, 5), m(2, 40, 900_000)], &target);
        assert_eq!(
            opt,
            [
                Instruction::Insert { data: &target[..2] },
                Instruction::Copy {
                    offset: 900_000,
                    len: 40
                },
                Instruction::Insert { data: &target[42..] },
            ]
        );
        let range = SourceRange::covering(&opt).unwrap();
        assert_eq!(range.offset, 900_000);
        assert_eq!(range.end(), 900_040);
    }

    #[test]
    fn no_matches_is_one_insert() {
        let target = b"literal only";
        assert_eq!(optimize(&[], target), [Instruction::Insert { data: target }]);
        assert!(optimize(&[], b"").is_empty());
    }

    #[test]
    fn appended_literal_scenario() {
        let mut target = vec![b'A'; 1000];
        target.extend_from_slice(&[b'B'; 10]);
        let opt = optimize(&[m(0, 1000, 0)], &target);
        assert_eq!(
            opt,
            [
                Instruction::Copy {
                    offset: 0,
                    len: 1000
                },
                Instruction::Insert { data: b"BBBBBBBBBB" },
            ]
        );
        assert_eq!(total_len(&opt), 1010);
    }

    #[test]
    fn zero_length_matches_ignored() {
        let target = b"hello";
        let opt = optimize(&[m(2, 0, 9)], target);
        assert_eq!(opt, [Instruction::Insert { data: target }]);
    }
}
