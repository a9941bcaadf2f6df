//! Sequence alignment and dissimilarity scoring
//!
//! Two sequences are aligned into matching blocks, and the gaps between
//! blocks become opcodes:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `equal` | `a[i1..i2] == b[j1..j2]` |
//! | `replace` | `a[i1..i2]` should be replaced by `b[j1..j2]` |
//! | `delete` | `a[i1..i2]` has no counterpart in `b` |
//! | `insert` | `b[j1..j2]` has no counterpart in `a` |
//!
//! The dissimilarity of two sequences is the sum, over every non-equal
//! opcode, of the longer of its two ranges. No element is ever treated as
//! junk: recognition output is compared literally.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// How matching blocks are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AlignStrategy {
    /// Longest common subsequence (dynamic programming)
    #[default]
    Lcs,
    /// Recursive longest contiguous matching block
    MatchingBlocks,
}

impl AlignStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            AlignStrategy::Lcs => "lcs",
            AlignStrategy::MatchingBlocks => "matching-blocks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTag {
    Equal,
    Replace,
    Insert,
    Delete,
}

/// One contiguous edit operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opcode {
    pub tag: OpTag,
    /// Range in the first (result) sequence
    pub a: Range<usize>,
    /// Range in the second (reference) sequence
    pub b: Range<usize>,
}

impl Opcode {
    /// Number of differing positions this operation accounts for
    pub fn cost(&self) -> usize {
        match self.tag {
            OpTag::Equal => 0,
            _ => self.a.len().max(self.b.len()),
        }
    }
}

/// A run of equal elements: `a[a_start..a_start + len] == b[b_start..b_start + len]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    a_start: usize,
    b_start: usize,
    len: usize,
}

/// Computes the opcodes turning `a` into `b`
pub fn opcodes<T: Eq + Hash>(a: &[T], b: &[T], strategy: AlignStrategy) -> Vec<Opcode> {
    let blocks = match strategy {
        AlignStrategy::Lcs => lcs_blocks(a, b),
        AlignStrategy::MatchingBlocks => matching_blocks(a, b),
    };

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    for block in blocks {
        let tag = if i < block.a_start && j < block.b_start {
            Some(OpTag::Replace)
        } else if i < block.a_start {
            Some(OpTag::Delete)
        } else if j < block.b_start {
            Some(OpTag::Insert)
        } else {
            None
        };
        if let Some(tag) = tag {
            ops.push(Opcode {
                tag,
                a: i..block.a_start,
                b: j..block.b_start,
            });
        }

        i = block.a_start + block.len;
        j = block.b_start + block.len;
        if block.len > 0 {
            ops.push(Opcode {
                tag: OpTag::Equal,
                a: block.a_start..i,
                b: block.b_start..j,
            });
        }
    }
    ops
}

/// Dissimilarity between a result and a reference sequence
pub fn dissimilarity<T: Eq + Hash>(result: &[T], reference: &[T], strategy: AlignStrategy) -> usize {
    opcodes(result, reference, strategy)
        .iter()
        .map(Opcode::cost)
        .sum()
}

/// Matching blocks of a longest common subsequence, terminated by an empty
/// sentinel block at `(a.len(), b.len())`
fn lcs_blocks<T: Eq>(a: &[T], b: &[T]) -> Vec<Block> {
    let (n, m) = (a.len(), b.len());

    // Lengths are kept for two rows only; the traceback needs one bit per
    // cell, set when LCS(a[i + 1..], b[j..]) >= LCS(a[i..], b[j + 1..])
    let mut skip_a = vec![0u64; (n * m).div_ceil(64)];
    let mut below = vec![0usize; m + 1];
    let mut row = vec![0usize; m + 1];
    for i in (0..n).rev() {
        row[m] = 0;
        for j in (0..m).rev() {
            row[j] = if a[i] == b[j] {
                below[j + 1] + 1
            } else {
                below[j].max(row[j + 1])
            };
            if below[j] >= row[j + 1] {
                let cell = i * m + j;
                skip_a[cell / 64] |= 1 << (cell % 64);
            }
        }
        std::mem::swap(&mut row, &mut below);
    }
    let skips_a = |i: usize, j: usize| {
        let cell = i * m + j;
        skip_a[cell / 64] & (1 << (cell % 64)) != 0
    };

    let mut pairs = Vec::with_capacity(below[0]);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if skips_a(i, j) {
            i += 1;
        } else {
            j += 1;
        }
    }

    let blocks = pairs.into_iter().map(|(i, j)| Block {
        a_start: i,
        b_start: j,
        len: 1,
    });
    finish_blocks(blocks, n, m)
}

/// Matching blocks found by repeatedly taking the longest contiguous match
/// and recursing on both sides of it
fn matching_blocks<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<Block> {
    let mut b_index: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in b.iter().enumerate() {
        b_index.entry(item).or_default().push(j);
    }

    let mut found = Vec::new();
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let block = longest_match(a, &b_index, alo..ahi, blo..bhi);
        if block.len == 0 {
            continue;
        }
        if alo < block.a_start && blo < block.b_start {
            queue.push((alo, block.a_start, blo, block.b_start));
        }
        let (a_end, b_end) = (block.a_start + block.len, block.b_start + block.len);
        if a_end < ahi && b_end < bhi {
            queue.push((a_end, ahi, b_end, bhi));
        }
        found.push(block);
    }
    found.sort_by_key(|block| (block.a_start, block.b_start));

    finish_blocks(found.into_iter(), a.len(), b.len())
}

/// Longest run of equal elements within the given windows; ties go to the
/// earliest start in `a`, then in `b`
fn longest_match<T: Eq + Hash>(
    a: &[T],
    b_index: &HashMap<&T, Vec<usize>>,
    a_range: Range<usize>,
    b_range: Range<usize>,
) -> Block {
    let mut best = Block {
        a_start: a_range.start,
        b_start: b_range.start,
        len: 0,
    };

    // run_ending_at[j] = length of the match ending at a[i - 1], b[j]
    let mut run_ending_at: HashMap<usize, usize> = HashMap::new();
    for i in a_range {
        let mut next = HashMap::new();
        if let Some(positions) = b_index.get(&a[i]) {
            for &j in positions {
                if j < b_range.start {
                    continue;
                }
                if j >= b_range.end {
                    break;
                }
                let len = j
                    .checked_sub(1)
                    .and_then(|prev| run_ending_at.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, len);
                if len > best.len {
                    best = Block {
                        a_start: i + 1 - len,
                        b_start: j + 1 - len,
                        len,
                    };
                }
            }
        }
        run_ending_at = next;
    }
    best
}

/// Merges adjacent blocks and appends the sentinel
fn finish_blocks(blocks: impl Iterator<Item = Block>, n: usize, m: usize) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::new();
    for block in blocks {
        match merged.last_mut() {
            Some(last)
                if last.a_start + last.len == block.a_start
                    && last.b_start + last.len == block.b_start =>
            {
                last.len += block.len;
            }
            _ => merged.push(block),
        }
    }
    merged.push(Block {
        a_start: n,
        b_start: m,
        len: 0,
    });
    merged
}
