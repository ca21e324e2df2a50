//! Text similarity scoring.
//!
//! [`similarity_ratio`] implements the Ratcliff/Obershelp "gestalt pattern
//! matching" ratio: find the longest common block, recurse on both sides of
//! it, and report `2 * matched / (len(a) + len(b))`. Strings are compared by
//! Unicode scalar value, so CJK text scores the same way Latin text does.
//!
//! # Example
//!
//! ```
//! use slidegrab::similarity_ratio;
//!
//! assert_eq!(similarity_ratio("abcd", "abcd"), 1.0);
//! assert_eq!(similarity_ratio("abcd", "bcde"), 0.75);
//! assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
//! ```

use std::collections::HashMap;

/// A run of identical characters shared by both inputs.
///
/// `a[a_start..a_start + size] == b[b_start..b_start + size]`, with offsets
/// counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    /// Offset of the block in the first string.
    pub a_start: usize,
    /// Offset of the block in the second string.
    pub b_start: usize,
    /// Length of the block in characters.
    pub size: usize,
}

/// Similarity of two strings in `[0.0, 1.0]`.
///
/// Two empty strings are identical (`1.0`); strings without a single common
/// character score `0.0`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matched: usize = blocks(&a, &b).iter().map(|block| block.size).sum();
    2.0 * matched as f64 / total as f64
}

/// Non-overlapping matching blocks of `a` and `b`, in increasing order.
pub fn matching_blocks(a: &str, b: &str) -> Vec<MatchingBlock> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    blocks(&a, &b)
}

fn blocks(a: &[char], b: &[char]) -> Vec<MatchingBlock> {
    let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
    for (position, &ch) in b.iter().enumerate() {
        b_index.entry(ch).or_default().push(position);
    }

    let mut found = Vec::new();
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_low, a_high, b_low, b_high)) = pending.pop() {
        let block = longest_match(a, &b_index, a_low, a_high, b_low, b_high);
        if block.size == 0 {
            continue;
        }

        if a_low < block.a_start && b_low < block.b_start {
            pending.push((a_low, block.a_start, b_low, block.b_start));
        }
        let a_after = block.a_start + block.size;
        let b_after = block.b_start + block.size;
        if a_after < a_high && b_after < b_high {
            pending.push((a_after, a_high, b_after, b_high));
        }
        found.push(block);
    }

    found.sort_by_key(|block| (block.a_start, block.b_start));
    found
}

/// Longest block common to `a[a_low..a_high]` and `b[b_low..b_high]`.
///
/// Ties resolve to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b_index: &HashMap<char, Vec<usize>>,
    a_low: usize,
    a_high: usize,
    b_low: usize,
    b_high: usize,
) -> MatchingBlock {
    let mut best = MatchingBlock {
        a_start: a_low,
        b_start: b_low,
        size: 0,
    };

    // run_lengths[j] = length of the match ending at a[i - 1], b[j].
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();

    for (i, ch) in a.iter().enumerate().take(a_high).skip(a_low) {
        let mut next_run_lengths = HashMap::new();
        if let Some(positions) = b_index.get(ch) {
            for &j in positions {
                if j < b_low {
                    continue;
                }
                if j >= b_high {
                    break;
                }
                let previous = if j > 0 {
                    run_lengths.get(&(j - 1)).copied().unwrap_or(0)
                } else {
                    0
                };
                let length = previous + 1;
                next_run_lengths.insert(j, length);
                if length > best.size {
                    best = MatchingBlock {
                        a_start: i + 1 - length,
                        b_start: j + 1 - length,
                        size: length,
                    };
                }
            }
        }
        run_lengths = next_run_lengths;
    }

    best
}
