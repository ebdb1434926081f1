//! Name similarity via Ratcliff/Obershelp sequence matching.
//!
//! The ratio is `2 * M / T` where `M` is the number of characters in the
//! recursively found longest common blocks and `T` the combined length.
//! Comparison is case-insensitive.

/// Case-insensitive similarity ratio in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Total size of all matching blocks, found by splitting around the longest
/// match and recursing on both sides. Uses an explicit work stack.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            stack.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    // prev[x + 1] = length of the common suffix ending at (i - 1, blo + x)
    let mut prev = vec![0usize; width];
    let mut cur = vec![0usize; width];
    for i in alo..ahi {
        for j in blo..bhi {
            let x = j - blo;
            if a[i] == b[j] {
                let k = prev[x] + 1;
                cur[x + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                cur[x + 1] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_identity() {
        assert_eq!(similarity("User Login System", "USER LOGIN SYSTEM"), 1.0);
    }

    #[test]
    fn test_known_ratio() {
        // "bcd" is the only common block: 2 * 3 / 8
        assert_eq!(similarity("abcd", "bcde"), 0.75);
    }

    #[test]
    fn test_disjoint_strings() {
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_recurses_on_both_sides() {
        // Blocks "ab" and "ef" around a mismatched middle: 2 * 4 / 10
        assert_eq!(similarity("abXef", "abYef"), 0.8);
    }

    #[test]
    fn test_symmetric_for_simple_pairs() {
        for (a, b) in [
            ("Payment gateway", "Payment gateways"),
            ("Export invoices", "export invoice"),
            ("abcd", "bcda"),
        ] {
            assert_eq!(similarity(a, b), similarity(b, a), "{} / {}", a, b);
        }
    }

    #[test]
    fn test_deterministic() {
        let first = similarity("Set up CI pipeline", "Setup CI pipelines");
        let second = similarity("Set up CI pipeline", "Setup CI pipelines");
        assert_eq!(first, second);
        assert!(first > 0.8);
    }
}
