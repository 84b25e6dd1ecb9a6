//! Text similarity primitives shared by the fuzzy strategies.

/// Tolerance for score comparisons. Ratios such as `1 - 0.8` are not exact
/// in binary floating point.
pub(crate) const SCORE_EPSILON: f64 = 1e-9;

/// Collapse internal whitespace runs to one space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein distance over chars, or `None` once it must exceed `max_dist`.
pub fn levenshtein_bounded(a: &[char], b: &[char], max_dist: usize) -> Option<usize> {
    let (m, n) = (a.len(), b.len());
    if m.abs_diff(n) > max_dist {
        return None;
    }
    if m == 0 {
        return Some(n);
    }
    if n == 0 {
        return Some(m);
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        let mut row_min = curr[0];
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j - 1] + cost).min(prev[j] + 1).min(curr[j - 1] + 1);
            row_min = row_min.min(curr[j]);
        }
        if row_min > max_dist {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let dist = prev[n];
    (dist <= max_dist).then_some(dist)
}

/// Normalized similarity `1 - dist / max_len` in `[0, 1]`.
///
/// Returns `None` when the ratio provably falls below `floor`, which lets
/// callers skip hopeless windows cheaply. Two empty strings are identical.
pub fn similarity_at_least(a: &str, b: &str, floor: f64) -> Option<f64> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return Some(1.0);
    }

    let floor = floor.clamp(0.0, 1.0);
    let max_dist = ((1.0 - floor) * max_len as f64 + SCORE_EPSILON).floor() as usize;
    let dist = levenshtein_bounded(&a, &b, max_dist)?;
    let score = 1.0 - dist as f64 / max_len as f64;
    (score + SCORE_EPSILON >= floor).then_some(score)
}

/// Unbounded normalized similarity.
pub fn similarity(a: &str, b: &str) -> f64 {
    similarity_at_least(a, b, 0.0).unwrap_or(0.0)
}

/// Longest-common-subsequence alignment of two line sequences.
///
/// Returns index pairs `(i_a, i_b)` of equal lines in increasing order.
pub fn lcs_alignment<S: AsRef<str>>(a: &[S], b: &[S]) -> Vec<(usize, usize)> {
    let m = a.len();
    let n = b.len();

    if m == 0 || n == 0 {
        return Vec::new();
    }

    let mut dp = vec![vec![0usize; n + 1]; m + 1];

    for i in 1..=m {
        for j in 1..=n {
            if a[i - 1].as_ref() == b[j - 1].as_ref() {
                dp[i][j] = dp[i - 1][j - 1] + 1;
            } else {
                dp[i][j] = dp[i][j - 1].max(dp[i - 1][j]);
            }
        }
    }

    let mut alignment = Vec::new();
    let mut i = m;
    let mut j = n;

    while i > 0 && j > 0 {
        if a[i - 1].as_ref() == b[j - 1].as_ref() {
            alignment.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[i][j - 1] > dp[i - 1][j] {
            j -= 1;
        } else {
            i -= 1;
        }
    }

    alignment.reverse();
    alignment
}
