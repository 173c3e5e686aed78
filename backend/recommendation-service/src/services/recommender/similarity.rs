//! Log-likelihood user similarity over implicit preferences.
//!
//! For users `a` and `b` the 2x2 contingency table over items is
//!
//! |            | in b       | not in b                 |
//! |------------|------------|--------------------------|
//! | in a       | k11 = both | k12 = a only             |
//! | not in a   | k21 = b only | k22 = neither          |
//!
//! and similarity = 1 - 1 / (1 + LLR(k11, k12, k21, k22)).
//!
//! `k22` counts one unseen catalog item on top of the dataset's distinct
//! items, so complete overlap inside a tiny catalog still scores above zero.
//! The ratio is two-sided; pairs that share fewer items than independence
//! predicts score zero.

/// Pseudo-count added to the "neither" cell
pub const UNSEEN_ITEM_PSEUDO_COUNT: u64 = 1;

fn x_log_x(x: u64) -> f64 {
    if x == 0 {
        0.0
    } else {
        let x = x as f64;
        x * x.ln()
    }
}

/// Unnormalized Shannon entropy: `xlogx(sum) - sum(xlogx(e))`.
fn entropy(elements: &[u64]) -> f64 {
    let mut sum = 0u64;
    let mut result = 0.0;
    for &element in elements {
        result += x_log_x(element);
        sum += element;
    }
    x_log_x(sum) - result
}

/// Dunning's log-likelihood ratio for a 2x2 table.
pub fn log_likelihood_ratio(k11: u64, k12: u64, k21: u64, k22: u64) -> f64 {
    let row_entropy = entropy(&[k11 + k12, k21 + k22]);
    let column_entropy = entropy(&[k11 + k21, k12 + k22]);
    let matrix_entropy = entropy(&[k11, k12, k21, k22]);
    if row_entropy + column_entropy < matrix_entropy {
        // round-off
        return 0.0;
    }
    2.0 * (row_entropy + column_entropy - matrix_entropy)
}

/// Similarity of two users from their item counts and overlap.
///
/// `num_items` is the number of distinct items in the dataset. Returns
/// `None` when the users share no item; such pairs are never neighbours.
pub fn log_likelihood_similarity(
    items_a: usize,
    items_b: usize,
    common: usize,
    num_items: usize,
) -> Option<f64> {
    if common == 0 {
        return None;
    }

    // Canonical order keeps sim(a, b) bit-identical to sim(b, a).
    let (small, large) = if items_a <= items_b {
        (items_a as u64, items_b as u64)
    } else {
        (items_b as u64, items_a as u64)
    };
    let common = common as u64;
    let universe = num_items as u64 + UNSEEN_ITEM_PSEUDO_COUNT;

    let k11 = common;
    let k12 = small - common;
    let k21 = large - common;
    let k22 = universe.saturating_sub(small + large - common);

    // k11 / N <= row_a / N * row_b / N: no positive association.
    let n = k11 + k12 + k21 + k22;
    if (k11 as u128) * (n as u128) <= (small as u128) * (large as u128) {
        return Some(0.0);
    }

    let llr = log_likelihood_ratio(k11, k12, k21, k22);
    Some(1.0 - 1.0 / (1.0 + llr))
}
