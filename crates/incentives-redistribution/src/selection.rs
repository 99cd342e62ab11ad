use incentives_types::{hash_to_u128, Hash};

/// Stake-weighted draw.
///
/// Weights are laid out as contiguous ranges on one axis in slice order, the
/// anchor picks `anchor mod total`, and the entry whose range contains that
/// point is returned. Zero weights occupy no range and are never chosen.
/// `None` when the total weight is zero.
pub fn select_weighted<T>(entries: &[T], weight: impl Fn(&T) -> u128, anchor: &Hash) -> Option<usize> {
    let mut ends = Vec::with_capacity(entries.len());
    let mut total: u128 = 0;
    for entry in entries {
        total = total.saturating_add(weight(entry));
        ends.push(total);
    }
    if total == 0 {
        return None;
    }

    let draw = hash_to_u128(anchor) % total;
    Some(ends.partition_point(|&end| end <= draw))
}
