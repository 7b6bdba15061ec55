//! Stable handles into the engine's arenas.
//!
//! Bodies, constraints and composites live in `slotmap` arenas and are
//! referenced by small `Copy` keys rather than in-place back-pointers;
//! a tree walk passes the parent id explicitly instead of following a
//! stored reference.

use slotmap::new_key_type;

/// Key identifying a [`crate::pair::Pair`]: the two bodies' numeric
/// ids, ordered so the lower id is always first.
pub type PairKey = (u64, u64);

new_key_type! {
    /// Handle to a [`crate::body::Body`] stored in an [`crate::Engine`].
    pub struct BodyId;

    /// Handle to a [`crate::constraint::Constraint`] stored in an [`crate::Engine`].
    pub struct ConstraintId;

    /// Handle to a [`crate::composite::Composite`] stored in an [`crate::Engine`].
    pub struct CompositeId;
}

/// Canonical ordering for a pair of body ids: the lower id always
/// sorts first, so a pair's storage key is independent of which body
/// was passed as `a` and which as `b`.
///
/// `slotmap` keys don't expose a stable total order across runs, so
/// pairs are ordered by an explicit insertion-order tag stashed in
/// [`crate::body::Body::id`] instead of the raw key.
pub fn ordered_pair(a: (BodyId, u64), b: (BodyId, u64)) -> ((BodyId, u64), (BodyId, u64)) {
    if a.1 <= b.1 {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_picks_smaller_numeric_id_first() {
        let a = (BodyId::default(), 5);
        let b = (BodyId::default(), 2);

        let (lo, hi) = ordered_pair(a, b);
        assert_eq!(lo.1, 2);
        assert_eq!(hi.1, 5);
    }
}
