//! Pending resync requests.
//!
//! Anything that changes sort criteria, cursor state, directory contents, terminal size,
//! mouse preference or the tick period raises the matching [Resync] flag instead of acting
//! on the spot. The reactor runs the handler for every raised flag once per cycle, in
//! [Resync::ORDER], and clears the flag after the handler returns.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    Sort,
    Pos,
    Dir,
    NavSize,
    Mouse,
    Period,
}

impl Resync {
    pub const ORDER: [Resync; 6] = [
        Resync::Sort,
        Resync::Pos,
        Resync::Dir,
        Resync::NavSize,
        Resync::Mouse,
        Resync::Period,
    ];

    #[inline]
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Bitset of raised [Resync] flags. Starts with every flag raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation(u8);

impl Default for Invalidation {
    fn default() -> Self {
        Self::all()
    }
}

impl Invalidation {
    pub fn all() -> Self {
        Invalidation(Resync::ORDER.iter().fold(0, |acc, r| acc | r.bit()))
    }

    pub fn none() -> Self {
        Invalidation(0)
    }

    #[inline]
    pub fn set(&mut self, r: Resync) {
        self.0 |= r.bit();
    }

    #[inline]
    pub fn clear(&mut self, r: Resync) {
        self.0 &= !r.bit();
    }

    #[inline]
    pub fn is_set(&self, r: Resync) -> bool {
        self.0 & r.bit() != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raised flags in handler order.
    pub fn pending(&self) -> impl Iterator<Item = Resync> + '_ {
        Resync::ORDER.into_iter().filter(|r| self.is_set(*r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fully_raised_in_fixed_order() {
        let inv = Invalidation::default();
        assert_eq!(inv.pending().collect::<Vec<_>>(), Resync::ORDER);
    }

    #[test]
    fn set_is_idempotent_and_clear_is_per_flag() {
        let mut inv = Invalidation::none();
        assert!(inv.is_empty());

        inv.set(Resync::Period);
        inv.set(Resync::Sort);
        inv.set(Resync::Period);
        assert_eq!(
            inv.pending().collect::<Vec<_>>(),
            [Resync::Sort, Resync::Period]
        );

        inv.clear(Resync::Sort);
        assert!(!inv.is_set(Resync::Sort));
        assert!(inv.is_set(Resync::Period));
        inv.clear(Resync::Period);
        assert!(inv.is_empty());
    }
}
