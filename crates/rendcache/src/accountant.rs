//! Saturating byte accounting for the cache, grounded directly on
//! `rend_cache_increment_allocation`/`rend_cache_decrement_allocation` in
//! `rendcache.c`.
//!
//! The cache is not a security boundary for memory; this exists purely to
//! drive the sweeper's force-eviction loop, so arithmetic saturates instead
//! of panicking or wrapping.

use tracing::warn;

/// A single non-negative running total of resident bytes, with saturating
/// arithmetic and a one-shot warning on the first under/overflow.
///
/// The one-shot flags are scoped to this instance rather than to the
/// process (the original's `static int have_underflowed`/`have_overflowed`
/// were function-local statics, i.e. effectively process-global) — see
/// `DESIGN.md` for why that's the right translation for a library value
/// rather than a set of process globals.
#[derive(Debug, Default)]
pub struct Accountant {
    total: u64,
    warned_overflow: bool,
    warned_underflow: bool,
}

impl Accountant {
    /// Creates a fresh accountant with a zero total.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increases the total by `n`, saturating (and warning once) if it
    /// would overflow `u64::MAX`.
    pub fn add(&mut self, n: u64) {
        match self.total.checked_add(n) {
            Some(sum) => self.total = sum,
            None => {
                self.total = u64::MAX;
                if !self.warned_overflow {
                    self.warned_overflow = true;
                    warn!("overflow incrementing rendezvous cache allocation total");
                }
            }
        }
    }

    /// Decreases the total by `n`, clamping to zero (and warning once) if
    /// `n` exceeds the current total.
    pub fn sub(&mut self, n: u64) {
        match self.total.checked_sub(n) {
            Some(diff) => self.total = diff,
            None => {
                self.total = 0;
                if !self.warned_underflow {
                    self.warned_underflow = true;
                    warn!("underflow decrementing rendezvous cache allocation total");
                }
            }
        }
    }

    /// Returns the current total.
    pub fn get(&self) -> u64 {
        self.total
    }

    /// Hard-zeroes the total, matching `rend_cache_free_all`'s unconditional
    /// `rend_cache_total_allocation = 0` rather than subtracting each freed
    /// entry's charge back out (which a prior saturating `add` could leave
    /// unable to reach zero).
    pub fn reset(&mut self) {
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zero() {
        assert_eq!(Accountant::new().get(), 0);
    }

    #[test]
    fn test_add_then_get() {
        let mut a = Accountant::new();
        a.add(100);
        a.add(50);
        assert_eq!(a.get(), 150);
    }

    #[test]
    fn test_sub_within_bounds() {
        let mut a = Accountant::new();
        a.add(100);
        a.sub(40);
        assert_eq!(a.get(), 60);
    }

    #[test]
    fn test_sub_underflow_clamps_to_zero() {
        let mut a = Accountant::new();
        a.add(10);
        a.sub(50);
        assert_eq!(a.get(), 0);
    }

    #[test]
    fn test_add_overflow_saturates_to_max() {
        let mut a = Accountant::new();
        a.add(u64::MAX);
        a.add(1);
        assert_eq!(a.get(), u64::MAX);
    }

    #[test]
    fn test_sub_never_goes_negative_across_many_calls() {
        let mut a = Accountant::new();
        a.add(5);
        a.sub(3);
        a.sub(10);
        a.sub(1);
        assert_eq!(a.get(), 0);
    }

    #[test]
    fn test_reset_zeroes_even_after_overflow() {
        let mut a = Accountant::new();
        a.add(u64::MAX);
        a.add(1); // saturates; no per-entry subtraction could unwind this to zero
        a.reset();
        assert_eq!(a.get(), 0);
    }
}
