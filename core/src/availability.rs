//! Availability decision logic.
//!
//! Reservation intervals are half-open `[start, end)`: the end instant is
//! excluded, so two bookings sharing an endpoint (a guest checking out the
//! morning another checks in) do not overlap.

use crate::error::Error;
use crate::model::Booking;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated half-open date interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// Create a range, enforcing `start < end`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if start >= end {
            return Err(Error::InvalidInput(format!(
                "start date {start} must be before end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Start of the interval (inclusive).
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the interval (exclusive).
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Half-open overlap test: `[s1,e1)` and `[s2,e2)` overlap iff
    /// `s1 < e2 && s2 < e1`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Whether any pending or confirmed booking in `bookings` overlaps
/// `period`. Cancelled bookings never block.
#[must_use]
pub fn conflicts_with<'a, I>(period: &DateRange, bookings: I) -> bool
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings.into_iter().any(|b| {
        b.status.blocks_availability()
            && DateRange::new(b.start_date, b.end_date)
                .is_ok_and(|existing| existing.overlaps(period))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, 0, 0, 0).single().unwrap()
    }

    #[test]
    fn rejects_inverted_and_empty_ranges() {
        assert!(DateRange::new(day(5), day(5)).is_err());
        assert!(DateRange::new(day(6), day(5)).is_err());
        assert!(DateRange::new(day(5), day(6)).is_ok());
    }

    #[test]
    fn overlapping_ranges_are_detected() {
        let booked = DateRange::new(day(1), day(5)).unwrap();
        let overlapping = DateRange::new(day(4), day(8)).unwrap();
        assert!(booked.overlaps(&overlapping));
        assert!(overlapping.overlaps(&booked));
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let booked = DateRange::new(day(1), day(5)).unwrap();
        let adjacent = DateRange::new(day(5), day(8)).unwrap();
        assert!(!booked.overlaps(&adjacent));
        assert!(!adjacent.overlaps(&booked));
    }

    #[test]
    fn contained_range_overlaps() {
        let outer = DateRange::new(day(1), day(10)).unwrap();
        let inner = DateRange::new(day(3), day(4)).unwrap();
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    fn arb_range() -> impl Strategy<Value = DateRange> {
        (0i64..10_000, 1i64..500).prop_map(|(start, len)| {
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap();
            let start = base + chrono::Duration::hours(start);
            DateRange::new(start, start + chrono::Duration::hours(len)).unwrap()
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_range(), b in arb_range()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn range_overlaps_itself(a in arb_range()) {
            prop_assert!(a.overlaps(&a));
        }

        #[test]
        fn disjoint_iff_one_ends_before_other_starts(a in arb_range(), b in arb_range()) {
            let disjoint = a.end() <= b.start() || b.end() <= a.start();
            prop_assert_eq!(!a.overlaps(&b), disjoint);
        }
    }
}
