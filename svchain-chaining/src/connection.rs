use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use svchain_core::consts::PLOIDY_EPSILON;
use svchain_core::models::{BreakendEnd, BreakendRef, Variant, VariantId};
use svchain_core::ploidy::format_ploidy;

use crate::error::{ChainingError, ChainingResult};

///
/// Ploidy bookkeeping for one variant during a chaining run.
///
/// Each breakend starts with the variant's ploidy available; every link through
/// it allocates part of that. A breakend is exhausted once the allocation reaches
/// the lower bound of the estimate, and exhausted against its maximum once it
/// reaches the upper bound.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub variant: VariantId,
    pub is_sgl: bool,
    pub ploidy: f64,
    pub min_ploidy: f64,
    pub max_ploidy: f64,
    allocated: [f64; 2],
    connections: [Vec<BreakendRef>; 2],
}

impl ConnectionState {
    ///
    /// Build the state for a variant.
    ///
    /// # Arguments
    /// - `variant`: the variant to track
    /// - `uniform_ploidy`: use a ploidy of exactly 1 instead of the variant's estimate,
    ///   for clusters without replication
    ///
    pub fn new(variant: &Variant, uniform_ploidy: bool) -> Self {
        let (ploidy, min_ploidy, max_ploidy) = if uniform_ploidy {
            (1.0, 1.0, 1.0)
        } else {
            (variant.ploidy, variant.ploidy_min(), variant.ploidy_max())
        };

        ConnectionState {
            variant: variant.id,
            is_sgl: variant.is_sgl(),
            ploidy,
            min_ploidy,
            max_ploidy,
            allocated: [0.0; 2],
            connections: [Vec::new(), Vec::new()],
        }
    }

    pub fn allocated(&self, end: BreakendEnd) -> f64 {
        self.allocated[end.index()]
    }

    /// Ploidy still expected at this breakend, never negative.
    pub fn unlinked_ploidy(&self, end: BreakendEnd) -> f64 {
        (self.ploidy - self.allocated[end.index()]).max(0.0)
    }

    /// Headroom up to the upper bound of the estimate, never negative.
    pub fn max_unlinked_ploidy(&self, end: BreakendEnd) -> f64 {
        (self.max_ploidy - self.allocated[end.index()]).max(0.0)
    }

    pub fn is_exhausted(&self, end: BreakendEnd) -> bool {
        if self.is_sgl && end == BreakendEnd::End {
            return true;
        }

        let allocated = self.allocated[end.index()];
        allocated > 0.0 && allocated >= self.min_ploidy - PLOIDY_EPSILON
    }

    pub fn is_exhausted_vs_max(&self, end: BreakendEnd) -> bool {
        if self.is_sgl && end == BreakendEnd::End {
            return true;
        }

        let allocated = self.allocated[end.index()];
        allocated > 0.0 && allocated >= self.max_ploidy - PLOIDY_EPSILON
    }

    ///
    /// Allocate ploidy to one breakend.
    ///
    /// Allocating past the upper bound is an error and is never clamped.
    ///
    pub fn add_allocation(&mut self, end: BreakendEnd, amount: f64) -> ChainingResult<()> {
        let breakend = BreakendRef::new(self.variant, end);

        if self.is_sgl && end == BreakendEnd::End {
            return Err(ChainingError::AllocationExceedsMax {
                breakend,
                amount,
                allocated: 0.0,
                max: 0.0,
            });
        }

        if !(amount >= 0.0) || amount > self.max_unlinked_ploidy(end) + PLOIDY_EPSILON {
            return Err(ChainingError::AllocationExceedsMax {
                breakend,
                amount,
                allocated: self.allocated[end.index()],
                max: self.max_ploidy,
            });
        }

        self.allocated[end.index()] += amount;
        Ok(())
    }

    pub fn record_connection(&mut self, end: BreakendEnd, other: BreakendRef) {
        self.connections[end.index()].push(other);
    }

    pub fn connections(&self, end: BreakendEnd) -> &[BreakendRef] {
        &self.connections[end.index()]
    }

    pub fn has_connections(&self) -> bool {
        self.connections.iter().any(|c| !c.is_empty())
    }

    /// Both breakends are exhausted, or the only breakend for an SGL.
    pub fn is_complete(&self) -> bool {
        self.is_exhausted(BreakendEnd::Start) && self.is_exhausted(BreakendEnd::End)
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ploidy({}-{}-{}) alloc({} {}) conns({} {})",
            self.variant,
            format_ploidy(self.min_ploidy),
            format_ploidy(self.ploidy),
            format_ploidy(self.max_ploidy),
            format_ploidy(self.allocated[0]),
            format_ploidy(self.allocated[1]),
            self.connections[0].len(),
            self.connections[1].len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use svchain_core::models::{Breakend, SvType};

    #[fixture]
    fn uncertain_del() -> Variant {
        Variant::from_positions(0, SvType::Del, "1", 100, 200)
            .unwrap()
            .with_ploidy(2.0, 0.5)
            .unwrap()
    }

    #[rstest]
    fn test_exhaustion_bounds(uncertain_del: Variant) {
        let mut state = ConnectionState::new(&uncertain_del, false);

        assert_eq!(state.min_ploidy, 1.5);
        assert_eq!(state.max_ploidy, 2.5);
        assert_eq!(state.is_exhausted(BreakendEnd::Start), false);

        state.add_allocation(BreakendEnd::Start, 1.0).unwrap();
        assert_eq!(state.is_exhausted(BreakendEnd::Start), false);
        assert_eq!(state.unlinked_ploidy(BreakendEnd::Start), 1.0);

        state.add_allocation(BreakendEnd::Start, 0.5).unwrap();
        assert_eq!(state.is_exhausted(BreakendEnd::Start), true);
        assert_eq!(state.is_exhausted_vs_max(BreakendEnd::Start), false);
        assert_eq!(state.max_unlinked_ploidy(BreakendEnd::Start), 1.0);

        state.add_allocation(BreakendEnd::Start, 1.0).unwrap();
        assert_eq!(state.is_exhausted_vs_max(BreakendEnd::Start), true);
        assert_eq!(state.unlinked_ploidy(BreakendEnd::Start), 0.0);

        // other end untouched
        assert_eq!(state.allocated(BreakendEnd::End), 0.0);
        assert_eq!(state.is_complete(), false);
    }

    #[rstest]
    fn test_allocation_past_max_is_rejected(uncertain_del: Variant) {
        let mut state = ConnectionState::new(&uncertain_del, false);
        state.add_allocation(BreakendEnd::End, 2.0).unwrap();

        let result = state.add_allocation(BreakendEnd::End, 1.0);
        assert!(matches!(
            result,
            Err(ChainingError::AllocationExceedsMax { .. })
        ));
        // not clamped
        assert_eq!(state.allocated(BreakendEnd::End), 2.0);
    }

    #[rstest]
    fn test_uniform_ploidy(uncertain_del: Variant) {
        let mut state = ConnectionState::new(&uncertain_del, true);
        assert_eq!(state.ploidy, 1.0);
        assert_eq!(state.max_ploidy, 1.0);

        state.add_allocation(BreakendEnd::Start, 1.0).unwrap();
        state.add_allocation(BreakendEnd::End, 1.0).unwrap();
        assert_eq!(state.is_complete(), true);
    }

    #[rstest]
    fn test_sgl_end_counts_as_exhausted() {
        let sgl = Variant::new(0, SvType::Sgl, Breakend::new("1", 100, 1), None, 1.0, 0.0).unwrap();
        let mut state = ConnectionState::new(&sgl, false);

        assert_eq!(state.is_exhausted(BreakendEnd::End), true);
        assert!(state.add_allocation(BreakendEnd::End, 0.5).is_err());

        state.record_connection(BreakendEnd::Start, BreakendRef::start(VariantId(1)));
        state.add_allocation(BreakendEnd::Start, 1.0).unwrap();
        assert_eq!(state.has_connections(), true);
        assert_eq!(state.connections(BreakendEnd::Start).len(), 1);
        assert_eq!(state.is_complete(), true);
    }
}
