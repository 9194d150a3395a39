use std::fmt::{self, Display};

use svchain_core::models::{BreakendRef, ChainingRule, LinkedPair};
use svchain_core::ploidy::{PloidyEstimate, copy_numbers_equal, format_ploidy, ploidy_match};

use crate::chain::ChainId;

///
/// The shape of a two-pair proposal.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MultiConnection {
    /// Both breakends of a foldback (or both open ends of a foldback chain) link
    /// to one breakend, replicating the chain behind it.
    Foldback {
        target: Option<ChainId>,
        foldback_chain: Option<ChainId>,
    },
    /// Both breakends of a duplicating variant link to the two open ends of a chain.
    ComplexDup { target: Option<ChainId> },
}

impl MultiConnection {
    pub fn splitting_rule(&self) -> ChainingRule {
        match self {
            MultiConnection::Foldback { .. } => ChainingRule::FoldbackSplit,
            MultiConnection::ComplexDup { .. } => ChainingRule::ComplexDupSplit,
        }
    }

    pub fn target(&self) -> Option<ChainId> {
        match self {
            MultiConnection::Foldback { target, .. } => *target,
            MultiConnection::ComplexDup { target } => *target,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BreakendPloidy {
    breakend: BreakendRef,
    ploidy: f64,
    exhausted: bool,
}

///
/// One unit of work for the allocator: one pair, or two for a multi-connection,
/// plus the ploidy to allocate.
///
#[derive(Clone, Debug, PartialEq)]
pub struct ProposedLinks {
    pub links: Vec<LinkedPair>,
    rules: Vec<ChainingRule>,
    ploidy: f64,
    breakend_ploidies: Vec<BreakendPloidy>,
    link_ploidy_match: bool,
    multi: Option<MultiConnection>,
}

impl ProposedLinks {
    pub fn new(pair: LinkedPair, rule: ChainingRule) -> Self {
        ProposedLinks {
            links: vec![pair],
            rules: vec![rule],
            ploidy: 0.0,
            breakend_ploidies: Vec::new(),
            link_ploidy_match: false,
            multi: None,
        }
    }

    pub fn multi(
        pair_a: LinkedPair,
        pair_b: LinkedPair,
        rule: ChainingRule,
        connection: MultiConnection,
    ) -> Self {
        ProposedLinks {
            links: vec![pair_a, pair_b],
            rules: vec![rule],
            ploidy: 0.0,
            breakend_ploidies: Vec::new(),
            link_ploidy_match: false,
            multi: Some(connection),
        }
    }

    pub fn add_rule(&mut self, rule: ChainingRule) {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    pub fn rules(&self) -> &[ChainingRule] {
        &self.rules
    }

    /// The highest-priority rule behind the proposal.
    pub fn top_rule(&self) -> ChainingRule {
        self.rules
            .iter()
            .copied()
            .min()
            .unwrap_or(ChainingRule::Nearest)
    }

    pub fn ploidy(&self) -> f64 {
        self.ploidy
    }

    pub fn link_ploidy_match(&self) -> bool {
        self.link_ploidy_match
    }

    pub fn multi_connection(&self) -> Option<MultiConnection> {
        self.multi
    }

    pub fn is_multi(&self) -> bool {
        self.multi.is_some()
    }

    pub fn target_chain(&self) -> Option<ChainId> {
        self.multi.and_then(|m| m.target())
    }

    pub fn foldback_chain(&self) -> Option<ChainId> {
        match self.multi {
            Some(MultiConnection::Foldback { foldback_chain, .. }) => foldback_chain,
            _ => None,
        }
    }

    ///
    /// Set the ploidy of a single-pair proposal from both breakends' remaining ploidy.
    ///
    /// Equal copy numbers are averaged and both breakends are marked to be used up.
    /// Otherwise the lower value is allocated and only that breakend is used up.
    ///
    pub fn add_breakend_ploidies(
        &mut self,
        breakend1: BreakendRef,
        ploidy1: f64,
        breakend2: BreakendRef,
        ploidy2: f64,
    ) {
        if copy_numbers_equal(ploidy1, ploidy2) {
            self.ploidy = (ploidy1 + ploidy2) * 0.5;
            self.link_ploidy_match = true;
            self.set_breakend(breakend1, ploidy1, true);
            self.set_breakend(breakend2, ploidy2, true);
        } else {
            self.ploidy = ploidy1.min(ploidy2);
            self.link_ploidy_match = false;
            self.set_breakend(breakend1, ploidy1, ploidy1 < ploidy2);
            self.set_breakend(breakend2, ploidy2, ploidy2 < ploidy1);
        }
    }

    ///
    /// Set ploidy for a foldback: the foldback's two breakends each carry the
    /// link ploidy while the shared breakend carries twice that.
    ///
    pub fn add_foldback_breakends(
        &mut self,
        foldback_start: BreakendRef,
        foldback_end: BreakendRef,
        foldback: PloidyEstimate,
        other: BreakendRef,
        other_ploidy: PloidyEstimate,
    ) {
        self.add_replicating_breakends(foldback_start, foldback_end, foldback, other, other_ploidy);
    }

    ///
    /// Set ploidy for a complex duplication: the duplicating variant's breakends
    /// each carry the link ploidy while the chain behind them carries twice that.
    ///
    pub fn add_comp_dup_breakends(
        &mut self,
        dup_start: BreakendRef,
        dup_end: BreakendRef,
        dup: PloidyEstimate,
        chain_breakend: BreakendRef,
        chain_ploidy: PloidyEstimate,
    ) {
        self.add_replicating_breakends(dup_start, dup_end, dup, chain_breakend, chain_ploidy);
    }

    fn add_replicating_breakends(
        &mut self,
        start: BreakendRef,
        end: BreakendRef,
        single: PloidyEstimate,
        other: BreakendRef,
        double: PloidyEstimate,
    ) {
        let twice = single.ploidy * 2.0;
        self.ploidy = single.ploidy;

        if ploidy_match(twice, single.uncertainty, double.ploidy, double.uncertainty) {
            self.link_ploidy_match = true;
            self.set_breakend(start, single.ploidy, true);
            self.set_breakend(end, single.ploidy, true);
            self.set_breakend(other, double.ploidy, true);
        } else if double.ploidy > twice {
            self.link_ploidy_match = false;
            self.set_breakend(start, single.ploidy, true);
            self.set_breakend(end, single.ploidy, true);
            self.set_breakend(other, double.ploidy, false);
        } else {
            self.ploidy = double.ploidy * 0.5;
            self.link_ploidy_match = false;
            self.set_breakend(start, single.ploidy, false);
            self.set_breakend(end, single.ploidy, false);
            self.set_breakend(other, double.ploidy, true);
        }
    }

    /// Cap the proposal at a chain's lower ploidy; no breakend is used up any more.
    pub fn set_lower_ploidy(&mut self, ploidy: f64) {
        self.ploidy = ploidy;
        self.link_ploidy_match = false;
        self.breakend_ploidies
            .iter_mut()
            .for_each(|b| b.exhausted = false);
    }

    fn set_breakend(&mut self, breakend: BreakendRef, ploidy: f64, exhausted: bool) {
        match self
            .breakend_ploidies
            .iter_mut()
            .find(|b| b.breakend == breakend)
        {
            Some(existing) => {
                existing.ploidy = ploidy;
                existing.exhausted = exhausted;
            }
            None => self.breakend_ploidies.push(BreakendPloidy {
                breakend,
                ploidy,
                exhausted,
            }),
        }
    }

    /// The breakend's own ploidy if one was recorded, else the proposal's.
    pub fn breakend_ploidy(&self, breakend: BreakendRef) -> f64 {
        self.breakend_ploidies
            .iter()
            .find(|b| b.breakend == breakend)
            .map_or(self.ploidy, |b| b.ploidy)
    }

    /// Whether this proposal is expected to use up the breakend.
    pub fn breakend_ploidy_matched(&self, breakend: BreakendRef) -> bool {
        self.breakend_ploidies
            .iter()
            .any(|b| b.breakend == breakend && b.exhausted)
    }

    pub fn is_valid(&self) -> bool {
        let shape_ok = match self.multi {
            None => self.links.len() == 1,
            Some(_) => self.links.len() == 2,
        };

        shape_ok && !self.rules.is_empty() && self.ploidy > 0.0
    }
}

impl Display for ProposedLinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.links.iter().map(|l| l.to_string()).collect();
        write!(
            f,
            "{} pairs({}) ploidy({}) match({})",
            self.top_rule(),
            pairs.join(", "),
            format_ploidy(self.ploidy),
            self.link_ploidy_match
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use svchain_core::models::{LinkType, SvType, Variant, VariantId, VariantSet};

    #[fixture]
    fn pair() -> LinkedPair {
        let variants = VariantSet::from(vec![
            Variant::from_positions(0, SvType::Del, "1", 100, 200).unwrap(),
            Variant::from_positions(1, SvType::Del, "1", 300, 400).unwrap(),
        ]);
        LinkedPair::from_variants(&variants, VariantId(0), false, VariantId(1), true, LinkType::TemplatedInsertion)
            .unwrap()
    }

    #[rstest]
    fn test_equal_breakend_ploidies(pair: LinkedPair) {
        let mut proposed = ProposedLinks::new(pair, ChainingRule::PloidyMatch);
        proposed.add_breakend_ploidies(pair.first(), 2.0, pair.second(), 2.2);

        assert!((proposed.ploidy() - 2.1).abs() < 1e-9);
        assert_eq!(proposed.link_ploidy_match(), true);
        assert_eq!(proposed.breakend_ploidy_matched(pair.first()), true);
        assert_eq!(proposed.breakend_ploidy_matched(pair.second()), true);
        assert_eq!(proposed.is_valid(), true);
    }

    #[rstest]
    fn test_unequal_breakend_ploidies(pair: LinkedPair) {
        let mut proposed = ProposedLinks::new(pair, ChainingRule::PloidyMax);
        proposed.add_breakend_ploidies(pair.first(), 4.0, pair.second(), 1.0);

        assert_eq!(proposed.ploidy(), 1.0);
        assert_eq!(proposed.link_ploidy_match(), false);
        assert_eq!(proposed.breakend_ploidy_matched(pair.first()), false);
        assert_eq!(proposed.breakend_ploidy_matched(pair.second()), true);
        assert_eq!(proposed.breakend_ploidy(pair.first()), 4.0);

        proposed.set_lower_ploidy(0.5);
        assert_eq!(proposed.ploidy(), 0.5);
        assert_eq!(proposed.breakend_ploidy_matched(pair.second()), false);
    }

    #[rstest]
    fn test_top_rule(pair: LinkedPair) {
        let mut proposed = ProposedLinks::new(pair, ChainingRule::Nearest);
        proposed.add_rule(ChainingRule::Assembly);
        proposed.add_rule(ChainingRule::Adjacent);
        proposed.add_rule(ChainingRule::Assembly);

        assert_eq!(proposed.top_rule(), ChainingRule::Assembly);
        assert_eq!(proposed.rules().len(), 3);
    }

    #[rstest]
    fn test_foldback_ploidies(pair: LinkedPair) {
        let fb_start = BreakendRef::start(VariantId(5));
        let fb_end = BreakendRef::end(VariantId(5));
        let other = BreakendRef::end(VariantId(0));

        let mut proposed = ProposedLinks::multi(
            pair,
            pair,
            ChainingRule::FoldbackSplit,
            MultiConnection::Foldback {
                target: Some(ChainId(0)),
                foldback_chain: None,
            },
        );

        // other carries twice the foldback
        proposed.add_foldback_breakends(
            fb_start,
            fb_end,
            PloidyEstimate::new(2.0, 0.2),
            other,
            PloidyEstimate::new(4.0, 0.2),
        );
        assert_eq!(proposed.ploidy(), 2.0);
        assert_eq!(proposed.link_ploidy_match(), true);
        assert_eq!(proposed.breakend_ploidy_matched(other), true);
        assert_eq!(proposed.target_chain(), Some(ChainId(0)));
        assert_eq!(proposed.is_valid(), true);

        // other carries much more than twice
        proposed.add_foldback_breakends(
            fb_start,
            fb_end,
            PloidyEstimate::new(1.0, 0.1),
            other,
            PloidyEstimate::new(6.0, 0.1),
        );
        assert_eq!(proposed.ploidy(), 1.0);
        assert_eq!(proposed.link_ploidy_match(), false);
        assert_eq!(proposed.breakend_ploidy_matched(fb_start), true);
        assert_eq!(proposed.breakend_ploidy_matched(other), false);

        // other carries less than twice
        proposed.add_foldback_breakends(
            fb_start,
            fb_end,
            PloidyEstimate::new(3.0, 0.1),
            other,
            PloidyEstimate::new(2.0, 0.1),
        );
        assert_eq!(proposed.ploidy(), 1.0);
        assert_eq!(proposed.breakend_ploidy_matched(fb_end), false);
        assert_eq!(proposed.breakend_ploidy_matched(other), true);
    }

    #[rstest]
    fn test_invalid_shapes(pair: LinkedPair) {
        // no ploidy set
        let proposed = ProposedLinks::new(pair, ChainingRule::Only);
        assert_eq!(proposed.is_valid(), false);

        let mut two_without_multi = ProposedLinks::new(pair, ChainingRule::Only);
        two_without_multi.links.push(pair);
        two_without_multi.add_breakend_ploidies(pair.first(), 1.0, pair.second(), 1.0);
        assert_eq!(two_without_multi.is_valid(), false);
    }
}
