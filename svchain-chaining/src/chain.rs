use std::fmt::{self, Display};

use log::debug;
use serde::{Deserialize, Serialize};

use svchain_core::models::{BreakendRef, LinkedPair, VariantId};
use svchain_core::ploidy::{PloidyEstimate, combine_uncertainty, format_ploidy, ploidy_match};

use crate::error::{ChainingError, ChainingResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub usize);

impl Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// An ordered walk of linked pairs with one ploidy for the whole path.
///
/// Consecutive links meet at the two breakends of one variant:
/// `links[i].second().other() == links[i + 1].first()`. The chain's open ends
/// are the breakends left unlinked at either extremity.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub id: ChainId,
    links: Vec<LinkedPair>,
    ploidy: f64,
    ploidy_uncertainty: f64,
}

impl Chain {
    pub fn new(id: ChainId) -> Self {
        Chain {
            id,
            links: Vec::new(),
            ploidy: 0.0,
            ploidy_uncertainty: 0.0,
        }
    }

    pub fn links(&self) -> &[LinkedPair] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn ploidy(&self) -> f64 {
        self.ploidy
    }

    pub fn ploidy_uncertainty(&self) -> f64 {
        self.ploidy_uncertainty
    }

    pub fn ploidy_estimate(&self) -> PloidyEstimate {
        PloidyEstimate::new(self.ploidy, self.ploidy_uncertainty)
    }

    pub fn set_ploidy(&mut self, estimate: PloidyEstimate) {
        self.ploidy = estimate.ploidy;
        self.ploidy_uncertainty = estimate.uncertainty;
    }

    pub fn first_link(&self) -> Option<&LinkedPair> {
        self.links.first()
    }

    pub fn last_link(&self) -> Option<&LinkedPair> {
        self.links.last()
    }

    ///
    /// The unlinked breakend at the start or end of the chain, if there is one.
    ///
    /// An SGL at an extremity leaves that end closed.
    ///
    pub fn open_breakend(&self, at_start: bool) -> Option<BreakendRef> {
        if at_start {
            self.links.first().and_then(|l| l.first_unlinked())
        } else {
            self.links.last().and_then(|l| l.second_unlinked())
        }
    }

    pub fn first_link_open_on_start(&self) -> bool {
        self.links
            .first()
            .is_some_and(|l| l.first_unlinked_on_start())
    }

    pub fn last_link_open_on_start(&self) -> bool {
        self.links
            .last()
            .is_some_and(|l| l.second_unlinked_on_start())
    }

    pub fn can_extend_start(&self, pair: &LinkedPair) -> bool {
        self.open_breakend(true)
            .is_some_and(|open| pair.has_breakend(open))
    }

    pub fn can_extend_end(&self, pair: &LinkedPair) -> bool {
        self.open_breakend(false)
            .is_some_and(|open| pair.has_breakend(open))
    }

    ///
    /// Joining the chain's two open ends would turn it into a cycle.
    ///
    pub fn would_close(&self, pair: &LinkedPair) -> bool {
        match (self.open_breakend(true), self.open_breakend(false)) {
            (Some(start), Some(end)) => {
                start != end && pair.has_breakend(start) && pair.has_breakend(end)
            }
            _ => false,
        }
    }

    ///
    /// Add a pair at one end of the chain, switching it as needed so the walk
    /// continues through the open breakend.
    ///
    pub fn extend(&mut self, pair: LinkedPair, at_start: bool) -> ChainingResult<()> {
        if self.links.is_empty() {
            self.links.push(pair);
            return Ok(());
        }

        let open = self
            .open_breakend(at_start)
            .ok_or(ChainingError::InvalidChainLink {
                chain: self.id,
                pair,
            })?;

        if !pair.has_breakend(open) {
            return Err(ChainingError::InvalidChainLink {
                chain: self.id,
                pair,
            });
        }

        if at_start {
            let pair = if pair.second() == open { pair } else { pair.switched() };
            self.links.insert(0, pair);
        } else {
            let pair = if pair.first() == open { pair } else { pair.switched() };
            self.links.push(pair);
        }

        Ok(())
    }

    ///
    /// Count the links, and how many of them are assembled, on the walk between
    /// two linked breakends.
    ///
    /// Returns (0, 0) if the chain does not run from one to the other.
    ///
    pub fn path_between(&self, breakend_a: BreakendRef, breakend_b: BreakendRef) -> (usize, usize) {
        self.directed_path(breakend_a, breakend_b)
            .or_else(|| self.directed_path(breakend_b, breakend_a))
            .unwrap_or((0, 0))
    }

    fn directed_path(&self, from: BreakendRef, to: BreakendRef) -> Option<(usize, usize)> {
        let start = self.links.iter().position(|l| l.first() == from)?;
        let end = start + self.links[start..].iter().position(|l| l.second() == to)?;

        let path = &self.links[start..=end];
        Some((path.len(), path.iter().filter(|l| l.is_assembled()).count()))
    }

    /// Reverse the walking direction.
    pub fn reverse(&mut self) {
        self.links.reverse();
        self.links.iter_mut().for_each(|l| l.switch());
    }

    ///
    /// Copy this chain into a sibling carrying `excess` ploidy and reduce this
    /// chain by the same amount.
    ///
    pub fn split_off(&mut self, new_id: ChainId, excess: f64) -> Chain {
        self.ploidy -= excess;

        Chain {
            id: new_id,
            links: self.links.clone(),
            ploidy: excess,
            ploidy_uncertainty: self.ploidy_uncertainty,
        }
    }

    ///
    /// Fold a split-off sibling back in, summing ploidy. Fails if the two chains
    /// no longer walk the same links.
    ///
    pub fn rejoin(&mut self, sibling: Chain) -> bool {
        if !self.same_links(&sibling) {
            return false;
        }

        self.ploidy += sibling.ploidy;
        true
    }

    fn same_links(&self, other: &Chain) -> bool {
        if self.links.len() != other.links.len() {
            return false;
        }

        let forward = self
            .links
            .iter()
            .zip(other.links.iter())
            .all(|(a, b)| a.first() == b.first() && a.second() == b.second());

        forward
            || self
                .links
                .iter()
                .zip(other.links.iter().rev())
                .all(|(a, b)| a.first() == b.second() && a.second() == b.first())
    }

    ///
    /// Traverse the chain twice, out through `pair_a`/`pair_b` at the open end and
    /// back in at the open start, modelling a duplication of the whole path.
    ///
    pub fn duplicate_on_link(&mut self, pair_a: LinkedPair, pair_b: LinkedPair) -> ChainingResult<()> {
        let invalid = |pair| ChainingError::InvalidChainLink {
            chain: self.id,
            pair,
        };

        let open_start = self.open_breakend(true).ok_or(invalid(pair_a))?;
        let open_end = self.open_breakend(false).ok_or(invalid(pair_a))?;

        let (to_end, to_start) = if pair_a.has_breakend(open_end) && pair_b.has_breakend(open_start) {
            (pair_a, pair_b)
        } else if pair_b.has_breakend(open_end) && pair_a.has_breakend(open_start) {
            (pair_b, pair_a)
        } else {
            return Err(invalid(pair_a));
        };

        let to_end = if to_end.first() == open_end { to_end } else { to_end.switched() };
        let to_start = if to_start.second() == open_start { to_start } else { to_start.switched() };

        // the pairs must meet at the two breakends of the duplicated variant
        if to_end.second().other() != to_start.first() {
            return Err(invalid(to_start));
        }

        let original = self.links.clone();
        self.links.push(to_end);
        self.links.push(to_start);
        self.links.extend(original);

        Ok(())
    }

    ///
    /// Fold the chain back on itself through a foldback variant whose two
    /// breakends both link to the same open breakend of this chain.
    ///
    pub fn foldback_on_link(&mut self, pair_a: LinkedPair, pair_b: LinkedPair) -> ChainingResult<()> {
        let (open_end, pair_a, pair_b) = self.orient_for_fold(pair_a, pair_b)?;

        let out = if pair_a.first() == open_end { pair_a } else { pair_a.switched() };
        let back = if pair_b.second() == open_end { pair_b } else { pair_b.switched() };

        if out.second().other() != back.first() {
            return Err(ChainingError::InvalidChainLink {
                chain: self.id,
                pair: back,
            });
        }

        self.append_folded(&[out, back]);
        Ok(())
    }

    ///
    /// Fold the chain back on itself through another chain whose two open ends
    /// both link to the same open breakend of this chain.
    ///
    pub fn foldback_on_chain(
        &mut self,
        foldback: &Chain,
        pair_a: LinkedPair,
        pair_b: LinkedPair,
    ) -> ChainingResult<()> {
        let (open_end, pair_a, pair_b) = self.orient_for_fold(pair_a, pair_b)?;

        let out = if pair_a.first() == open_end { pair_a } else { pair_a.switched() };
        let back = if pair_b.second() == open_end { pair_b } else { pair_b.switched() };

        let mut inner = foldback.clone();
        if inner.open_breakend(true) != Some(out.second()) {
            inner.reverse();
        }

        if inner.open_breakend(true) != Some(out.second())
            || inner.open_breakend(false) != Some(back.first())
        {
            return Err(ChainingError::InvalidChainLink {
                chain: self.id,
                pair: back,
            });
        }

        let mut middle = Vec::with_capacity(inner.links.len() + 2);
        middle.push(out);
        middle.extend(inner.links);
        middle.push(back);

        self.append_folded(&middle);
        Ok(())
    }

    // both fold pairs must touch the same open breakend; reverse so it is the open end
    fn orient_for_fold(
        &mut self,
        pair_a: LinkedPair,
        pair_b: LinkedPair,
    ) -> ChainingResult<(BreakendRef, LinkedPair, LinkedPair)> {
        let touches = |open: Option<BreakendRef>| {
            open.is_some_and(|o| pair_a.has_breakend(o) && pair_b.has_breakend(o))
        };

        if !touches(self.open_breakend(false)) {
            if touches(self.open_breakend(true)) {
                self.reverse();
            } else {
                return Err(ChainingError::InvalidChainLink {
                    chain: self.id,
                    pair: pair_a,
                });
            }
        }

        let open_end = self
            .open_breakend(false)
            .ok_or(ChainingError::InvalidChainLink {
                chain: self.id,
                pair: pair_a,
            })?;

        Ok((open_end, pair_a, pair_b))
    }

    fn append_folded(&mut self, middle: &[LinkedPair]) {
        let mut reversed = self.links.clone();
        reversed.reverse();
        reversed.iter_mut().for_each(|l| l.switch());

        self.links.extend_from_slice(middle);
        self.links.extend(reversed);
    }

    /// Append another chain whose open start continues this chain's open end.
    fn append_chain(&mut self, other: Chain) {
        self.links.extend(other.links);
    }

    pub fn is_consistent(&self) -> bool {
        self.ploidy > 0.0
            && self
                .links
                .windows(2)
                .all(|w| w[0].second().other() == w[1].first())
    }

    /// Variants in walk order, without repeats.
    pub fn variants(&self) -> Vec<VariantId> {
        let mut variants = Vec::new();
        for link in &self.links {
            for variant in [link.first_variant(), link.second_variant()] {
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }
        }
        variants
    }

    pub fn has_variant(&self, variant: VariantId) -> bool {
        self.links.iter().any(|l| l.has_variant(variant))
    }

    pub fn has_link(&self, pair: &LinkedPair) -> bool {
        self.links.iter().any(|l| l.matches(pair))
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chain({}) links({}) ploidy({} unc={})",
            self.id,
            self.links.len(),
            format_ploidy(self.ploidy),
            format_ploidy(self.ploidy_uncertainty)
        )
    }
}

///
/// Merge chains whose open ends are the two breakends of the same variant and
/// whose ploidies agree, until no more merges are possible.
///
/// The merged chain keeps the lower id. Returns true if anything merged.
///
pub fn reconcile_chains(chains: &mut Vec<Chain>) -> bool {
    let mut merged_any = false;

    while let Some((i, j, i_at_start, j_at_start)) = find_mergeable(chains) {
        let mut second = chains.remove(j);
        let first = &mut chains[i];

        // i walks into the shared variant, j walks out of it
        if i_at_start {
            first.reverse();
        }
        if !j_at_start {
            second.reverse();
        }

        debug!(
            "merging chain({}) ploidy({}) into chain({}) ploidy({})",
            second.id,
            format_ploidy(second.ploidy),
            first.id,
            format_ploidy(first.ploidy)
        );

        let estimate = combine_uncertainty(first.ploidy_estimate(), second.ploidy_estimate());
        first.append_chain(second);
        first.set_ploidy(estimate);

        merged_any = true;
    }

    merged_any
}

fn find_mergeable(chains: &[Chain]) -> Option<(usize, usize, bool, bool)> {
    for i in 0..chains.len() {
        for j in (i + 1)..chains.len() {
            let (a, b) = (&chains[i], &chains[j]);

            if !ploidy_match(a.ploidy, a.ploidy_uncertainty, b.ploidy, b.ploidy_uncertainty) {
                continue;
            }

            for a_at_start in [true, false] {
                let Some(open_a) = a.open_breakend(a_at_start) else {
                    continue;
                };

                for b_at_start in [true, false] {
                    if b.open_breakend(b_at_start) == Some(open_a.other()) {
                        return Some((i, j, a_at_start, b_at_start));
                    }
                }
            }
        }
    }

    None
}
