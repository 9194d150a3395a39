//! The chain allocator: applies ranked link proposals to a cluster's chains.
//!
//! Each accepted proposal extends, splits, replicates or seeds chains, then
//! allocates ploidy to every breakend it touches, prunes candidate pairs that
//! can no longer be used, and merges chains whose ends now meet.
//!
//! Any internal inconsistency is fatal for the run: the allocator is marked
//! invalid and every later call fails with [ChainingError::InvalidRun].

use std::collections::VecDeque;
use std::f64::consts::SQRT_2;

use fxhash::FxHashMap;
use log::{debug, error, trace, warn};

use svchain_core::models::{BreakendEnd, BreakendRef, ChainingRule, LinkedPair, VariantId, VariantSet};
use svchain_core::ploidy::{PloidyEstimate, combine_uncertainty, format_ploidy, ploidy_match};

use crate::chain::{Chain, ChainId, reconcile_chains};
use crate::config::ChainingConfig;
use crate::connection::ConnectionState;
use crate::error::{ChainingError, ChainingResult};
use crate::proposed::{MultiConnection, ProposedLinks};

#[derive(Clone, Copy, Debug)]
struct ChainCandidate {
    index: usize,
    at_start: bool,
    /// The pair's breakend that is not yet in the chain.
    new_breakend: BreakendRef,
    ploidy_matched: bool,
}

enum ChainSelection {
    Existing { candidate: ChainCandidate, forced: bool },
    NewChain,
    Skip,
}

pub struct ChainAllocator<'a> {
    variants: &'a VariantSet,
    config: ChainingConfig,
    cluster_id: usize,

    chains: Vec<Chain>,
    next_chain_id: usize,

    connections: FxHashMap<VariantId, ConnectionState>,
    completed: Vec<ConnectionState>,

    possible_links: FxHashMap<BreakendRef, Vec<LinkedPair>>,
    complex_dup_candidates: FxHashMap<VariantId, Vec<LinkedPair>>,

    unique_pairs: Vec<LinkedPair>,
    skipped_pairs: Vec<LinkedPair>,

    link_index: usize,
    is_valid: bool,
    pair_skipped: bool,
}

impl<'a> ChainAllocator<'a> {
    pub fn new(variants: &'a VariantSet, config: ChainingConfig) -> Self {
        ChainAllocator {
            variants,
            config,
            cluster_id: 0,
            chains: Vec::new(),
            next_chain_id: 0,
            connections: FxHashMap::default(),
            completed: Vec::new(),
            possible_links: FxHashMap::default(),
            complex_dup_candidates: FxHashMap::default(),
            unique_pairs: Vec::new(),
            skipped_pairs: Vec::new(),
            link_index: 0,
            is_valid: true,
            pair_skipped: false,
        }
    }

    /// Reset all run state for a new cluster.
    pub fn initialise(&mut self, cluster_id: usize) {
        self.cluster_id = cluster_id;

        self.is_valid = true;
        self.link_index = 0;
        self.pair_skipped = false;
        self.next_chain_id = 0;

        self.chains.clear();
        self.unique_pairs.clear();
        self.skipped_pairs.clear();
        self.connections.clear();
        self.completed.clear();
        self.possible_links.clear();
        self.complex_dup_candidates.clear();
    }

    ///
    /// Create a connection state for every variant that can be chained.
    ///
    /// # Arguments
    /// - `has_replication`: whether any variant in the cluster is replicated; if not,
    ///   every breakend is treated as having a ploidy of exactly 1
    ///
    pub fn populate_connections(&mut self, has_replication: bool) {
        for variant in self.variants {
            if variant.ploidy <= self.config.min_chaining_ploidy {
                debug!(
                    "cluster({}) skipping variant({}) with low ploidy({} min={} max={})",
                    self.cluster_id,
                    variant.id,
                    format_ploidy(variant.ploidy),
                    format_ploidy(variant.ploidy_min()),
                    format_ploidy(variant.ploidy_max())
                );
                continue;
            }

            self.connections
                .insert(variant.id, ConnectionState::new(variant, !has_replication));
        }
    }

    /// Index a candidate pair under both of its breakends.
    pub fn add_possible_link(&mut self, pair: LinkedPair) {
        for breakend in [pair.first(), pair.second()] {
            let links = self.possible_links.entry(breakend).or_default();
            if !links.iter().any(|l| l.matches(&pair)) {
                links.push(pair);
            }
        }
    }

    pub fn set_possible_links(&mut self, pairs: impl IntoIterator<Item = LinkedPair>) {
        self.possible_links.clear();
        pairs.into_iter().for_each(|p| self.add_possible_link(p));
    }

    pub fn add_complex_dup_candidate(&mut self, variant: VariantId, pair: LinkedPair) {
        self.complex_dup_candidates
            .entry(variant)
            .or_default()
            .push(pair);
    }

    ///
    /// Apply a batch of proposals in order.
    ///
    /// Stops after the first applied multi-connection, since it changes chains the
    /// remaining proposals were ranked against. Returns whether anything was added;
    /// each applied proposal clears the skip list.
    ///
    pub fn process_proposed_links(
        &mut self,
        proposals: &mut VecDeque<ProposedLinks>,
    ) -> ChainingResult<bool> {
        let mut link_added = false;

        while let Some(proposed) = proposals.pop_front() {
            let is_multi = proposed.is_multi();
            let added = self.add_proposed_link(proposed)?;
            link_added |= added;

            if is_multi && added {
                break;
            }
        }

        Ok(link_added)
    }

    ///
    /// Apply one proposal.
    ///
    /// Returns `Ok(false)` when the proposal is skipped: it is malformed, refers
    /// to a chain that no longer exists, would close a chain, or is pinned to a
    /// chain whose ploidy disagrees. Errors are fatal for the run.
    ///
    pub fn add_proposed_link(&mut self, proposed: ProposedLinks) -> ChainingResult<bool> {
        if !self.is_valid {
            return Err(ChainingError::InvalidRun(self.cluster_id));
        }

        match self.apply_proposed_link(proposed) {
            Ok(added) => Ok(added),
            Err(err) => {
                error!("cluster({}) chaining halted: {}", self.cluster_id, err);
                self.is_valid = false;
                Err(err)
            }
        }
    }

    fn apply_proposed_link(&mut self, mut proposed: ProposedLinks) -> ChainingResult<bool> {
        if !proposed.is_valid() {
            error!(
                "cluster({}) skipping invalid proposed links: {}",
                self.cluster_id, proposed
            );
            return Ok(false);
        }

        if !self.references_live_chains(&proposed) {
            return Ok(false);
        }

        let top_rule = proposed.top_rule();
        let link_index = self.link_index;
        proposed
            .links
            .iter_mut()
            .for_each(|l| l.set_link_reason(top_rule, link_index));

        match proposed.multi_connection() {
            Some(multi) => match self.find_multi_target(&proposed, multi) {
                Some(index) => self.add_complex_links_to_chain(&proposed, multi, index)?,
                None => self.add_links_to_new_chain(&proposed)?,
            },
            None => match self.select_chain(&proposed)? {
                ChainSelection::Skip => return Ok(false),
                ChainSelection::Existing { candidate, forced } => {
                    self.add_link_to_chain(&mut proposed, candidate, forced)?
                }
                ChainSelection::NewChain => self.add_links_to_new_chain(&proposed)?,
            },
        }

        self.register_new_link(&proposed)?;
        self.link_index += 1;

        reconcile_chains(&mut self.chains);

        self.skipped_pairs.clear();
        Ok(true)
    }

    fn references_live_chains(&self, proposed: &ProposedLinks) -> bool {
        let target = proposed.target_chain();
        let foldback = proposed.foldback_chain();

        for id in [target, foldback].into_iter().flatten() {
            if self.chain_index(id).is_none() {
                warn!(
                    "cluster({}) proposed links({}) refer to chain({}) which no longer exists",
                    self.cluster_id, proposed, id
                );
                return false;
            }
        }

        if let Some(id) = target.filter(|t| Some(*t) == foldback) {
            warn!(
                "cluster({}) proposed links({}) fold chain({}) onto itself",
                self.cluster_id, proposed, id
            );
            return false;
        }

        true
    }

    fn chain_index(&self, id: ChainId) -> Option<usize> {
        self.chains.iter().position(|c| c.id == id)
    }

    fn next_chain_id(&mut self) -> ChainId {
        let id = ChainId(self.next_chain_id);
        self.next_chain_id += 1;
        id
    }

    fn variant_uncertainty(&self, variant: VariantId) -> f64 {
        self.variants
            .get(variant)
            .map_or(0.0, |v| v.ploidy_uncertainty)
    }

    fn find_multi_target(&self, proposed: &ProposedLinks, multi: MultiConnection) -> Option<usize> {
        if let Some(target) = multi.target() {
            return self.chain_index(target);
        }

        let (pair_a, pair_b) = (proposed.links[0], proposed.links[1]);

        match multi {
            MultiConnection::Foldback { foldback_chain, .. } => {
                let shared = [pair_a.first(), pair_a.second()]
                    .into_iter()
                    .find(|be| pair_b.has_breakend(*be))?;

                self.chains.iter().position(|c| {
                    Some(c.id) != foldback_chain
                        && (c.open_breakend(true) == Some(shared)
                            || c.open_breakend(false) == Some(shared))
                })
            }
            MultiConnection::ComplexDup { .. } => self.chains.iter().position(|c| {
                match (c.open_breakend(true), c.open_breakend(false)) {
                    (Some(start), Some(end)) => {
                        (pair_a.has_breakend(end) && pair_b.has_breakend(start))
                            || (pair_b.has_breakend(end) && pair_a.has_breakend(start))
                    }
                    _ => false,
                }
            }),
        }
    }

    fn add_complex_links_to_chain(
        &mut self,
        proposed: &ProposedLinks,
        multi: MultiConnection,
        index: usize,
    ) -> ChainingResult<()> {
        let new_ploidy = proposed.ploidy();
        let chain_ploidy = self.chains[index].ploidy();

        // the chain is halved below, so only the excess over twice the link is split off
        if !proposed.link_ploidy_match() && chain_ploidy > new_ploidy * 2.0 {
            let sibling_id = self.next_chain_id();
            let sibling = self.chains[index].split_off(sibling_id, chain_ploidy - new_ploidy * 2.0);

            debug!(
                "cluster({}) new chain({}) ploidy({}) from chain({}) ploidy({}) for multi-connection ploidy({})",
                self.cluster_id,
                sibling.id,
                format_ploidy(sibling.ploidy()),
                self.chains[index].id,
                format_ploidy(self.chains[index].ploidy()),
                format_ploidy(new_ploidy)
            );

            self.chains.push(sibling);
        }

        let (pair_a, pair_b) = (proposed.links[0], proposed.links[1]);
        let mut foldback_index = None;

        debug!(
            "cluster({}) duplicating chain({} links={}) for {}",
            self.cluster_id,
            self.chains[index].id,
            self.chains[index].link_count(),
            multi.splitting_rule()
        );

        match multi {
            MultiConnection::Foldback {
                foldback_chain: Some(foldback_id),
                ..
            } => {
                let fold_index = self
                    .chain_index(foldback_id)
                    .ok_or(ChainingError::InvalidRun(self.cluster_id))?;
                let foldback = self.chains[fold_index].clone();
                self.chains[index].foldback_on_chain(&foldback, pair_a, pair_b)?;
                foldback_index = Some(fold_index);
            }
            MultiConnection::Foldback { .. } => {
                self.chains[index].foldback_on_link(pair_a, pair_b)?;
            }
            MultiConnection::ComplexDup { .. } => {
                self.chains[index].duplicate_on_link(pair_a, pair_b)?;
            }
        }

        let chain = &mut self.chains[index];
        let estimate = chain.ploidy_estimate();
        chain.set_ploidy(PloidyEstimate::new(
            estimate.ploidy * 0.5,
            estimate.uncertainty / SQRT_2,
        ));

        for pair in &proposed.links {
            debug!(
                "cluster({}) index({}) method({}) adding linked pair({} ploidy={}) to existing chain({}) ploidy({})",
                self.cluster_id,
                self.link_index,
                proposed.top_rule(),
                pair,
                format_ploidy(new_ploidy),
                chain.id,
                chain.ploidy_estimate()
            );
        }

        if let Some(fold_index) = foldback_index {
            self.chains.remove(fold_index);
        }

        Ok(())
    }

    fn select_chain(&mut self, proposed: &ProposedLinks) -> ChainingResult<ChainSelection> {
        let pair = proposed.links[0];

        let mut forced: Option<ChainCandidate> = None;
        let mut forced_mismatch = false;
        let mut best_matched: Option<(ChainCandidate, f64)> = None;
        let mut best_unmatched: Option<(ChainCandidate, f64)> = None;
        let mut closes_chain = None;

        for (index, chain) in self.chains.iter().enumerate() {
            let open_start = chain.open_breakend(true).filter(|be| pair.has_breakend(*be));
            let open_end = chain.open_breakend(false).filter(|be| pair.has_breakend(*be));

            let Some(chain_breakend) = open_start.or(open_end) else {
                continue;
            };

            if chain.would_close(&pair) {
                closes_chain = Some(chain.id);
                break;
            }

            let Some(new_breakend) = pair.other_breakend(chain_breakend) else {
                continue;
            };

            let state = self.connections.get(&chain_breakend.variant).ok_or(
                ChainingError::MissingConnectionState {
                    cluster_id: self.cluster_id,
                    variant: chain_breakend.variant,
                },
            )?;

            let ploidy_matched = ploidy_match(
                proposed.ploidy(),
                chain.ploidy_uncertainty(),
                chain.ploidy(),
                chain.ploidy_uncertainty(),
            );

            let candidate = ChainCandidate {
                index,
                at_start: open_start.is_some(),
                new_breakend,
                ploidy_matched,
            };

            // the variant's other breakend only connects into this chain
            let opposite = chain_breakend.end.opposite();
            if state.is_exhausted(opposite) && state.connections(opposite).len() <= 1 {
                if proposed.link_ploidy_match() && ploidy_matched {
                    if forced.is_none() {
                        trace!(
                            "cluster({}) pair({}) links breakend({}) to chain({}) as only exhausted connection",
                            self.cluster_id,
                            pair,
                            chain_breakend,
                            chain.id
                        );
                        forced = Some(candidate);
                    }
                    continue;
                }

                if !ploidy_matched {
                    forced_mismatch = true;
                }
            }

            if ploidy_matched {
                let diff = (chain.ploidy() - proposed.ploidy()).abs();
                if best_matched.is_none_or(|(_, best)| diff < best) {
                    best_matched = Some((candidate, diff));
                }
            } else if !proposed.link_ploidy_match()
                && best_unmatched.is_none_or(|(_, best)| chain.ploidy() > best)
            {
                best_unmatched = Some((candidate, chain.ploidy()));
            }
        }

        if let Some(chain_id) = closes_chain {
            trace!(
                "cluster({}) skipping linked pair({}) which would close chain({})",
                self.cluster_id,
                pair,
                chain_id
            );
            self.add_skipped_pair(pair);
            return Ok(ChainSelection::Skip);
        }

        if let Some(candidate) = forced {
            return Ok(ChainSelection::Existing {
                candidate,
                forced: true,
            });
        }

        if let Some((candidate, _)) = best_matched.or(best_unmatched) {
            return Ok(ChainSelection::Existing {
                candidate,
                forced: false,
            });
        }

        if forced_mismatch {
            trace!(
                "cluster({}) skipping linked pair({}) on ploidy mismatch with its only chain",
                self.cluster_id,
                pair
            );
            self.add_skipped_pair(pair);
            return Ok(ChainSelection::Skip);
        }

        Ok(ChainSelection::NewChain)
    }

    fn add_link_to_chain(
        &mut self,
        proposed: &mut ProposedLinks,
        candidate: ChainCandidate,
        forced: bool,
    ) -> ChainingResult<()> {
        let pair = proposed.links[0];
        let proposed_ploidy = proposed.ploidy();
        let chain_ploidy = self.chains[candidate.index].ploidy();
        let mut matched = forced || candidate.ploidy_matched;

        if !matched && chain_ploidy > proposed_ploidy {
            let sibling_id = self.next_chain_id();
            let sibling =
                self.chains[candidate.index].split_off(sibling_id, chain_ploidy - proposed_ploidy);

            debug!(
                "cluster({}) new chain({}) ploidy({}) from chain({}) ploidy({}) for new link ploidy({})",
                self.cluster_id,
                sibling.id,
                format_ploidy(sibling.ploidy()),
                self.chains[candidate.index].id,
                format_ploidy(self.chains[candidate.index].ploidy()),
                format_ploidy(proposed_ploidy)
            );

            self.chains.push(sibling);
            matched = true;
        }

        let new_uncertainty = self.variant_uncertainty(candidate.new_breakend.variant);
        let chain = &mut self.chains[candidate.index];

        if matched {
            let contribution = if proposed.link_ploidy_match() {
                proposed.breakend_ploidy(candidate.new_breakend)
            } else {
                proposed_ploidy
            };

            chain.set_ploidy(combine_uncertainty(
                PloidyEstimate::new(contribution, new_uncertainty),
                chain.ploidy_estimate(),
            ));
        } else {
            // the chain can only carry its own ploidy through the new link
            proposed.set_lower_ploidy(chain.ploidy());
        }

        chain.extend(pair, candidate.at_start)?;

        debug!(
            "cluster({}) index({}) method({}) adding linked pair({} ploidy={}) to existing chain({}) ploidy({})",
            self.cluster_id,
            self.link_index,
            proposed.top_rule(),
            pair,
            format_ploidy(proposed.ploidy()),
            chain.id,
            chain.ploidy_estimate()
        );

        Ok(())
    }

    fn add_links_to_new_chain(&mut self, proposed: &ProposedLinks) -> ChainingResult<()> {
        let first_pair = proposed.links[0];
        let uncertainty1 = self.variant_uncertainty(first_pair.first_variant());
        let uncertainty2 = self.variant_uncertainty(first_pair.second_variant());

        let estimate = if !proposed.link_ploidy_match() || proposed.is_multi() {
            combine_uncertainty(
                PloidyEstimate::new(proposed.ploidy(), uncertainty1),
                PloidyEstimate::new(proposed.ploidy(), uncertainty2),
            )
        } else {
            combine_uncertainty(
                PloidyEstimate::new(proposed.breakend_ploidy(first_pair.first()), uncertainty1),
                PloidyEstimate::new(proposed.breakend_ploidy(first_pair.second()), uncertainty2),
            )
        };

        // a second pair joins the first pair's chain if it can, otherwise it seeds its
        // own chain and reconciliation joins them later
        let mut current: Option<usize> = None;

        for pair in &proposed.links {
            if let Some(index) = current {
                let chain = &mut self.chains[index];

                if chain.can_extend_start(pair) {
                    chain.extend(*pair, true)?;
                } else if chain.can_extend_end(pair) {
                    chain.extend(*pair, false)?;
                } else {
                    current = None;
                }
            }

            if current.is_none() {
                let mut chain = Chain::new(self.next_chain_id());
                chain.extend(*pair, true)?;
                chain.set_ploidy(estimate);
                self.chains.push(chain);
                current = Some(self.chains.len() - 1);
            }

            if let Some(index) = current {
                debug!(
                    "cluster({}) index({}) method({}) adding linked pair({} ploidy={}) to new chain({}) ploidy({})",
                    self.cluster_id,
                    self.link_index,
                    proposed.top_rule(),
                    pair,
                    format_ploidy(proposed.ploidy()),
                    self.chains[index].id,
                    self.chains[index].ploidy_estimate()
                );
            }
        }

        Ok(())
    }

    fn register_new_link(&mut self, proposed: &ProposedLinks) -> ChainingResult<()> {
        let can_use_max =
            proposed.top_rule() == ChainingRule::Assembly && self.config.assembly_uses_max_ploidy;
        let mut exhausted: Vec<BreakendRef> = Vec::new();

        for pair in &proposed.links {
            for breakend in [pair.first(), pair.second()] {
                if exhausted.contains(&breakend) {
                    continue;
                }

                let Some(other_pair_breakend) = pair.other_breakend(breakend) else {
                    continue;
                };

                let state = self.connections.get_mut(&breakend.variant).ok_or(
                    ChainingError::MissingConnectionState {
                        cluster_id: self.cluster_id,
                        variant: breakend.variant,
                    },
                )?;

                if state.is_exhausted_vs_max(breakend.end) {
                    error!(
                        "cluster({}) breakend({}) already exhausted: {} with proposed links({})",
                        self.cluster_id, breakend, state, proposed
                    );
                    return Err(ChainingError::BreakendExhausted {
                        cluster_id: self.cluster_id,
                        breakend,
                    });
                }

                state.record_connection(breakend.end, other_pair_breakend);

                let breakend_exhausted = if proposed.breakend_ploidy_matched(breakend) {
                    // this link uses up whatever the breakend has left, within its upper bound
                    let amount = state
                        .unlinked_ploidy(breakend.end)
                        .max(proposed.breakend_ploidy(breakend))
                        .min(state.max_unlinked_ploidy(breakend.end));
                    state.add_allocation(breakend.end, amount)?;
                    true
                } else {
                    state.add_allocation(breakend.end, proposed.ploidy())?;
                    if can_use_max {
                        state.is_exhausted_vs_max(breakend.end)
                    } else {
                        state.is_exhausted(breakend.end)
                    }
                };

                let is_sgl = state.is_sgl;

                if breakend_exhausted {
                    exhausted.push(breakend);
                }

                if !is_sgl {
                    self.remove_opposite_links(breakend.other(), other_pair_breakend);
                }
            }

            // unique pairs guard against conflicting links such as start-start and end-end
            if !self.matches_existing_pair(pair) {
                self.unique_pairs.push(*pair);
            }
        }

        for breakend in exhausted {
            if let Some(state) = self.connections.get(&breakend.variant) {
                let opposite = breakend.end.opposite();
                let other_exhausted = if can_use_max {
                    state.is_exhausted_vs_max(opposite)
                } else {
                    state.is_exhausted(opposite)
                };

                if other_exhausted {
                    self.check_complete(breakend.variant);
                    self.complex_dup_candidates.remove(&breakend.variant);
                }
            }

            self.remove_possible_links(breakend);
        }

        Ok(())
    }

    fn check_complete(&mut self, variant: VariantId) {
        let complete = self
            .connections
            .get(&variant)
            .is_some_and(|s| s.is_complete());

        if complete {
            if let Some(state) = self.connections.remove(&variant) {
                trace!(
                    "cluster({}) variant({}) both breakends exhausted",
                    self.cluster_id,
                    state
                );
                self.completed.push(state);
            }
        }
    }

    /// Drop every candidate through an exhausted breakend, from both index entries.
    fn remove_possible_links(&mut self, breakend: BreakendRef) {
        let Some(links) = self.possible_links.remove(&breakend) else {
            return;
        };

        for link in links {
            let Some(other) = link.other_breakend(breakend) else {
                continue;
            };

            if let Some(other_links) = self.possible_links.get_mut(&other) {
                other_links.retain(|l| !l.matches(&link));
                if other_links.is_empty() {
                    self.possible_links.remove(&other);
                }
            }
        }
    }

    ///
    /// After linking breakend X of one variant to breakend Y of another, the pair
    /// joining their opposite breakends can no longer be part of the same walk.
    ///
    fn remove_opposite_links(&mut self, opposite: BreakendRef, pair_other: BreakendRef) {
        // a complex duplication around a single variant legitimately uses both
        if self.complex_dup_candidates.contains_key(&opposite.variant)
            || self.complex_dup_candidates.contains_key(&pair_other.variant)
        {
            return;
        }

        let pair_other_opposite = pair_other.other();

        if let Some(links) = self.possible_links.get_mut(&opposite) {
            if let Some(pos) = links
                .iter()
                .position(|l| l.has_breakend(opposite) && l.has_breakend(pair_other_opposite))
            {
                links.remove(pos);
            }

            if links.is_empty() {
                self.possible_links.remove(&opposite);
            }
        }
    }

    fn add_skipped_pair(&mut self, pair: LinkedPair) {
        self.pair_skipped = true;
        if !self.has_skipped_pair(&pair) {
            self.skipped_pairs.push(pair);
        }
    }

    /// The breakend's remaining expected ploidy, or 0 once exhausted.
    pub fn unlinked_ploidy(&self, breakend: BreakendRef) -> f64 {
        match self.connections.get(&breakend.variant) {
            Some(state) if !state.is_exhausted(breakend.end) => state.unlinked_ploidy(breakend.end),
            _ => 0.0,
        }
    }

    ///
    /// Like [ChainAllocator::unlinked_ploidy], but once the expected ploidy is used
    /// up the headroom to the breakend's upper bound is still offered.
    ///
    pub fn max_unlinked_ploidy(&self, breakend: BreakendRef) -> f64 {
        let Some(state) = self.connections.get(&breakend.variant) else {
            return 0.0;
        };

        if !state.is_exhausted(breakend.end) {
            state.unlinked_ploidy(breakend.end)
        } else if !state.is_exhausted_vs_max(breakend.end) {
            state.max_unlinked_ploidy(breakend.end)
        } else {
            0.0
        }
    }

    ///
    /// The ploidy a breakend can offer once chains ending on it are taken into account.
    ///
    /// A breakend that is the open end of chains can give at most the larger of the
    /// biggest such chain and whatever is left unchained.
    ///
    pub fn chain_limited_ploidy(&self, breakend: BreakendRef) -> f64 {
        let Some(state) = self.connections.get(&breakend.variant) else {
            return 0.0;
        };

        let unlinked = self.unlinked_ploidy(breakend);
        if unlinked == 0.0 || !state.has_connections() {
            return unlinked;
        }

        let chains = self.chains_with_open_breakend(breakend);
        if chains.is_empty() {
            return unlinked;
        }

        if chains.len() == 1 && state.is_exhausted(breakend.end.opposite()) {
            return chains[0].ploidy();
        }

        let mut max_chain_ploidy: f64 = 0.0;
        let mut total_chain_ploidy = 0.0;

        for chain in &chains {
            for at_start in [true, false] {
                if chain.open_breakend(at_start) == Some(breakend) {
                    total_chain_ploidy += chain.ploidy();
                    max_chain_ploidy = max_chain_ploidy.max(chain.ploidy());
                }
            }
        }

        if total_chain_ploidy > 0.0 {
            let unchained = (unlinked - total_chain_ploidy).max(0.0);
            max_chain_ploidy.max(unchained)
        } else {
            unlinked
        }
    }

    /// Ploidy still free on both breakends of a variant.
    pub fn unlinked_variant_ploidy(&self, variant: VariantId) -> f64 {
        let Some(state) = self.connections.get(&variant) else {
            return 0.0;
        };

        if state.is_sgl {
            return self.unlinked_ploidy(BreakendRef::start(variant));
        }

        if state.is_exhausted(BreakendEnd::Start) || state.is_exhausted(BreakendEnd::End) {
            return 0.0;
        }

        state
            .unlinked_ploidy(BreakendEnd::Start)
            .min(state.unlinked_ploidy(BreakendEnd::End))
    }

    pub fn chains_with_open_breakend(&self, breakend: BreakendRef) -> Vec<&Chain> {
        self.chains
            .iter()
            .filter(|c| {
                c.open_breakend(true) == Some(breakend) || c.open_breakend(false) == Some(breakend)
            })
            .collect()
    }

    pub fn matches_existing_pair(&self, pair: &LinkedPair) -> bool {
        self.unique_pairs.iter().any(|p| p.matches(pair))
    }

    pub fn has_skipped_pair(&self, pair: &LinkedPair) -> bool {
        self.skipped_pairs.iter().any(|p| p.matches(pair))
    }

    /// Filter out pairs that are temporarily unusable until another link is added.
    pub fn remove_skipped_pairs(&self, pairs: &mut Vec<LinkedPair>) {
        if self.skipped_pairs.is_empty() {
            return;
        }
        pairs.retain(|p| !self.has_skipped_pair(p));
    }

    pub fn pair_skipped(&self) -> bool {
        self.pair_skipped
    }

    pub fn clear_pair_skipped(&mut self) {
        self.pair_skipped = false;
    }

    pub fn possible_links(&self) -> &FxHashMap<BreakendRef, Vec<LinkedPair>> {
        &self.possible_links
    }

    pub fn possible_links_for(&self, breakend: BreakendRef) -> &[LinkedPair] {
        self.possible_links
            .get(&breakend)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn complex_dup_candidates(&self) -> &FxHashMap<VariantId, Vec<LinkedPair>> {
        &self.complex_dup_candidates
    }

    pub fn connection_state(&self, variant: VariantId) -> Option<&ConnectionState> {
        self.connections.get(&variant)
    }

    pub fn completed_connections(&self) -> &[ConnectionState] {
        &self.completed
    }

    pub fn unique_pairs(&self) -> &[LinkedPair] {
        &self.unique_pairs
    }

    pub fn skipped_pairs(&self) -> &[LinkedPair] {
        &self.skipped_pairs
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn cluster_id(&self) -> usize {
        self.cluster_id
    }

    pub fn link_index(&self) -> usize {
        self.link_index
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn variants(&self) -> &'a VariantSet {
        self.variants
    }

    pub fn config(&self) -> &ChainingConfig {
        &self.config
    }

    /// Hand back the chains, unless the run was invalidated.
    pub fn finish(self) -> ChainingResult<Vec<Chain>> {
        if !self.is_valid {
            return Err(ChainingError::InvalidRun(self.cluster_id));
        }
        Ok(self.chains)
    }
}
