use std::collections::VecDeque;

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use svchain_core::models::{ChainingRule, LinkedPair, VariantSet};
use svchain_core::ploidy::ploidy_match;

use crate::allocator::ChainAllocator;
use crate::assembly::find_assembled_pairs;
use crate::chain::Chain;
use crate::config::ChainingConfig;
use crate::connection::ConnectionState;
use crate::error::{ChainingError, ChainingResult};
use crate::proposed::ProposedLinks;

///
/// Decides which links to try next, given the allocator's current state.
///
/// Returning no proposals ends the run.
///
pub trait LinkProposer {
    fn propose(&mut self, allocator: &ChainAllocator) -> Vec<ProposedLinks>;

    /// Pairs to index as candidates before the run starts.
    fn candidate_pairs(&self) -> Vec<LinkedPair> {
        Vec::new()
    }
}

///
/// Proposes assembly-confirmed pairs one at a time, shortest first, with
/// ploidy taken from what each breakend still has available.
///
pub struct AssemblyLinkProposer {
    pairs: Vec<LinkedPair>,
}

impl AssemblyLinkProposer {
    pub fn new(pairs: Vec<LinkedPair>) -> Self {
        AssemblyLinkProposer { pairs }
    }

    pub fn from_variants(variants: &VariantSet, config: &ChainingConfig) -> Self {
        AssemblyLinkProposer::new(find_assembled_pairs(
            variants,
            config.min_templated_insertion_length,
        ))
    }
}

impl LinkProposer for AssemblyLinkProposer {
    fn propose(&mut self, allocator: &ChainAllocator) -> Vec<ProposedLinks> {
        let mut pairs = self.pairs.clone();
        allocator.remove_skipped_pairs(&mut pairs);

        for pair in pairs {
            if allocator.matches_existing_pair(&pair) {
                continue;
            }

            let ploidy1 = allocator.max_unlinked_ploidy(pair.first());
            let ploidy2 = allocator.max_unlinked_ploidy(pair.second());

            if ploidy1 <= 0.0 || ploidy2 <= 0.0 {
                continue;
            }

            let mut proposed = ProposedLinks::new(pair, ChainingRule::Assembly);
            proposed.add_breakend_ploidies(pair.first(), ploidy1, pair.second(), ploidy2);

            // an averaged ploidy must still fit the smaller breakend
            let limit = ploidy1.min(ploidy2);
            if proposed.ploidy() > limit {
                proposed.set_lower_ploidy(limit);
            }

            return vec![proposed];
        }

        Vec::new()
    }

    fn candidate_pairs(&self) -> Vec<LinkedPair> {
        self.pairs.clone()
    }
}

///
/// One analysis group of variants, chained independently of every other cluster.
///
#[derive(Clone, Debug)]
pub struct Cluster {
    pub id: usize,
    pub variants: VariantSet,
    /// Whether any variant carries more than a single copy. Without replication
    /// every breakend is chained with a ploidy of 1.
    pub has_replication: bool,
    pub candidate_pairs: Vec<LinkedPair>,
}

impl Cluster {
    pub fn new(id: usize, variants: VariantSet) -> Self {
        let has_replication = variants
            .iter()
            .any(|v| !ploidy_match(v.ploidy, v.ploidy_uncertainty, 1.0, 0.0));

        Cluster {
            id,
            variants,
            has_replication,
            candidate_pairs: Vec::new(),
        }
    }

    pub fn with_candidate_pairs(mut self, pairs: Vec<LinkedPair>) -> Self {
        self.candidate_pairs = pairs;
        self
    }
}

///
/// The outcome of chaining one cluster.
///
#[derive(Debug, Serialize)]
pub struct ClusterChains {
    pub cluster_id: usize,
    pub chains: Vec<Chain>,
    pub unique_pairs: Vec<LinkedPair>,
    pub completed: Vec<ConnectionState>,
    pub link_count: usize,
}

///
/// Run a proposer against a fresh allocator until it has nothing more to offer.
///
/// # Arguments
/// - `cluster`: the variants and candidate pairs to chain
/// - `proposer`: the link ranking policy
/// - `config`: chaining settings
///
pub fn chain_cluster<P: LinkProposer>(
    cluster: &Cluster,
    proposer: &mut P,
    config: &ChainingConfig,
) -> ChainingResult<ClusterChains> {
    let mut allocator = ChainAllocator::new(&cluster.variants, config.clone());
    allocator.initialise(cluster.id);
    allocator.populate_connections(cluster.has_replication);
    allocator.set_possible_links(
        cluster
            .candidate_pairs
            .iter()
            .copied()
            .chain(proposer.candidate_pairs()),
    );

    for round in 0..config.max_proposal_rounds {
        let mut proposals: VecDeque<ProposedLinks> = proposer.propose(&allocator).into();

        if proposals.is_empty() {
            debug!(
                "cluster({}) chaining complete after {} rounds",
                cluster.id, round
            );
            return collect_chains(allocator);
        }

        allocator.clear_pair_skipped();
        let added = allocator.process_proposed_links(&mut proposals)?;

        if !added && !allocator.pair_skipped() {
            debug!(
                "cluster({}) proposer made no progress in round {}",
                cluster.id, round
            );
            return collect_chains(allocator);
        }
    }

    warn!(
        "cluster({}) proposer still active after {} rounds",
        cluster.id, config.max_proposal_rounds
    );

    Err(ChainingError::ProposalLimit {
        cluster_id: cluster.id,
        rounds: config.max_proposal_rounds,
    })
}

fn collect_chains(allocator: ChainAllocator) -> ChainingResult<ClusterChains> {
    let cluster_id = allocator.cluster_id();
    let unique_pairs = allocator.unique_pairs().to_vec();
    let completed = allocator.completed_connections().to_vec();
    let link_count = allocator.link_index();
    let chains = allocator.finish()?;

    Ok(ClusterChains {
        cluster_id,
        chains,
        unique_pairs,
        completed,
        link_count,
    })
}

///
/// Chain many clusters in parallel, each with its own proposer.
///
/// Results keep the order of `clusters`; a failed cluster does not affect the others.
///
pub fn chain_clusters_with<P, F>(
    clusters: &[Cluster],
    config: &ChainingConfig,
    make_proposer: F,
) -> Vec<ChainingResult<ClusterChains>>
where
    P: LinkProposer,
    F: Fn(&Cluster) -> P + Sync,
{
    clusters
        .par_iter()
        .map(|cluster| {
            let mut proposer = make_proposer(cluster);
            chain_cluster(cluster, &mut proposer, config)
        })
        .collect()
}

/// Chain many clusters in parallel using assembled links only.
pub fn chain_clusters(
    clusters: &[Cluster],
    config: &ChainingConfig,
) -> Vec<ChainingResult<ClusterChains>> {
    chain_clusters_with(clusters, config, |cluster| {
        AssemblyLinkProposer::from_variants(&cluster.variants, config)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use svchain_core::models::{BreakendEnd, BreakendRef, LinkType, SvType, Variant, VariantId};

    /// DELs of 100 bases, 100 apart, each end assembled to the next variant's start.
    fn assembled_dels(count: usize) -> VariantSet {
        let variants = (0..count)
            .map(|i| {
                let start = 100 + 200 * i as u32;
                let mut variant =
                    Variant::from_positions(i, SvType::Del, "1", start, start + 100).unwrap();
                if i > 0 {
                    variant = variant
                        .with_assembly(BreakendEnd::Start, &format!("asm{}", i - 1))
                        .unwrap();
                }
                if i + 1 < count {
                    variant = variant
                        .with_assembly(BreakendEnd::End, &format!("asm{}", i))
                        .unwrap();
                }
                variant
            })
            .collect::<Vec<_>>();

        VariantSet::from(variants)
    }

    #[fixture]
    fn config() -> ChainingConfig {
        ChainingConfig::default()
    }

    #[rstest]
    fn test_cluster_detects_replication() {
        let plain = Cluster::new(0, assembled_dels(3));
        assert_eq!(plain.has_replication, false);

        let mut variants: Vec<Variant> = assembled_dels(3).iter().cloned().collect();
        variants[1] = variants[1].clone().with_ploidy(2.0, 0.2).unwrap();
        let replicated = Cluster::new(1, VariantSet::from(variants));
        assert_eq!(replicated.has_replication, true);
    }

    #[rstest]
    fn test_chain_cluster_links_assembled_dels(config: ChainingConfig) {
        let cluster = Cluster::new(7, assembled_dels(4));
        let mut proposer = AssemblyLinkProposer::from_variants(&cluster.variants, &config);

        let result = chain_cluster(&cluster, &mut proposer, &config).unwrap();

        assert_eq!(result.cluster_id, 7);
        assert_eq!(result.link_count, 3);
        assert_eq!(result.unique_pairs.len(), 3);
        assert_eq!(result.chains.len(), 1);

        let chain = &result.chains[0];
        assert_eq!(chain.link_count(), 3);
        assert!(chain.is_consistent());
        assert_eq!(chain.variants().len(), 4);

        // the two inner variants are used at both ends
        assert!(
            result
                .completed
                .iter()
                .any(|state| state.variant == VariantId(1))
        );
        assert!(
            result
                .completed
                .iter()
                .any(|state| state.variant == VariantId(2))
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["cluster_id"], 7);
        assert_eq!(json["chains"].as_array().unwrap().len(), 1);
        assert_eq!(json["chains"][0]["links"].as_array().unwrap().len(), 3);
    }

    #[rstest]
    fn test_chain_clusters_keeps_input_order(config: ChainingConfig) {
        let clusters: Vec<Cluster> = (0..6)
            .map(|i| Cluster::new(i, assembled_dels(i + 1)))
            .collect();

        let results = chain_clusters(&clusters, &config);
        assert_eq!(results.len(), 6);

        for (i, result) in results.into_iter().enumerate() {
            let result = result.unwrap();
            assert_eq!(result.cluster_id, i);
            assert_eq!(result.link_count, i);
            assert_eq!(result.chains.len(), if i == 0 { 0 } else { 1 });
        }
    }

    /// Links the first two variants, then keeps asking for the link that would close the chain.
    struct ClosingProposer {
        variants: VariantSet,
        round: usize,
    }

    impl LinkProposer for ClosingProposer {
        fn propose(&mut self, _allocator: &ChainAllocator) -> Vec<ProposedLinks> {
            let (first, second) = if self.round == 0 {
                (BreakendRef::end(VariantId(0)), BreakendRef::start(VariantId(1)))
            } else {
                (BreakendRef::start(VariantId(0)), BreakendRef::end(VariantId(1)))
            };
            self.round += 1;

            let pair =
                LinkedPair::new(&self.variants, first, second, LinkType::TemplatedInsertion)
                    .unwrap();
            let mut proposed = ProposedLinks::new(pair, ChainingRule::Nearest);
            proposed.add_breakend_ploidies(first, 1.0, second, 1.0);
            vec![proposed]
        }
    }

    #[rstest]
    fn test_stuck_proposer_hits_round_limit() {
        let config = ChainingConfig {
            max_proposal_rounds: 5,
            ..Default::default()
        };
        let cluster = Cluster::new(3, assembled_dels(2));
        let mut proposer = ClosingProposer {
            variants: cluster.variants.clone(),
            round: 0,
        };

        let result = chain_cluster(&cluster, &mut proposer, &config);

        assert!(matches!(
            result,
            Err(ChainingError::ProposalLimit {
                cluster_id: 3,
                rounds: 5
            })
        ));
        assert_eq!(proposer.round, 5);
    }
}
