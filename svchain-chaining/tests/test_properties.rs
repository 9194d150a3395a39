use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rstest::rstest;

use svchain_chaining::{Chain, ChainAllocator, ChainId, ChainingConfig, ProposedLinks};
use svchain_core::models::{
    BreakendRef, ChainingRule, LinkType, LinkedPair, SvType, Variant, VariantId, VariantSet,
};
use svchain_core::ploidy::PloidyEstimate;

const EPSILON: f64 = 0.011;

/// A row of DELs 100 bases apart with random replicated ploidy.
fn random_dels(rng: &mut StdRng, count: usize) -> VariantSet {
    let variants = (0..count)
        .map(|i| {
            let start = 1000 + 200 * i as u32;
            let ploidy = [1.0, 2.0, 3.0][rng.gen_range(0..3usize)];
            Variant::from_positions(i, SvType::Del, "1", start, start + 100)
                .unwrap()
                .with_ploidy(ploidy, 0.4)
                .unwrap()
        })
        .collect::<Vec<_>>();

    VariantSet::from(variants)
}

/// Every end-to-start pair between two different variants.
fn candidate_pairs(variants: &VariantSet) -> Vec<LinkedPair> {
    let mut pairs = Vec::new();
    for i in 0..variants.len() {
        for j in 0..variants.len() {
            if i != j {
                pairs.push(
                    LinkedPair::new(
                        variants,
                        BreakendRef::end(VariantId(i)),
                        BreakendRef::start(VariantId(j)),
                        LinkType::TemplatedInsertion,
                    )
                    .unwrap(),
                );
            }
        }
    }
    pairs
}

fn propose(allocator: &ChainAllocator, pair: LinkedPair) -> Option<ProposedLinks> {
    let ploidy1 = allocator.max_unlinked_ploidy(pair.first());
    let ploidy2 = allocator.max_unlinked_ploidy(pair.second());
    if ploidy1 <= 0.0 || ploidy2 <= 0.0 {
        return None;
    }

    let mut proposed = ProposedLinks::new(pair, ChainingRule::PloidyMax);
    proposed.add_breakend_ploidies(pair.first(), ploidy1, pair.second(), ploidy2);
    if proposed.ploidy() > ploidy1.min(ploidy2) {
        proposed.set_lower_ploidy(ploidy1.min(ploidy2));
    }
    Some(proposed)
}

/// Allocated ploidy and ceiling for a breakend, whether or not its variant has completed.
fn allocation(allocator: &ChainAllocator, breakend: BreakendRef) -> (f64, f64) {
    let state = allocator
        .connection_state(breakend.variant)
        .or_else(|| {
            allocator
                .completed_connections()
                .iter()
                .find(|s| s.variant == breakend.variant)
        })
        .unwrap();

    (state.allocated(breakend.end), state.max_unlinked_ploidy(breakend.end))
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(42)]
#[case(2024)]
fn test_random_runs_respect_ploidy_ceilings(#[case] seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = rng.gen_range(3..8);
    let variants = random_dels(&mut rng, count);
    let pairs = candidate_pairs(&variants);

    let mut allocator = ChainAllocator::new(&variants, ChainingConfig::default());
    allocator.initialise(seed as usize);
    allocator.populate_connections(true);
    allocator.set_possible_links(pairs.iter().copied());

    for _ in 0..40 {
        let pair = *pairs.choose(&mut rng).unwrap();
        let Some(proposed) = propose(&allocator, pair) else {
            continue;
        };

        let before = [pair.first(), pair.second()].map(|be| allocation(&allocator, be));

        if allocator.add_proposed_link(proposed).unwrap() {
            for (i, be) in [pair.first(), pair.second()].into_iter().enumerate() {
                let (allocated_before, ceiling) = before[i];
                let (allocated_after, _) = allocation(&allocator, be);
                let added = allocated_after - allocated_before;

                assert!(added > 0.0);
                assert!(added <= ceiling + EPSILON, "{} took {} over ceiling {}", be, added, ceiling);
            }
        }

        for chain in allocator.chains() {
            assert!(chain.is_consistent(), "{}", chain);
        }
    }

    assert_eq!(allocator.is_valid(), true);
}

#[rstest]
#[case(3)]
#[case(11)]
#[case(99)]
fn test_unique_pairs_are_never_duplicated(#[case] seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let variants = random_dels(&mut rng, 6);
    let mut pairs = candidate_pairs(&variants);
    pairs.shuffle(&mut rng);

    let mut allocator = ChainAllocator::new(&variants, ChainingConfig::default());
    allocator.initialise(0);
    allocator.populate_connections(true);

    // every pair goes in twice
    for pair in pairs.iter().chain(pairs.iter()) {
        if let Some(proposed) = propose(&allocator, *pair) {
            allocator.add_proposed_link(proposed).unwrap();
        }
    }

    let unique = allocator.unique_pairs();
    for (i, a) in unique.iter().enumerate() {
        for b in &unique[i + 1..] {
            assert!(!a.matches(b), "{} recorded twice", a);
        }
    }
}

#[rstest]
#[case(5)]
#[case(17)]
#[case(256)]
fn test_chains_are_never_closed(#[case] seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = rng.gen_range(4..8);
    let variants = random_dels(&mut rng, count);
    let pairs = candidate_pairs(&variants);

    let mut allocator = ChainAllocator::new(&variants, ChainingConfig::default());
    allocator.initialise(0);
    allocator.populate_connections(true);

    for _ in 0..30 {
        let pair = *pairs.choose(&mut rng).unwrap();
        if let Some(proposed) = propose(&allocator, pair) {
            allocator.add_proposed_link(proposed).unwrap();
        }

        // try to close every chain through its two open ends
        let closing: Vec<LinkedPair> = allocator
            .chains()
            .iter()
            .filter_map(|chain| {
                let start = chain.open_breakend(true)?;
                let end = chain.open_breakend(false)?;
                if start.variant == end.variant {
                    return None;
                }
                LinkedPair::new(&variants, start, end, LinkType::TemplatedInsertion).ok()
            })
            .collect();

        for pair in closing {
            let links_before: Vec<usize> = allocator.chains().iter().map(Chain::link_count).collect();

            if let Some(proposed) = propose(&allocator, pair) {
                assert_eq!(allocator.add_proposed_link(proposed).unwrap(), false);
            }

            let links_after: Vec<usize> = allocator.chains().iter().map(Chain::link_count).collect();
            assert_eq!(links_before, links_after);
        }
    }
}

#[rstest]
#[case(8)]
#[case(31)]
#[case(64)]
fn test_split_then_rejoin_restores_chain(#[case] seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let variants = random_dels(&mut rng, 5);

    let mut chain = Chain::new(ChainId(0));
    for i in 0..4 {
        let pair = LinkedPair::new(
            &variants,
            BreakendRef::end(VariantId(i)),
            BreakendRef::start(VariantId(i + 1)),
            LinkType::TemplatedInsertion,
        )
        .unwrap();
        chain.extend(pair, false).unwrap();
    }

    let ploidy = rng.gen_range(1.0..8.0);
    chain.set_ploidy(PloidyEstimate::new(ploidy, 0.3));
    let original = chain.clone();

    let excess = rng.gen_range(0.1..ploidy);
    let mut sibling = chain.split_off(ChainId(1), excess);
    assert!((chain.ploidy() + sibling.ploidy() - ploidy).abs() < 1e-9);

    // walking direction does not matter for a rejoin
    if rng.gen_bool(0.5) {
        sibling.reverse();
    }

    assert_eq!(chain.rejoin(sibling), true);
    assert_eq!(chain.links(), original.links());
    assert!((chain.ploidy() - ploidy).abs() < 1e-9);
}
