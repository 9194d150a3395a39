use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::MIN_TEMPLATED_INSERTION_LENGTH;
use crate::errors::{ModelError, ModelResult};
use crate::models::rule::{ChainingRule, LinkReason};
use crate::models::variant::{BreakendEnd, BreakendRef, VariantId, VariantSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkType {
    TemplatedInsertion,
    DeletionBridge,
}

impl Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::TemplatedInsertion => write!(f, "TI"),
            LinkType::DeletionBridge => write!(f, "DB"),
        }
    }
}

///
/// A hypothesised direct adjacency between a breakend of one variant and a
/// breakend of another.
///
/// The pair is directional only in the sense that a chain walks from `first`
/// to `second`; [LinkedPair::matches] ignores direction.
///
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkedPair {
    first: BreakendRef,
    second: BreakendRef,
    first_is_sgl: bool,
    second_is_sgl: bool,
    link_type: LinkType,
    length: i64,
    assembled: bool,
    reason: Option<LinkReason>,
}

impl LinkedPair {
    pub fn new(
        variants: &VariantSet,
        first: BreakendRef,
        second: BreakendRef,
        link_type: LinkType,
    ) -> ModelResult<Self> {
        LinkedPair::with_min_ti_length(
            variants,
            first,
            second,
            link_type,
            MIN_TEMPLATED_INSERTION_LENGTH,
        )
    }

    ///
    /// Build a pair, converting templated insertions shorter than `min_ti_length`
    /// into deletion bridges.
    ///
    pub fn with_min_ti_length(
        variants: &VariantSet,
        first: BreakendRef,
        second: BreakendRef,
        link_type: LinkType,
        min_ti_length: u32,
    ) -> ModelResult<Self> {
        if first.variant == second.variant {
            return Err(ModelError::SameVariantLink(first, second));
        }

        let be1 = variants.breakend(first)?;
        let be2 = variants.breakend(second)?;

        if be1.chr != be2.chr {
            return Err(ModelError::ChromosomeMismatch(first, second));
        }

        let distance = (be2.position as i64 - be1.position as i64).abs();

        let (link_type, length) = match link_type {
            LinkType::TemplatedInsertion if distance >= min_ti_length as i64 => {
                (LinkType::TemplatedInsertion, distance)
            }
            _ => (LinkType::DeletionBridge, -distance - 1),
        };

        Ok(LinkedPair {
            first,
            second,
            first_is_sgl: variants.try_get(first.variant)?.is_sgl(),
            second_is_sgl: variants.try_get(second.variant)?.is_sgl(),
            link_type,
            length,
            assembled: false,
            reason: None,
        })
    }

    /// Shorthand for `new(.., BreakendRef::new(var1, end1), BreakendRef::new(var2, end2), ..)`.
    pub fn from_variants(
        variants: &VariantSet,
        var1: VariantId,
        first_link_on_start: bool,
        var2: VariantId,
        second_link_on_start: bool,
        link_type: LinkType,
    ) -> ModelResult<Self> {
        LinkedPair::new(
            variants,
            BreakendRef::new(var1, BreakendEnd::from_start(first_link_on_start)),
            BreakendRef::new(var2, BreakendEnd::from_start(second_link_on_start)),
            link_type,
        )
    }

    pub fn first(&self) -> BreakendRef {
        self.first
    }

    pub fn second(&self) -> BreakendRef {
        self.second
    }

    pub fn first_variant(&self) -> VariantId {
        self.first.variant
    }

    pub fn second_variant(&self) -> VariantId {
        self.second.variant
    }

    pub fn first_link_on_start(&self) -> bool {
        self.first.uses_start()
    }

    pub fn second_link_on_start(&self) -> bool {
        self.second.uses_start()
    }

    pub fn first_unlinked_on_start(&self) -> bool {
        !self.first.uses_start()
    }

    pub fn second_unlinked_on_start(&self) -> bool {
        !self.second.uses_start()
    }

    /// The first variant's other breakend, if it has one.
    pub fn first_unlinked(&self) -> Option<BreakendRef> {
        if self.first_is_sgl {
            None
        } else {
            Some(self.first.other())
        }
    }

    /// The second variant's other breakend, if it has one.
    pub fn second_unlinked(&self) -> Option<BreakendRef> {
        if self.second_is_sgl {
            None
        } else {
            Some(self.second.other())
        }
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn is_assembled(&self) -> bool {
        self.assembled
    }

    pub fn set_assembled(&mut self) {
        self.assembled = true;
    }

    pub fn assembled(mut self) -> Self {
        self.assembled = true;
        self
    }

    pub fn link_reason(&self) -> Option<LinkReason> {
        self.reason
    }

    pub fn set_link_reason(&mut self, rule: ChainingRule, index: usize) {
        self.reason = Some(LinkReason { rule, index });
    }

    /// Reverse the walking direction of the pair in place.
    pub fn switch(&mut self) {
        std::mem::swap(&mut self.first, &mut self.second);
        std::mem::swap(&mut self.first_is_sgl, &mut self.second_is_sgl);
    }

    pub fn switched(mut self) -> Self {
        self.switch();
        self
    }

    pub fn has_breakend(&self, breakend: BreakendRef) -> bool {
        self.first == breakend || self.second == breakend
    }

    pub fn has_variant(&self, variant: VariantId) -> bool {
        self.first.variant == variant || self.second.variant == variant
    }

    pub fn other_breakend(&self, breakend: BreakendRef) -> Option<BreakendRef> {
        if self.first == breakend {
            Some(self.second)
        } else if self.second == breakend {
            Some(self.first)
        } else {
            None
        }
    }

    /// Same two breakends, in either direction.
    pub fn matches(&self, other: &LinkedPair) -> bool {
        (self.first == other.first && self.second == other.second)
            || (self.first == other.second && self.second == other.first)
    }

    /// Same two variants, regardless of which breakends are joined.
    pub fn same_variants(&self, other: &LinkedPair) -> bool {
        (self.first.variant == other.first.variant && self.second.variant == other.second.variant)
            || (self.first.variant == other.second.variant
                && self.second.variant == other.first.variant)
    }

    /// True if the two pairs compete for a breakend.
    pub fn has_link_clash(&self, other: &LinkedPair) -> bool {
        self.has_breakend(other.first) || self.has_breakend(other.second)
    }
}

impl Display for LinkedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}<>{} {} len={}{}",
            self.first,
            self.second,
            self.link_type,
            self.length,
            if self.assembled { " asmb" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SvType, Variant};

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn variants() -> VariantSet {
        VariantSet::from(vec![
            Variant::from_positions(0, SvType::Dup, "1", 100, 200).unwrap(),
            Variant::from_positions(1, SvType::Dup, "1", 300, 400).unwrap(),
            Variant::from_positions(2, SvType::Del, "1", 100, 200).unwrap(),
            Variant::from_positions(3, SvType::Del, "1", 210, 400).unwrap(),
            Variant::from_positions(4, SvType::Del, "1", 250, 400).unwrap(),
            Variant::from_positions(5, SvType::Del, "2", 250, 400).unwrap(),
        ])
    }

    #[rstest]
    fn test_linked_pair_switching(variants: VariantSet) {
        let mut lp =
            LinkedPair::from_variants(&variants, VariantId(0), false, VariantId(1), true, LinkType::TemplatedInsertion)
                .unwrap();

        assert_eq!(lp.first_variant(), VariantId(0));
        assert_eq!(lp.second_variant(), VariantId(1));
        assert_eq!(lp.first_link_on_start(), false);
        assert_eq!(lp.second_link_on_start(), true);
        assert_eq!(lp.first_unlinked_on_start(), true);
        assert_eq!(lp.second_unlinked_on_start(), false);
        assert_eq!(lp.link_type(), LinkType::TemplatedInsertion);
        assert_eq!(lp.length(), 100);

        lp.switch();
        assert_eq!(lp.first_variant(), VariantId(1));
        assert_eq!(lp.second_variant(), VariantId(0));
        assert_eq!(lp.first_link_on_start(), true);
        assert_eq!(lp.second_link_on_start(), false);
    }

    #[rstest]
    fn test_short_ti_becomes_deletion_bridge(variants: VariantSet) {
        let lp2 =
            LinkedPair::from_variants(&variants, VariantId(2), false, VariantId(3), true, LinkType::TemplatedInsertion)
                .unwrap();
        assert_eq!(lp2.link_type(), LinkType::DeletionBridge);
        assert_eq!(lp2.length(), -11);

        let lp3 =
            LinkedPair::from_variants(&variants, VariantId(2), false, VariantId(4), true, LinkType::TemplatedInsertion)
                .unwrap();
        assert_eq!(lp3.link_type(), LinkType::TemplatedInsertion);
        assert_eq!(lp3.same_variants(&lp2), false);
        assert_eq!(lp3.has_link_clash(&lp2), true);
        assert_eq!(lp3.matches(&lp2), false);
    }

    #[rstest]
    fn test_matches_ignores_direction(variants: VariantSet) {
        let lp =
            LinkedPair::from_variants(&variants, VariantId(0), false, VariantId(1), true, LinkType::TemplatedInsertion)
                .unwrap();
        let reversed = lp.switched();
        assert_eq!(lp.matches(&reversed), true);
        assert_eq!(lp.same_variants(&reversed), true);

        let other_ends =
            LinkedPair::from_variants(&variants, VariantId(0), true, VariantId(1), false, LinkType::TemplatedInsertion)
                .unwrap();
        assert_eq!(lp.matches(&other_ends), false);
        assert_eq!(lp.same_variants(&other_ends), true);
        assert_eq!(lp.has_link_clash(&other_ends), false);
    }

    #[rstest]
    fn test_invalid_pairs(variants: VariantSet) {
        let same = LinkedPair::from_variants(&variants, VariantId(0), false, VariantId(0), true, LinkType::TemplatedInsertion);
        assert_eq!(
            same.err(),
            Some(ModelError::SameVariantLink(
                BreakendRef::end(VariantId(0)),
                BreakendRef::start(VariantId(0))
            ))
        );

        let cross_chr = LinkedPair::from_variants(&variants, VariantId(4), false, VariantId(5), true, LinkType::TemplatedInsertion);
        assert!(matches!(cross_chr, Err(ModelError::ChromosomeMismatch(_, _))));
    }

    #[rstest]
    fn test_other_breakend_and_reason(variants: VariantSet) {
        let mut lp =
            LinkedPair::from_variants(&variants, VariantId(0), false, VariantId(1), true, LinkType::TemplatedInsertion)
                .unwrap();
        assert_eq!(
            lp.other_breakend(BreakendRef::end(VariantId(0))),
            Some(BreakendRef::start(VariantId(1)))
        );
        assert_eq!(lp.other_breakend(BreakendRef::start(VariantId(0))), None);
        assert_eq!(lp.first_unlinked(), Some(BreakendRef::start(VariantId(0))));

        lp.set_link_reason(ChainingRule::Assembly, 4);
        assert_eq!(lp.link_reason().unwrap().index, 4);
        assert_eq!(lp.link_reason().unwrap().rule, ChainingRule::Assembly);
    }
}
