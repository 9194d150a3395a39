use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

///
/// The ranking rule that proposed a link, in descending priority.
///
/// The ordering is meaningful: a lower variant outranks a higher one, so
/// `rules.iter().min()` gives the top rule of a proposal.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChainingRule {
    Assembly,
    Only,
    FoldbackSplit,
    ComplexDupSplit,
    Foldback,
    PloidyMatch,
    AdjacentMatch,
    Adjacent,
    PloidySupport,
    PloidyMax,
    Nearest,
}

impl ChainingRule {
    /// Multi-connection rules replicate an existing chain segment.
    pub fn is_splitting(&self) -> bool {
        matches!(self, ChainingRule::FoldbackSplit | ChainingRule::ComplexDupSplit)
    }
}

impl Display for ChainingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainingRule::Assembly => "ASSEMBLY",
            ChainingRule::Only => "ONLY",
            ChainingRule::FoldbackSplit => "FOLDBACK_SPLIT",
            ChainingRule::ComplexDupSplit => "COMP_DUP_SPLIT",
            ChainingRule::Foldback => "FOLDBACK",
            ChainingRule::PloidyMatch => "PLOIDY_MATCH",
            ChainingRule::AdjacentMatch => "ADJACENT_MATCH",
            ChainingRule::Adjacent => "ADJACENT",
            ChainingRule::PloidySupport => "PLOIDY_SUPPORT",
            ChainingRule::PloidyMax => "PLOIDY_MAX",
            ChainingRule::Nearest => "NEAREST",
        };
        write!(f, "{}", name)
    }
}

/// Why and when a pair was added to a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkReason {
    pub rule: ChainingRule,
    /// Run-wide index of the allocation that added the pair.
    pub index: usize,
}
