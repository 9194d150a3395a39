pub mod linked_pair;
pub mod rule;
pub mod variant;

// re-export for cleaner imports
pub use self::linked_pair::{LinkType, LinkedPair};
pub use self::rule::{ChainingRule, LinkReason};
pub use self::variant::{Breakend, BreakendEnd, BreakendRef, SvType, Variant, VariantId, VariantSet};
