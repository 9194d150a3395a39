//! # svchain-core
//!
//! Core data models for structural-variant chaining.
//!
//! ## Main Components
//!
//! - **`Variant`** / **`Breakend`**: an SV call with its ploidy estimate and its one or two breakends
//! - **`VariantSet`**: the read-only arena of variants for one cluster, addressed by `VariantId`
//! - **`BreakendRef`**: a cheap handle to one end of a variant
//! - **`LinkedPair`**: a candidate adjacency between breakends of two different variants
//! - **`ChainingRule`**: the ranking rule that proposed a link
//! - **`ploidy`**: matching and blending of uncertain copy-number values
//!
//! ## Example
//!
//! ```rust
//! use svchain_core::models::{LinkType, LinkedPair, SvType, Variant, VariantId, VariantSet};
//!
//! let variants = VariantSet::from(vec![
//!     Variant::from_positions(0, SvType::Del, "1", 1100, 1200).unwrap(),
//!     Variant::from_positions(1, SvType::Del, "1", 1300, 1400).unwrap(),
//! ]);
//!
//! let pair = LinkedPair::from_variants(
//!     &variants,
//!     VariantId(0),
//!     false,
//!     VariantId(1),
//!     true,
//!     LinkType::TemplatedInsertion,
//! )
//! .unwrap();
//!
//! assert_eq!(pair.length(), 100);
//! ```
//!
pub mod errors;
pub mod models;
pub mod ploidy;

// re-exports
pub use errors::{ModelError, ModelResult};
pub use ploidy::PloidyEstimate;

pub mod consts {
    /// Templated insertions shorter than this are treated as deletion bridges.
    pub const MIN_TEMPLATED_INSERTION_LENGTH: u32 = 30;

    /// Variants at or below this ploidy are not chained.
    pub const MIN_CHAINING_PLOIDY: f64 = 0.05;

    pub const MAX_COPY_NUMBER_DIFF: f64 = 0.5;
    pub const MAX_COPY_NUMBER_DIFF_PERC: f64 = 0.15;

    pub const PLOIDY_MATCH_UNCERTAINTY_FACTOR: f64 = 1.0;
    pub const MIN_PLOIDY_UNCERTAINTY: f64 = 0.1;

    /// Slack used when comparing allocated ploidy against a breakend's bounds.
    pub const PLOIDY_EPSILON: f64 = 0.01;
}
