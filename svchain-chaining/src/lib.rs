//! # svchain-chaining
//!
//! Builds derivative-chromosome chains from ranked links between structural-variant breakends.
//!
//! A proposer ranks candidate links and hands them to the [`ChainAllocator`], which decides
//! which chain each link joins, keeps every breakend's allocated ploidy within its estimate,
//! splits chains whose ploidy is only partly explained by a new link, and merges chains that
//! turn out to share a variant.
//!
//! ## Main Components
//!
//! - **`ChainAllocator`**: applies proposed links to the chains of one cluster
//! - **`Chain`**: an ordered walk of linked pairs with its own ploidy estimate
//! - **`ConnectionState`**: per-variant allocated ploidy and connections
//! - **`ProposedLinks`**: one ranked proposal, a single pair or a foldback / complex duplication
//! - **`LinkProposer`**: the seam for link-ranking policies; `AssemblyLinkProposer` is the built-in one
//! - **`chain_clusters`**: chain many clusters in parallel
//!
//! ## Example
//!
//! ```rust
//! use svchain_chaining::{ChainingConfig, Cluster, chain_clusters};
//! use svchain_core::models::{BreakendEnd, SvType, Variant, VariantSet};
//!
//! let variants = VariantSet::from(vec![
//!     Variant::from_positions(0, SvType::Del, "1", 1100, 1200)
//!         .unwrap()
//!         .with_assembly(BreakendEnd::End, "asm1")
//!         .unwrap(),
//!     Variant::from_positions(1, SvType::Del, "1", 1300, 1400)
//!         .unwrap()
//!         .with_assembly(BreakendEnd::Start, "asm1")
//!         .unwrap(),
//! ]);
//!
//! let clusters = vec![Cluster::new(0, variants)];
//! let results = chain_clusters(&clusters, &ChainingConfig::default());
//!
//! let chains = &results[0].as_ref().unwrap().chains;
//! assert_eq!(chains.len(), 1);
//! assert_eq!(chains[0].link_count(), 1);
//! ```
//!
pub mod allocator;
pub mod assembly;
pub mod chain;
pub mod config;
pub mod connection;
pub mod error;
pub mod finder;
pub mod proposed;

// re-exports
pub use allocator::ChainAllocator;
pub use assembly::find_assembled_pairs;
pub use chain::{Chain, ChainId, reconcile_chains};
pub use config::{ChainingConfig, ChainingConfigError};
pub use connection::ConnectionState;
pub use error::{ChainingError, ChainingResult};
pub use finder::{
    AssemblyLinkProposer, Cluster, ClusterChains, LinkProposer, chain_cluster, chain_clusters,
    chain_clusters_with,
};
pub use proposed::{MultiConnection, ProposedLinks};
