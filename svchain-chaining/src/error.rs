use thiserror::Error;

use svchain_core::ModelError;
use svchain_core::models::{BreakendRef, LinkedPair, VariantId};

use crate::chain::ChainId;
use crate::config::ChainingConfigError;

#[derive(Error, Debug)]
pub enum ChainingError {
    #[error("Cluster {cluster_id}: no connection state for variant {variant}")]
    MissingConnectionState { cluster_id: usize, variant: VariantId },

    #[error(
        "Breakend {breakend} cannot take ploidy {amount:.2}: allocated {allocated:.2} of max {max:.2}"
    )]
    AllocationExceedsMax {
        breakend: BreakendRef,
        amount: f64,
        allocated: f64,
        max: f64,
    },

    #[error("Cluster {cluster_id}: breakend {breakend} is already exhausted against its maximum ploidy")]
    BreakendExhausted {
        cluster_id: usize,
        breakend: BreakendRef,
    },

    #[error("Chain {chain}: pair {pair} does not continue an open end")]
    InvalidChainLink { chain: ChainId, pair: LinkedPair },

    #[error("Cluster {0}: chaining run is invalid")]
    InvalidRun(usize),

    #[error("Cluster {cluster_id}: proposer still active after {rounds} rounds")]
    ProposalLimit { cluster_id: usize, rounds: usize },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ChainingConfigError),
}

pub type ChainingResult<T> = std::result::Result<T, ChainingError>;
