use thiserror::Error;

use crate::models::{BreakendRef, VariantId};

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("Invalid ploidy for variant {0}: ploidy={1}, uncertainty={2}")]
    InvalidPloidy(VariantId, f64, f64),

    #[error("Variant {0} is a single breakend and has no end breakend")]
    MissingBreakend(VariantId),

    #[error("Unknown variant: {0}")]
    UnknownVariant(VariantId),

    #[error("Cannot link two breakends of the same variant: {0} and {1}")]
    SameVariantLink(BreakendRef, BreakendRef),

    #[error("Breakends {0} and {1} are on different chromosomes")]
    ChromosomeMismatch(BreakendRef, BreakendRef),

    #[error("Variant type {0} needs explicit breakends")]
    ExplicitBreakendsRequired(String),
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;
