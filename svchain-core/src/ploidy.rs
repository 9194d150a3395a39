//! Ploidy comparison and blending.
//!
//! Every place a chain's ploidy is compared with a breakend's or a proposed
//! link's goes through [ploidy_match], and every place two estimates are merged
//! into one goes through [combine_uncertainty].

use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{
    MAX_COPY_NUMBER_DIFF, MAX_COPY_NUMBER_DIFF_PERC, MIN_PLOIDY_UNCERTAINTY,
    PLOIDY_MATCH_UNCERTAINTY_FACTOR,
};

///
/// A ploidy value with its standard error.
///
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PloidyEstimate {
    pub ploidy: f64,
    pub uncertainty: f64,
}

impl PloidyEstimate {
    pub fn new(ploidy: f64, uncertainty: f64) -> Self {
        PloidyEstimate {
            ploidy,
            uncertainty,
        }
    }

    pub fn matches(&self, other: &PloidyEstimate) -> bool {
        ploidy_match(self.ploidy, self.uncertainty, other.ploidy, other.uncertainty)
    }
}

impl Display for PloidyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} unc={:.1}", self.ploidy, self.uncertainty)
    }
}

///
/// Two copy numbers are equal if they differ by no more than 0.5 absolutely
/// or 15% relatively.
///
pub fn copy_numbers_equal(cn1: f64, cn2: f64) -> bool {
    let diff = (cn1 - cn2).abs();

    if diff <= MAX_COPY_NUMBER_DIFF {
        return true;
    }

    let larger = cn1.abs().max(cn2.abs());
    larger > 0.0 && diff / larger <= MAX_COPY_NUMBER_DIFF_PERC
}

///
/// Decide whether two ploidy estimates describe the same multiplicity.
///
/// The tolerance scales with the larger of the two uncertainties; values that
/// are copy-number equal always match.
///
pub fn ploidy_match(ploidy1: f64, uncertainty1: f64, ploidy2: f64, uncertainty2: f64) -> bool {
    let diff = (ploidy1 - ploidy2).abs();
    let tolerance = uncertainty1.max(uncertainty2) * PLOIDY_MATCH_UNCERTAINTY_FACTOR;

    diff <= tolerance || copy_numbers_equal(ploidy1, ploidy2)
}

///
/// Blend two estimates with inverse-variance weighting.
///
/// If either uncertainty is zero the weights are undefined, so the result is
/// the plain average with an uncertainty no lower than [MIN_PLOIDY_UNCERTAINTY].
///
pub fn combine_uncertainty(est1: PloidyEstimate, est2: PloidyEstimate) -> PloidyEstimate {
    if est1.uncertainty <= 0.0 || est2.uncertainty <= 0.0 {
        return PloidyEstimate::new(
            (est1.ploidy + est2.ploidy) * 0.5,
            est1.uncertainty
                .max(est2.uncertainty)
                .max(MIN_PLOIDY_UNCERTAINTY),
        );
    }

    let weight1 = 1.0 / (est1.uncertainty * est1.uncertainty);
    let weight2 = 1.0 / (est2.uncertainty * est2.uncertainty);
    let total_weight = weight1 + weight2;

    PloidyEstimate::new(
        (est1.ploidy * weight1 + est2.ploidy * weight2) / total_weight,
        (1.0 / total_weight).sqrt(),
    )
}

pub fn format_ploidy(ploidy: f64) -> String {
    format!("{:.2}", ploidy)
}
