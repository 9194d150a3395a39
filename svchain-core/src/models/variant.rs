use std::fmt::{self, Display};
use std::slice::Iter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

///
/// Stable index of a variant inside its [VariantSet].
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariantId(pub usize);

impl Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SvType {
    Del,
    Dup,
    Inv,
    Ins,
    Bnd,
    Sgl,
}

impl Display for SvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SvType::Del => "DEL",
            SvType::Dup => "DUP",
            SvType::Inv => "INV",
            SvType::Ins => "INS",
            SvType::Bnd => "BND",
            SvType::Sgl => "SGL",
        };
        write!(f, "{}", name)
    }
}

/// Which of a variant's two breakends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BreakendEnd {
    Start,
    End,
}

impl BreakendEnd {
    pub fn from_start(is_start: bool) -> Self {
        if is_start {
            BreakendEnd::Start
        } else {
            BreakendEnd::End
        }
    }

    pub fn is_start(self) -> bool {
        self == BreakendEnd::Start
    }

    pub fn opposite(self) -> Self {
        match self {
            BreakendEnd::Start => BreakendEnd::End,
            BreakendEnd::End => BreakendEnd::Start,
        }
    }

    pub fn index(self) -> usize {
        match self {
            BreakendEnd::Start => 0,
            BreakendEnd::End => 1,
        }
    }
}

///
/// Lightweight handle to one breakend: the owning variant plus which end.
///
/// Linked pairs and chains hold these rather than the breakend data itself,
/// which stays owned by the [Variant].
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BreakendRef {
    pub variant: VariantId,
    pub end: BreakendEnd,
}

impl BreakendRef {
    pub fn new(variant: VariantId, end: BreakendEnd) -> Self {
        BreakendRef { variant, end }
    }

    pub fn start(variant: VariantId) -> Self {
        BreakendRef::new(variant, BreakendEnd::Start)
    }

    pub fn end(variant: VariantId) -> Self {
        BreakendRef::new(variant, BreakendEnd::End)
    }

    pub fn uses_start(&self) -> bool {
        self.end.is_start()
    }

    /// The other breakend of the same variant. For an SGL this does not exist.
    pub fn other(&self) -> BreakendRef {
        BreakendRef::new(self.variant, self.end.opposite())
    }
}

impl Display for BreakendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.uses_start() { "s" } else { "e" };
        write!(f, "{}:{}", self.variant, side)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Breakend {
    pub chr: String,
    pub position: u32,
    /// 1 if the retained sequence lies below the break, -1 if above.
    pub orientation: i8,
    /// Assembly contigs this breakend was called from.
    pub assembly_ids: Vec<String>,
}

impl Breakend {
    pub fn new(chr: &str, position: u32, orientation: i8) -> Self {
        Breakend {
            chr: chr.to_string(),
            position,
            orientation,
            assembly_ids: Vec::new(),
        }
    }

    pub fn shares_assembly(&self, other: &Breakend) -> bool {
        self.assembly_ids
            .iter()
            .any(|id| other.assembly_ids.contains(id))
    }
}

impl Display for Breakend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chr, self.position, self.orientation)
    }
}

///
/// One structural-variant call with its copy-number estimate.
///
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Variant {
    pub id: VariantId,
    pub sv_type: SvType,
    pub start: Breakend,
    pub end: Option<Breakend>,
    pub ploidy: f64,
    pub ploidy_uncertainty: f64,
}

impl Variant {
    ///
    /// Create a variant from explicit breakends.
    ///
    /// An SGL must have no end breakend and every other type must have one.
    ///
    pub fn new(
        id: usize,
        sv_type: SvType,
        start: Breakend,
        end: Option<Breakend>,
        ploidy: f64,
        ploidy_uncertainty: f64,
    ) -> ModelResult<Self> {
        let id = VariantId(id);

        if !(ploidy >= 0.0) || !(ploidy_uncertainty >= 0.0) {
            return Err(ModelError::InvalidPloidy(id, ploidy, ploidy_uncertainty));
        }

        if (sv_type == SvType::Sgl) != end.is_none() {
            return Err(ModelError::MissingBreakend(id));
        }

        Ok(Variant {
            id,
            sv_type,
            start,
            end,
            ploidy,
            ploidy_uncertainty,
        })
    }

    ///
    /// Create an intra-chromosomal variant using the orientations standard for its type:
    /// DEL and INS (1, -1), DUP (-1, 1), INV (1, 1).
    ///
    /// Ploidy defaults to 1 with no uncertainty.
    ///
    pub fn from_positions(
        id: usize,
        sv_type: SvType,
        chr: &str,
        start: u32,
        end: u32,
    ) -> ModelResult<Self> {
        let (start_orient, end_orient) = match sv_type {
            SvType::Del | SvType::Ins => (1, -1),
            SvType::Dup => (-1, 1),
            SvType::Inv => (1, 1),
            SvType::Bnd | SvType::Sgl => {
                return Err(ModelError::ExplicitBreakendsRequired(sv_type.to_string()));
            }
        };

        Variant::new(
            id,
            sv_type,
            Breakend::new(chr, start, start_orient),
            Some(Breakend::new(chr, end, end_orient)),
            1.0,
            0.0,
        )
    }

    pub fn with_ploidy(mut self, ploidy: f64, uncertainty: f64) -> ModelResult<Self> {
        if !(ploidy >= 0.0) || !(uncertainty >= 0.0) {
            return Err(ModelError::InvalidPloidy(self.id, ploidy, uncertainty));
        }
        self.ploidy = ploidy;
        self.ploidy_uncertainty = uncertainty;
        Ok(self)
    }

    ///
    /// Tag one breakend with an assembly contig id.
    ///
    pub fn with_assembly(mut self, end: BreakendEnd, assembly_id: &str) -> ModelResult<Self> {
        let id = self.id;
        let breakend = match end {
            BreakendEnd::Start => &mut self.start,
            BreakendEnd::End => self.end.as_mut().ok_or(ModelError::MissingBreakend(id))?,
        };
        breakend.assembly_ids.push(assembly_id.to_string());
        Ok(self)
    }

    pub fn breakend(&self, end: BreakendEnd) -> Option<&Breakend> {
        match end {
            BreakendEnd::Start => Some(&self.start),
            BreakendEnd::End => self.end.as_ref(),
        }
    }

    pub fn breakend_ref(&self, end: BreakendEnd) -> Option<BreakendRef> {
        self.breakend(end).map(|_| BreakendRef::new(self.id, end))
    }

    pub fn is_sgl(&self) -> bool {
        self.sv_type == SvType::Sgl
    }

    pub fn ploidy_min(&self) -> f64 {
        (self.ploidy - self.ploidy_uncertainty).max(0.0)
    }

    pub fn ploidy_max(&self) -> f64 {
        self.ploidy + self.ploidy_uncertainty
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) => write!(f, "{}:{} {}-{}", self.id, self.sv_type, self.start, end),
            None => write!(f, "{}:{} {}", self.id, self.sv_type, self.start),
        }
    }
}

///
/// The read-only arena of variants for one analysis run.
///
/// Ids are reassigned on construction so that `VariantId(i)` always addresses
/// the i-th variant.
///
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariantSet {
    pub variants: Vec<Variant>,
}

impl From<Vec<Variant>> for VariantSet {
    fn from(mut variants: Vec<Variant>) -> Self {
        for (index, variant) in variants.iter_mut().enumerate() {
            variant.id = VariantId(index);
        }
        VariantSet { variants }
    }
}

impl<'a> IntoIterator for &'a VariantSet {
    type Item = &'a Variant;
    type IntoIter = Iter<'a, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.variants.iter()
    }
}

impl VariantSet {
    pub fn get(&self, id: VariantId) -> Option<&Variant> {
        self.variants.get(id.0)
    }

    pub fn try_get(&self, id: VariantId) -> ModelResult<&Variant> {
        self.get(id).ok_or(ModelError::UnknownVariant(id))
    }

    ///
    /// Look up the breakend data behind a [BreakendRef].
    ///
    pub fn breakend(&self, breakend: BreakendRef) -> ModelResult<&Breakend> {
        self.try_get(breakend.variant)?
            .breakend(breakend.end)
            .ok_or(ModelError::MissingBreakend(breakend.variant))
    }

    /// Every existing breakend, start before end, in variant order.
    pub fn breakend_refs(&self) -> impl Iterator<Item = BreakendRef> + '_ {
        self.variants.iter().flat_map(|v| {
            [BreakendEnd::Start, BreakendEnd::End]
                .into_iter()
                .filter_map(|end| v.breakend_ref(end))
        })
    }

    pub fn iter(&self) -> Iter<'_, Variant> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
