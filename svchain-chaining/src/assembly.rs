use svchain_core::models::{BreakendRef, LinkType, LinkedPair, VariantSet};

///
/// Find templated insertions confirmed by assembly.
///
/// Two breakends of different variants form an assembled pair when they sit on
/// the same chromosome, were called from a shared assembly contig, and face each
/// other: the lower breakend points up (orientation -1) and the upper one points
/// down (orientation 1). Pairs come back shortest first.
///
pub fn find_assembled_pairs(variants: &VariantSet, min_ti_length: u32) -> Vec<LinkedPair> {
    let breakends: Vec<BreakendRef> = variants.breakend_refs().collect();
    let mut pairs: Vec<LinkedPair> = Vec::new();

    for (i, &lower_ref) in breakends.iter().enumerate() {
        for &upper_ref in &breakends[i + 1..] {
            if lower_ref.variant == upper_ref.variant {
                continue;
            }

            let (Ok(be1), Ok(be2)) = (variants.breakend(lower_ref), variants.breakend(upper_ref))
            else {
                continue;
            };

            if be1.chr != be2.chr || !be1.shares_assembly(be2) {
                continue;
            }

            let (lower, upper, lower_be, upper_be) = if be1.position <= be2.position {
                (lower_ref, upper_ref, be1, be2)
            } else {
                (upper_ref, lower_ref, be2, be1)
            };

            if lower_be.orientation != -1 || upper_be.orientation != 1 {
                continue;
            }

            if let Ok(pair) = LinkedPair::with_min_ti_length(
                variants,
                lower,
                upper,
                LinkType::TemplatedInsertion,
                min_ti_length,
            ) {
                pairs.push(pair.assembled());
            }
        }
    }

    pairs.sort_by(|a, b| {
        a.length()
            .cmp(&b.length())
            .then_with(|| a.first().cmp(&b.first()))
            .then_with(|| a.second().cmp(&b.second()))
    });

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use svchain_core::models::{BreakendEnd, SvType, Variant, VariantId};

    fn del(id: usize, start: u32, end: u32) -> Variant {
        Variant::from_positions(id, SvType::Del, "1", start, end).unwrap()
    }

    #[rstest]
    fn test_assembled_pairs_face_each_other() {
        let variants = VariantSet::from(vec![
            del(0, 100, 200).with_assembly(BreakendEnd::End, "asm1").unwrap(),
            del(1, 300, 400)
                .with_assembly(BreakendEnd::Start, "asm1")
                .unwrap()
                .with_assembly(BreakendEnd::End, "asm2")
                .unwrap(),
            del(2, 420, 600).with_assembly(BreakendEnd::Start, "asm2").unwrap(),
        ]);

        let pairs = find_assembled_pairs(&variants, 30);
        assert_eq!(pairs.len(), 2);

        // 400-420 is too short for a templated insertion
        assert_eq!(pairs[0].first(), BreakendRef::end(VariantId(1)));
        assert_eq!(pairs[0].second(), BreakendRef::start(VariantId(2)));
        assert_eq!(pairs[0].link_type(), LinkType::DeletionBridge);
        assert_eq!(pairs[0].length(), -21);

        assert_eq!(pairs[1].first(), BreakendRef::end(VariantId(0)));
        assert_eq!(pairs[1].length(), 100);
        assert_eq!(pairs.iter().all(|p| p.is_assembled()), true);
    }

    #[rstest]
    fn test_no_pair_without_shared_assembly_or_facing() {
        let variants = VariantSet::from(vec![
            del(0, 100, 200).with_assembly(BreakendEnd::End, "asm1").unwrap(),
            del(1, 300, 400).with_assembly(BreakendEnd::Start, "asm9").unwrap(),
            // breakends face away from each other
            del(2, 500, 600).with_assembly(BreakendEnd::Start, "asm3").unwrap(),
            del(3, 700, 800).with_assembly(BreakendEnd::End, "asm3").unwrap(),
        ]);

        assert_eq!(find_assembled_pairs(&variants, 30).len(), 0);
    }
}
