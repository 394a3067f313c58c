//! Variant management for blocks.
//!
//! Every function here is pure: it inspects the current rows and returns the
//! legal resulting rows plus any compensating changes. Persisting them is the
//! store's job (see [`crate::MutationPlan`]).
//!
//! Rules:
//! - A block always keeps at least one variant
//! - A new label is the letter at index `count` (A, B, C, ...), not a counter
//! - Deleting the active variant moves the selection to the first remaining
//!   variant by sort_order

use crate::ids::*;
use crate::{Block, Error, PlanItem, PlanItemKind, Result, Variant, VariantItem};
use serde::{Deserialize, Serialize};

/// Label at a position: 0 → "A", 25 → "Z", 26 → "AA", 27 → "AB", ...
pub fn label_for_index(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Labels are one or more uppercase ASCII letters
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_uppercase())
}

/// Label for the next variant of a block, derived from the current count only
pub fn plan_next_label(existing: &[Variant]) -> String {
    label_for_index(existing.len())
}

/// One label change on an existing variant
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relabel {
    pub variant_id: VariantId,
    pub from: String,
    pub to: String,
}

/// A new block together with its default variant
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockCreation {
    pub plan_item: PlanItem,
    pub block: Block,
    pub default_variant: Variant,
}

/// A new, empty variant for an existing block
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantCreation {
    pub variant: Variant,
    /// Positional relabels needed to keep labels unique
    pub relabels: Vec<Relabel>,
    /// Active label after the plan is applied
    pub active_label: String,
}

/// Outcome of a deletion request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantDeletion {
    pub variant_id: VariantId,
    pub block_id: BlockId,
    pub allowed: bool,
    /// Active label after the deletion; `None` when refused
    pub new_active_label: Option<String>,
}

/// A deep copy of a variant under the next label
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantDuplication {
    pub source_id: VariantId,
    pub variant: Variant,
    pub items: Vec<VariantItem>,
    pub relabels: Vec<Relabel>,
    pub active_label: String,
}

/// An explicit label change requested by the coach
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantRelabel {
    pub block_id: BlockId,
    pub relabel: Relabel,
    pub active_label: String,
}

fn by_sort_order(variants: &[Variant]) -> Vec<&Variant> {
    let mut ordered: Vec<&Variant> = variants.iter().collect();
    ordered.sort_by_key(|v| v.sort_order);
    ordered
}

fn ensure_same_block(block_id: BlockId, variants: &[Variant]) -> Result<()> {
    match variants.iter().find(|v| v.block_id != block_id) {
        Some(stray) => Err(Error::InvalidParameters(format!(
            "Variant '{}' belongs to block '{}', not '{}'",
            stray.id, stray.block_id, block_id
        ))),
        None => Ok(()),
    }
}

/// Re-letter variants A, B, C, ... by sort_order, returning only real changes
fn positional_relabels(ordered: &[&Variant]) -> Vec<Relabel> {
    ordered
        .iter()
        .enumerate()
        .filter_map(|(pos, v)| {
            let to = label_for_index(pos);
            (to != v.label).then(|| Relabel {
                variant_id: v.id,
                from: v.label.clone(),
                to,
            })
        })
        .collect()
}

fn label_after(variant: &Variant, relabels: &[Relabel]) -> String {
    relabels
        .iter()
        .find(|r| r.variant_id == variant.id)
        .map(|r| r.to.clone())
        .unwrap_or_else(|| variant.label.clone())
}

/// Resolve the caller's active label to a variant; `None` means the first by sort_order
fn find_active<'a>(
    ordered: &[&'a Variant],
    active_label: Option<&str>,
) -> Result<Option<&'a Variant>> {
    match active_label {
        Some(label) => ordered
            .iter()
            .find(|v| v.label == label)
            .copied()
            .map(Some)
            .ok_or_else(|| {
                Error::InvalidParameters(format!("Active label '{}' matches no variant", label))
            }),
        None => Ok(ordered.first().copied()),
    }
}

/// Shared by creation and duplication: the new variant row, the relabels and
/// the translated active label
fn next_variant(
    block_id: BlockId,
    variants: &[Variant],
    active_label: Option<&str>,
    name: Option<String>,
) -> Result<(Variant, Vec<Relabel>, String)> {
    ensure_same_block(block_id, variants)?;

    let ordered = by_sort_order(variants);
    let label = plan_next_label(variants);

    // Only reachable after deleting a variant that was not the last one
    let relabels = if variants.iter().any(|v| v.label == label) {
        tracing::info!(
            "Label {} already taken in block {}, relabelling {} variants",
            label,
            block_id,
            variants.len()
        );
        positional_relabels(&ordered)
    } else {
        Vec::new()
    };

    let active_label = match find_active(&ordered, active_label)? {
        Some(active) => label_after(active, &relabels),
        None => label.clone(),
    };

    let sort_order = ordered.last().map_or(0, |v| v.sort_order + 1);

    let variant = Variant {
        id: VariantId::generate(),
        block_id,
        label,
        name,
        sort_order,
    };

    Ok((variant, relabels, active_label))
}

/// Plan a new block with its default variant "A"
///
/// The block, its plan item and its first variant are returned together so
/// the store can write them in one step; a block never exists without a
/// variant.
pub fn plan_block_creation(
    workout_id: WorkoutId,
    plan_items: &[PlanItem],
    name: impl Into<String>,
    rounds: Option<u32>,
) -> Result<BlockCreation> {
    if rounds == Some(0) {
        return Err(Error::InvalidParameters(
            "A block needs at least one round".into(),
        ));
    }
    if let Some(stray) = plan_items.iter().find(|i| i.workout_id != workout_id) {
        return Err(Error::InvalidParameters(format!(
            "Plan item '{}' belongs to workout '{}', not '{}'",
            stray.id, stray.workout_id, workout_id
        )));
    }

    let block = Block {
        id: BlockId::generate(),
        name: name.into(),
        rounds,
    };
    let (default_variant, _, _) = next_variant(block.id, &[], None, None)?;
    let sort_order = plan_items
        .iter()
        .map(|i| i.sort_order)
        .max()
        .map_or(0, |max| max + 1);

    let plan_item = PlanItem {
        id: PlanItemId::generate(),
        workout_id,
        sort_order,
        kind: PlanItemKind::Block { block_id: block.id },
    };

    tracing::debug!("Planned block {} at sort_order {}", block.id, sort_order);

    Ok(BlockCreation {
        plan_item,
        block,
        default_variant,
    })
}

/// Plan a new, empty variant for a block
///
/// `variants` are the block's current variants. `active_label` is the
/// caller's current selection (`None` means the first variant).
pub fn plan_variant_creation(
    block_id: BlockId,
    variants: &[Variant],
    active_label: Option<&str>,
    name: Option<String>,
) -> Result<VariantCreation> {
    let (variant, relabels, active_label) = next_variant(block_id, variants, active_label, name)?;
    tracing::debug!(
        "Planned variant {} ({}) for block {}",
        variant.label,
        variant.id,
        block_id
    );
    Ok(VariantCreation {
        variant,
        relabels,
        active_label,
    })
}

/// Active label after deleting the variant labelled `deleted_label`
///
/// Unchanged unless the deleted variant was the active one, in which case
/// the first remaining variant by sort_order takes over. `None` if nothing
/// remains.
pub fn select_active_after_deletion(
    variants: &[Variant],
    deleted_label: &str,
    previous_active: &str,
) -> Option<String> {
    if deleted_label != previous_active {
        return Some(previous_active.to_string());
    }
    variants
        .iter()
        .filter(|v| v.label != deleted_label)
        .min_by_key(|v| v.sort_order)
        .map(|v| v.label.clone())
}

/// Plan the deletion of a variant
///
/// Deleting the last remaining variant is refused (`allowed == false`);
/// the caller decides what to do instead.
pub fn plan_variant_deletion(
    variant_id: VariantId,
    variants: &[Variant],
    active_label: &str,
) -> Result<VariantDeletion> {
    let target = variants
        .iter()
        .find(|v| v.id == variant_id)
        .ok_or_else(|| Error::NotFound(format!("Variant '{}'", variant_id)))?;
    ensure_same_block(target.block_id, variants)?;
    if !variants.iter().any(|v| v.label == active_label) {
        return Err(Error::InvalidParameters(format!(
            "Active label '{}' matches no variant of block '{}'",
            active_label, target.block_id
        )));
    }

    if variants.len() <= 1 {
        tracing::warn!(
            "Refusing to delete variant {}: block {} would have no variants",
            variant_id,
            target.block_id
        );
        return Ok(VariantDeletion {
            variant_id,
            block_id: target.block_id,
            allowed: false,
            new_active_label: None,
        });
    }

    let new_active_label = select_active_after_deletion(variants, &target.label, active_label);

    Ok(VariantDeletion {
        variant_id,
        block_id: target.block_id,
        allowed: true,
        new_active_label,
    })
}

/// Plan a deep copy of a variant
///
/// `items` may hold items of any variant; only the source's are copied.
/// Copies get fresh ids and keep the source's exercise/protocol references
/// and relative order.
pub fn plan_variant_duplication(
    source_id: VariantId,
    variants: &[Variant],
    items: &[VariantItem],
    active_label: Option<&str>,
) -> Result<VariantDuplication> {
    let source = variants
        .iter()
        .find(|v| v.id == source_id)
        .ok_or_else(|| Error::NotFound(format!("Variant '{}'", source_id)))?;

    let (variant, relabels, active_label) =
        next_variant(source.block_id, variants, active_label, source.name.clone())?;

    let mut copies: Vec<VariantItem> = items
        .iter()
        .filter(|i| i.variant_id == source_id)
        .map(|i| VariantItem {
            id: VariantItemId::generate(),
            variant_id: variant.id,
            sort_order: i.sort_order,
            exercise_id: i.exercise_id,
            protocol_id: i.protocol_id,
        })
        .collect();
    copies.sort_by_key(|i| i.sort_order);

    tracing::debug!(
        "Planned duplicate of variant {} as {} with {} items",
        source.label,
        variant.label,
        copies.len()
    );

    Ok(VariantDuplication {
        source_id,
        variant,
        items: copies,
        relabels,
        active_label,
    })
}

/// Plan an explicit label change
pub fn plan_variant_relabel(
    variant_id: VariantId,
    variants: &[Variant],
    new_label: &str,
    active_label: &str,
) -> Result<VariantRelabel> {
    let target = variants
        .iter()
        .find(|v| v.id == variant_id)
        .ok_or_else(|| Error::NotFound(format!("Variant '{}'", variant_id)))?;
    ensure_same_block(target.block_id, variants)?;

    if !is_valid_label(new_label) {
        return Err(Error::InvalidParameters(format!(
            "'{}' is not a valid variant label",
            new_label
        )));
    }
    if variants
        .iter()
        .any(|v| v.id != variant_id && v.label == new_label)
    {
        return Err(Error::InvalidParameters(format!(
            "Label '{}' is already used in block '{}'",
            new_label, target.block_id
        )));
    }

    let active_label = if target.label == active_label {
        new_label.to_string()
    } else {
        active_label.to_string()
    };

    Ok(VariantRelabel {
        block_id: target.block_id,
        relabel: Relabel {
            variant_id,
            from: target.label.clone(),
            to: new_label.to_string(),
        },
        active_label,
    })
}

/// Plan a new (exercise, protocol) pairing at the end of a variant
pub fn plan_variant_item_append(
    variant_id: VariantId,
    items: &[VariantItem],
    exercise_id: ExerciseId,
    protocol_id: ProtocolId,
) -> VariantItem {
    let sort_order = items
        .iter()
        .filter(|i| i.variant_id == variant_id)
        .map(|i| i.sort_order)
        .max()
        .map_or(0, |max| max + 1);

    VariantItem {
        id: VariantItemId::generate(),
        variant_id,
        sort_order,
        exercise_id,
        protocol_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants_with(block_id: BlockId, labels: &[(&str, i64)]) -> Vec<Variant> {
        labels
            .iter()
            .map(|(label, order)| Variant {
                id: VariantId::generate(),
                block_id,
                label: label.to_string(),
                name: None,
                sort_order: *order,
            })
            .collect()
    }

    #[test]
    fn test_label_sequence() {
        assert_eq!(label_for_index(0), "A");
        assert_eq!(label_for_index(1), "B");
        assert_eq!(label_for_index(25), "Z");
        assert_eq!(label_for_index(26), "AA");
        assert_eq!(label_for_index(27), "AB");
        assert_eq!(label_for_index(52), "BA");
    }

    #[test]
    fn test_next_label_depends_only_on_count() {
        let block_id = BlockId::generate();
        assert_eq!(plan_next_label(&[]), "A");
        assert_eq!(plan_next_label(&variants_with(block_id, &[("A", 0)])), "B");
        assert_eq!(
            plan_next_label(&variants_with(block_id, &[("A", 0), ("B", 1)])),
            "C"
        );
        // After deleting "B" from A, B, C two remain, so "C" again
        assert_eq!(
            plan_next_label(&variants_with(block_id, &[("A", 0), ("C", 2)])),
            "C"
        );
    }

    #[test]
    fn test_creation_appends_after_last_sort_order() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0), ("B", 7)]);

        let plan = plan_variant_creation(block_id, &variants, Some("B"), Some("Easy".into()))
            .unwrap();

        assert_eq!(plan.variant.label, "C");
        assert_eq!(plan.variant.sort_order, 8);
        assert_eq!(plan.variant.name.as_deref(), Some("Easy"));
        assert!(plan.relabels.is_empty());
        assert_eq!(plan.active_label, "B");
    }

    #[test]
    fn test_creation_relabels_when_label_is_taken() {
        let block_id = BlockId::generate();
        // "B" was deleted earlier, so the count-based label "C" collides
        let variants = variants_with(block_id, &[("A", 0), ("C", 2)]);

        let plan = plan_variant_creation(block_id, &variants, Some("C"), None).unwrap();

        assert_eq!(plan.variant.label, "C");
        assert_eq!(plan.relabels.len(), 1);
        assert_eq!(plan.relabels[0].from, "C");
        assert_eq!(plan.relabels[0].to, "B");
        assert_eq!(plan.active_label, "B");
    }

    #[test]
    fn test_creation_rejects_foreign_variants() {
        let block_id = BlockId::generate();
        let variants = variants_with(BlockId::generate(), &[("A", 0)]);
        assert!(matches!(
            plan_variant_creation(block_id, &variants, None, None),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_creation_rejects_unknown_active_label() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0)]);
        assert!(matches!(
            plan_variant_creation(block_id, &variants, Some("D"), None),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_block_creation_includes_variant_a() {
        let workout_id = WorkoutId::generate();
        let existing = vec![PlanItem {
            id: PlanItemId::generate(),
            workout_id,
            sort_order: 4,
            kind: PlanItemKind::Info {
                content: "Warm up".into(),
            },
        }];

        let plan = plan_block_creation(workout_id, &existing, "Circuit", Some(3)).unwrap();

        assert_eq!(plan.plan_item.sort_order, 5);
        assert_eq!(
            plan.plan_item.kind,
            PlanItemKind::Block {
                block_id: plan.block.id
            }
        );
        assert_eq!(plan.default_variant.label, "A");
        assert_eq!(plan.default_variant.block_id, plan.block.id);
    }

    #[test]
    fn test_block_creation_rejects_zero_rounds() {
        assert!(matches!(
            plan_block_creation(WorkoutId::generate(), &[], "Circuit", Some(0)),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_deleting_sole_variant_is_refused() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0)]);

        let plan = plan_variant_deletion(variants[0].id, &variants, "A").unwrap();

        assert!(!plan.allowed);
        assert_eq!(plan.new_active_label, None);
    }

    #[test]
    fn test_deleting_active_variant_selects_lowest_sort_order() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0), ("B", 1)]);

        let plan = plan_variant_deletion(variants[0].id, &variants, "A").unwrap();

        assert!(plan.allowed);
        assert_eq!(plan.new_active_label.as_deref(), Some("B"));
    }

    #[test]
    fn test_deleting_inactive_variant_keeps_selection() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0), ("B", 1), ("C", 2)]);

        let plan = plan_variant_deletion(variants[0].id, &variants, "C").unwrap();

        assert!(plan.allowed);
        assert_eq!(plan.new_active_label.as_deref(), Some("C"));
    }

    #[test]
    fn test_deletion_rejects_stale_active_label() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0), ("B", 1)]);

        assert!(matches!(
            plan_variant_deletion(variants[0].id, &variants, "Q"),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            plan_variant_deletion(variants[1].id, &variants, ""),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_select_active_ignores_slice_order() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("C", 9), ("A", 0), ("B", 3)]);

        assert_eq!(
            select_active_after_deletion(&variants, "A", "A").as_deref(),
            Some("B")
        );
    }

    #[test]
    fn test_deleting_unknown_variant_is_not_found() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0), ("B", 1)]);
        assert!(matches!(
            plan_variant_deletion(VariantId::generate(), &variants, "A"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_duplication_deep_copies_items() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0)]);
        let source = variants[0].id;
        let items: Vec<VariantItem> = [2, 0, 1]
            .iter()
            .map(|order| VariantItem {
                id: VariantItemId::generate(),
                variant_id: source,
                sort_order: *order,
                exercise_id: ExerciseId::generate(),
                protocol_id: ProtocolId::generate(),
            })
            .collect();

        let plan = plan_variant_duplication(source, &variants, &items, None).unwrap();

        assert_eq!(plan.variant.label, "B");
        assert_eq!(plan.active_label, "A");
        assert_eq!(plan.items.len(), 3);

        let mut originals = items.clone();
        originals.sort_by_key(|i| i.sort_order);
        for (copy, original) in plan.items.iter().zip(&originals) {
            assert_ne!(copy.id, original.id);
            assert_eq!(copy.variant_id, plan.variant.id);
            assert_eq!(copy.exercise_id, original.exercise_id);
            assert_eq!(copy.protocol_id, original.protocol_id);
            assert_eq!(copy.sort_order, original.sort_order);
        }
    }

    #[test]
    fn test_relabel_validates_label() {
        let block_id = BlockId::generate();
        let variants = variants_with(block_id, &[("A", 0), ("B", 1)]);

        assert!(matches!(
            plan_variant_relabel(variants[0].id, &variants, "b", "A"),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            plan_variant_relabel(variants[0].id, &variants, "B", "A"),
            Err(Error::InvalidParameters(_))
        ));

        let plan = plan_variant_relabel(variants[0].id, &variants, "Z", "A").unwrap();
        assert_eq!(plan.relabel.to, "Z");
        assert_eq!(plan.active_label, "Z");
    }

    #[test]
    fn test_item_append_goes_last() {
        let variant_id = VariantId::generate();
        let items = vec![VariantItem {
            id: VariantItemId::generate(),
            variant_id,
            sort_order: 4,
            exercise_id: ExerciseId::generate(),
            protocol_id: ProtocolId::generate(),
        }];

        let item = plan_variant_item_append(
            variant_id,
            &items,
            ExerciseId::generate(),
            ProtocolId::generate(),
        );
        assert_eq!(item.sort_order, 5);

        let first = plan_variant_item_append(
            VariantId::generate(),
            &items,
            ExerciseId::generate(),
            ProtocolId::generate(),
        );
        assert_eq!(first.sort_order, 0);
    }
}
