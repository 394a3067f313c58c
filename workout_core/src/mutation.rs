//! Applying planned mutations to a snapshot.
//!
//! In production the store persists these changes itself. Applying them to
//! an in-memory snapshot lets the CLI and tests see the resulting structure.

use crate::ids::*;
use crate::variants::{
    BlockCreation, Relabel, VariantCreation, VariantDeletion, VariantDuplication, VariantRelabel,
};
use crate::{Error, Result, VariantItem, WorkoutSnapshot};
use serde::{Deserialize, Serialize};

/// Any change computed by the variant manager
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mutation", rename_all = "snake_case")]
pub enum MutationPlan {
    CreateBlock(BlockCreation),
    CreateVariant(VariantCreation),
    DeleteVariant(VariantDeletion),
    DuplicateVariant(VariantDuplication),
    RelabelVariant(VariantRelabel),
    AppendItem(VariantItem),
}

impl WorkoutSnapshot {
    /// Apply a planned mutation
    ///
    /// Refused deletions are reported as errors and leave the snapshot
    /// untouched.
    pub fn apply(&mut self, plan: &MutationPlan) -> Result<()> {
        match plan {
            MutationPlan::CreateBlock(creation) => {
                let block_id = creation.block.id;
                self.plan_items.push(creation.plan_item.clone());
                self.blocks.push(creation.block.clone());
                self.variants.push(creation.default_variant.clone());
                self.active_variants
                    .insert(block_id, creation.default_variant.label.clone());
                tracing::info!("Created block {} in workout {}", block_id, self.workout.id);
            }
            MutationPlan::CreateVariant(creation) => {
                let block_id = creation.variant.block_id;
                self.require_block(block_id)?;
                self.apply_relabels(&creation.relabels)?;
                self.variants.push(creation.variant.clone());
                self.active_variants
                    .insert(block_id, creation.active_label.clone());
                tracing::info!(
                    "Created variant {} in block {}",
                    creation.variant.label,
                    block_id
                );
            }
            MutationPlan::DeleteVariant(deletion) => {
                let active = match (deletion.allowed, &deletion.new_active_label) {
                    (true, Some(label)) => label.clone(),
                    _ => {
                        return Err(Error::InvalidParameters(format!(
                            "Deletion of variant '{}' was refused: \
                             block '{}' must keep one variant",
                            deletion.variant_id, deletion.block_id
                        )))
                    }
                };
                if !self.variants.iter().any(|v| v.id == deletion.variant_id) {
                    return Err(Error::NotFound(format!("Variant '{}'", deletion.variant_id)));
                }
                self.variants.retain(|v| v.id != deletion.variant_id);
                self.variant_items
                    .retain(|i| i.variant_id != deletion.variant_id);
                self.active_variants.insert(deletion.block_id, active);
                tracing::info!(
                    "Deleted variant {} from block {}",
                    deletion.variant_id,
                    deletion.block_id
                );
            }
            MutationPlan::DuplicateVariant(duplication) => {
                let block_id = duplication.variant.block_id;
                self.require_block(block_id)?;
                self.apply_relabels(&duplication.relabels)?;
                self.variants.push(duplication.variant.clone());
                self.variant_items.extend(duplication.items.iter().cloned());
                self.active_variants
                    .insert(block_id, duplication.active_label.clone());
                tracing::info!(
                    "Duplicated variant {} as {} in block {}",
                    duplication.source_id,
                    duplication.variant.label,
                    block_id
                );
            }
            MutationPlan::RelabelVariant(relabel) => {
                self.apply_relabels(std::slice::from_ref(&relabel.relabel))?;
                self.active_variants
                    .insert(relabel.block_id, relabel.active_label.clone());
                tracing::info!(
                    "Relabelled variant {} from {} to {}",
                    relabel.relabel.variant_id,
                    relabel.relabel.from,
                    relabel.relabel.to
                );
            }
            MutationPlan::AppendItem(item) => {
                if !self.variants.iter().any(|v| v.id == item.variant_id) {
                    return Err(Error::NotFound(format!("Variant '{}'", item.variant_id)));
                }
                self.variant_items.push(item.clone());
                tracing::info!("Appended item {} to variant {}", item.id, item.variant_id);
            }
        }
        Ok(())
    }

    fn require_block(&self, block_id: BlockId) -> Result<()> {
        if self.blocks.iter().any(|b| b.id == block_id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Block '{}'", block_id)))
        }
    }

    fn apply_relabels(&mut self, relabels: &[Relabel]) -> Result<()> {
        // Check everything first so a bad plan changes nothing
        for relabel in relabels {
            match self.variants.iter().find(|v| v.id == relabel.variant_id) {
                Some(v) if v.label == relabel.from => {}
                Some(v) => {
                    return Err(Error::InvalidParameters(format!(
                        "Variant '{}' is labelled '{}', expected '{}'",
                        v.id, v.label, relabel.from
                    )))
                }
                None => {
                    return Err(Error::NotFound(format!("Variant '{}'", relabel.variant_id)))
                }
            }
        }
        for relabel in relabels {
            if let Some(variant) = self
                .variants
                .iter_mut()
                .find(|v| v.id == relabel.variant_id)
            {
                variant.label = relabel.to.clone();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SnapshotBuilder;
    use crate::variants::*;
    use crate::PlanTree;

    #[test]
    fn test_new_block_becomes_loadable_once_populated() {
        let mut snapshot = SnapshotBuilder::new("Build").build();
        let creation =
            plan_block_creation(snapshot.workout.id, &snapshot.plan_items, "Finisher", None)
                .unwrap();
        let variant_id = creation.default_variant.id;
        snapshot
            .apply(&MutationPlan::CreateBlock(creation))
            .unwrap();

        // Created empty, populated afterwards
        assert!(PlanTree::load(snapshot.clone()).is_err());

        let item = plan_variant_item_append(
            variant_id,
            &snapshot.variant_items,
            ExerciseId::generate(),
            ProtocolId::generate(),
        );
        snapshot.apply(&MutationPlan::AppendItem(item)).unwrap();
        assert!(PlanTree::load(snapshot).is_ok());
    }

    #[test]
    fn test_delete_active_variant_updates_selection() {
        let mut builder = SnapshotBuilder::new("Delete");
        let (_, block_id) = builder.block(&[2, 1]);
        let mut snapshot = builder.build();
        let variants = snapshot.variants_of(block_id);
        let variant_a = variants[0].id;

        let plan = plan_variant_deletion(variant_a, &variants, "A").unwrap();
        snapshot.apply(&MutationPlan::DeleteVariant(plan)).unwrap();

        assert_eq!(snapshot.variants.len(), 1);
        assert!(snapshot.items_of(variant_a).is_empty());
        let tree = PlanTree::load(snapshot).unwrap();
        assert_eq!(tree.active_variant(block_id).unwrap().label, "B");
    }

    #[test]
    fn test_refused_deletion_changes_nothing() {
        let mut builder = SnapshotBuilder::new("Refuse");
        let (_, block_id) = builder.block(&[1]);
        let mut snapshot = builder.build();
        let before = snapshot.clone();
        let variants = snapshot.variants_of(block_id);

        let plan = plan_variant_deletion(variants[0].id, &variants, "A").unwrap();
        let err = snapshot
            .apply(&MutationPlan::DeleteVariant(plan))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidParameters(_)));
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_create_after_middle_deletion_keeps_labels_unique() {
        let mut builder = SnapshotBuilder::new("Relabel");
        let (_, block_id) = builder.block(&[1, 1, 1]);
        let mut snapshot = builder.build();

        let variants = snapshot.variants_of(block_id);
        let plan = plan_variant_deletion(variants[1].id, &variants, "C").unwrap();
        snapshot.apply(&MutationPlan::DeleteVariant(plan)).unwrap();

        let variants = snapshot.variants_of(block_id);
        let active = snapshot.active_label(block_id);
        let creation =
            plan_variant_creation(block_id, &variants, active.as_deref(), None).unwrap();
        let new_id = creation.variant.id;
        snapshot
            .apply(&MutationPlan::CreateVariant(creation))
            .unwrap();

        let mut labels: Vec<_> = snapshot
            .variants_of(block_id)
            .iter()
            .map(|v| v.label.clone())
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["A", "B", "C"]);
        assert_eq!(snapshot.active_label(block_id).as_deref(), Some("B"));

        // The new variant is still empty; fill it and the tree loads
        let item = plan_variant_item_append(
            new_id,
            &snapshot.variant_items,
            ExerciseId::generate(),
            ProtocolId::generate(),
        );
        snapshot.apply(&MutationPlan::AppendItem(item)).unwrap();
        assert!(PlanTree::load(snapshot).is_ok());
    }

    #[test]
    fn test_duplicate_is_immediately_loadable() {
        let mut builder = SnapshotBuilder::new("Copy");
        let (_, block_id) = builder.block(&[3]);
        let mut snapshot = builder.build();

        let variants = snapshot.variants_of(block_id);
        let plan =
            plan_variant_duplication(variants[0].id, &variants, &snapshot.variant_items, None)
                .unwrap();
        snapshot
            .apply(&MutationPlan::DuplicateVariant(plan))
            .unwrap();

        let tree = PlanTree::load(snapshot).unwrap();
        let loaded = tree.variants_of(block_id).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(tree.items_of(loaded[1].id).unwrap().len(), 3);
    }

    #[test]
    fn test_stale_relabel_is_rejected() {
        let mut builder = SnapshotBuilder::new("Stale");
        let (_, block_id) = builder.block(&[1, 1]);
        let mut snapshot = builder.build();
        let variants = snapshot.variants_of(block_id);

        let plan = plan_variant_relabel(variants[0].id, &variants, "X", "A").unwrap();
        snapshot.variants[0].label = "Q".into();

        assert!(matches!(
            snapshot.apply(&MutationPlan::RelabelVariant(plan)),
            Err(Error::InvalidParameters(_))
        ));
    }
}
