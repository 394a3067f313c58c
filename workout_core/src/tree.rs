//! Validated, indexed view of one workout snapshot.
//!
//! All structural invariants are checked once, at load time. Traversal
//! afterwards is read-only and never has to re-check them.

use crate::ids::*;
use crate::{
    Block, Error, Exercise, PlanItem, PlanItemKind, Protocol, Result, Variant, VariantItem,
    Workout, WorkoutSnapshot,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
struct BlockNode {
    block: Block,
    /// Sorted by sort_order
    variants: Vec<Variant>,
    /// Index into `variants`
    active: usize,
}

/// A loaded workout whose structure is known to be consistent
#[derive(Clone, Debug)]
pub struct PlanTree {
    workout: Workout,
    plan_items: Vec<PlanItem>,
    plan_index: HashMap<PlanItemId, usize>,
    blocks: HashMap<BlockId, BlockNode>,
    variant_index: HashMap<VariantId, (BlockId, usize)>,
    variant_items: HashMap<VariantId, Vec<VariantItem>>,
    exercises: HashMap<ExerciseId, Exercise>,
    protocols: HashMap<ProtocolId, Protocol>,
    captured_at: Option<DateTime<Utc>>,
}

impl WorkoutSnapshot {
    /// Check the snapshot against every structural invariant
    ///
    /// Returns a list of violations, or empty Vec if consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let workout_id = self.workout.id;

        // Plan items: unique ids, unique sort_order, owned by this workout
        let mut item_ids = HashSet::new();
        let mut item_orders: HashMap<i64, PlanItemId> = HashMap::new();
        let mut block_refs: HashMap<BlockId, usize> = HashMap::new();
        for item in &self.plan_items {
            if !item_ids.insert(item.id) {
                errors.push(format!("Plan item '{}' appears more than once", item.id));
            }
            if item.workout_id != workout_id {
                errors.push(format!(
                    "Plan item '{}' belongs to workout '{}', not '{}'",
                    item.id, item.workout_id, workout_id
                ));
            }
            if let Some(other) = item_orders.insert(item.sort_order, item.id) {
                errors.push(format!(
                    "Plan items '{}' and '{}' share sort_order {}",
                    other, item.id, item.sort_order
                ));
            }
            if let PlanItemKind::Block { block_id } = &item.kind {
                *block_refs.entry(*block_id).or_default() += 1;
            }
        }

        // Blocks: each owned by exactly one plan item
        let mut block_ids = HashSet::new();
        for block in &self.blocks {
            if !block_ids.insert(block.id) {
                errors.push(format!("Block '{}' appears more than once", block.id));
            }
            match block_refs.get(&block.id) {
                None => errors.push(format!(
                    "Block '{}' is not referenced by any plan item",
                    block.id
                )),
                Some(count) if *count > 1 => errors.push(format!(
                    "Block '{}' is referenced by {} plan items",
                    block.id, count
                )),
                _ => {}
            }
        }
        for block_id in block_refs.keys() {
            if !block_ids.contains(block_id) {
                errors.push(format!(
                    "Plan item references non-existent block '{}'",
                    block_id
                ));
            }
        }

        // Variants: known parent, unique label and sort_order per block
        let mut variant_ids = HashSet::new();
        let mut variant_counts: HashMap<BlockId, usize> = HashMap::new();
        let mut labels: HashSet<(BlockId, &str)> = HashSet::new();
        let mut variant_orders: HashSet<(BlockId, i64)> = HashSet::new();
        for variant in &self.variants {
            if !variant_ids.insert(variant.id) {
                errors.push(format!("Variant '{}' appears more than once", variant.id));
            }
            if !block_ids.contains(&variant.block_id) {
                errors.push(format!(
                    "Variant '{}' references non-existent block '{}'",
                    variant.id, variant.block_id
                ));
            }
            *variant_counts.entry(variant.block_id).or_default() += 1;
            if variant.label.is_empty() {
                errors.push(format!("Variant '{}' has an empty label", variant.id));
            } else if !labels.insert((variant.block_id, variant.label.as_str())) {
                errors.push(format!(
                    "Block '{}' has more than one variant labelled '{}'",
                    variant.block_id, variant.label
                ));
            }
            if !variant_orders.insert((variant.block_id, variant.sort_order)) {
                errors.push(format!(
                    "Block '{}' has more than one variant with sort_order {}",
                    variant.block_id, variant.sort_order
                ));
            }
        }
        for block in &self.blocks {
            if !variant_counts.contains_key(&block.id) {
                errors.push(format!("Block '{}' has no variants", block.id));
            }
        }

        // Variant items: known parent, unique sort_order per variant
        let mut variant_item_ids = HashSet::new();
        let mut item_counts: HashMap<VariantId, usize> = HashMap::new();
        let mut variant_item_orders: HashSet<(VariantId, i64)> = HashSet::new();
        for item in &self.variant_items {
            if !variant_item_ids.insert(item.id) {
                errors.push(format!("Variant item '{}' appears more than once", item.id));
            }
            if !variant_ids.contains(&item.variant_id) {
                errors.push(format!(
                    "Variant item '{}' references non-existent variant '{}'",
                    item.id, item.variant_id
                ));
            }
            *item_counts.entry(item.variant_id).or_default() += 1;
            if !variant_item_orders.insert((item.variant_id, item.sort_order)) {
                errors.push(format!(
                    "Variant '{}' has more than one item with sort_order {}",
                    item.variant_id, item.sort_order
                ));
            }
        }
        for variant in &self.variants {
            if !item_counts.contains_key(&variant.id) {
                errors.push(format!(
                    "Variant '{}' ({}) has no items",
                    variant.label, variant.id
                ));
            }
        }

        // Active selections must name a real variant
        for (block_id, label) in &self.active_variants {
            if !block_ids.contains(block_id) {
                errors.push(format!(
                    "Active variant selected for non-existent block '{}'",
                    block_id
                ));
            } else if !labels.contains(&(*block_id, label.as_str())) {
                errors.push(format!(
                    "Active variant '{}' does not exist in block '{}'",
                    label, block_id
                ));
            }
        }

        errors
    }
}

impl PlanTree {
    /// Validate a snapshot and index it for traversal
    pub fn load(snapshot: WorkoutSnapshot) -> Result<Self> {
        let errors = snapshot.validate();
        if !errors.is_empty() {
            tracing::warn!(
                "Rejected snapshot of workout {} with {} violation(s)",
                snapshot.workout.id,
                errors.len()
            );
            return Err(Error::StructureInconsistent(errors.join("; ")));
        }

        let WorkoutSnapshot {
            workout,
            mut plan_items,
            blocks,
            variants,
            variant_items,
            exercises,
            protocols,
            active_variants,
            captured_at,
        } = snapshot;

        // sort_order is unique per workout, so this is a total order
        plan_items.sort_by_key(|item| item.sort_order);
        let plan_index = plan_items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id, pos))
            .collect();

        let mut by_block: HashMap<BlockId, Vec<Variant>> = HashMap::new();
        for variant in variants {
            by_block.entry(variant.block_id).or_default().push(variant);
        }

        let mut grouped_items: HashMap<VariantId, Vec<VariantItem>> = HashMap::new();
        for item in variant_items {
            grouped_items.entry(item.variant_id).or_default().push(item);
        }
        for items in grouped_items.values_mut() {
            items.sort_by_key(|item| item.sort_order);
        }

        let mut block_nodes = HashMap::new();
        let mut variant_index = HashMap::new();
        for block in blocks {
            let mut variants = by_block.remove(&block.id).unwrap_or_default();
            variants.sort_by_key(|v| v.sort_order);
            for (pos, variant) in variants.iter().enumerate() {
                variant_index.insert(variant.id, (block.id, pos));
            }
            let active = active_variants
                .get(&block.id)
                .and_then(|label| variants.iter().position(|v| &v.label == label))
                .unwrap_or(0);
            block_nodes.insert(
                block.id,
                BlockNode {
                    block,
                    variants,
                    active,
                },
            );
        }

        tracing::debug!(
            "Loaded workout {} ({} plan items, {} blocks)",
            workout.id,
            plan_items.len(),
            block_nodes.len()
        );

        Ok(Self {
            workout,
            plan_items,
            plan_index,
            blocks: block_nodes,
            variant_index,
            variant_items: grouped_items,
            exercises: exercises.into_iter().map(|e| (e.id, e)).collect(),
            protocols: protocols.into_iter().map(|p| (p.id, p)).collect(),
            captured_at,
        })
    }

    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// All plan items, ascending by sort_order (Rest/Info included)
    pub fn ordered_plan_items(&self) -> &[PlanItem] {
        &self.plan_items
    }

    /// Whether any plan item is an exercise or a block
    pub fn has_actionable_items(&self) -> bool {
        self.plan_items.iter().any(PlanItem::is_actionable)
    }

    pub fn plan_item(&self, id: PlanItemId) -> Option<&PlanItem> {
        self.plan_index.get(&id).map(|pos| &self.plan_items[*pos])
    }

    /// Position of a plan item in [`Self::ordered_plan_items`]
    pub fn plan_item_index(&self, id: PlanItemId) -> Option<usize> {
        self.plan_index.get(&id).copied()
    }

    pub fn block(&self, id: BlockId) -> Result<&Block> {
        self.block_node(id).map(|node| &node.block)
    }

    /// Variants of a block, ascending by sort_order
    pub fn variants_of(&self, block_id: BlockId) -> Result<&[Variant]> {
        self.block_node(block_id).map(|node| node.variants.as_slice())
    }

    /// The block's currently active variant
    pub fn active_variant(&self, block_id: BlockId) -> Result<&Variant> {
        let node = self.block_node(block_id)?;
        node.variants.get(node.active).ok_or_else(|| {
            Error::StructureInconsistent(format!("Block '{}' has no variants", block_id))
        })
    }

    pub fn variant(&self, id: VariantId) -> Result<&Variant> {
        let (block_id, pos) = self
            .variant_index
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Variant '{}'", id)))?;
        self.block_node(*block_id)?
            .variants
            .get(*pos)
            .ok_or_else(|| Error::NotFound(format!("Variant '{}'", id)))
    }

    /// Items of a variant, ascending by sort_order
    pub fn items_of(&self, variant_id: VariantId) -> Result<&[VariantItem]> {
        if !self.variant_index.contains_key(&variant_id) {
            return Err(Error::NotFound(format!("Variant '{}'", variant_id)));
        }
        Ok(self
            .variant_items
            .get(&variant_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    pub fn exercise(&self, id: ExerciseId) -> Option<&Exercise> {
        self.exercises.get(&id)
    }

    pub fn protocol(&self, id: ProtocolId) -> Option<&Protocol> {
        self.protocols.get(&id)
    }

    fn block_node(&self, id: BlockId) -> Result<&BlockNode> {
        self.blocks
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Block '{}'", id)))
    }
}
