//! Core domain types for workout plans.
//!
//! This module defines the data a snapshot provider hands to the engine:
//! - The workout and its ordered plan items
//! - Blocks, their variants and variant items
//! - Read-only exercise and protocol reference data
//! - The navigation cursor supplied by callers

use crate::ids::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Workout and Plan Items
// ============================================================================

/// Root container of a training plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workout {
    pub id: WorkoutId,
    pub title: String,
    #[serde(default)]
    pub archived: bool,
}

/// Payload of a plan item, tagged by what the item is
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanItemKind {
    /// A bare exercise performed outside any block
    Exercise {
        exercise_id: ExerciseId,
        #[serde(default)]
        protocol_id: Option<ProtocolId>,
    },
    /// A block of alternative variants
    Block { block_id: BlockId },
    /// A rest pause, shown to the athlete but never navigated to
    Rest {
        #[serde(default)]
        content: String,
        #[serde(default)]
        duration_seconds: Option<u32>,
    },
    /// Free-text information for the athlete
    Info { content: String },
}

/// One ordered entry of a workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanItem {
    pub id: PlanItemId,
    pub workout_id: WorkoutId,
    pub sort_order: i64,
    #[serde(flatten)]
    pub kind: PlanItemKind,
}

impl PlanItem {
    /// Whether navigation may land on this item (exercises and blocks)
    pub fn is_actionable(&self) -> bool {
        matches!(
            self.kind,
            PlanItemKind::Exercise { .. } | PlanItemKind::Block { .. }
        )
    }

    /// Short name of the item's tag
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            PlanItemKind::Exercise { .. } => "exercise",
            PlanItemKind::Block { .. } => "block",
            PlanItemKind::Rest { .. } => "rest",
            PlanItemKind::Info { .. } => "info",
        }
    }
}

// ============================================================================
// Blocks and Variants
// ============================================================================

/// A sub-container of one or more variants (e.g. a circuit)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    #[serde(default)]
    pub rounds: Option<u32>,
}

/// One concrete realization of a block
///
/// Labels are unique within a block but positional: they are not stable
/// identifiers and may be reassigned.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variant {
    pub id: VariantId,
    pub block_id: BlockId,
    #[serde(rename = "variant_label")]
    pub label: String,
    #[serde(default)]
    pub name: Option<String>,
    pub sort_order: i64,
}

/// An (exercise, protocol) pairing, the atomic unit of athlete work
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantItem {
    pub id: VariantItemId,
    pub variant_id: VariantId,
    pub sort_order: i64,
    pub exercise_id: ExerciseId,
    pub protocol_id: ProtocolId,
}

// ============================================================================
// Reference Data
// ============================================================================

/// Exercise reference data (read-only)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exercise {
    pub id: ExerciseId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

/// Protocol reference data (read-only)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Protocol {
    pub id: ProtocolId,
    pub name: String,
    #[serde(default)]
    pub sets: Option<u32>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub intensity: Option<String>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time structure of one workout, as supplied by the store
///
/// Rows are kept flat, the way the store returns them. [`crate::PlanTree`]
/// validates and indexes them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSnapshot {
    pub workout: Workout,
    #[serde(default)]
    pub plan_items: Vec<PlanItem>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub variant_items: Vec<VariantItem>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub protocols: Vec<Protocol>,
    /// Active variant label per block; blocks not listed use their first variant
    #[serde(default)]
    pub active_variants: BTreeMap<BlockId, String>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

impl WorkoutSnapshot {
    /// An empty snapshot for a new workout
    pub fn new(workout: Workout) -> Self {
        Self {
            workout,
            plan_items: Vec::new(),
            blocks: Vec::new(),
            variants: Vec::new(),
            variant_items: Vec::new(),
            exercises: Vec::new(),
            protocols: Vec::new(),
            active_variants: BTreeMap::new(),
            captured_at: None,
        }
    }

    /// Variants belonging to a block, in snapshot order
    pub fn variants_of(&self, block_id: BlockId) -> Vec<Variant> {
        self.variants
            .iter()
            .filter(|v| v.block_id == block_id)
            .cloned()
            .collect()
    }

    /// Items belonging to a variant, in snapshot order
    pub fn items_of(&self, variant_id: VariantId) -> Vec<VariantItem> {
        self.variant_items
            .iter()
            .filter(|i| i.variant_id == variant_id)
            .cloned()
            .collect()
    }

    /// The active label of a block: the explicit selection, or the label
    /// of its first variant by sort order
    pub fn active_label(&self, block_id: BlockId) -> Option<String> {
        if let Some(label) = self.active_variants.get(&block_id) {
            return Some(label.clone());
        }
        self.variants
            .iter()
            .filter(|v| v.block_id == block_id)
            .min_by_key(|v| v.sort_order)
            .map(|v| v.label.clone())
    }
}

// ============================================================================
// Navigation Cursor
// ============================================================================

/// Caller-supplied "where am I" pointer; never persisted by the engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationCursor {
    pub plan_item_id: PlanItemId,
    #[serde(default)]
    pub exercise_id: Option<ExerciseId>,
    #[serde(default)]
    pub protocol_id: Option<ProtocolId>,
    /// Exact item inside the active variant; wins over the pair when both are given
    #[serde(default)]
    pub variant_item_id: Option<VariantItemId>,
    #[serde(default)]
    pub program_id: Option<ProgramId>,
}

impl NavigationCursor {
    /// Cursor pointing at a plan item, with no position inside a block
    pub fn at(plan_item_id: PlanItemId) -> Self {
        Self {
            plan_item_id,
            exercise_id: None,
            protocol_id: None,
            variant_item_id: None,
            program_id: None,
        }
    }

    /// Set the (exercise, protocol) pair identifying a position in a block.
    pub fn with_pair(mut self, exercise_id: ExerciseId, protocol_id: ProtocolId) -> Self {
        self.exercise_id = Some(exercise_id);
        self.protocol_id = Some(protocol_id);
        self
    }

    /// Set the exact variant item.
    pub fn with_variant_item(mut self, variant_item_id: VariantItemId) -> Self {
        self.variant_item_id = Some(variant_item_id);
        self
    }

    /// Set the program context.
    pub fn in_program(mut self, program_id: ProgramId) -> Self {
        self.program_id = Some(program_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_item_wire_shape() {
        let item = PlanItem {
            id: PlanItemId::generate(),
            workout_id: WorkoutId::generate(),
            sort_order: 3,
            kind: PlanItemKind::Rest {
                content: "Breathe".into(),
                duration_seconds: Some(90),
            },
        };

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "rest");
        assert_eq!(value["duration_seconds"], 90);

        let parsed: PlanItem = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, item);
        assert!(!parsed.is_actionable());
    }

    #[test]
    fn test_variant_label_field_name() {
        let variant = Variant {
            id: VariantId::generate(),
            block_id: BlockId::generate(),
            label: "B".into(),
            name: None,
            sort_order: 1,
        };
        let value = serde_json::to_value(&variant).unwrap();
        assert_eq!(value["variant_label"], "B");
    }

    #[test]
    fn test_active_label_defaults_to_first_variant() {
        let block_id = BlockId::generate();
        let mut snapshot = WorkoutSnapshot::new(Workout {
            id: WorkoutId::generate(),
            title: "Legs".into(),
            archived: false,
        });
        for (label, order) in [("B", 5), ("A", 2)] {
            snapshot.variants.push(Variant {
                id: VariantId::generate(),
                block_id,
                label: label.into(),
                name: None,
                sort_order: order,
            });
        }

        assert_eq!(snapshot.active_label(block_id).as_deref(), Some("A"));

        snapshot.active_variants.insert(block_id, "B".into());
        assert_eq!(snapshot.active_label(block_id).as_deref(), Some("B"));
    }

    #[test]
    fn test_minimal_snapshot_parses() {
        let json = r#"{
            "workout": {"id": "6f1c1a52-1b0e-4a8e-9a57-52f8d8f4b0a1", "title": "Empty"}
        }"#;
        let snapshot: WorkoutSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.plan_items.is_empty());
        assert!(!snapshot.workout.archived);
    }
}
