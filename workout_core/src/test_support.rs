//! Snapshot builders shared by unit tests.

use crate::ids::*;
use crate::{Block, PlanItem, PlanItemKind, Variant, VariantItem, Workout, WorkoutSnapshot};

pub(crate) struct SnapshotBuilder {
    snapshot: WorkoutSnapshot,
    next_order: i64,
}

impl SnapshotBuilder {
    pub(crate) fn new(title: &str) -> Self {
        Self {
            snapshot: WorkoutSnapshot::new(Workout {
                id: WorkoutId::generate(),
                title: title.into(),
                archived: false,
            }),
            next_order: 0,
        }
    }

    fn push(&mut self, sort_order: i64, kind: PlanItemKind) -> PlanItemId {
        let id = PlanItemId::generate();
        self.snapshot.plan_items.push(PlanItem {
            id,
            workout_id: self.snapshot.workout.id,
            sort_order,
            kind,
        });
        self.next_order = self.next_order.max(sort_order + 1);
        id
    }

    pub(crate) fn exercise(&mut self) -> PlanItemId {
        self.exercise_at(self.next_order)
    }

    pub(crate) fn exercise_at(&mut self, sort_order: i64) -> PlanItemId {
        self.push(
            sort_order,
            PlanItemKind::Exercise {
                exercise_id: ExerciseId::generate(),
                protocol_id: Some(ProtocolId::generate()),
            },
        )
    }

    pub(crate) fn rest(&mut self) -> PlanItemId {
        self.rest_at(self.next_order)
    }

    pub(crate) fn rest_at(&mut self, sort_order: i64) -> PlanItemId {
        self.push(
            sort_order,
            PlanItemKind::Rest {
                content: "Rest".into(),
                duration_seconds: Some(60),
            },
        )
    }

    pub(crate) fn info(&mut self) -> PlanItemId {
        let order = self.next_order;
        self.push(
            order,
            PlanItemKind::Info {
                content: "Keep your back straight".into(),
            },
        )
    }

    /// Add a block with one variant per entry, each holding that many items.
    /// Variants are labelled A, B, ... in order.
    pub(crate) fn block(&mut self, variant_sizes: &[usize]) -> (PlanItemId, BlockId) {
        let block_id = BlockId::generate();
        self.snapshot.blocks.push(Block {
            id: block_id,
            name: format!("Block {}", self.snapshot.blocks.len() + 1),
            rounds: Some(3),
        });
        for (pos, size) in variant_sizes.iter().enumerate() {
            let variant_id = VariantId::generate();
            self.snapshot.variants.push(Variant {
                id: variant_id,
                block_id,
                label: crate::variants::label_for_index(pos),
                name: None,
                sort_order: pos as i64,
            });
            for order in 0..*size {
                self.snapshot.variant_items.push(VariantItem {
                    id: VariantItemId::generate(),
                    variant_id,
                    sort_order: order as i64,
                    exercise_id: ExerciseId::generate(),
                    protocol_id: ProtocolId::generate(),
                });
            }
        }
        let order = self.next_order;
        let plan_item = self.push(order, PlanItemKind::Block { block_id });
        (plan_item, block_id)
    }

    pub(crate) fn build(self) -> WorkoutSnapshot {
        self.snapshot
    }
}
