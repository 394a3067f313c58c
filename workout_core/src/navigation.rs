//! Navigation through a loaded workout.
//!
//! Given a cursor, this module works out where the athlete is and what the
//! neighbouring steps are. It keeps no history: next and previous are both
//! derived from sort_order alone, so any position can be resolved again
//! from its cursor.
//!
//! ## Rules
//!
//! 1. An exercise plan item is a single position outside any block
//! 2. A block is entered at the first item of its active variant and left
//!    after the last one
//! 3. Rest and info items are shown but never navigated to; they are
//!    skipped when looking for the next or previous step
//! 4. A workout with nothing actionable resolves to `EmptyWorkout`

use crate::ids::*;
use crate::{
    Error, NavigationCursor, PlanItem, PlanItemKind, PlanTree, Result, Variant, VariantItem,
    WorkoutSnapshot,
};
use serde::{Deserialize, Serialize};

/// A place the athlete can be
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    /// A bare exercise plan item
    Exercise {
        plan_item_id: PlanItemId,
        exercise_id: ExerciseId,
        protocol_id: Option<ProtocolId>,
    },
    /// One item inside a block's active variant
    BlockItem {
        plan_item_id: PlanItemId,
        block_id: BlockId,
        variant_id: VariantId,
        variant_label: String,
        variant_item_id: VariantItemId,
        exercise_id: ExerciseId,
        protocol_id: ProtocolId,
        /// Zero-based index within the variant
        index: usize,
        /// Number of items in the variant
        item_count: usize,
    },
}

impl Position {
    pub fn plan_item_id(&self) -> PlanItemId {
        match self {
            Position::Exercise { plan_item_id, .. } | Position::BlockItem { plan_item_id, .. } => {
                *plan_item_id
            }
        }
    }

    pub fn exercise_id(&self) -> ExerciseId {
        match self {
            Position::Exercise { exercise_id, .. } | Position::BlockItem { exercise_id, .. } => {
                *exercise_id
            }
        }
    }

    /// A cursor that resolves back to exactly this position
    pub fn to_cursor(&self, program_id: Option<ProgramId>) -> NavigationCursor {
        let cursor = match self {
            Position::Exercise { plan_item_id, .. } => NavigationCursor::at(*plan_item_id),
            Position::BlockItem {
                plan_item_id,
                variant_item_id,
                exercise_id,
                protocol_id,
                ..
            } => NavigationCursor::at(*plan_item_id)
                .with_pair(*exercise_id, *protocol_id)
                .with_variant_item(*variant_item_id),
        };
        match program_id {
            Some(program_id) => cursor.in_program(program_id),
            None => cursor,
        }
    }
}

/// Neighbouring step in either direction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", content = "position", rename_all = "snake_case")]
pub enum Step {
    At(Position),
    EndOfWorkout,
    StartOfWorkout,
}

impl Step {
    pub fn position(&self) -> Option<&Position> {
        match self {
            Step::At(position) => Some(position),
            Step::EndOfWorkout | Step::StartOfWorkout => None,
        }
    }
}

/// Whether the current position is inside a block
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "context", rename_all = "snake_case")]
pub enum NavigationContext {
    Outside,
    InsideBlockVariant {
        block_id: BlockId,
        block_name: String,
        rounds: Option<u32>,
        variant_id: VariantId,
        variant_label: String,
    },
}

/// A fully resolved cursor
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Navigation {
    pub workout_id: WorkoutId,
    pub program_id: Option<ProgramId>,
    pub context: NavigationContext,
    pub current: Position,
    pub next: Step,
    pub previous: Step,
}

/// Result of resolving a cursor
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// Nothing in the workout can be navigated to
    EmptyWorkout,
    Resolved(Navigation),
}

impl NavigationOutcome {
    pub fn navigation(&self) -> Option<&Navigation> {
        match self {
            NavigationOutcome::Resolved(navigation) => Some(navigation),
            NavigationOutcome::EmptyWorkout => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Load a snapshot and resolve a cursor against it
pub fn resolve_navigation(
    cursor: &NavigationCursor,
    snapshot: &WorkoutSnapshot,
) -> Result<NavigationOutcome> {
    let tree = PlanTree::load(snapshot.clone())?;
    resolve(&tree, cursor)
}

/// Resolve a cursor against a loaded tree
pub fn resolve(tree: &PlanTree, cursor: &NavigationCursor) -> Result<NavigationOutcome> {
    if !tree.has_actionable_items() {
        tracing::debug!("Workout {} has no actionable items", tree.workout().id);
        return Ok(NavigationOutcome::EmptyWorkout);
    }

    let item = tree.plan_item(cursor.plan_item_id).ok_or_else(|| {
        Error::NotFound(format!(
            "Plan item '{}' in workout '{}'",
            cursor.plan_item_id,
            tree.workout().id
        ))
    })?;

    let current = match &item.kind {
        PlanItemKind::Exercise {
            exercise_id,
            protocol_id,
        } => Position::Exercise {
            plan_item_id: item.id,
            exercise_id: *exercise_id,
            protocol_id: *protocol_id,
        },
        PlanItemKind::Block { block_id } => locate_in_block(tree, item.id, *block_id, cursor)?,
        PlanItemKind::Rest { .. } | PlanItemKind::Info { .. } => {
            return Err(Error::InvalidParameters(format!(
                "Plan item '{}' is a {} item and cannot be a position",
                item.id,
                item.kind_name()
            )))
        }
    };

    describe(tree, current, cursor.program_id).map(NavigationOutcome::Resolved)
}

/// Resolve the first actionable position of the workout
pub fn start(tree: &PlanTree, program_id: Option<ProgramId>) -> Result<NavigationOutcome> {
    for item in tree.ordered_plan_items() {
        if let Some(position) = entry_position(tree, item, Direction::Forward)? {
            return describe(tree, position, program_id).map(NavigationOutcome::Resolved);
        }
    }
    Ok(NavigationOutcome::EmptyWorkout)
}

/// Step after `current`
///
/// `current` must match the tree: a stale or hand-built position is
/// rejected with `InvalidParameters`.
pub fn next(tree: &PlanTree, current: &Position) -> Result<Step> {
    let from = verify(tree, current)?;

    if let Position::BlockItem {
        plan_item_id,
        block_id,
        variant_id,
        index,
        ..
    } = current
    {
        let variant = tree.variant(*variant_id)?;
        let items = tree.items_of(*variant_id)?;
        // verify() keeps index below items.len()
        if index + 1 < items.len() {
            return Ok(Step::At(block_position(
                *plan_item_id,
                *block_id,
                variant,
                items,
                index + 1,
            )));
        }
        tracing::debug!("Variant {} exhausted, leaving block {}", variant.label, block_id);
    }

    for item in &tree.ordered_plan_items()[from + 1..] {
        if let Some(position) = entry_position(tree, item, Direction::Forward)? {
            return Ok(Step::At(position));
        }
    }
    Ok(Step::EndOfWorkout)
}

/// Step before `current`
///
/// Same validation as [`next`].
pub fn previous(tree: &PlanTree, current: &Position) -> Result<Step> {
    let from = verify(tree, current)?;

    if let Position::BlockItem {
        plan_item_id,
        block_id,
        variant_id,
        index,
        ..
    } = current
    {
        if *index > 0 {
            let variant = tree.variant(*variant_id)?;
            let items = tree.items_of(*variant_id)?;
            return Ok(Step::At(block_position(
                *plan_item_id,
                *block_id,
                variant,
                items,
                index - 1,
            )));
        }
    }

    for item in tree.ordered_plan_items()[..from].iter().rev() {
        if let Some(position) = entry_position(tree, item, Direction::Backward)? {
            return Ok(Step::At(position));
        }
    }
    Ok(Step::StartOfWorkout)
}

/// Check a position against the tree and return its plan item index
///
/// A block position must name the block's active variant and the item
/// that actually sits at `index`.
fn verify(tree: &PlanTree, current: &Position) -> Result<usize> {
    let from = plan_index(tree, current.plan_item_id())?;
    let item = tree
        .plan_item(current.plan_item_id())
        .ok_or_else(|| Error::NotFound(format!("Plan item '{}'", current.plan_item_id())))?;

    match (current, &item.kind) {
        (Position::Exercise { .. }, PlanItemKind::Exercise { .. }) => Ok(from),
        (
            Position::BlockItem {
                block_id,
                variant_id,
                variant_item_id,
                index,
                ..
            },
            PlanItemKind::Block { block_id: owner },
        ) if owner == block_id => {
            let active = tree.active_variant(*block_id)?;
            if active.id != *variant_id {
                return Err(Error::InvalidParameters(format!(
                    "Variant '{}' is not the active variant of block '{}'",
                    variant_id, block_id
                )));
            }
            match tree.items_of(*variant_id)?.get(*index) {
                Some(found) if found.id == *variant_item_id => Ok(from),
                _ => Err(Error::InvalidParameters(format!(
                    "Variant item '{}' is not at index {} of variant '{}'",
                    variant_item_id, index, active.label
                ))),
            }
        }
        _ => Err(Error::InvalidParameters(format!(
            "Position does not match {} plan item '{}'",
            item.kind_name(),
            item.id
        ))),
    }
}

fn describe(
    tree: &PlanTree,
    current: Position,
    program_id: Option<ProgramId>,
) -> Result<Navigation> {
    let context = match &current {
        Position::Exercise { .. } => NavigationContext::Outside,
        Position::BlockItem {
            block_id,
            variant_id,
            variant_label,
            ..
        } => {
            let block = tree.block(*block_id)?;
            NavigationContext::InsideBlockVariant {
                block_id: *block_id,
                block_name: block.name.clone(),
                rounds: block.rounds,
                variant_id: *variant_id,
                variant_label: variant_label.clone(),
            }
        }
    };

    let next = next(tree, &current)?;
    let previous = previous(tree, &current)?;

    Ok(Navigation {
        workout_id: tree.workout().id,
        program_id,
        context,
        current,
        next,
        previous,
    })
}

fn plan_index(tree: &PlanTree, plan_item_id: PlanItemId) -> Result<usize> {
    tree.plan_item_index(plan_item_id)
        .ok_or_else(|| Error::NotFound(format!("Plan item '{}'", plan_item_id)))
}

/// Where navigation lands when arriving at `item` from the given direction
fn entry_position(
    tree: &PlanTree,
    item: &PlanItem,
    direction: Direction,
) -> Result<Option<Position>> {
    match &item.kind {
        PlanItemKind::Exercise {
            exercise_id,
            protocol_id,
        } => Ok(Some(Position::Exercise {
            plan_item_id: item.id,
            exercise_id: *exercise_id,
            protocol_id: *protocol_id,
        })),
        PlanItemKind::Block { block_id } => {
            let variant = tree.active_variant(*block_id)?;
            let items = non_empty_items(tree, variant)?;
            let index = match direction {
                Direction::Forward => 0,
                Direction::Backward => items.len() - 1,
            };
            Ok(Some(block_position(item.id, *block_id, variant, items, index)))
        }
        PlanItemKind::Rest { .. } | PlanItemKind::Info { .. } => Ok(None),
    }
}

fn non_empty_items<'a>(tree: &'a PlanTree, variant: &Variant) -> Result<&'a [VariantItem]> {
    let items = tree.items_of(variant.id)?;
    if items.is_empty() {
        return Err(Error::StructureInconsistent(format!(
            "Active variant '{}' of block '{}' has no items",
            variant.label, variant.block_id
        )));
    }
    Ok(items)
}

fn locate_in_block(
    tree: &PlanTree,
    plan_item_id: PlanItemId,
    block_id: BlockId,
    cursor: &NavigationCursor,
) -> Result<Position> {
    let variant = tree.active_variant(block_id)?;
    let items = non_empty_items(tree, variant)?;

    let by_pair = match (cursor.exercise_id, cursor.protocol_id) {
        (Some(exercise_id), Some(protocol_id)) => Some((exercise_id, protocol_id)),
        (None, None) => None,
        _ => {
            return Err(Error::InvalidParameters(
                "exercise_id and protocol_id must be supplied together".into(),
            ))
        }
    };

    let index = match (cursor.variant_item_id, by_pair) {
        (Some(item_id), pair) => {
            let index = items
                .iter()
                .position(|i| i.id == item_id)
                .ok_or_else(|| {
                    Error::InvalidParameters(format!(
                        "Variant item '{}' is not in active variant '{}'",
                        item_id, variant.label
                    ))
                })?;
            if let Some((exercise_id, protocol_id)) = pair {
                let item = &items[index];
                if item.exercise_id != exercise_id || item.protocol_id != protocol_id {
                    return Err(Error::InvalidParameters(format!(
                        "Variant item '{}' does not pair exercise '{}' with protocol '{}'",
                        item_id, exercise_id, protocol_id
                    )));
                }
            }
            index
        }
        (None, Some((exercise_id, protocol_id))) => items
            .iter()
            .position(|i| i.exercise_id == exercise_id && i.protocol_id == protocol_id)
            .ok_or_else(|| {
                Error::InvalidParameters(format!(
                    "Exercise '{}' with protocol '{}' is not in active variant '{}'",
                    exercise_id, protocol_id, variant.label
                ))
            })?,
        (None, None) => 0,
    };

    Ok(block_position(plan_item_id, block_id, variant, items, index))
}

fn block_position(
    plan_item_id: PlanItemId,
    block_id: BlockId,
    variant: &Variant,
    items: &[VariantItem],
    index: usize,
) -> Position {
    let item = &items[index];
    Position::BlockItem {
        plan_item_id,
        block_id,
        variant_id: variant.id,
        variant_label: variant.label.clone(),
        variant_item_id: item.id,
        exercise_id: item.exercise_id,
        protocol_id: item.protocol_id,
        index,
        item_count: items.len(),
    }
}
