#![forbid(unsafe_code)]

//! Core structure and navigation engine for coach-authored workout plans.
//!
//! This crate provides:
//! - Domain types (workouts, plan items, blocks, variants, cursors)
//! - Plan tree loading and structural validation
//! - Variant management (labels, creation, deletion, duplication)
//! - Navigation (current position, next and previous step)
//! - Snapshot persistence and access control seams

pub mod ids;
pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod tree;
pub mod variants;
pub mod mutation;
pub mod navigation;
pub mod snapshot;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
pub use config::Config;
pub use tree::PlanTree;
pub use variants::{
    plan_block_creation, plan_next_label, plan_variant_creation, plan_variant_deletion,
    plan_variant_duplication, plan_variant_item_append, plan_variant_relabel,
};
pub use mutation::MutationPlan;
pub use navigation::{resolve_navigation, Navigation, NavigationOutcome, Position, Step};
pub use snapshot::{AccessControl, JsonSnapshotStore, Principal, SnapshotProvider};
