//! Typed identifiers for every entity in a workout plan.
//!
//! The external store hands out UUIDs for all rows. Wrapping each kind in
//! its own newtype keeps a block id from being passed where a variant id
//! is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// Identifier of a workout (the root container)
    WorkoutId
);
entity_id!(
    /// Identifier of one ordered entry in a workout
    PlanItemId
);
entity_id!(
    /// Identifier of a block
    BlockId
);
entity_id!(
    /// Identifier of a block variant
    VariantId
);
entity_id!(
    /// Identifier of an (exercise, protocol) pairing inside a variant
    VariantItemId
);
entity_id!(
    /// Identifier of exercise reference data
    ExerciseId
);
entity_id!(
    /// Identifier of protocol reference data
    ProtocolId
);
entity_id!(
    /// Identifier of the program a workout is being followed under
    ProgramId
);
