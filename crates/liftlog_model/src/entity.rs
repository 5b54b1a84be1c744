//! Entity kinds and the foreign-key dependency graph.
//!
//! Entity types form a DAG by foreign key: a `Workout` may reference a
//! `Cycle`, an `Exercise` always references a `Workout`. The push and pull
//! pipelines iterate the fixed topological orders defined here, so a parent
//! type is always processed to completion before its dependents. Adding a
//! new entity type means extending this enum and the order slices; the
//! pipelines themselves are generic over `EntityKind`.

use serde::{Deserialize, Serialize};

/// The entity types synchronized between the local and remote stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// The user profile. Root of all user-scoped data.
    Profile,
    /// A training cycle (mesocycle). Parent of workouts.
    Cycle,
    /// A workout session. May reference a cycle, parent of exercises.
    Workout,
    /// An exercise performed within a workout.
    Exercise,
    /// A training goal. Independent leaf.
    Goal,
    /// A body measurement. Independent leaf.
    Measurement,
    /// A strength test result. Independent leaf.
    StrengthTest,
    /// A scheduled training reminder. Independent leaf.
    ScheduledTraining,
}

impl EntityKind {
    /// Fixed topological order for pushing local changes.
    ///
    /// Workouts carry a nullable `cycle_id` and exercises a `workout_id`,
    /// so parents must reach the remote store before their dependents.
    pub const PUSH_ORDER: [EntityKind; 7] = [
        EntityKind::Cycle,
        EntityKind::Workout,
        EntityKind::Exercise,
        EntityKind::Goal,
        EntityKind::Measurement,
        EntityKind::StrengthTest,
        EntityKind::ScheduledTraining,
    ];

    /// Fixed order for pulling remote changes: profile first (all
    /// user-scoped rows reference it), then the push order.
    pub const PULL_ORDER: [EntityKind; 8] = [
        EntityKind::Profile,
        EntityKind::Cycle,
        EntityKind::Workout,
        EntityKind::Exercise,
        EntityKind::Goal,
        EntityKind::Measurement,
        EntityKind::StrengthTest,
        EntityKind::ScheduledTraining,
    ];

    /// The table name shared by the local and remote stores.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Profile => "profiles",
            EntityKind::Cycle => "cycles",
            EntityKind::Workout => "workouts",
            EntityKind::Exercise => "exercises",
            EntityKind::Goal => "goals",
            EntityKind::Measurement => "measurements",
            EntityKind::StrengthTest => "strength_tests",
            EntityKind::ScheduledTraining => "scheduled_trainings",
        }
    }

    /// The parent entity type this kind references by foreign key, if any.
    ///
    /// Profile linkage is by `user_id` scoping, not a row-level foreign
    /// key, so it is not part of the parent graph.
    pub fn parent(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Workout => Some(EntityKind::Cycle),
            EntityKind::Exercise => Some(EntityKind::Workout),
            _ => None,
        }
    }

    /// The foreign-key field on rows of this kind pointing at the parent.
    pub fn parent_field(&self) -> Option<&'static str> {
        match self {
            EntityKind::Workout => Some("cycle_id"),
            EntityKind::Exercise => Some("workout_id"),
            _ => None,
        }
    }

    /// Entity types whose rows reference rows of this kind.
    ///
    /// Drives cascade deletion: removing a row removes its dependents
    /// first.
    pub fn children(self) -> impl Iterator<Item = EntityKind> {
        Self::PULL_ORDER
            .into_iter()
            .filter(move |kind| kind.parent() == Some(self))
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Profile => "profile",
            EntityKind::Cycle => "cycle",
            EntityKind::Workout => "workout",
            EntityKind::Exercise => "exercise",
            EntityKind::Goal => "goal",
            EntityKind::Measurement => "measurement",
            EntityKind::StrengthTest => "strength_test",
            EntityKind::ScheduledTraining => "scheduled_training",
        };
        write!(f, "{name}")
    }
}
