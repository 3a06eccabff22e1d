//! # Unit Registry
//!
//! The declarative list of sync units a pass runs. Adding an entity is one
//! `register::<R>()` line; the orchestrator never names entities itself.

use std::sync::Arc;

use tracing::debug;

use campus_core::{
    AttendanceRecord, Course, EntityKind, Exam, Fee, SchoolClass, Student, SyncRecord, Teacher,
    User,
};

use crate::unit::{EntitySyncUnit, SyncUnit};

/// Ordered set of sync units, at most one per entity.
#[derive(Clone, Default)]
pub struct UnitRegistry {
    units: Vec<Arc<dyn SyncUnit>>,
}

impl UnitRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// All eight school entities.
    pub fn standard() -> Self {
        UnitRegistry::new()
            .register::<User>()
            .register::<Teacher>()
            .register::<Student>()
            .register::<Course>()
            .register::<SchoolClass>()
            .register::<AttendanceRecord>()
            .register::<Exam>()
            .register::<Fee>()
    }

    /// Registers the standard unit for `R`.
    pub fn register<R: SyncRecord>(self) -> Self {
        self.with_unit(Arc::new(EntitySyncUnit::<R>::new()))
    }

    /// Registers a custom unit. A unit for an already registered entity
    /// replaces the old one in place.
    pub fn with_unit(mut self, unit: Arc<dyn SyncUnit>) -> Self {
        let entity = unit.entity();
        match self.units.iter_mut().find(|u| u.entity() == entity) {
            Some(existing) => {
                debug!(%entity, "Replacing registered sync unit");
                *existing = unit;
            }
            None => self.units.push(unit),
        }
        self
    }

    pub fn units(&self) -> &[Arc<dyn SyncUnit>] {
        &self.units
    }

    /// Registered entities in registration order.
    pub fn entities(&self) -> Vec<EntityKind> {
        self.units.iter().map(|u| u.entity()).collect()
    }

    pub fn contains(&self, entity: EntityKind) -> bool {
        self.units.iter().any(|u| u.entity() == entity)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entities()).finish()
    }
}
