//! The persistent store the controller reconciles against.
//!
//! Only the contract matters to the engine: filtered listing plus typed
//! get/update/delete keyed by identifier, linearizable per key. The in-tree
//! backend lives in [`memory`]; anything heavier is a deployment concern.

use async_trait::async_trait;

use crate::data_model::{Entity, EntityType, Status};

pub mod memory;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("entity not found. type: {entity_type}, id: {id}")]
    NotFound { entity_type: EntityType, id: String },

    #[error("entity already exists. type: {entity_type}, name: {name}")]
    AlreadyExists {
        entity_type: EntityType,
        name: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single field comparison. Filters are conjunctions of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    TypeIs(EntityType),
    NameIs(String),
    /// ModifiedTime strictly before the given epoch-ms instant.
    ModifiedBefore(u64),
    StatusIn(Vec<Status>),
}

impl Predicate {
    fn matches(&self, entity: &Entity) -> bool {
        match self {
            Predicate::TypeIs(entity_type) => entity.entity_type() == *entity_type,
            Predicate::NameIs(name) => entity.name() == name,
            Predicate::ModifiedBefore(instant) => entity.modified_time() < *instant,
            Predicate::StatusIn(statuses) => statuses.contains(&entity.status()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// A filter matching every entity.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn field(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.predicates.iter().all(|p| p.matches(entity))
    }
}

/// Store contract the controller and handlers consume.
///
/// `update` is the only write path handlers use; implementations bump
/// `modified_time` monotonically on every update so the resync filter can
/// tell stale entities from fresh ones.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn add(&self, entity: Entity) -> Result<Entity>;

    async fn get(&self, entity_type: EntityType, id: &str) -> Result<Option<Entity>>;

    async fn update(&self, entity: Entity) -> Result<Entity>;

    /// Removes the row. Deleting an absent row is a success; the delete
    /// handler re-observes deletions on resync.
    async fn delete(&self, entity_type: EntityType, id: &str) -> Result<()>;

    async fn list_global(&self, filter: Filter) -> Result<Vec<Entity>>;
}
