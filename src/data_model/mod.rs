
use std::collections::HashMap;

use derive_builder::Builder;
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::utils::get_epoch_time_in_ms;

/// Reconciliation status of an entity. Transitions are driven by entity
/// handlers only; the controller reads the status to route, never writes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Status {
    /// Newly written by the API, not yet realized at the backend.
    Initialized,
    /// Realization in progress.
    Creating,
    /// Realized-elsewhere state was lost.
    Missing,
    /// Declared configuration changed.
    Updating,
    /// Converged.
    Ready,
    /// Deletion in progress.
    Deleting,
    /// Terminal failure awaiting intervention.
    Error,
}

/// Runtime tag discriminating entity variants. Keys the handler registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub enum EntityType {
    Function,
    FunctionRun,
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct Function {
    #[builder(default = "nanoid!()")]
    pub id: String,
    pub name: String,
    /// Container image the function executes in.
    pub image: String,
    /// Function source, baked into the image by the build step.
    #[builder(setter(into), default)]
    pub source: String,
    #[builder(setter(into), default = "\"main\".to_string()")]
    pub main: String,
    #[builder(default)]
    pub secrets: Vec<String>,
    #[builder(default)]
    pub labels: HashMap<String, String>,
    #[builder(default = "Status::Initialized")]
    pub status: Status,
    #[builder(default)]
    pub delete: bool,
    #[builder(default = "self.default_created_at()")]
    pub created_time: u64,
    #[builder(default = "self.default_created_at()")]
    pub modified_time: u64,
    /// Why the entity is in ERROR, when it is.
    #[builder(setter(into, strip_option), default)]
    pub reason: Option<String>,
}

impl FunctionBuilder {
    fn default_created_at(&self) -> u64 {
        get_epoch_time_in_ms()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct FunctionRun {
    #[builder(default = "nanoid!()")]
    pub id: String,
    /// Name of the function this run invokes.
    pub function_name: String,
    #[builder(default = "serde_json::Value::Null")]
    pub input: serde_json::Value,
    #[builder(setter(strip_option), default)]
    pub output: Option<serde_json::Value>,
    #[builder(default = "Status::Initialized")]
    pub status: Status,
    #[builder(default)]
    pub delete: bool,
    #[builder(default = "self.default_created_at()")]
    pub created_time: u64,
    #[builder(default = "self.default_created_at()")]
    pub modified_time: u64,
    #[builder(setter(into, strip_option), default)]
    pub reason: Option<String>,
}

impl FunctionRunBuilder {
    fn default_created_at(&self) -> u64 {
        get_epoch_time_in_ms()
    }
}

/// The polymorphic unit the controller manipulates. Variants carry payload
/// fields the controller never inspects; it sees only the accessors below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entity {
    Function(Function),
    FunctionRun(FunctionRun),
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Function(_) => EntityType::Function,
            Entity::FunctionRun(_) => EntityType::FunctionRun,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Function(f) => &f.id,
            Entity::FunctionRun(r) => &r.id,
        }
    }

    /// Runs are not user-named; their id doubles as the name.
    pub fn name(&self) -> &str {
        match self {
            Entity::Function(f) => &f.name,
            Entity::FunctionRun(r) => &r.id,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Entity::Function(f) => f.status,
            Entity::FunctionRun(r) => r.status,
        }
    }

    pub fn delete(&self) -> bool {
        match self {
            Entity::Function(f) => f.delete,
            Entity::FunctionRun(r) => r.delete,
        }
    }

    pub fn modified_time(&self) -> u64 {
        match self {
            Entity::Function(f) => f.modified_time,
            Entity::FunctionRun(r) => r.modified_time,
        }
    }

    pub fn set_status(&mut self, status: Status) {
        match self {
            Entity::Function(f) => f.status = status,
            Entity::FunctionRun(r) => r.status = status,
        }
    }

    pub fn set_delete(&mut self, delete: bool) {
        match self {
            Entity::Function(f) => f.delete = delete,
            Entity::FunctionRun(r) => r.delete = delete,
        }
    }

    pub(crate) fn set_modified_time(&mut self, modified_time: u64) {
        match self {
            Entity::Function(f) => f.modified_time = modified_time,
            Entity::FunctionRun(r) => r.modified_time = modified_time,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Entity::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_function_run(&self) -> Option<&FunctionRun> {
        match self {
            Entity::FunctionRun(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Function> for Entity {
    fn from(function: Function) -> Self {
        Entity::Function(function)
    }
}

impl From<FunctionRun> for Entity {
    fn from(run: FunctionRun) -> Self {
        Entity::FunctionRun(run)
    }
}
