use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::data_model::{
    Function, FunctionBuilder, FunctionRun, FunctionRunBuilder, Status,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    status_code: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_error(e: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string().as_str())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("API Error: {} - {}", self.status_code, self.message);
        (self.status_code, self.message).into_response()
    }
}

impl From<crate::entity_store::Error> for ApiError {
    fn from(e: crate::entity_store::Error) -> Self {
        match e {
            crate::entity_store::Error::NotFound { .. } => Self::not_found(&e.to_string()),
            crate::entity_store::Error::AlreadyExists { .. } => Self::conflict(&e.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFunction {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl CreateFunction {
    pub fn into_function(self) -> Result<Function, ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::bad_request("function name must not be empty"));
        }
        let mut builder = FunctionBuilder::default();
        builder
            .name(self.name)
            .image(self.image)
            .source(self.source)
            .secrets(self.secrets)
            .labels(self.labels);
        if let Some(main) = self.main {
            builder.main(main);
        }
        builder
            .build()
            .map_err(|e| ApiError::bad_request(&e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateFunction {
    pub image: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiFunction {
    pub id: String,
    pub name: String,
    pub image: String,
    pub main: String,
    pub status: Status,
    pub reason: Option<String>,
    pub created_time: u64,
    pub modified_time: u64,
}

impl From<Function> for ApiFunction {
    fn from(function: Function) -> Self {
        Self {
            id: function.id,
            name: function.name,
            image: function.image,
            main: function.main,
            status: function.status,
            reason: function.reason,
            created_time: function.created_time,
            modified_time: function.modified_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FunctionList {
    pub functions: Vec<ApiFunction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunFunction {
    #[serde(default)]
    pub input: serde_json::Value,
}

impl RunFunction {
    pub fn into_run(self, function_name: &str) -> Result<FunctionRun, ApiError> {
        FunctionRunBuilder::default()
            .function_name(function_name.to_string())
            .input(self.input)
            .build()
            .map_err(|e| ApiError::bad_request(&e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiFunctionRun {
    pub id: String,
    pub function_name: String,
    pub status: Status,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub created_time: u64,
    pub modified_time: u64,
}

impl From<FunctionRun> for ApiFunctionRun {
    fn from(run: FunctionRun) -> Self {
        Self {
            id: run.id,
            function_name: run.function_name,
            status: run.status,
            input: run.input,
            output: run.output,
            reason: run.reason,
            created_time: run.created_time,
            modified_time: run.modified_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FunctionRunList {
    pub runs: Vec<ApiFunctionRun>,
}
