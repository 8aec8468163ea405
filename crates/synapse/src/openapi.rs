//! Reflection of an OpenAPI 3 document into tools a model can call
//!
//! The document is loaded once, its local `$ref`s are inlined, and the typed
//! view is shared by the schema builder and the HTTP dispatcher.
pub mod document;
pub mod resolve;
pub mod schema;

pub use document::{
    HttpMethod, OpenApiDocument, Operation, OperationRef, Parameter, ParameterLocation,
    PathItem, RequestBody,
};
pub use schema::{build_tools, ToolFormat};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenApiError {
    #[error("Failed to read OpenAPI document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse OpenAPI document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid OpenAPI structure at {location}: {source}")]
    Structure {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unresolvable reference: {0}")]
    UnresolvedRef(String),

    #[error("Only local references are supported, found: {0}")]
    RemoteRef(String),

    #[error("The OpenAPI document declares no servers")]
    MissingServer,
}
