//! Request, response and storage types of the knowledge API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The id of a freshly created entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
}

/// Which model an agent runs on, stored as `jsonb`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub name: String,
    #[serde(default)]
    pub settings: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentCreate {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub model: LlmConfig,
    #[serde(default)]
    pub sub_agents: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub model: LlmConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeGroupCreate {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// One document to store in a knowledge group
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeBaseCreate {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    pub id: Uuid,
    pub knowledge_group_id: Uuid,
    pub name: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A search hit. `similarity` is always `1 - distance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseSearch {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub distance: f64,
    pub similarity: f64,
}

impl KnowledgeBaseSearch {
    pub fn new(id: Uuid, name: String, content: String, distance: f64) -> Self {
        Self {
            id,
            name,
            content,
            distance,
            similarity: 1.0 - distance,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub k: Option<i64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

// Sessions and their messages have tables but no endpoints yet.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    pub labels: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}
