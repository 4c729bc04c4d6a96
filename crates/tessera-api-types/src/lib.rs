//! Wire shapes for the Tessera admin API.
//!
//! Schemas and cards travel as JSON. A schema `definition` and a card
//! `content` are carried as raw JSON values; the server validates them and
//! never interprets their structure beyond that.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSchemaRequest {
    pub title: String,
    pub definition: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaResponse {
    pub id: Uuid,
    pub title: String,
    pub definition: Value,
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaListResponse {
    pub schemas: Vec<SchemaResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaListQuery {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCardRequest {
    #[serde(default)]
    pub image: Option<String>,
    pub schema_id: Uuid,
    pub content: Value,
}

/// Partial update: absent or empty fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeCardRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub schema_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardListQuery {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub page: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardResponse {
    pub id: Uuid,
    pub schema_id: Uuid,
    pub image: Option<String>,
    pub content: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardListResponse {
    pub cards: Vec<CardResponse>,
}

/// Returned by every write: the id of the affected schema or card.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdResponse {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}
