//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// A named record shape. `member_ids` is the ordered index of cards that
/// belong to this schema and drives card pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaRecord {
    pub id: Uuid,
    pub title: String,
    pub definition: Value,
    pub member_ids: Vec<Uuid>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRecord {
    pub id: Uuid,
    pub schema_id: Uuid,
    pub image_location: Option<String>,
    pub content: Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
