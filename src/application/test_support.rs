//! In-memory repositories for service and router tests.
//!
//! Every write runs under one lock, so the card table and the member indexes
//! change together the way a database transaction keeps them in step.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CardsRepo, CardsWriteRepo, CreateCardParams, CreateSchemaParams, RepoError, SchemaListWindow,
    SchemasRepo, SchemasWriteRepo, UpdateCardParams,
};
use crate::domain::entities::{CardRecord, SchemaRecord};

#[derive(Default)]
struct State {
    schemas: Vec<SchemaRecord>,
    cards: HashMap<Uuid, CardRecord>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn schema_count(&self) -> usize {
        self.lock().schemas.len()
    }

    pub fn card_count(&self) -> usize {
        self.lock().cards.len()
    }

    pub fn member_ids(&self, schema_id: Uuid) -> Vec<Uuid> {
        self.lock()
            .schemas
            .iter()
            .find(|schema| schema.id == schema_id)
            .map(|schema| schema.member_ids.clone())
            .unwrap_or_default()
    }

    /// Drop a card row but leave its id in the index.
    pub fn remove_card_row(&self, id: Uuid) {
        self.lock().cards.remove(&id);
    }
}

impl State {
    fn schema_mut(&mut self, id: Uuid) -> Option<&mut SchemaRecord> {
        self.schemas.iter_mut().find(|schema| schema.id == id)
    }
}

#[async_trait]
impl SchemasRepo for InMemoryStore {
    async fn find_schema(&self, id: Uuid) -> Result<Option<SchemaRecord>, RepoError> {
        Ok(self
            .lock()
            .schemas
            .iter()
            .find(|schema| schema.id == id)
            .cloned())
    }

    async fn list_schemas(
        &self,
        window: SchemaListWindow,
    ) -> Result<Vec<SchemaRecord>, RepoError> {
        let state = self.lock();
        let schemas = match window.limit {
            Some(limit) => state
                .schemas
                .iter()
                .skip(window.offset as usize)
                .take(limit as usize)
                .cloned()
                .collect(),
            None => state.schemas.clone(),
        };
        Ok(schemas)
    }
}

#[async_trait]
impl SchemasWriteRepo for InMemoryStore {
    async fn create_schema(&self, params: CreateSchemaParams) -> Result<SchemaRecord, RepoError> {
        let record = SchemaRecord {
            id: Uuid::new_v4(),
            title: params.title,
            definition: params.definition,
            member_ids: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().schemas.push(record.clone());
        Ok(record)
    }

    async fn delete_schema(&self, id: Uuid) -> Result<u64, RepoError> {
        let mut state = self.lock();
        let position = state
            .schemas
            .iter()
            .position(|schema| schema.id == id)
            .ok_or(RepoError::NotFound)?;
        state.schemas.remove(position);

        let before = state.cards.len();
        state.cards.retain(|_, card| card.schema_id != id);
        Ok((before - state.cards.len()) as u64)
    }
}

#[async_trait]
impl CardsRepo for InMemoryStore {
    async fn find_card(&self, id: Uuid) -> Result<Option<CardRecord>, RepoError> {
        Ok(self.lock().cards.get(&id).cloned())
    }

    async fn find_cards(&self, ids: &[Uuid]) -> Result<Vec<CardRecord>, RepoError> {
        let state = self.lock();
        // Reverse so callers cannot rely on the fetch order.
        Ok(ids
            .iter()
            .rev()
            .filter_map(|id| state.cards.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl CardsWriteRepo for InMemoryStore {
    async fn insert_card(&self, params: CreateCardParams) -> Result<CardRecord, RepoError> {
        let mut state = self.lock();
        let now = OffsetDateTime::now_utc();
        let record = CardRecord {
            id: Uuid::new_v4(),
            schema_id: params.schema_id,
            image_location: params.image_location,
            content: params.content,
            created_at: now,
            updated_at: now,
        };

        let schema = state
            .schema_mut(params.schema_id)
            .ok_or(RepoError::NotFound)?;
        schema.member_ids.push(record.id);
        state.cards.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_card(&self, params: UpdateCardParams) -> Result<CardRecord, RepoError> {
        let mut state = self.lock();
        let mut card = state
            .cards
            .get(&params.id)
            .cloned()
            .ok_or(RepoError::NotFound)?;

        if let Some(image) = params.image_location {
            card.image_location = Some(image);
        }

        if let Some((schema_id, content)) = params.content {
            if schema_id != card.schema_id {
                state
                    .schema_mut(schema_id)
                    .ok_or_else(|| RepoError::InvalidInput {
                        message: format!("schema {schema_id} does not exist"),
                    })?
                    .member_ids
                    .push(card.id);
                if let Some(previous) = state.schema_mut(card.schema_id) {
                    previous.member_ids.retain(|id| *id != card.id);
                }
                card.schema_id = schema_id;
            }
            card.content = content;
        }

        card.updated_at = OffsetDateTime::now_utc();
        state.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn delete_card(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.lock();
        let card = state.cards.remove(&id).ok_or(RepoError::NotFound)?;
        if let Some(schema) = state.schema_mut(card.schema_id) {
            schema.member_ids.retain(|member| *member != id);
        }
        Ok(())
    }
}
