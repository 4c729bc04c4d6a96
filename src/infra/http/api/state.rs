use std::sync::Arc;

use crate::application::cards::CardService;
use crate::application::schemas::SchemaService;
use crate::cache::CacheState;

#[derive(Clone)]
pub struct ApiState {
    pub schemas: Arc<SchemaService>,
    pub cards: Arc<CardService>,
    pub cache: CacheState,
}
