use std::num::NonZeroU32;
use std::sync::Arc;

use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use tessera::application::cards::{AddCardCommand, CardService, CardServiceError, ChangeCardCommand};
use tessera::application::repos::{CardsRepo, SchemasRepo};
use tessera::application::schemas::{AddSchemaCommand, SchemaService, SchemaServiceError};
use tessera::infra::db::PostgresRepositories;

struct Services {
    repos: Arc<PostgresRepositories>,
    schemas: SchemaService,
    cards: CardService,
}

fn services(pool: PgPool) -> Services {
    let repos = Arc::new(PostgresRepositories::new(pool));
    let schemas = SchemaService::new(repos.clone(), repos.clone());
    let cards = CardService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        NonZeroU32::new(10).expect("non-zero"),
    );
    Services {
        repos,
        schemas,
        cards,
    }
}

fn product_definition() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": { "name": { "type": "string" } }
    })
}

async fn add_schema(services: &Services, title: &str) -> Uuid {
    services
        .schemas
        .add_schema(AddSchemaCommand {
            title: title.to_string(),
            definition: product_definition(),
        })
        .await
        .expect("schema should be created")
        .id
}

async fn add_card(services: &Services, schema_id: Uuid, name: &str) -> Uuid {
    services
        .cards
        .add_card(AddCardCommand {
            image: None,
            schema_id,
            content: json!({ "name": name }),
        })
        .await
        .expect("card should be created")
        .id
}

async fn member_ids(services: &Services, schema_id: Uuid) -> Vec<Uuid> {
    services
        .repos
        .find_schema(schema_id)
        .await
        .expect("schema lookup")
        .expect("schema exists")
        .member_ids
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_adds_keep_every_id(pool: PgPool) {
    let services = Arc::new(services(pool));
    let schema_id = add_schema(&services, "Product").await;

    let mut handles = Vec::new();
    for index in 0..16 {
        let services = services.clone();
        handles.push(tokio::spawn(async move {
            add_card(&services, schema_id, &format!("item-{index}")).await
        }));
    }

    let mut added = Vec::new();
    for handle in handles {
        added.push(handle.await.expect("task should finish"));
    }

    let mut indexed = member_ids(&services, schema_id).await;
    assert_eq!(indexed.len(), added.len());
    indexed.sort();
    added.sort();
    assert_eq!(indexed, added);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn pages_follow_index_order(pool: PgPool) {
    let services = services(pool);
    let schema_id = add_schema(&services, "Product").await;

    let mut added = Vec::new();
    for index in 0..5 {
        added.push(add_card(&services, schema_id, &format!("item-{index}")).await);
    }

    let mut seen = Vec::new();
    for page in 0..3 {
        let cards = services
            .cards
            .get_cards(schema_id, 2, page)
            .await
            .expect("page should load");
        seen.extend(cards.into_iter().map(|card| card.id));
    }
    assert_eq!(seen, added);

    assert!(matches!(
        services.cards.get_cards(schema_id, 2, 3).await,
        Err(CardServiceError::PageOutOfRange)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn moving_and_deleting_cards_maintain_indexes(pool: PgPool) {
    let services = services(pool);
    let from = add_schema(&services, "Chairs").await;
    let to = add_schema(&services, "Tables").await;
    let moved = add_card(&services, from, "oak").await;
    let kept = add_card(&services, from, "pine").await;

    let card = services
        .cards
        .change_card(ChangeCardCommand {
            id: moved,
            content: Some(json!({ "name": "oak table" })),
            schema_id: Some(to),
            ..Default::default()
        })
        .await
        .expect("card should move");
    assert_eq!(card.schema_id, to);
    assert_eq!(member_ids(&services, from).await, vec![kept]);
    assert_eq!(member_ids(&services, to).await, vec![moved]);

    services
        .cards
        .delete_card(kept)
        .await
        .expect("card should be deleted");
    assert!(member_ids(&services, from).await.is_empty());
    assert!(
        services
            .repos
            .find_card(kept)
            .await
            .expect("lookup")
            .is_none()
    );

    assert!(matches!(
        services.cards.delete_card(kept).await,
        Err(CardServiceError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_schema_removes_its_cards(pool: PgPool) {
    let services = services(pool);
    let schema_id = add_schema(&services, "Product").await;
    let first = add_card(&services, schema_id, "a").await;
    let second = add_card(&services, schema_id, "b").await;

    let removed = services
        .schemas
        .delete_schema(schema_id)
        .await
        .expect("schema should be deleted");
    assert_eq!(removed, 2);

    let remaining = services
        .repos
        .find_cards(&[first, second])
        .await
        .expect("lookup");
    assert!(remaining.is_empty());

    assert!(matches!(
        services.schemas.delete_schema(schema_id).await,
        Err(SchemaServiceError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn schema_listing_is_in_insertion_order(pool: PgPool) {
    let services = services(pool);
    let mut created = Vec::new();
    for title in ["first", "second", "third"] {
        created.push(add_schema(&services, title).await);
    }

    let all: Vec<Uuid> = services
        .schemas
        .get_schemas(0, 0)
        .await
        .expect("list")
        .into_iter()
        .map(|schema| schema.id)
        .collect();
    assert_eq!(all, created);

    let window: Vec<Uuid> = services
        .schemas
        .get_schemas(1, 2)
        .await
        .expect("list")
        .into_iter()
        .map(|schema| schema.id)
        .collect();
    assert_eq!(window, vec![created[2]]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn array_cards_are_stored(pool: PgPool) {
    let services = services(pool);
    let schema_id = services
        .schemas
        .add_schema(AddSchemaCommand {
            title: "Tags".to_string(),
            definition: json!({ "type": "array", "items": { "type": "string" } }),
        })
        .await
        .expect("schema should be created")
        .id;

    let card = services
        .cards
        .add_card(AddCardCommand {
            image: None,
            schema_id,
            content: json!(["oak", "pine"]),
        })
        .await
        .expect("array card should be stored");

    let stored = services
        .repos
        .find_card(card.id)
        .await
        .expect("lookup")
        .expect("card exists");
    assert_eq!(stored.content, json!(["oak", "pine"]));
    assert_eq!(member_ids(&services, schema_id).await, vec![card.id]);
}
