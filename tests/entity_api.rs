//! Router-level tests against an in-memory repository

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use entity_store::api::{EntityFilterResponse, EntityResponse, ErrorResponse};
use entity_store::database::models::{
    Addition, AdditionPatch, Entity, EntityAddition, EntityFilter, EntityPatch, NewEntity,
    Pagination,
};
use entity_store::{create_router, EntityRepository, EntityState, RepositoryError};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

#[derive(Default)]
struct Store {
    entities: Vec<Entity>,
    additions: Vec<Addition>,
    next_id: i32,
}

fn apply_entity_patch(patch: EntityPatch, entity: &mut Entity) {
    if let Some(title) = patch.title {
        entity.title = title;
    }
    if let Some(verified) = patch.verified {
        entity.verified = verified;
    }
    if let Some(numbers) = patch.important_numbers {
        entity.important_numbers = numbers;
    }
}

fn apply_addition_patch(patch: AdditionPatch, addition: &mut Addition) {
    if let Some(info) = patch.additional_info {
        addition.additional_info = Some(info);
    }
    if let Some(number) = patch.additional_number {
        addition.additional_number = Some(number);
    }
}

/// LIMIT/OFFSET over rows already in id order
fn page_of<T: Clone>(rows: &[T], page: Pagination) -> Vec<T> {
    let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
    rows.iter().skip(offset).take(limit).cloned().collect()
}

/// Mirrors the PostgreSQL repository semantics without a database
#[derive(Default)]
struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    fn view(store: &Store, entity: &Entity) -> EntityAddition {
        let addition = store
            .additions
            .iter()
            .find(|a| Some(a.id) == entity.addition_id)
            .cloned();
        EntityAddition::from((entity.clone(), addition))
    }
}

#[async_trait::async_trait]
impl EntityRepository for InMemoryRepository {
    async fn create(
        &self,
        entity: NewEntity,
        addition: Option<AdditionPatch>,
        cancel: &CancellationToken,
    ) -> Result<i32, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }

        let mut store = self.store.lock().unwrap();
        store.next_id += 1;
        let id = store.next_id;

        let mut row = Addition {
            id,
            additional_info: None,
            additional_number: None,
        };
        if let Some(patch) = addition {
            apply_addition_patch(patch, &mut row);
        }
        store.additions.push(row);

        store.entities.push(Entity {
            id,
            title: entity.title,
            verified: entity.verified,
            important_numbers: entity.important_numbers,
            addition_id: Some(id),
        });

        Ok(id)
    }

    async fn get_by_id(
        &self,
        id: i32,
        _cancel: &CancellationToken,
    ) -> Result<EntityAddition, RepositoryError> {
        let store = self.store.lock().unwrap();
        store
            .entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| Self::view(&store, e))
            .ok_or_else(|| RepositoryError::entity_not_found(id))
    }

    async fn check_exists(
        &self,
        id: i32,
        _cancel: &CancellationToken,
    ) -> Result<Entity, RepositoryError> {
        let store = self.store.lock().unwrap();
        store
            .entities
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::entity_not_found(id))
    }

    async fn list(
        &self,
        filter: EntityFilter,
        _cancel: &CancellationToken,
    ) -> Result<Vec<EntityAddition>, RepositoryError> {
        let store = self.store.lock().unwrap();
        let mut matching: Vec<EntityAddition> = store
            .entities
            .iter()
            .filter(|e| filter.title.as_ref().map_or(true, |t| &e.title == t))
            .filter(|e| filter.verified.map_or(true, |v| e.verified == v))
            .map(|e| Self::view(&store, e))
            .collect();
        matching.sort_by_key(|e| e.id);

        Ok(match filter.pagination() {
            Some(page) => page_of(&matching, page),
            None => matching,
        })
    }

    async fn update(
        &self,
        id: i32,
        addition_id: i32,
        entity: EntityPatch,
        addition: Option<AdditionPatch>,
        _cancel: &CancellationToken,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();

        let row = store
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RepositoryError::entity_not_found(id))?;
        if row.addition_id != Some(addition_id) {
            return Err(RepositoryError::IntegrityError("addition mismatch".to_string()));
        }
        apply_entity_patch(entity, row);

        if let Some(patch) = addition {
            let row = store
                .additions
                .iter_mut()
                .find(|a| a.id == addition_id)
                .ok_or_else(|| RepositoryError::IntegrityError("missing addition".to_string()))?;
            apply_addition_patch(patch, row);
        }

        Ok(())
    }

    async fn delete_by_id(&self, id: i32, _cancel: &CancellationToken) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().unwrap();

        let index = store
            .entities
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RepositoryError::entity_not_found(id))?;
        let removed = store.entities.remove(index);
        store.additions.retain(|a| Some(a.id) != removed.addition_id);

        Ok(())
    }
}

fn app() -> Router {
    let repository = Arc::new(InMemoryRepository::default()) as Arc<dyn EntityRepository>;
    create_router(EntityState::new(repository, Duration::from_secs(5)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        panic!("unexpected body {}: {}", String::from_utf8_lossy(bytes), e)
    })
}

async fn create(app: &Router, body: serde_json::Value) -> i32 {
    let (status, bytes) = send(app, Method::POST, "/api/create", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&bytes));
    parse(&bytes)
}

#[tokio::test]
async fn test_create_then_get_returns_input() {
    let app = app();

    let id = create(
        &app,
        serde_json::json!({"title": "X", "verified": true, "important_numbers": [1, 2]}),
    )
    .await;

    let (status, bytes) = send(&app, Method::GET, &format!("/api/get/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let entity: EntityResponse = parse(&bytes);
    assert_eq!(entity.id, id);
    assert_eq!(entity.title, "X");
    assert!(entity.verified);
    assert_eq!(entity.important_numbers, vec![1, 2]);
    assert!(entity.addition.is_none());
}

#[tokio::test]
async fn test_create_with_addition() {
    let app = app();

    let id = create(
        &app,
        serde_json::json!({
            "title": "with addition",
            "verified": false,
            "addition": {"additional_info": "info", "additional_number": 7}
        }),
    )
    .await;

    let (_, bytes) = send(&app, Method::GET, &format!("/api/get/{}", id), None).await;
    let entity: EntityResponse = parse(&bytes);

    let addition = entity.addition.expect("addition should be presented");
    assert_eq!(addition.additional_info.as_deref(), Some("info"));
    assert_eq!(addition.additional_number, Some(7));
    assert!(entity.important_numbers.is_empty());
}

#[tokio::test]
async fn test_create_with_empty_addition_reads_back_absent() {
    let app = app();

    let id = create(
        &app,
        serde_json::json!({"title": "empty addition", "verified": true, "addition": {}}),
    )
    .await;

    let (_, bytes) = send(&app, Method::GET, &format!("/api/get/{}", id), None).await;
    let entity: EntityResponse = parse(&bytes);
    assert!(entity.addition.is_none());

    let body: serde_json::Value = parse(&bytes);
    assert!(body.get("addition").is_none(), "{}", body);
}

#[tokio::test]
async fn test_create_requires_title_and_verified() {
    let app = app();

    let (status, bytes) = send(&app, Method::POST, "/api/create", Some(serde_json::json!({"verified": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&bytes);
    assert_eq!(error.message, "title field is required");

    let (status, _) = send(&app, Method::POST, "/api/create", Some(serde_json::json!({"title": "X"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let app = app();

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/create",
        Some(serde_json::json!({"title": 5, "verified": true})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let _: ErrorResponse = parse(&bytes);
}

#[tokio::test]
async fn test_get_unknown_or_invalid_id() {
    let app = app();

    let (status, bytes) = send(&app, Method::GET, "/api/get/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorResponse = parse(&bytes);
    assert_eq!(error.message, "Not found: entity 42 not found");

    let (status, _) = send(&app, Method::GET, "/api/get/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/get/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let app = app();
    let id = create(&app, serde_json::json!({"title": "gone", "verified": true})).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/delete/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/get/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/delete/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_query_paginates_verified() {
    let app = app();
    let first = create(&app, serde_json::json!({"title": "a", "verified": true})).await;
    let second = create(&app, serde_json::json!({"title": "b", "verified": true})).await;
    let _third = create(&app, serde_json::json!({"title": "c", "verified": false})).await;

    let (status, bytes) = send(&app, Method::GET, "/api/getAll?verified=true&page=2&perPage=1", None).await;
    assert_eq!(status, StatusCode::OK);

    let page: EntityFilterResponse = parse(&bytes);
    let ids: Vec<i32> = page.entity.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![second]);
    assert_eq!(page.page, Some(2));
    assert_eq!(page.per_page, Some(1));

    // Page 0 and page 1 are the same page
    let (_, zero) = send(&app, Method::GET, "/api/getAll?verified=true&page=0&perPage=1", None).await;
    let (_, one) = send(&app, Method::GET, "/api/getAll?verified=true&page=1&perPage=1", None).await;
    let zero: EntityFilterResponse = parse(&zero);
    let one: EntityFilterResponse = parse(&one);
    assert_eq!(zero.entity, one.entity);
    assert_eq!(zero.entity[0].id, first);
}

#[tokio::test]
async fn test_list_query_rejects_bad_values() {
    let app = app();

    let (status, bytes) = send(&app, Method::GET, "/api/getAll?verified=maybe", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&bytes);
    assert!(error.message.contains("verified"), "{}", error.message);

    let (status, _) = send(&app, Method::GET, "/api/getAll?page=-1&perPage=2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_query_huge_page_is_empty() {
    let app = app();
    create(&app, serde_json::json!({"title": "only", "verified": true})).await;

    let (status, bytes) = send(
        &app,
        Method::GET,
        "/api/getAll?page=4294967295&perPage=4294967295",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&bytes));

    let page: EntityFilterResponse = parse(&bytes);
    assert!(page.entity.is_empty());
    assert_eq!(page.page, Some(u32::MAX));
}

#[tokio::test]
async fn test_list_body_filters_by_exact_title() {
    let app = app();
    let exact = create(&app, serde_json::json!({"title": "title", "verified": true})).await;
    create(&app, serde_json::json!({"title": "title 2", "verified": true})).await;

    let (status, bytes) = send(&app, Method::POST, "/api/getAll", Some(serde_json::json!({"title": "title"}))).await;
    assert_eq!(status, StatusCode::OK);
    let page: EntityFilterResponse = parse(&bytes);
    assert_eq!(page.entity.len(), 1);
    assert_eq!(page.entity[0].id, exact);
    assert_eq!(page.page, None);

    // Empty body lists everything
    let (status, bytes) = send(&app, Method::POST, "/api/getAll", None).await;
    assert_eq!(status, StatusCode::OK);
    let page: EntityFilterResponse = parse(&bytes);
    assert_eq!(page.entity.len(), 2);
}

#[tokio::test]
async fn test_list_empty_store_is_ok() {
    let app = app();

    let (status, bytes) = send(&app, Method::GET, "/api/getAll?title=nothing", None).await;
    assert_eq!(status, StatusCode::OK);
    let page: EntityFilterResponse = parse(&bytes);
    assert!(page.entity.is_empty());
}

#[tokio::test]
async fn test_patch_title_only_keeps_other_fields() {
    let app = app();
    let id = create(
        &app,
        serde_json::json!({
            "title": "before",
            "verified": true,
            "important_numbers": [4, 5],
            "addition": {"additional_info": "kept"}
        }),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/patch/{}", id),
        Some(serde_json::json!({"title": "after"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, bytes) = send(&app, Method::GET, &format!("/api/get/{}", id), None).await;
    let entity: EntityResponse = parse(&bytes);
    assert_eq!(entity.title, "after");
    assert!(entity.verified);
    assert_eq!(entity.important_numbers, vec![4, 5]);
    assert_eq!(
        entity.addition.and_then(|a| a.additional_info).as_deref(),
        Some("kept")
    );
}

#[tokio::test]
async fn test_patch_addition_only() {
    let app = app();
    let id = create(&app, serde_json::json!({"title": "t", "verified": false})).await;

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/patch/{}", id),
        Some(serde_json::json!({"addition": {"additional_number": 99}})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, bytes) = send(&app, Method::GET, &format!("/api/get/{}", id), None).await;
    let entity: EntityResponse = parse(&bytes);
    assert_eq!(entity.title, "t");
    let addition = entity.addition.expect("addition should now be presented");
    assert_eq!(addition.additional_number, Some(99));
    assert_eq!(addition.additional_info, None);
}

#[tokio::test]
async fn test_patch_empty_body_is_noop() {
    let app = app();
    let id = create(&app, serde_json::json!({"title": "same", "verified": true})).await;

    let (status, _) = send(&app, Method::PATCH, &format!("/api/patch/{}", id), Some(serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, bytes) = send(&app, Method::GET, &format!("/api/get/{}", id), None).await;
    let entity: EntityResponse = parse(&bytes);
    assert_eq!(entity.title, "same");
}

#[tokio::test]
async fn test_patch_unknown_entity() {
    let app = app();

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/patch/1000",
        Some(serde_json::json!({"title": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::PATCH, "/api/patch/-1", Some(serde_json::json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_time_endpoint() {
    let app = app();

    let (status, bytes) = send(&app, Method::GET, "/api/time", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!bytes.is_empty());
}
