mod common;

use async_trait::async_trait;
use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::Query as RepeatedQuery;
use common::*;
use graasp_public::{
    AppState, MemoryRepository, PublicResult, create_router,
    auth::AuthUser,
    handlers,
    models::{ChildrenQuery, CopyItemRequest, IdsQuery, ItemIdsQuery, ItemReadQuery, TagQuery},
    repository::{ItemStore, Repository},
};
use std::sync::Arc;
use tokio::test;
use tower::ServiceExt;
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// A repository whose database is down: every snapshot fails to open.
pub struct UnavailableRepository;

#[async_trait]
impl Repository for UnavailableRepository {
    async fn snapshot(&self) -> PublicResult<Box<dyn ItemStore>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }

    async fn transaction(&self) -> PublicResult<Box<dyn ItemStore>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn fixture_state() -> (Fixture, AppState) {
    let fixture = Fixture::new();
    let repo = MemoryRepository::new(fixture.data());
    let state = state(&repo);
    (fixture, state)
}

// --- TESTS ---

#[test]
async fn get_item_returns_public_item() {
    let (fixture, state) = fixture_state();

    let response = handlers::get_item(
        State(state),
        Path(fixture.child_1.id),
        Query(ItemReadQuery::default()),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["id"], fixture.child_1.id.to_string());
    assert!(body.get("itemMemberships").is_none());
}

#[test]
async fn get_item_with_memberships_is_flat() {
    let (fixture, state) = fixture_state();

    let response = handlers::get_item(
        State(state),
        Path(fixture.public_root.id),
        Query(ItemReadQuery {
            with_memberships: Some(true),
        }),
    )
    .await
    .into_response();

    let body = json_body(response).await;
    assert_eq!(body["name"], "public root");
    assert_eq!(body["itemMemberships"].as_array().unwrap().len(), 1);
    assert_eq!(body["itemMemberships"][0]["permission"], "admin");
}

#[test]
async fn get_item_hidden_is_forbidden() {
    let (fixture, state) = fixture_state();

    let response = handlers::get_item(
        State(state),
        Path(fixture.hidden.id),
        Query(ItemReadQuery::default()),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "GPIERR002");
    assert_eq!(body["origin"], "graasp-plugin-public");
    assert_eq!(body["data"], fixture.hidden.id.to_string());
}

#[test]
async fn get_children_ordered() {
    let (fixture, state) = fixture_state();

    let Json(children) = handlers::get_children(
        State(state),
        Path(fixture.public_root.id),
        Query(ChildrenQuery {
            ordered: Some(true),
        }),
    )
    .await
    .unwrap();

    let names: Vec<&str> = children.iter().map(|child| child.name.as_str()).collect();
    assert_eq!(names, ["child 2", "child 1"]);
}

#[test]
async fn get_items_by_tag_without_match_is_empty() {
    let (_fixture, state) = fixture_state();

    let Json(items) = handlers::get_items_by_tag(
        State(state),
        Query(TagQuery {
            tag_id: Uuid::new_v4(),
            with_memberships: None,
        }),
    )
    .await
    .unwrap();

    assert!(items.is_empty());
}

#[test]
async fn get_many_items_keeps_request_order() {
    let (fixture, state) = fixture_state();

    let response = handlers::get_many_items(
        State(state),
        RepeatedQuery(IdsQuery {
            id: vec![fixture.hidden.id, fixture.child_2.id],
        }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body[0]["code"], "GPIERR002");
    assert_eq!(body[1]["id"], fixture.child_2.id.to_string());
}

#[test]
async fn get_many_item_memberships_per_id() {
    let (fixture, state) = fixture_state();

    let body = json_body(
        handlers::get_many_item_memberships(
            State(state),
            RepeatedQuery(ItemIdsQuery {
                item_id: vec![fixture.child_1.id],
            }),
        )
        .await
        .into_response(),
    )
    .await;

    assert_eq!(body[0].as_array().unwrap().len(), 1);
    assert_eq!(body[0][0]["memberId"], fixture.owner.id.to_string());
}

#[test]
async fn get_member_unknown_is_not_found() {
    let (_fixture, state) = fixture_state();

    let response = handlers::get_member(State(state), Path(Uuid::new_v4()))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "GPIERR005");
}

#[test]
async fn get_many_members_rejects_large_batches() {
    let (_fixture, state) = fixture_state();
    let ids = (0..51).map(|_| Uuid::new_v4()).collect();

    let response = handlers::get_many_members(State(state), RepeatedQuery(IdsQuery { id: ids }))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "GPIERR006");
    assert_eq!(body["data"], 51);
}

#[test]
async fn copy_item_as_caller() {
    let (fixture, state) = fixture_state();
    let caller = AuthUser {
        id: fixture.visitor.id,
        name: fixture.visitor.name.clone(),
    };

    let Json(copy) = handlers::copy_item(
        caller,
        State(state),
        Path(fixture.child_2.id),
        Json(CopyItemRequest::default()),
    )
    .await
    .unwrap();

    assert_eq!(copy.name, "child 2");
    assert_eq!(copy.creator, fixture.visitor.id);
}

#[test]
async fn edit_gates_reject_with_bad_request() {
    let (fixture, state) = fixture_state();

    let responses = vec![
        handlers::reject_item_upload(State(state.clone())).await.into_response(),
        handlers::reject_thumbnail_upload(State(state.clone())).await.into_response(),
        handlers::reject_item_update(State(state.clone()), Path(fixture.child_1.id))
            .await
            .into_response(),
        handlers::reject_avatar_upload(State(state.clone())).await.into_response(),
        handlers::reject_member_update(State(state), Path(fixture.owner.id))
            .await
            .into_response(),
    ];

    let mut codes = Vec::new();
    for response in responses {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        codes.push(json_body(response).await["code"].as_str().unwrap().to_string());
    }
    assert_eq!(
        codes,
        ["GERR003", "GERR003", "GERR003", "GERR004", "GERR004"]
    );
}

#[test]
async fn storage_failure_is_internal_error_without_details() {
    let state = AppState::new(Arc::new(UnavailableRepository), config());

    let response = handlers::get_item(
        State(state),
        Path(Uuid::new_v4()),
        Query(ItemReadQuery::default()),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "GPIERR999");
    assert_eq!(body["message"], "database error");
}

#[test]
async fn storage_failure_while_resolving_the_caller_is_internal_error() {
    let app = create_router(AppState::new(Arc::new(UnavailableRepository), config()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/p/items/{}/copy", Uuid::new_v4()))
                .header("Content-Type", "application/json")
                .header("x-member-id", Uuid::new_v4().to_string())
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["code"], "GPIERR999");
}

#[test]
async fn copy_without_credentials_is_unauthorized() {
    let app = create_router(AppState::new(Arc::new(UnavailableRepository), config()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/p/items/{}/copy", Uuid::new_v4()))
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
