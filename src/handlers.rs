use crate::{
    AppState,
    auth::AuthUser,
    error::{ErrorBody, PublicError},
    models::{
        BatchEntry, ChildrenQuery, CopyItemRequest, IdsQuery, Item, ItemIdsQuery, ItemMembership,
        ItemReadQuery, Member, PublicItem, TagQuery,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::Query as RepeatedQuery;
use uuid::Uuid;

// --- Items ---

/// get_item
///
/// [Public Route] A single public item, optionally with its memberships.
#[utoipa::path(
    get,
    path = "/p/items/{id}",
    params(("id" = Uuid, Path, description = "Item id"), ItemReadQuery),
    responses(
        (status = 200, description = "Public item", body = PublicItem),
        (status = 403, description = "Item is not public", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody)
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ItemReadQuery>,
) -> Result<Json<PublicItem>, PublicError> {
    let item = state
        .service
        .get_one(id, query.with_memberships.unwrap_or(false))
        .await?;
    Ok(Json(item))
}

/// get_children
///
/// [Public Route] Direct children of a public item. With `ordered=true`, children follow
/// the folder's stored order.
#[utoipa::path(
    get,
    path = "/p/items/{id}/children",
    params(("id" = Uuid, Path, description = "Parent item id"), ChildrenQuery),
    responses(
        (status = 200, description = "Children", body = [Item]),
        (status = 403, description = "Item is not public", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody)
    )
)]
pub async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChildrenQuery>,
) -> Result<Json<Vec<Item>>, PublicError> {
    let children = state
        .service
        .get_children(id, query.ordered.unwrap_or(false))
        .await?;
    Ok(Json(children))
}

/// get_items_by_tag
///
/// [Public Route] Public items that also carry `tagId`.
#[utoipa::path(
    get,
    path = "/p/items",
    params(TagQuery),
    responses((status = 200, description = "Tagged public items", body = [PublicItem]))
)]
pub async fn get_items_by_tag(
    State(state): State<AppState>,
    Query(query): Query<TagQuery>,
) -> Result<Json<Vec<PublicItem>>, PublicError> {
    let items = state
        .service
        .get_by_tag(query.tag_id, query.with_memberships.unwrap_or(false))
        .await?;
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/p/items/published",
    params(ItemReadQuery),
    responses((status = 200, description = "Public and published items", body = [PublicItem]))
)]
pub async fn get_published_items(
    State(state): State<AppState>,
    Query(query): Query<ItemReadQuery>,
) -> Result<Json<Vec<PublicItem>>, PublicError> {
    let items = state
        .service
        .get_published(query.with_memberships.unwrap_or(false))
        .await?;
    Ok(Json(items))
}

/// get_many_items
///
/// [Public Route] One entry per requested id, in request order: the item, or the error
/// body explaining why it is not returned.
#[utoipa::path(
    get,
    path = "/p/items/many",
    params(IdsQuery),
    responses((status = 200, description = "Items or per-id errors", body = [BatchEntry<Item>]))
)]
pub async fn get_many_items(
    State(state): State<AppState>,
    RepeatedQuery(query): RepeatedQuery<IdsQuery>,
) -> Result<Json<Vec<BatchEntry<Item>>>, PublicError> {
    let entries = state.service.get_many(&query.id).await?;
    Ok(Json(entries))
}

/// copy_item
///
/// [Authenticated Route] Copies a public item, and its subtree, for the caller. The copy
/// lands under `parentId` when given, at the root otherwise.
#[utoipa::path(
    post,
    path = "/p/items/{id}/copy",
    params(("id" = Uuid, Path, description = "Public item to copy")),
    request_body = CopyItemRequest,
    responses(
        (status = 200, description = "The copy", body = Item),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "Source not public or destination not writable", body = ErrorBody),
        (status = 404, description = "Source or destination not found", body = ErrorBody)
    )
)]
pub async fn copy_item(
    AuthUser { id: actor, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CopyItemRequest>,
) -> Result<Json<Item>, PublicError> {
    let copy = state
        .service
        .copy(
            id,
            actor,
            payload.parent_id,
            payload.should_copy_tags.unwrap_or(false),
        )
        .await?;
    Ok(Json(copy))
}

/// reject_item_upload
///
/// [Public Route] Uploads are never accepted through the public surface.
#[utoipa::path(
    post,
    path = "/p/items/upload",
    responses((status = 400, description = "Cannot edit public item", body = ErrorBody))
)]
pub async fn reject_item_upload(State(state): State<AppState>) -> PublicError {
    state.service.reject_item_edit(None)
}

#[utoipa::path(
    post,
    path = "/p/items/thumbnails/upload",
    responses((status = 400, description = "Cannot edit public item", body = ErrorBody))
)]
pub async fn reject_thumbnail_upload(State(state): State<AppState>) -> PublicError {
    state.service.reject_item_edit(None)
}

#[utoipa::path(
    patch,
    path = "/p/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses((status = 400, description = "Cannot edit public item", body = ErrorBody))
)]
pub async fn reject_item_update(State(state): State<AppState>, Path(id): Path<Uuid>) -> PublicError {
    state.service.reject_item_edit(Some(id))
}

// --- Memberships ---

/// get_many_item_memberships
///
/// [Public Route] For each requested item: its inherited memberships followed by the
/// memberships of its subtree, or the error body for that item.
#[utoipa::path(
    get,
    path = "/p/item-memberships",
    params(ItemIdsQuery),
    responses((
        status = 200,
        description = "Memberships or per-id errors",
        body = [BatchEntry<Vec<ItemMembership>>]
    ))
)]
pub async fn get_many_item_memberships(
    State(state): State<AppState>,
    RepeatedQuery(query): RepeatedQuery<ItemIdsQuery>,
) -> Result<Json<Vec<BatchEntry<Vec<ItemMembership>>>>, PublicError> {
    let entries = state.service.get_many_item_memberships(&query.item_id).await?;
    Ok(Json(entries))
}

// --- Members ---

#[utoipa::path(
    get,
    path = "/p/members/{id}",
    params(("id" = Uuid, Path, description = "Member id")),
    responses(
        (status = 200, description = "Member", body = Member),
        (status = 404, description = "Member not found", body = ErrorBody)
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Member>, PublicError> {
    let member = state.service.get_member(id).await?;
    Ok(Json(member))
}

/// get_many_members
///
/// [Public Route] At most 50 members per request, one entry per requested id.
#[utoipa::path(
    get,
    path = "/p/members",
    params(IdsQuery),
    responses(
        (status = 200, description = "Members or per-id errors", body = [BatchEntry<Member>]),
        (status = 400, description = "Too many ids", body = ErrorBody)
    )
)]
pub async fn get_many_members(
    State(state): State<AppState>,
    RepeatedQuery(query): RepeatedQuery<IdsQuery>,
) -> Result<Json<Vec<BatchEntry<Member>>>, PublicError> {
    let entries = state.service.get_members(&query.id).await?;
    Ok(Json(entries))
}

#[utoipa::path(
    post,
    path = "/p/members/avatars/upload",
    responses((status = 400, description = "Cannot edit public member", body = ErrorBody))
)]
pub async fn reject_avatar_upload(State(state): State<AppState>) -> PublicError {
    state.service.reject_member_edit(None)
}

#[utoipa::path(
    patch,
    path = "/p/members/{id}",
    params(("id" = Uuid, Path, description = "Member id")),
    responses((status = 400, description = "Cannot edit public member", body = ErrorBody))
)]
pub async fn reject_member_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> PublicError {
    state.service.reject_member_edit(Some(id))
}
