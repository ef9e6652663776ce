use crate::controller::ApiResponse;
use crate::params::parse_id;
use crate::params::user::{
    BatchCreateParams, BatchDeleteParams, ExportParams, IndexParams, SearchQueryParams,
    UpdateParams,
};
use crate::response::{AnalyticsReport, BatchCreated, BatchDeleted, Deleted, SearchResults};
use crate::{AppState, Error};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use domain::user::{self as UserApi, ExportFormat};
use domain::{users, ListParams, NewUser, SearchParams};

use log::*;

const INVALID_JSON: &str = "Invalid JSON format";

/// GET a page of Users
#[utoipa::path(
    get,
    path = "/api/users",
    params(IndexParams),
    responses(
        (status = 200, description = "Successfully retrieved a page of Users", body = domain::Page<users::Model>),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET all Users with params: {params:?}");

    let list_params: ListParams = params.into();
    let page = UserApi::list(app_state.user_store_ref(), &list_params);

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), page)))
}

/// CREATE a new User and notify every connected WebSocket client
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "Successfully created a new User", body = users::Model),
        (status = 400, description = "Invalid JSON or a field failed validation"),
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(new_user) = payload.map_err(|_| Error::bad_request(INVALID_JSON))?;
    debug!("CREATE new User from: {new_user:?}");

    let user = UserApi::create(
        app_state.user_store_ref(),
        app_state.event_publisher.as_ref(),
        new_user,
    )
    .await?;

    debug!("Newly created User {user:?}");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), user)),
    ))
}

/// GET a particular User specified by its id.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(
        ("id" = u64, Path, description = "User id to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved a User", body = users::Model),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn read(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let id = parse_id(&id)?;
    debug!("GET User by id: {id}");

    let user = UserApi::find_by_id(app_state.user_store_ref(), id)?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), user)))
}

/// UPDATE the supplied fields of a User
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(
        ("id" = u64, Path, description = "Id of the User to update"),
    ),
    request_body = UpdateParams,
    responses(
        (status = 200, description = "Successfully updated a User", body = users::Model),
        (status = 400, description = "Invalid JSON or a field failed validation"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn update(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateParams>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let id = parse_id(&id)?;
    let Json(params) = payload.map_err(|_| Error::bad_request(INVALID_JSON))?;
    debug!("PUT Update User with id: {id}");

    let user = UserApi::update(app_state.user_store_ref(), id, params)?;

    debug!("Updated User: {user:?}");

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), user)))
}

/// DELETE a User specified by its id.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(
        ("id" = u64, Path, description = "Id of the User to delete"),
    ),
    responses(
        (status = 200, description = "Successfully deleted a User"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn delete(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let id = parse_id(&id)?;
    debug!("DELETE User by id: {id}");

    UserApi::delete(app_state.user_store_ref(), id)?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        Deleted {
            message: "User deleted".to_string(),
        },
    )))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/activate",
    params(
        ("id" = u64, Path, description = "Id of the User to activate"),
    ),
    responses(
        (status = 200, description = "Successfully activated a User", body = users::Model),
        (status = 404, description = "User not found"),
    )
)]
pub async fn activate(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let id = parse_id(&id)?;
    let user = UserApi::activate(app_state.user_store_ref(), id)?;
    Ok(Json(ApiResponse::new(StatusCode::OK.into(), user)))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/deactivate",
    params(
        ("id" = u64, Path, description = "Id of the User to deactivate"),
    ),
    responses(
        (status = 200, description = "Successfully deactivated a User", body = users::Model),
        (status = 404, description = "User not found"),
    )
)]
pub async fn deactivate(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let id = parse_id(&id)?;
    let user = UserApi::deactivate(app_state.user_store_ref(), id)?;
    Ok(Json(ApiResponse::new(StatusCode::OK.into(), user)))
}

/// CREATE up to 100 Users at once. Invalid entries are skipped.
#[utoipa::path(
    post,
    path = "/api/users/batch",
    request_body = BatchCreateParams,
    responses(
        (status = 201, description = "Created every valid entry", body = BatchCreated),
        (status = 400, description = "Empty or oversized batch"),
    )
)]
pub async fn batch_create(
    State(app_state): State<AppState>,
    payload: Result<Json<BatchCreateParams>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(params) = payload.map_err(|_| Error::bad_request("Invalid request format"))?;
    debug!("POST batch of {} Users", params.users.len());

    let created = UserApi::create_batch(app_state.user_store_ref(), params.users)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            StatusCode::CREATED.into(),
            BatchCreated {
                count: created.len(),
                created,
            },
        )),
    ))
}

/// DELETE every listed User that exists
#[utoipa::path(
    delete,
    path = "/api/users/batch",
    request_body = BatchDeleteParams,
    responses(
        (status = 200, description = "Ids that were deleted", body = BatchDeleted),
        (status = 400, description = "No ids supplied"),
    )
)]
pub async fn batch_delete(
    State(app_state): State<AppState>,
    payload: Result<Json<BatchDeleteParams>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(params) = payload.map_err(|_| Error::bad_request("Invalid request format"))?;
    debug!("DELETE batch of Users: {:?}", params.ids);

    let deleted = UserApi::delete_batch(app_state.user_store_ref(), &params.ids)?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        BatchDeleted {
            count: deleted.len(),
            deleted,
        },
    )))
}

#[utoipa::path(
    get,
    path = "/api/users/search",
    params(SearchQueryParams),
    responses(
        (status = 200, description = "Users matching every supplied filter", body = SearchResults),
    )
)]
pub async fn search(
    State(app_state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
) -> Result<impl IntoResponse, Error> {
    let search_params: SearchParams = params.into();
    let results = UserApi::search(app_state.user_store_ref(), &search_params);

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        SearchResults {
            count: results.len(),
            results,
        },
    )))
}

/// Download every User as a JSON or CSV attachment
#[utoipa::path(
    get,
    path = "/api/users/export",
    params(ExportParams),
    responses(
        (
            status = 200,
            description = "Attachment holding every User",
            content((String = "application/json"), (String = "text/csv"))
        ),
    )
)]
pub async fn export(
    State(app_state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, Error> {
    let format = match params.format.as_deref() {
        Some("csv") => ExportFormat::Csv,
        _ => ExportFormat::Json,
    };

    let body = UserApi::export(app_state.user_store_ref(), format)?;

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", format.file_name()),
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/api/users/analytics",
    responses(
        (status = 200, description = "Aggregate figures over every User", body = AnalyticsReport),
    )
)]
pub async fn analytics(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let analytics = UserApi::analytics(app_state.user_store_ref());

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        AnalyticsReport {
            analytics,
            timestamp: Utc::now(),
        },
    )))
}
