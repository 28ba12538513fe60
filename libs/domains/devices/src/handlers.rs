//! HTTP handlers for the links and catalog APIs
//!
//! Both routers expect a [`Principal`] in the request extensions, put there
//! by `axum_helpers::jwt_auth_middleware`.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use axum_helpers::{
    Principal, RequireAdmin, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestRuleResponse, BadRequestUuidResponse, BadRequestValidationResponse,
        ConflictResponse, ForbiddenResponse, InternalServerErrorResponse, NotFoundResponse,
        UnauthorizedResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::DeviceResult;
use crate::models::{
    Availability, BindDevice, CatalogEntry, DeviceLink, DeviceSummary, LinkStatus, LinkView,
    RegisterEntry, SetActive,
};
use crate::repository::{CatalogRepository, LinkageStore};
use crate::service::{CatalogService, LinkageService};

/// OpenAPI documentation for the device links API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_links,
        bind_device,
        set_link_active,
        unbind_device,
        list_all_links,
        check_availability,
    ),
    components(
        schemas(BindDevice, SetActive, DeviceLink, LinkView, LinkStatus, DeviceSummary, Availability),
        responses(
            BadRequestRuleResponse,
            BadRequestUuidResponse,
            NotFoundResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Links", description = "Bind, activate and release IoT devices")
    )
)]
pub struct ApiDoc;

/// OpenAPI documentation for the catalog API
#[derive(OpenApi)]
#[openapi(
    paths(register_entry, get_entry),
    components(
        schemas(CatalogEntry, RegisterEntry),
        responses(
            BadRequestValidationResponse,
            ConflictResponse,
            ForbiddenResponse,
            NotFoundResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Catalog", description = "Catalog entries and IoT device registration")
    )
)]
pub struct CatalogApiDoc;

/// Routes for `/links`.
pub fn links_router<S: LinkageStore>(service: LinkageService<S>) -> Router {
    Router::new()
        .route("/", get(list_links::<S>).post(bind_device::<S>))
        .route("/admin", get(list_all_links::<S>))
        .route("/availability/{device_id}", get(check_availability::<S>))
        .route(
            "/{id}",
            patch(set_link_active::<S>).delete(unbind_device::<S>),
        )
        .with_state(Arc::new(service))
}

/// Routes for `/catalog`.
pub fn catalog_router<R: CatalogRepository + 'static>(service: CatalogService<R>) -> Router {
    Router::new()
        .route("/", post(register_entry::<R>))
        .route("/{id}", get(get_entry::<R>))
        .with_state(Arc::new(service))
}

/// List the caller's links with their devices
#[utoipa::path(
    get,
    path = "",
    tag = "Links",
    responses(
        (status = 200, description = "Caller's links, newest first", body = Vec<LinkView>),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_links<S: LinkageStore>(
    State(service): State<Arc<LinkageService<S>>>,
    principal: Principal,
) -> DeviceResult<Json<Vec<LinkView>>> {
    let views = service.list_for_owner(principal.id).await?;
    Ok(Json(views))
}

/// Bind a device to the caller
#[utoipa::path(
    post,
    path = "",
    tag = "Links",
    request_body = BindDevice,
    responses(
        (status = 201, description = "Device linked", body = DeviceLink),
        (status = 400, response = BadRequestRuleResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn bind_device<S: LinkageStore>(
    State(service): State<Arc<LinkageService<S>>>,
    principal: Principal,
    ValidatedJson(input): ValidatedJson<BindDevice>,
) -> DeviceResult<impl IntoResponse> {
    let link = service.bind(principal.id, input.device_id).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// Activate or deactivate one of the caller's links
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Links",
    params(
        ("id" = Uuid, Path, description = "Link ID")
    ),
    request_body = SetActive,
    responses(
        (status = 200, description = "Link updated", body = DeviceLink),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn set_link_active<S: LinkageStore>(
    State(service): State<Arc<LinkageService<S>>>,
    principal: Principal,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<SetActive>,
) -> DeviceResult<Json<DeviceLink>> {
    let link = service.set_active(id, principal.id, input.active).await?;
    Ok(Json(link))
}

/// Release one of the caller's devices
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Links",
    params(
        ("id" = Uuid, Path, description = "Link ID")
    ),
    responses(
        (status = 200, description = "Link removed", body = DeviceLink),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn unbind_device<S: LinkageStore>(
    State(service): State<Arc<LinkageService<S>>>,
    principal: Principal,
    UuidPath(id): UuidPath,
) -> DeviceResult<Json<DeviceLink>> {
    let link = service.unbind(id, principal.id).await?;
    Ok(Json(link))
}

/// List every link (administrators only)
#[utoipa::path(
    get,
    path = "/admin",
    tag = "Links",
    responses(
        (status = 200, description = "All links, newest first", body = Vec<DeviceLink>),
        (status = 403, response = ForbiddenResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_all_links<S: LinkageStore>(
    State(service): State<Arc<LinkageService<S>>>,
    RequireAdmin(admin): RequireAdmin,
) -> DeviceResult<Json<Vec<DeviceLink>>> {
    tracing::debug!(admin_id = %admin.id, "Listing all device links");
    let links = service.list_all().await?;
    Ok(Json(links))
}

/// Check whether a device can still be bound
#[utoipa::path(
    get,
    path = "/availability/{device_id}",
    tag = "Links",
    params(
        ("device_id" = Uuid, Path, description = "Catalog entry ID")
    ),
    responses(
        (status = 200, description = "Availability of the device", body = Availability),
        (status = 400, response = BadRequestRuleResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn check_availability<S: LinkageStore>(
    State(service): State<Arc<LinkageService<S>>>,
    _principal: Principal,
    UuidPath(device_id): UuidPath,
) -> DeviceResult<Json<Availability>> {
    let availability = service.check_availability(device_id).await?;
    Ok(Json(availability))
}

/// Register a catalog entry (administrators only)
#[utoipa::path(
    post,
    path = "",
    tag = "Catalog",
    request_body = RegisterEntry,
    responses(
        (status = 201, description = "Entry registered", body = CatalogEntry),
        (status = 400, response = BadRequestValidationResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn register_entry<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    RequireAdmin(_admin): RequireAdmin,
    ValidatedJson(input): ValidatedJson<RegisterEntry>,
) -> DeviceResult<impl IntoResponse> {
    let entry = service.register_entry(input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get a catalog entry by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Catalog entry ID")
    ),
    responses(
        (status = 200, description = "Entry found", body = CatalogEntry),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_entry<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    _principal: Principal,
    UuidPath(id): UuidPath,
) -> DeviceResult<Json<CatalogEntry>> {
    let entry = service.get_entry(id).await?;
    Ok(Json(entry))
}
