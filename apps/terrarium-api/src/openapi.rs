//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for all APIs
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Terrarium API",
        version = "0.1.0",
        description = "Binds IoT terrarium devices to user accounts. Every /api route expects `Authorization: Bearer <jwt>`.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api/links", api = domain_devices::ApiDoc),
        (path = "/api/catalog", api = domain_devices::CatalogApiDoc)
    ),
    tags(
        (name = "Links", description = "Device linkage lifecycle"),
        (name = "Catalog", description = "Catalog entries and IoT devices")
    )
)]
pub struct ApiDoc;
