use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Proteus API",
        version = "0.1.0",
        description = "Patent search crawler over a rotating egress endpoint pool."
    ),
    paths(
        crate::routes::search,
        crate::routes::pool_status,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::SearchRequest,
        crate::dto::SearchResponse,
        crate::dto::QueryResult,
        crate::dto::RecordSet,
        crate::dto::PoolStatusResponse,
        crate::dto::QuarantinedEndpoint,
        crate::dto::EndpointPerformance,
        crate::dto::CredentialQuota,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "search", description = "Batch patent search"),
        (name = "pool", description = "Egress pool status"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "API token. Set via PROTEUS_API_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
