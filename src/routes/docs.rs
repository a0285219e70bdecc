//! Interactive API documentation routes.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Path the raw OpenAPI document is served under.
const OPENAPI_JSON: &str = "/api-doc/openapi.json";

/// Serve the Swagger UI at `/docs`, backed by the generated document.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new("/docs")
        .url(OPENAPI_JSON, ApiDoc::openapi())
        .into();

    ui.with_state(state)
}
