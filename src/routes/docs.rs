use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const SWAGGER_UI_PATH: &str = "/docs";
const OPENAPI_JSON_PATH: &str = "/api-doc/openapi.json";

/// Serve the Swagger UI and the raw OpenAPI document of the archive API.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new(SWAGGER_UI_PATH)
        .url(OPENAPI_JSON_PATH, ApiDoc::openapi())
        .into();

    ui.with_state(state)
}
