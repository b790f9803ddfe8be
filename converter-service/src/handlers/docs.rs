use crate::ApiDoc;
use axum::{response::Html, Json};
use utoipa::OpenApi;

const ASSET_BASE: &str = "/static/swagger_ui";
const DOCS_TITLE: &str = "Office Document Conversion Service - Swagger UI";

/// Swagger UI page. The bundle is served from `/static/swagger_ui/`, which
/// operators populate; the API itself does not depend on it.
pub async fn swagger_ui() -> Html<String> {
    Html(swagger_ui_html("/openapi.json", DOCS_TITLE))
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn swagger_ui_html(openapi_url: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<link type="text/css" rel="stylesheet" href="{base}/swagger-ui.css">
<link rel="shortcut icon" href="{base}/favicon.png">
<title>{title}</title>
</head>
<body>
<div id="swagger-ui"></div>
<script src="{base}/swagger-ui-bundle.js"></script>
<script src="{base}/swagger-ui-standalone-preset.js"></script>
<script>
const ui = SwaggerUIBundle({{
    url: '{openapi_url}',
    dom_id: '#swagger-ui',
    layout: 'BaseLayout',
    deepLinking: true,
    showExtensions: true,
    showCommonExtensions: true,
    presets: [
        SwaggerUIBundle.presets.apis,
        SwaggerUIBundle.SwaggerUIStandalonePreset
    ],
}})
</script>
</body>
</html>"#,
        base = ASSET_BASE,
        title = title,
        openapi_url = openapi_url,
    )
}
