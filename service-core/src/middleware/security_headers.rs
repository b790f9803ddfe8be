use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

fn is_docs_route(path: &str) -> bool {
    path == "/docs" || path == "/openapi.json" || path.starts_with("/static/")
}

pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let docs_route = is_docs_route(req.uri().path());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );

    if docs_route {
        // Swagger UI boots from an inline script and loads its bundle from /static.
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static(
                "default-src 'self'; \
                 script-src 'self' 'unsafe-inline'; \
                 style-src 'self' 'unsafe-inline'; \
                 img-src 'self' data:; \
                 connect-src 'self'",
            ),
        );
        headers.insert(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("SAMEORIGIN"),
        );
    } else {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        );
        headers.insert(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::is_docs_route;

    #[test]
    fn docs_assets_are_docs_routes() {
        assert!(is_docs_route("/docs"));
        assert!(is_docs_route("/openapi.json"));
        assert!(is_docs_route("/static/swagger_ui/swagger-ui.css"));
    }

    #[test]
    fn api_routes_are_not_docs_routes() {
        assert!(!is_docs_route("/convert"));
        assert!(!is_docs_route("/download/3f2a"));
        assert!(!is_docs_route("/staticfile"));
    }
}
