use axum::{
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

/// Set by the upstream auth proxy. Comma separated permission names.
pub const PERMISSIONS_HEADER: &str = "x-user-permissions";

/// What the caller may do, as asserted by the auth proxy. Credentials never
/// reach this service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    pub export: bool,
}

impl Permissions {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let export = headers
            .get_all(PERMISSIONS_HEADER)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|name| name.trim().eq_ignore_ascii_case("export"));
        Self { export }
    }
}

pub async fn permissions_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let permissions = Permissions::from_headers(request.headers());
    request.extensions_mut().insert(permissions);
    next.run(request).await
}
