//! Caller identity
//!
//! The console sends the acting user in `x-warden-user`; requests without it
//! are attributed to the configured default user.

use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::api::AppState;
use crate::gateway::CallContext;

pub const CALLER_HEADER: &str = "x-warden-user";

/// Identity recorded in the audit log for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl Caller {
    pub fn context(&self) -> CallContext {
        CallContext::user(self.0.clone())
    }

    pub fn name(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| state.config.warden.default_user.clone());
        Ok(Caller(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Caller {
        let state = AppState::in_memory(Config::default());
        let (mut parts, _) = request.into_parts();
        Caller::from_request_parts(&mut parts, &state).await.unwrap()
    }

    #[tokio::test]
    async fn test_header_identity() {
        let request = Request::builder()
            .header(CALLER_HEADER, " maria ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, Caller("maria".into()));
    }

    #[tokio::test]
    async fn test_falls_back_to_default_user() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await, Caller("warden_app".into()));

        let request = Request::builder().header(CALLER_HEADER, "").body(()).unwrap();
        assert_eq!(extract(request).await, Caller("warden_app".into()));
    }
}
