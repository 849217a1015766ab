use crate::utils::error::{PostdeployError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Patch => write!(f, "PATCH"),
        }
    }
}

/// Authenticated access to the two platform APIs. Paths are relative to the
/// configured base URL; the decoded JSON body is returned (`Value::Null` when empty).
#[async_trait]
pub trait PlatformApi: Send + Sync {
    async fn cloudflare_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value>;

    async fn heroku_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<Value>;
}

/// Sink for handled failures. Implementations must not fail the caller.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, error: &PostdeployError);
}
