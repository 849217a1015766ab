use std::fmt;
use thiserror::Error;

/// Remote service a request was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Heroku,
    Cloudflare,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Heroku => write!(f, "Heroku"),
            Service::Cloudflare => write!(f, "Cloudflare"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PostdeployError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{service} API returned {status} for {method} {path}: {body}")]
    ApiStatusError {
        service: Service,
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("{service} API rejected {path}: {errors}")]
    ApiRejectedError {
        service: Service,
        path: String,
        errors: String,
    },

    #[error("Malformed {service} response for {path}: {message}")]
    MalformedResponseError {
        service: Service,
        path: String,
        message: String,
    },

    #[error("No Cloudflare zone named '{domain}' is visible to the API credentials")]
    ZoneNotFoundError { domain: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl PostdeployError {
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PostdeployError::ConfigValidationError { .. }
                | PostdeployError::MissingConfigError { .. }
                | PostdeployError::InvalidConfigValueError { .. }
        )
    }

    /// Short name used when forwarding the error to a crash reporter.
    pub fn error_class(&self) -> &'static str {
        match self {
            PostdeployError::HttpError(_) => "HttpError",
            PostdeployError::ApiStatusError { .. } => "ApiStatusError",
            PostdeployError::ApiRejectedError { .. } => "ApiRejectedError",
            PostdeployError::MalformedResponseError { .. } => "MalformedResponseError",
            PostdeployError::ZoneNotFoundError { .. } => "ZoneNotFoundError",
            PostdeployError::IoError(_) => "IoError",
            PostdeployError::SerializationError(_) => "SerializationError",
            PostdeployError::ConfigValidationError { .. } => "ConfigValidationError",
            PostdeployError::MissingConfigError { .. } => "MissingConfigError",
            PostdeployError::InvalidConfigValueError { .. } => "InvalidConfigValueError",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PostdeployError::HttpError(e) if e.is_timeout() => {
                "A request to Heroku or Cloudflare timed out".to_string()
            }
            PostdeployError::HttpError(_) => {
                "Could not reach Heroku or Cloudflare".to_string()
            }
            PostdeployError::ApiStatusError {
                service, status, ..
            } => format!("{} rejected a request with HTTP {}", service, status),
            PostdeployError::ZoneNotFoundError { domain } => {
                format!("Cloudflare zone '{}' was not found", domain)
            }
            e if e.is_config_error() => format!("Invalid configuration: {}", e),
            e => e.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            PostdeployError::HttpError(_) => {
                "Check network access and raise http.timeout_seconds if the APIs are slow"
                    .to_string()
            }
            PostdeployError::ApiStatusError { status: 401, .. }
            | PostdeployError::ApiStatusError { status: 403, .. } => {
                "Verify the API token and its permissions".to_string()
            }
            PostdeployError::ApiStatusError { status: 422, .. } => {
                "The resource may already exist on the app; remove it or rebuild the review app"
                    .to_string()
            }
            PostdeployError::ApiStatusError { status: 429, .. } => {
                "Rate limited; wait before rebuilding the review app".to_string()
            }
            PostdeployError::ApiStatusError { .. }
            | PostdeployError::ApiRejectedError { .. } => {
                "Inspect the API response body and rebuild the review app".to_string()
            }
            PostdeployError::MalformedResponseError { .. } => {
                "The API answered with an unexpected payload; check the configured base URL"
                    .to_string()
            }
            PostdeployError::ZoneNotFoundError { .. } => {
                "Add the domain to Cloudflare or fix review_app.zones".to_string()
            }
            PostdeployError::IoError(_) => "Check the configuration file path".to_string(),
            PostdeployError::SerializationError(_) => {
                "Check the JSON payloads exchanged with the APIs".to_string()
            }
            PostdeployError::ConfigValidationError { .. }
            | PostdeployError::MissingConfigError { .. }
            | PostdeployError::InvalidConfigValueError { .. } => {
                "Fix postdeploy.toml or export the referenced environment variables".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PostdeployError>;
