use crate::config::ReportingSettings;
use crate::domain::ports::ErrorReporter;
use crate::utils::error::{PostdeployError, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const PAYLOAD_VERSION: &str = "5";
const REPORT_CONTEXT: &str = "heroku:postdeploy";

/// Used when no crash reporter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

#[async_trait]
impl ErrorReporter for NoopReporter {
    async fn report(&self, _error: &PostdeployError) {}
}

/// Sends handled failures to Bugsnag's notify endpoint.
pub struct BugsnagReporter {
    client: Client,
    settings: ReportingSettings,
    app_name: Option<String>,
}

impl BugsnagReporter {
    pub fn new(settings: ReportingSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            settings,
            app_name: None,
        })
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn payload(&self, error: &PostdeployError) -> Value {
        json!({
            "apiKey": self.settings.bugsnag_api_key,
            "payloadVersion": PAYLOAD_VERSION,
            "notifier": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "url": "https://devcenter.heroku.com/articles/github-integration-review-apps",
            },
            "events": [{
                "exceptions": [{
                    "errorClass": error.error_class(),
                    "message": error.to_string(),
                    "stacktrace": [],
                }],
                "context": REPORT_CONTEXT,
                "severity": "error",
                "unhandled": false,
                "app": {
                    "id": self.app_name,
                    "releaseStage": self.settings.release_stage,
                },
                "device": {
                    "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                },
                "metaData": {
                    "postdeploy": {
                        "suggestion": error.recovery_suggestion(),
                    },
                },
            }],
        })
    }
}

#[async_trait]
impl ErrorReporter for BugsnagReporter {
    async fn report(&self, error: &PostdeployError) {
        let sent_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let result = self
            .client
            .post(&self.settings.notify_url)
            .header("Bugsnag-Api-Key", &self.settings.bugsnag_api_key)
            .header("Bugsnag-Payload-Version", PAYLOAD_VERSION)
            .header("Bugsnag-Sent-At", sent_at)
            .json(&self.payload(error))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Reported failure to Bugsnag");
            }
            Ok(response) => {
                tracing::warn!("Bugsnag rejected the report with {}", response.status());
            }
            Err(e) => {
                tracing::warn!("Could not deliver report to Bugsnag: {}", e);
            }
        }
    }
}
