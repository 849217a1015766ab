#![allow(dead_code)]

use async_trait::async_trait;
use heroku_postdeploy::domain::model::{AddonAttachment, RunContext, ZoneSubdomains};
use heroku_postdeploy::domain::ports::{ErrorReporter, HttpMethod, PlatformApi};
use heroku_postdeploy::utils::error::{PostdeployError, Result, Service};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub service: Service,
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

/// In-memory `PlatformApi` that records every call and answers like the real APIs.
pub struct FakeApi {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    zones: Vec<Value>,
    /// Fails the nth (0-based) call whose method matches and whose path starts with the prefix.
    fail_on: Option<(HttpMethod, &'static str, usize)>,
    omit_cname: bool,
}

impl FakeApi {
    pub fn new(zones: &[(&str, &str)]) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            zones: zones
                .iter()
                .map(|(id, name)| json!({ "id": id, "name": name, "status": "active" }))
                .collect(),
            fail_on: None,
            omit_cname: false,
        }
    }

    pub fn failing_on(mut self, method: HttpMethod, prefix: &'static str, nth: usize) -> Self {
        self.fail_on = Some((method, prefix, nth));
        self
    }

    pub fn without_cname(mut self) -> Self {
        self.omit_cname = true;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: RecordedCall) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        if let Some((method, prefix, nth)) = self.fail_on {
            let matching = |c: &RecordedCall| c.method == method && c.path.starts_with(prefix);
            let seen = calls.iter().filter(|c| matching(*c)).count();
            if matching(&call) && seen == nth {
                let err = PostdeployError::ApiStatusError {
                    service: call.service,
                    method: call.method.to_string(),
                    path: call.path.clone(),
                    status: 422,
                    body: r#"{"id":"invalid_params"}"#.to_string(),
                };
                calls.push(call);
                return Err(err);
            }
        }
        calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl PlatformApi for FakeApi {
    async fn cloudflare_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        self.record(RecordedCall {
            service: Service::Cloudflare,
            method,
            path: path.to_string(),
            body: body.clone(),
            headers: Vec::new(),
        })?;

        if method == HttpMethod::Get && path.starts_with("zones?") {
            return Ok(json!({
                "success": true,
                "errors": [],
                "result": self.zones,
                "result_info": { "page": 1, "per_page": 50, "total_pages": 1 }
            }));
        }
        Ok(json!({ "success": true, "errors": [], "result": body }))
    }

    async fn heroku_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        self.record(RecordedCall {
            service: Service::Heroku,
            method,
            path: path.to_string(),
            body: body.clone(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })?;

        if path.ends_with("/domains") {
            let hostname = body
                .as_ref()
                .and_then(|b| b["hostname"].as_str())
                .unwrap_or_default()
                .to_string();
            if self.omit_cname {
                return Ok(json!({ "hostname": hostname, "cname": null }));
            }
            return Ok(json!({
                "hostname": hostname,
                "cname": format!("{}.herokudns.com", hostname),
                "kind": "custom"
            }));
        }
        Ok(body.unwrap_or(Value::Null))
    }
}

#[derive(Default, Clone)]
pub struct RecordingReporter {
    pub reports: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, error: &PostdeployError) {
        self.reports.lock().unwrap().push(error.to_string());
    }
}

pub fn review_context(zones: &[(&str, &[&str])], addons: &[(&str, &str)]) -> RunContext {
    RunContext {
        app_name: "example-pr-42".to_string(),
        pr_number: "42".to_string(),
        primary_domain: "example.com".to_string(),
        zones: zones
            .iter()
            .map(|(domain, subdomains)| ZoneSubdomains {
                domain: domain.to_string(),
                subdomains: subdomains.iter().map(|s| s.to_string()).collect(),
            })
            .collect(),
        addon_attachments: addons
            .iter()
            .map(|(addon, app)| AddonAttachment {
                addon: addon.to_string(),
                app: app.to_string(),
            })
            .collect(),
        enable_acm: false,
        cloudflare_account_id: None,
    }
}
