use crate::config::{ApiSettings, CloudflareAuth};
use crate::domain::ports::{HttpMethod, PlatformApi};
use crate::utils::error::{PostdeployError, Result, Service};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;

pub const HEROKU_ACCEPT: &str = "application/vnd.heroku+json; version=3";

/// `PlatformApi` over a shared reqwest client.
pub struct ReqwestGateway {
    client: Client,
    settings: ApiSettings,
}

impl ReqwestGateway {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(concat!("heroku-postdeploy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, settings })
    }

    fn url(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(
        &self,
        service: Service,
        method: HttpMethod,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Value> {
        tracing::debug!("{} {} {}", service, method, path);
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("{} API response status: {}", service, status);

        let text = response.text().await?;
        if !status.is_success() {
            return Err(PostdeployError::ApiStatusError {
                service,
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| PostdeployError::MalformedResponseError {
            service,
            path: path.to_string(),
            message: format!("response is not JSON: {}", e),
        })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
    }
}

#[async_trait]
impl PlatformApi for ReqwestGateway {
    async fn cloudflare_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = Self::url(&self.settings.cloudflare_api_url, path);
        let mut request = self.client.request(to_method(method), url);

        request = match &self.settings.cloudflare_auth {
            CloudflareAuth::Token(token) => request.bearer_auth(token),
            CloudflareAuth::Key { api_key, email } => request
                .header("X-Auth-Key", api_key)
                .header("X-Auth-Email", email),
        };
        if let Some(body) = body {
            request = request.json(&body);
        }

        let value = self
            .send(Service::Cloudflare, method, path, request)
            .await?;

        // Cloudflare reports some failures inside a 2xx envelope.
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let errors = value
                .get("errors")
                .map(Value::to_string)
                .unwrap_or_else(|| "[]".to_string());
            return Err(PostdeployError::ApiRejectedError {
                service: Service::Cloudflare,
                path: path.to_string(),
                errors,
            });
        }

        Ok(value)
    }

    async fn heroku_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        let url = Self::url(&self.settings.heroku_api_url, path);
        let mut request = self
            .client
            .request(to_method(method), url)
            .bearer_auth(&self.settings.heroku_api_token)
            .header("Accept", HEROKU_ACCEPT);

        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        self.send(Service::Heroku, method, path, request).await
    }
}
