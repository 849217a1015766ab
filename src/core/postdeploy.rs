use crate::adapters::NoopReporter;
use crate::domain::model::{
    hostname, HostCName, RunContext, RunPlan, RunSummary, Zone, ZoneSubdomains,
};
use crate::domain::ports::{ErrorReporter, HttpMethod, PlatformApi};
use crate::utils::error::{PostdeployError, Result, Service};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::ExitCode;
use url::form_urlencoded;

/// Cloudflare's maximum page size for zone listings.
pub const ZONES_PER_PAGE: u64 = 50;

#[derive(Debug, Deserialize)]
struct HerokuDomain {
    cname: Option<String>,
}

/// Provisions a freshly created review app: custom domains, DNS, config vars,
/// add-ons and ACM. Stops at the first failed call; nothing already applied is undone.
pub struct Postdeploy<A: PlatformApi> {
    api: A,
    context: RunContext,
    reporter: Box<dyn ErrorReporter>,
}

impl<A: PlatformApi> Postdeploy<A> {
    pub fn new(api: A, context: RunContext) -> Self {
        Self {
            api,
            context,
            reporter: Box::new(NoopReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs every step and maps the outcome to the process exit status.
    pub async fn run(&self) -> ExitCode {
        match self.execute().await {
            Ok(summary) => {
                tracing::info!(
                    "✅ Review app {} provisioned: {} hostname(s), {} add-on(s)",
                    self.context.app_name,
                    summary.host_cnames.len(),
                    summary.addons_attached
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("❌ Postdeploy failed: {}", e);
                tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
                self.reporter.report(&e).await;
                ExitCode::FAILURE
            }
        }
    }

    pub async fn execute(&self) -> Result<RunSummary> {
        tracing::info!(
            "Starting postdeploy for {} (PR #{})",
            self.context.app_name,
            self.context.pr_number
        );

        let zones = self.fetch_zones().await?;
        let resolved = self.resolve_zones(&zones)?;
        let host_cnames = self.register_domains(&resolved).await?;
        self.create_dns_records(&host_cnames).await?;
        self.update_config_vars().await?;
        let addons_attached = self.attach_addons().await?;
        self.request_acm().await?;

        Ok(RunSummary {
            host_cnames,
            addons_attached,
        })
    }

    /// Everything `execute` would apply, without calling either API.
    pub fn plan(&self) -> RunPlan {
        RunPlan {
            hostnames: self
                .context
                .zones
                .iter()
                .flat_map(|entry| entry.hostnames())
                .collect(),
            config_vars: self.context.config_vars(),
            addon_attachments: self.context.addon_attachments.clone(),
        }
    }

    pub async fn fetch_zones(&self) -> Result<Vec<Zone>> {
        let mut zones = Vec::new();
        let mut page = 1;

        loop {
            let mut path = format!("zones?page={}&per_page={}", page, ZONES_PER_PAGE);
            if let Some(account_id) = &self.context.cloudflare_account_id {
                let filter: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("account.id", account_id)
                    .finish();
                path.push('&');
                path.push_str(&filter);
            }

            let body = self
                .api
                .cloudflare_request(HttpMethod::Get, &path, None)
                .await?;
            let page_zones: Vec<Zone> = decode(Service::Cloudflare, &path, &body, "/result")?;
            zones.extend(page_zones);

            let total_pages = body
                .pointer("/result_info/total_pages")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Fetched {} Cloudflare zone(s)", zones.len());
        Ok(zones)
    }

    /// Pairs every configured domain with its zone by exact name. Fails before any
    /// registration if one is missing.
    pub fn resolve_zones<'a>(
        &'a self,
        zones: &[Zone],
    ) -> Result<Vec<(Zone, &'a ZoneSubdomains)>> {
        self.context
            .zones
            .iter()
            .map(|entry| {
                zones
                    .iter()
                    .find(|zone| zone.name == entry.domain)
                    .map(|zone| (zone.clone(), entry))
                    .ok_or_else(|| PostdeployError::ZoneNotFoundError {
                        domain: entry.domain.clone(),
                    })
            })
            .collect()
    }

    pub async fn register_domains(
        &self,
        resolved: &[(Zone, &ZoneSubdomains)],
    ) -> Result<Vec<HostCName>> {
        let path = format!("apps/{}/domains", self.context.app_name);
        let mut host_cnames = Vec::with_capacity(self.context.hostname_count());

        for (zone, entry) in resolved {
            for subdomain in &entry.subdomains {
                let hostname = hostname(subdomain, &entry.domain);
                let body = self
                    .api
                    .heroku_request(
                        HttpMethod::Post,
                        &path,
                        Some(json!({ "hostname": hostname, "sni_endpoint": null })),
                        &[],
                    )
                    .await?;

                let domain: HerokuDomain = decode(Service::Heroku, &path, &body, "")?;
                let cname_target =
                    domain
                        .cname
                        .ok_or_else(|| PostdeployError::MalformedResponseError {
                            service: Service::Heroku,
                            path: path.clone(),
                            message: format!("no cname returned for {}", hostname),
                        })?;

                tracing::info!("🌐 Added {} to Heroku (cname {})", hostname, cname_target);
                host_cnames.push(HostCName {
                    zone_id: zone.id.clone(),
                    hostname,
                    cname_target,
                });
            }
        }

        Ok(host_cnames)
    }

    pub async fn create_dns_records(&self, host_cnames: &[HostCName]) -> Result<()> {
        for host_cname in host_cnames {
            let path = format!("zones/{}/dns_records", host_cname.zone_id);
            self.api
                .cloudflare_request(
                    HttpMethod::Post,
                    &path,
                    Some(json!({
                        "type": "CNAME",
                        "name": host_cname.hostname,
                        "content": host_cname.cname_target,
                    })),
                )
                .await?;
            tracing::info!(
                "📝 Created CNAME {} -> {}",
                host_cname.hostname,
                host_cname.cname_target
            );
        }
        Ok(())
    }

    pub async fn update_config_vars(&self) -> Result<()> {
        let path = format!("apps/{}/config-vars", self.context.app_name);
        let vars = serde_json::to_value(self.context.config_vars())?;
        self.api
            .heroku_request(HttpMethod::Patch, &path, Some(vars), &[])
            .await?;
        tracing::info!("⚙️  Updated config vars on {}", self.context.app_name);
        Ok(())
    }

    pub async fn attach_addons(&self) -> Result<usize> {
        for attachment in &self.context.addon_attachments {
            self.api
                .heroku_request(
                    HttpMethod::Post,
                    "addon-attachments",
                    Some(json!({
                        "addon": attachment.addon,
                        "app": self.context.app_name,
                        "confirm": attachment.app,
                    })),
                    &[],
                )
                .await?;
            tracing::info!(
                "🔌 Attached add-on {} from {}",
                attachment.addon,
                attachment.app
            );
        }
        Ok(self.context.addon_attachments.len())
    }

    /// Asks Heroku to manage certificates for the app. Let's Encrypt rate limits mean
    /// certificates may not actually be issued for short-lived review apps.
    pub async fn request_acm(&self) -> Result<()> {
        let path = format!("apps/{}/acm", self.context.app_name);
        self.api
            .heroku_request(
                HttpMethod::Post,
                &path,
                None,
                &[("Content-Type", "application/json")],
            )
            .await?;
        tracing::info!("🔒 Requested ACM for {}", self.context.app_name);
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(
    service: Service,
    path: &str,
    body: &Value,
    pointer: &str,
) -> Result<T> {
    let value = body
        .pointer(pointer)
        .ok_or_else(|| PostdeployError::MalformedResponseError {
            service,
            path: path.to_string(),
            message: format!("missing field {}", pointer),
        })?;

    T::deserialize(value).map_err(|e| PostdeployError::MalformedResponseError {
        service,
        path: path.to_string(),
        message: e.to_string(),
    })
}
