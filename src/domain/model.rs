use serde::{Deserialize, Serialize};

/// Subdomain marker that provisions the zone apex itself.
pub const ROOT_SUBDOMAIN: &str = "@";

/// Cloudflare DNS zone. Only the fields the run needs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// One entry of the zone map: a Cloudflare zone and the prefixes to provision in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSubdomains {
    pub domain: String,
    #[serde(default)]
    pub subdomains: Vec<String>,
}

impl ZoneSubdomains {
    pub fn hostnames(&self) -> impl Iterator<Item = String> + '_ {
        self.subdomains
            .iter()
            .map(move |subdomain| hostname(subdomain, &self.domain))
    }
}

/// Add-on to attach to the review app, confirmed against the app that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonAttachment {
    pub addon: String,
    pub app: String,
}

/// Hostname accepted by Heroku, waiting for its Cloudflare CNAME.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCName {
    pub zone_id: String,
    pub hostname: String,
    pub cname_target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub app_name: String,
    pub pr_number: String,
    pub primary_domain: String,
    pub zones: Vec<ZoneSubdomains>,
    pub addon_attachments: Vec<AddonAttachment>,
    pub enable_acm: bool,
    /// Restricts zone listing to one Cloudflare account when set.
    pub cloudflare_account_id: Option<String>,
}

impl RunContext {
    pub fn config_vars(&self) -> ConfigVars {
        ConfigVars::for_review_app(&self.pr_number, &self.primary_domain, self.enable_acm)
    }

    pub fn hostname_count(&self) -> usize {
        self.zones.iter().map(|z| z.subdomains.len()).sum()
    }
}

/// Full hostname for a subdomain prefix. An empty prefix or `@` means the apex.
pub fn hostname(subdomain: &str, domain: &str) -> String {
    let subdomain = subdomain.trim().trim_end_matches('.');
    if subdomain.is_empty() || subdomain == ROOT_SUBDOMAIN {
        domain.to_string()
    } else {
        format!("{}.{}", subdomain, domain)
    }
}

/// Config vars patched onto the review app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigVars {
    #[serde(rename = "APP_BASE_DOMAIN")]
    pub app_base_domain: String,
    #[serde(rename = "APP_URL")]
    pub app_url: String,
    #[serde(rename = "SESSION_SECURE_COOKIE")]
    pub session_secure_cookie: String,
    #[serde(rename = "SESSION_COOKIE")]
    pub session_cookie: String,
}

impl ConfigVars {
    pub fn for_review_app(pr_number: &str, primary_domain: &str, enable_acm: bool) -> Self {
        let base_domain = format!("pr-{}.{}", pr_number, primary_domain);
        Self {
            app_url: format!("https://{}", base_domain),
            app_base_domain: base_domain,
            session_secure_cookie: enable_acm.to_string(),
            session_cookie: format!("PR{}_SID", pr_number),
        }
    }
}

/// What a run would change, computed without touching either API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub hostnames: Vec<String>,
    pub config_vars: ConfigVars,
    pub addon_attachments: Vec<AddonAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub host_cnames: Vec<HostCName>,
    pub addons_attached: usize,
}
