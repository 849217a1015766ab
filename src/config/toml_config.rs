use crate::domain::model::{AddonAttachment, RunContext, ZoneSubdomains};
use crate::utils::error::{PostdeployError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HEROKU_API_URL: &str = "https://api.heroku.com";
pub const DEFAULT_CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_BUGSNAG_NOTIFY_URL: &str = "https://notify.bugsnag.com";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// On-disk shape of `postdeploy.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostdeployConfig {
    #[serde(default)]
    pub heroku: HerokuSection,
    #[serde(default)]
    pub cloudflare: CloudflareSection,
    pub review_app: ReviewAppSection,
    #[serde(default)]
    pub http: HttpSection,
    pub error_reporting: Option<ErrorReportingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HerokuSection {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub app_name: Option<String>,
    pub pr_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudflareSection {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewAppSection {
    pub primary_domain: String,
    #[serde(default)]
    pub enable_acm: bool,
    #[serde(default)]
    pub zones: Vec<ZoneSubdomains>,
    #[serde(default)]
    pub addon_attachments: Vec<AddonAttachment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpSection {
    pub timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorReportingSection {
    pub bugsnag_api_key: Option<String>,
    pub notify_url: Option<String>,
    pub release_stage: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum CloudflareAuth {
    Token(String),
    Key { api_key: String, email: String },
}

impl fmt::Debug for CloudflareAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudflareAuth::Token(_) => write!(f, "Token(***)"),
            CloudflareAuth::Key { email, .. } => write!(f, "Key {{ email: {:?}, api_key: *** }}", email),
        }
    }
}

#[derive(Clone)]
pub struct ApiSettings {
    pub heroku_api_url: String,
    pub heroku_api_token: String,
    pub cloudflare_api_url: String,
    pub cloudflare_auth: CloudflareAuth,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("heroku_api_url", &self.heroku_api_url)
            .field("heroku_api_token", &"***")
            .field("cloudflare_api_url", &self.cloudflare_api_url)
            .field("cloudflare_auth", &self.cloudflare_auth)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct ReportingSettings {
    pub bugsnag_api_key: String,
    pub notify_url: String,
    pub release_stage: String,
}

impl fmt::Debug for ReportingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportingSettings")
            .field("bugsnag_api_key", &"***")
            .field("notify_url", &self.notify_url)
            .field("release_stage", &self.release_stage)
            .finish()
    }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub context: RunContext,
    pub api: ApiSettings,
    pub reporting: Option<ReportingSettings>,
}

impl PostdeployConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PostdeployError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with_env(content, |key| std::env::var(key).ok())
    }

    /// Parses after replacing `${VAR}` with values from `env`; unknown variables stay literal.
    pub fn from_toml_str_with_env<F>(content: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let processed_content = substitute_env_vars(content, &env)?;

        toml::from_str(&processed_content).map_err(|e| PostdeployError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn resolve(self) -> Result<Settings> {
        self.resolve_with_env(|key| std::env::var(key).ok())
    }

    /// Fills unset values from the review app environment and validates the result.
    pub fn resolve_with_env<F>(self, env: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |value: Option<String>, key: &str| non_empty(value).or_else(|| non_empty(env(key)));

        let app_name = lookup(self.heroku.app_name, "HEROKU_APP_NAME");
        let app_name = validation::validate_required_field("heroku.app_name", &app_name)?.clone();
        let pr_number = lookup(self.heroku.pr_number, "HEROKU_PR_NUMBER");
        let pr_number = validation::validate_required_field("heroku.pr_number", &pr_number)?.clone();
        let heroku_api_token = lookup(self.heroku.api_token, "HEROKU_API_KEY");
        let heroku_api_token =
            validation::validate_required_field("heroku.api_token", &heroku_api_token)?.clone();

        let cloudflare_auth = match lookup(self.cloudflare.api_token, "CLOUDFLARE_API_TOKEN") {
            Some(token) => CloudflareAuth::Token(token),
            None => {
                let api_key = lookup(self.cloudflare.api_key, "CLOUDFLARE_API_KEY");
                let email = lookup(self.cloudflare.email, "CLOUDFLARE_EMAIL");
                match (api_key, email) {
                    (Some(api_key), Some(email)) => CloudflareAuth::Key { api_key, email },
                    _ => {
                        return Err(PostdeployError::MissingConfigError {
                            field: "cloudflare.api_token (or cloudflare.api_key + cloudflare.email)"
                                .to_string(),
                        })
                    }
                }
            }
        };

        let reporting = self.error_reporting.unwrap_or_default();
        let reporting = lookup(reporting.bugsnag_api_key, "BUGSNAG_API_KEY").map(|bugsnag_api_key| {
            ReportingSettings {
                bugsnag_api_key,
                notify_url: non_empty(reporting.notify_url)
                    .unwrap_or_else(|| DEFAULT_BUGSNAG_NOTIFY_URL.to_string()),
                release_stage: non_empty(reporting.release_stage)
                    .unwrap_or_else(|| "review".to_string()),
            }
        });

        let settings = Settings {
            context: RunContext {
                app_name,
                pr_number,
                primary_domain: self.review_app.primary_domain,
                zones: self.review_app.zones,
                addon_attachments: self.review_app.addon_attachments,
                enable_acm: self.review_app.enable_acm,
                cloudflare_account_id: non_empty(self.cloudflare.account_id),
            },
            api: ApiSettings {
                heroku_api_url: non_empty(self.heroku.api_url)
                    .unwrap_or_else(|| DEFAULT_HEROKU_API_URL.to_string()),
                heroku_api_token,
                cloudflare_api_url: non_empty(self.cloudflare.api_url)
                    .unwrap_or_else(|| DEFAULT_CLOUDFLARE_API_URL.to_string()),
                cloudflare_auth,
                timeout: Duration::from_secs(
                    self.http.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
                ),
                connect_timeout: Duration::from_secs(
                    self.http
                        .connect_timeout_seconds
                        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS),
                ),
            },
            reporting,
        };

        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        let ctx = &self.context;

        validation::validate_non_empty_string("heroku.app_name", &ctx.app_name)?;
        validation::validate_no_placeholder("heroku.app_name", &ctx.app_name)?;
        validation::validate_no_placeholder("heroku.pr_number", &ctx.pr_number)?;
        validation::validate_digits("heroku.pr_number", &ctx.pr_number)?;
        validation::validate_non_empty_string("review_app.primary_domain", &ctx.primary_domain)?;
        validation::validate_no_placeholder("review_app.primary_domain", &ctx.primary_domain)?;

        if ctx.zones.is_empty() {
            return Err(PostdeployError::ConfigValidationError {
                field: "review_app.zones".to_string(),
                message: "At least one zone must be configured".to_string(),
            });
        }
        for (index, zone) in ctx.zones.iter().enumerate() {
            let field = format!("review_app.zones[{}]", index);
            validation::validate_non_empty_string(&format!("{}.domain", field), &zone.domain)?;
            validation::validate_no_placeholder(&format!("{}.domain", field), &zone.domain)?;
            for subdomain in &zone.subdomains {
                validation::validate_no_placeholder(&format!("{}.subdomains", field), subdomain)?;
            }
        }
        for (index, attachment) in ctx.addon_attachments.iter().enumerate() {
            let field = format!("review_app.addon_attachments[{}]", index);
            validation::validate_non_empty_string(&format!("{}.addon", field), &attachment.addon)?;
            validation::validate_non_empty_string(&format!("{}.app", field), &attachment.app)?;
            validation::validate_no_placeholder(&format!("{}.addon", field), &attachment.addon)?;
            validation::validate_no_placeholder(&format!("{}.app", field), &attachment.app)?;
        }
        if let Some(account_id) = &ctx.cloudflare_account_id {
            validation::validate_no_placeholder("cloudflare.account_id", account_id)?;
        }

        validation::validate_url("heroku.api_url", &self.api.heroku_api_url)?;
        validation::validate_no_placeholder("heroku.api_token", &self.api.heroku_api_token)?;
        validation::validate_url("cloudflare.api_url", &self.api.cloudflare_api_url)?;
        match &self.api.cloudflare_auth {
            CloudflareAuth::Token(token) => {
                validation::validate_no_placeholder("cloudflare.api_token", token)?
            }
            CloudflareAuth::Key { api_key, email } => {
                validation::validate_no_placeholder("cloudflare.api_key", api_key)?;
                validation::validate_no_placeholder("cloudflare.email", email)?;
            }
        }
        validation::validate_positive_number("http.timeout_seconds", self.api.timeout.as_secs(), 1)?;
        validation::validate_positive_number(
            "http.connect_timeout_seconds",
            self.api.connect_timeout.as_secs(),
            1,
        )?;

        if let Some(reporting) = &self.reporting {
            validation::validate_url("error_reporting.notify_url", &reporting.notify_url)?;
        }

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 替換環境變數 (例如 ${HEROKU_APP_NAME})
fn substitute_env_vars<F>(content: &str, env: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PostdeployError::ConfigValidationError {
        field: "toml_parsing".to_string(),
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[heroku]
api_token = "${HEROKU_API_KEY}"

[cloudflare]
api_token = "cf-token"

[review_app]
primary_domain = "example.com"
enable_acm = true

[[review_app.zones]]
domain = "example.com"
subdomains = ["pr-${HEROKU_PR_NUMBER}", "api.pr-${HEROKU_PR_NUMBER}"]

[[review_app.zones]]
domain = "example.org"
subdomains = ["pr-${HEROKU_PR_NUMBER}"]

[[review_app.addon_attachments]]
addon = "postgresql-staging-1234"
app = "example-staging"

[http]
timeout_seconds = 15
"#;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn review_env() -> impl Fn(&str) -> Option<String> {
        env_of(&[
            ("HEROKU_APP_NAME", "example-pr-42"),
            ("HEROKU_PR_NUMBER", "42"),
            ("HEROKU_API_KEY", "heroku-token"),
        ])
    }

    #[test]
    fn test_config_parsing_with_substitution() {
        let config = PostdeployConfig::from_toml_str_with_env(SAMPLE, review_env()).unwrap();
        assert_eq!(config.heroku.api_token.as_deref(), Some("heroku-token"));
        assert_eq!(config.review_app.zones.len(), 2);
        assert_eq!(
            config.review_app.zones[0].subdomains,
            vec!["pr-42".to_string(), "api.pr-42".to_string()]
        );
        assert_eq!(config.review_app.zones[1].domain, "example.org");
    }

    #[test]
    fn test_resolve_falls_back_to_environment() {
        let config = PostdeployConfig::from_toml_str_with_env(SAMPLE, review_env()).unwrap();
        let settings = config.resolve_with_env(review_env()).unwrap();

        assert_eq!(settings.context.app_name, "example-pr-42");
        assert_eq!(settings.context.pr_number, "42");
        assert!(settings.context.enable_acm);
        assert_eq!(settings.api.heroku_api_url, DEFAULT_HEROKU_API_URL);
        assert_eq!(settings.api.cloudflare_api_url, DEFAULT_CLOUDFLARE_API_URL);
        assert_eq!(settings.api.timeout, Duration::from_secs(15));
        assert_eq!(
            settings.api.cloudflare_auth,
            CloudflareAuth::Token("cf-token".to_string())
        );
        assert!(settings.reporting.is_none());
    }

    #[test]
    fn test_unresolved_placeholder_is_rejected() {
        let env = env_of(&[("HEROKU_APP_NAME", "example-pr-42"), ("HEROKU_API_KEY", "t")]);
        let config = PostdeployConfig::from_toml_str_with_env(SAMPLE, &env).unwrap();
        let err = config
            .resolve_with_env(env_of(&[
                ("HEROKU_APP_NAME", "example-pr-42"),
                ("HEROKU_PR_NUMBER", "42"),
                ("HEROKU_API_KEY", "t"),
            ]))
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("review_app.zones[0].subdomains"));
    }

    #[test]
    fn test_unresolved_placeholders_in_zones_addons_and_account_are_rejected() {
        let template = r#"
[heroku]
app_name = "demo-pr-1"
pr_number = "1"
api_token = "heroku-token"

[cloudflare]
api_token = "cf"
account_id = "ACCOUNT"

[review_app]
primary_domain = "example.com"

[[review_app.zones]]
domain = "DOMAIN"
subdomains = ["pr-1"]

[[review_app.addon_attachments]]
addon = "ADDON"
app = "APP"
"#;
        let render = |domain: &str, addon: &str, app: &str, account: &str| {
            template
                .replace("\"DOMAIN\"", &format!("\"{}\"", domain))
                .replace("\"ADDON\"", &format!("\"{}\"", addon))
                .replace("\"APP\"", &format!("\"{}\"", app))
                .replace("\"ACCOUNT\"", &format!("\"{}\"", account))
        };
        let resolve = |content: String| {
            PostdeployConfig::from_toml_str_with_env(&content, |_| None)
                .unwrap()
                .resolve_with_env(|_| None)
        };

        assert!(resolve(render("example.com", "pg-1", "staging", "acc-1")).is_ok());

        let cases = [
            (
                render("${ZONE_DOMAIN}", "pg-1", "staging", "acc-1"),
                "review_app.zones[0].domain",
            ),
            (
                render("example.com", "${STAGING_DB}", "staging", "acc-1"),
                "review_app.addon_attachments[0].addon",
            ),
            (
                render("example.com", "pg-1", "${STAGING_APP}", "acc-1"),
                "review_app.addon_attachments[0].app",
            ),
            (
                render("example.com", "pg-1", "staging", "${CF_ACCOUNT}"),
                "cloudflare.account_id",
            ),
        ];
        for (content, field) in cases {
            let err = resolve(content).unwrap_err();
            assert!(err.is_config_error());
            assert!(
                err.to_string().contains(field),
                "expected {} in: {}",
                field,
                err
            );
        }

        let err = resolve(render("${ZONE_DOMAIN}", "${STAGING_DB}", "${STAGING_APP}", "${CF_ACCOUNT}"))
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_missing_app_name_fails() {
        let config = PostdeployConfig::from_toml_str_with_env(SAMPLE, review_env()).unwrap();
        let err = config
            .resolve_with_env(env_of(&[("HEROKU_PR_NUMBER", "42"), ("HEROKU_API_KEY", "t")]))
            .unwrap_err();
        assert!(matches!(
            err,
            PostdeployError::MissingConfigError { ref field } if field == "heroku.app_name"
        ));
    }

    #[test]
    fn test_cloudflare_key_auth() {
        let toml_content = r#"
[heroku]
app_name = "demo-pr-1"
pr_number = "1"
api_token = "heroku-token"

[cloudflare]
api_key = "global-key"
email = "ops@example.com"
account_id = "acc-1"

[review_app]
primary_domain = "example.com"

[[review_app.zones]]
domain = "example.com"
subdomains = ["@"]

[error_reporting]
bugsnag_api_key = "bugsnag-key"
"#;
        let settings = PostdeployConfig::from_toml_str_with_env(toml_content, |_| None)
            .unwrap()
            .resolve_with_env(|_| None)
            .unwrap();

        assert_eq!(
            settings.api.cloudflare_auth,
            CloudflareAuth::Key {
                api_key: "global-key".to_string(),
                email: "ops@example.com".to_string()
            }
        );
        assert_eq!(settings.context.cloudflare_account_id.as_deref(), Some("acc-1"));
        let reporting = settings.reporting.unwrap();
        assert_eq!(reporting.notify_url, DEFAULT_BUGSNAG_NOTIFY_URL);
        assert_eq!(reporting.release_stage, "review");
    }

    #[test]
    fn test_empty_zone_map_is_rejected() {
        let toml_content = r#"
[heroku]
app_name = "demo-pr-1"
pr_number = "1"
api_token = "heroku-token"

[cloudflare]
api_token = "cf"

[review_app]
primary_domain = "example.com"
"#;
        let err = PostdeployConfig::from_toml_str_with_env(toml_content, |_| None)
            .unwrap()
            .resolve_with_env(|_| None)
            .unwrap_err();
        assert!(err.to_string().contains("review_app.zones"));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let settings = PostdeployConfig::from_toml_str_with_env(SAMPLE, review_env())
            .unwrap()
            .resolve_with_env(review_env())
            .unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("heroku-token"));
        assert!(!rendered.contains("cf-token"));
    }
}
