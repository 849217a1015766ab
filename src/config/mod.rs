#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::{
    ApiSettings, CloudflareAuth, PostdeployConfig, ReportingSettings, Settings,
};

use crate::utils::error::Result;
use std::path::Path;

/// Loads `postdeploy.toml`, applies environment fallbacks and validates.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    PostdeployConfig::from_file(path)?.resolve()
}
