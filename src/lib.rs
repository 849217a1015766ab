pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::{BugsnagReporter, NoopReporter, ReqwestGateway};
pub use crate::config::{load_settings, PostdeployConfig, Settings};
pub use crate::core::postdeploy::Postdeploy;
pub use crate::utils::error::{PostdeployError, Result};
