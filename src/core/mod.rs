pub mod postdeploy;

pub use crate::domain::model::{HostCName, RunContext, RunPlan, RunSummary, Zone};
pub use crate::domain::ports::{ErrorReporter, HttpMethod, PlatformApi};
pub use crate::utils::error::Result;
pub use postdeploy::Postdeploy;
