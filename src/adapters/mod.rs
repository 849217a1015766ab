// Adapters layer: concrete implementations of the domain ports.

pub mod http;
pub mod reporter;

pub use http::ReqwestGateway;
pub use reporter::{BugsnagReporter, NoopReporter};
