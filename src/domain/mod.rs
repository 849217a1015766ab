// Domain layer: run data and the ports the orchestrator talks through.

pub mod model;
pub mod ports;
