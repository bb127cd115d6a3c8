pub mod models;
pub mod service;
pub mod workflow;

pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use workflow::{build_medical_workflow, create_flow_runner};
