pub mod client;
pub mod config;
pub mod form;
pub mod schema;
pub mod ui;

pub use client::{HttpMethod, HttpTransport, Transport};
pub use config::EngineConfig;
pub use form::{EngineEvent, FormEngine, FormMsg, OpenFormOptions};
