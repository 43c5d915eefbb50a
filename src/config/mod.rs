pub mod app;
pub mod session;

pub use app::{AppConfig, SignupSettings};
pub use session::{validate_production_config, SessionConfig, SessionConfigError, SessionLayer};
