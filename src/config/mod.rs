pub mod settings;

pub use settings::{AuthConfig, Config, ConfigError, GatewayConfig, LoggingConfig, SecurityConfig};
