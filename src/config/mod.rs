pub mod schema;

pub use schema::{
    default_config_path, Config, DatabaseConfig, GatewayConfig, LoggingConfig, ENV_PREFIX,
};
