pub mod config;
pub mod config_loader;
pub mod contract;

pub use config::{AppConfig, DatabaseConfig, IbConfig, ReconcileConfig};
pub use config_loader::ConfigLoader;
pub use contract::{standard_multiplier, ContractKey, OptionRight, OrderStatus};
