use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ib: IbConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// IB Gateway/TWS connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbConfig {
    /// Gateway/TWS host (use 127.0.0.1, not localhost; TWS may block IPv6).
    pub host: String,
    /// Gateway port (4001 = live, 4002 = paper).
    pub port: u16,
    /// Client ID (unique per connection).
    pub client_id: i32,
}

impl IbConfig {
    /// Connection URL for the ibapi crate.
    #[must_use]
    pub fn connection_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reconciliation pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Lookback window for local orders considered active (days).
    pub window_days: i64,
    /// Fill prices further apart than this are corrected (dollars).
    pub price_tolerance: Decimal,
    /// Per-broker-query timeout; a timeout degrades that source only.
    pub query_timeout_secs: u64,
    /// Options stop trading at this local market time.
    pub market_close_hour: u32,
    pub market_close_minute: u32,
    /// Market timezone as a UTC offset in hours (-5 = US/Eastern standard).
    pub market_utc_offset_hours: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/put_desk".to_string(),
                max_connections: 10,
            },
            ib: IbConfig {
                host: "127.0.0.1".to_string(),
                port: 4002, // Paper trading by default
                client_id: 100,
            },
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            window_days: 45,
            price_tolerance: Decimal::new(1, 2), // $0.01
            query_timeout_secs: 30,
            market_close_hour: 16,
            market_close_minute: 0,
            market_utc_offset_hours: -5,
        }
    }
}
