//! IB Gateway/TWS client connection management.

use anyhow::{Context, Result};
use put_desk_core::config::IbConfig;
use tracing::info;

/// Wrapper around ibapi::Client with convenience methods.
///
/// One client is reused for a whole reconciliation pass; queries are issued
/// sequentially to respect IB's per-topic request limits.
pub struct IbClient {
    config: IbConfig,
    client: ibapi::Client,
}

impl IbClient {
    /// Connect to IB Gateway/TWS.
    pub async fn connect(config: IbConfig) -> Result<Self> {
        let url = config.connection_url();
        info!(url = %url, client_id = config.client_id, "Connecting to IB Gateway");

        let client = ibapi::Client::connect(&url, config.client_id)
            .await
            .context("Failed to connect to IB Gateway")?;

        info!("Connected to IB Gateway");
        Ok(Self { config, client })
    }

    /// Get a reference to the underlying ibapi client.
    pub fn inner(&self) -> &ibapi::Client {
        &self.client
    }

    /// Check if the connection is alive.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Get the configuration.
    pub fn config(&self) -> &IbConfig {
        &self.config
    }
}
