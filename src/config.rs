//! Process configuration read from the environment, matching the external
//! interface named in the engine's integration contract.

use crate::error::{EngineError, Result};

/// Default size of the bounded executor pool (§4.8) absent an override.
pub const DEFAULT_POOL_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub metadata_ip_address: String,
    pub metadata_port: String,
    pub gcp_project_id: Option<String>,
    pub service_suffix: String,
    pub json_logs: bool,
    pub pool_size: usize,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let metadata_ip_address = std::env::var("METADATA_IP_ADDRESS").map_err(|_| {
            EngineError::Catalog("METADATA_IP_ADDRESS must be set".to_string())
        })?;
        let metadata_port = std::env::var("METADATA_PORT").unwrap_or_else(|_| "80".to_string());
        let gcp_project_id = std::env::var("GCP_PROJECT_ID").ok();
        let service_suffix = std::env::var("SERVICE_SUFFIX").unwrap_or_default();
        let json_logs = matches!(
            std::env::var("JSON_LOGS").as_deref(),
            Ok("1") | Ok("true") | Ok("TRUE")
        );
        let pool_size = std::env::var("EXECUTOR_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        Ok(Self {
            metadata_ip_address,
            metadata_port,
            gcp_project_id,
            service_suffix,
            json_logs,
            pool_size,
        })
    }
}
