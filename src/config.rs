//! Configuration for the engine
//!
//! CLI arguments and environment variable handling using clap. Live mode
//! requires the storage API plus the selected ledger backend's settings;
//! anything missing drops the whole process into demo mode at startup.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::ledger::{ConsensusLedgerConfig, RegistryLedgerConfig};
use crate::retry::RetryConfig;
use crate::storage::HttpStorageConfig;

/// Which ledger backend anchors certifications; a deployment-time choice,
/// never per-call
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LedgerBackend {
    /// Append-only consensus topic + token mint (backend A)
    Consensus,
    /// Smart-contract registry behind a JSON-RPC gateway (backend B)
    Registry,
}

/// Griot - certification and reward engine for cultural heritage content
#[derive(Parser, Debug, Clone)]
#[command(name = "griot")]
#[command(about = "Certification and reward orchestration engine for cultural heritage content")]
pub struct Args {
    /// Unique identifier for this engine instance
    #[arg(long, env = "GRIOT_INSTANCE_ID", default_value_t = Uuid::new_v4())]
    pub instance_id: Uuid,

    /// Force a mode ("demo" skips probes and external services entirely)
    #[arg(long, env = "GRIOT_MODE")]
    pub mode: Option<String>,

    /// Ledger backend to anchor certifications on
    #[arg(long, env = "LEDGER_BACKEND", value_enum, default_value = "consensus")]
    pub ledger_backend: LedgerBackend,

    /// Content-addressed storage API endpoint (e.g. "http://127.0.0.1:5001")
    #[arg(long, env = "STORAGE_API_URL")]
    pub storage_api_url: Option<String>,

    /// Public storage gateway base for certificate URLs
    #[arg(long, env = "STORAGE_GATEWAY_URL", default_value = "https://ipfs.io")]
    pub storage_gateway_url: String,

    /// Consensus bridge REST base URL
    #[arg(long, env = "CONSENSUS_URL")]
    pub consensus_url: Option<String>,

    /// Consensus topic for certification records
    #[arg(long, env = "CONSENSUS_TOPIC_ID")]
    pub consensus_topic_id: Option<String>,

    /// Token collection minted per certification
    #[arg(long, env = "CONSENSUS_TOKEN_ID")]
    pub consensus_token_id: Option<String>,

    /// Operator account id for the consensus bridge
    #[arg(long, env = "OPERATOR_ID")]
    pub operator_id: Option<String>,

    /// Operator key for the consensus bridge
    #[arg(long, env = "OPERATOR_KEY")]
    pub operator_key: Option<String>,

    /// JSON-RPC endpoint of the registry contract gateway
    #[arg(long, env = "REGISTRY_RPC_URL")]
    pub registry_rpc_url: Option<String>,

    /// Registry contract address
    #[arg(long, env = "REGISTRY_CONTRACT")]
    pub registry_contract: Option<String>,

    /// Signer key credential for the registry gateway
    #[arg(long, env = "REGISTRY_SIGNER_KEY")]
    pub registry_signer_key: Option<String>,

    /// Maximum attempts for retried remote operations
    #[arg(long, env = "MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "1000")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value = "10000")]
    pub retry_max_delay_ms: u64,

    /// Per-attempt timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path for the JSONL operation audit log (disabled when unset)
    #[arg(long, env = "OPERATIONS_LOG")]
    pub operations_log: Option<PathBuf>,
}

impl Args {
    /// Whether demo mode is forced regardless of configuration
    pub fn force_demo(&self) -> bool {
        matches!(self.mode.as_deref(), Some("demo"))
    }

    /// Whether the storage backend is fully configured for live mode
    pub fn storage_configured(&self) -> bool {
        self.storage_api_url.is_some()
    }

    /// Whether the selected ledger backend is fully configured for live mode
    pub fn ledger_configured(&self) -> bool {
        match self.ledger_backend {
            LedgerBackend::Consensus => {
                self.consensus_url.is_some()
                    && self.consensus_topic_id.is_some()
                    && self.consensus_token_id.is_some()
                    && self.operator_id.is_some()
                    && self.operator_key.is_some()
            }
            LedgerBackend::Registry => {
                self.registry_rpc_url.is_some()
                    && self.registry_contract.is_some()
                    && self.registry_signer_key.is_some()
            }
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Storage client configuration; call only when [`Self::storage_configured`]
    pub fn storage_config(&self) -> Option<HttpStorageConfig> {
        Some(HttpStorageConfig {
            api_url: self.storage_api_url.clone()?,
            gateway_url: self.storage_gateway_url.clone(),
            timeout: self.timeout(),
        })
    }

    /// Consensus backend configuration, when complete
    pub fn consensus_config(&self) -> Option<ConsensusLedgerConfig> {
        Some(ConsensusLedgerConfig {
            base_url: self.consensus_url.clone()?,
            topic_id: self.consensus_topic_id.clone()?,
            token_id: self.consensus_token_id.clone()?,
            operator_id: self.operator_id.clone()?,
            operator_key: self.operator_key.clone()?,
            timeout: self.timeout(),
        })
    }

    /// Registry backend configuration, when complete
    pub fn registry_config(&self) -> Option<RegistryLedgerConfig> {
        Some(RegistryLedgerConfig {
            rpc_url: self.registry_rpc_url.clone()?,
            contract_address: self.registry_contract.clone()?,
            signer_key: self.registry_signer_key.clone()?,
            timeout: self.timeout(),
        })
    }

    /// Retry tuning for the orchestrator's executor
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            attempt_timeout: self.timeout(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref mode) = self.mode {
            if mode != "demo" && mode != "live" {
                return Err(format!("invalid mode '{}', expected demo or live", mode));
            }
        }
        if self.max_retries == 0 {
            return Err("MAX_RETRIES must be at least 1".to_string());
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err("RETRY_BASE_DELAY_MS must not exceed RETRY_MAX_DELAY_MS".to_string());
        }
        Ok(())
    }
}
