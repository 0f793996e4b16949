//! Live/demo mode control
//!
//! Decides once, at startup, whether the process runs against live external
//! services or in-process demo surrogates, and constructs the matching
//! adapter pair so every component agrees on the same mode simultaneously.
//! The decision never flips mid-request: a failed live call later surfaces
//! as `StorageUnavailable`/`LedgerUnavailable`, it does not silently demote
//! the process to demo mode.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Args, LedgerBackend};
use crate::ledger::{ConsensusLedger, InMemoryLedger, LedgerAdapter, RegistryLedger};
use crate::storage::{HttpStorage, InMemoryStore, StorageAdapter};
use crate::types::Mode;

/// The adapter pair selected at startup, plus the mode they share
pub struct SelectedAdapters {
    pub storage: Arc<dyn StorageAdapter>,
    pub ledger: Arc<dyn LedgerAdapter>,
    pub mode: Mode,
}

/// Process-wide mode selection
pub struct ModeController;

impl ModeController {
    /// Decide the mode and construct adapters accordingly
    ///
    /// Live requires complete configuration for storage and the selected
    /// ledger backend AND passing one-shot connectivity probes on both.
    /// Anything short of that selects demo mode with a logged reason; the
    /// demo surrogates satisfy the exact same contracts and are explicitly
    /// non-durable.
    pub async fn initialize(args: &Args) -> SelectedAdapters {
        if args.force_demo() {
            info!("Demo mode forced by configuration");
            return Self::demo(args);
        }

        if !args.storage_configured() || !args.ledger_configured() {
            warn!(
                storage_configured = args.storage_configured(),
                ledger_configured = args.ledger_configured(),
                "Live configuration incomplete, running in demo mode"
            );
            return Self::demo(args);
        }

        let (storage, ledger) = match Self::build_live(args) {
            Ok(pair) => pair,
            Err(reason) => {
                warn!(reason = %reason, "Live adapter construction failed, running in demo mode");
                return Self::demo(args);
            }
        };

        // One-time connectivity probes; both must pass or neither adapter
        // goes live.
        if let Err(e) = storage.probe().await {
            warn!(error = %e, "Storage probe failed, running in demo mode");
            return Self::demo(args);
        }
        if let Err(e) = ledger.probe().await {
            warn!(error = %e, "Ledger probe failed, running in demo mode");
            return Self::demo(args);
        }

        info!(
            backend = ?args.ledger_backend,
            "Live mode: storage and ledger probes passed"
        );
        SelectedAdapters {
            storage,
            ledger,
            mode: Mode::Live,
        }
    }

    fn build_live(args: &Args) -> Result<(Arc<dyn StorageAdapter>, Arc<dyn LedgerAdapter>), String> {
        let storage_config = args
            .storage_config()
            .ok_or_else(|| "storage configuration incomplete".to_string())?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(
            HttpStorage::new(storage_config).map_err(|e| format!("storage client: {}", e))?,
        );

        let ledger: Arc<dyn LedgerAdapter> = match args.ledger_backend {
            LedgerBackend::Consensus => {
                let config = args
                    .consensus_config()
                    .ok_or_else(|| "consensus configuration incomplete".to_string())?;
                Arc::new(ConsensusLedger::new(config).map_err(|e| format!("consensus client: {}", e))?)
            }
            LedgerBackend::Registry => {
                let config = args
                    .registry_config()
                    .ok_or_else(|| "registry configuration incomplete".to_string())?;
                Arc::new(RegistryLedger::new(config).map_err(|e| format!("registry client: {}", e))?)
            }
        };

        Ok((storage, ledger))
    }

    fn demo(args: &Args) -> SelectedAdapters {
        SelectedAdapters {
            storage: Arc::new(
                InMemoryStore::new().with_gateway_base(args.storage_gateway_url.clone()),
            ),
            ledger: Arc::new(InMemoryLedger::new()),
            mode: Mode::Demo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_forced_demo_skips_probes() {
        let args = Args::parse_from(["griot", "--mode", "demo"]);
        let selected = ModeController::initialize(&args).await;
        assert_eq!(selected.mode, Mode::Demo);
    }

    #[tokio::test]
    async fn test_incomplete_configuration_selects_demo() {
        let args = Args::parse_from(["griot", "--storage-api-url", "http://127.0.0.1:5001"]);
        let selected = ModeController::initialize(&args).await;
        assert_eq!(selected.mode, Mode::Demo);
    }

    #[tokio::test]
    async fn test_demo_adapters_satisfy_contracts() {
        let args = Args::parse_from(["griot", "--mode", "demo"]);
        let selected = ModeController::initialize(&args).await;

        selected.storage.probe().await.unwrap();
        selected.ledger.probe().await.unwrap();
        assert!(selected.ledger.lookup("missing").await.unwrap().is_none());
    }
}
