//! Griot - certification and reward engine for cultural heritage content
//!
//! Griot certifies user-submitted cultural content by hashing it
//! deterministically, pinning it to a content-addressed store, and
//! anchoring the hash/CID pair on an external ledger, so any third party
//! can later prove the content existed, in a given form, at a given time,
//! attributed to a given contributor.
//!
//! ## Components
//!
//! - **Hasher**: canonical serialization + SHA-256 content hashing
//! - **Storage**: content-addressed store adapter (IPFS-style HTTP API or
//!   in-memory demo surrogate)
//! - **Ledger**: dual-backend anchor (consensus topic + token mint, or a
//!   registry contract behind a JSON-RPC gateway) with a demo surrogate
//! - **Orchestrator**: hash → store → anchor coordination, verification,
//!   and tamper detection
//! - **Rewards**: contribution points and levels, recorded through the
//!   same ledger for auditability
//! - **Mode**: one-time live/demo decision shared by all adapters

pub mod config;
pub mod engine;
pub mod hasher;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod mode;
pub mod orchestrator;
pub mod retry;
pub mod rewards;
pub mod storage;
pub mod types;

pub use config::Args;
pub use engine::Engine;
pub use retry::{CancelHandle, CancelToken};
pub use types::{ContentHash, ContentSubmission, EngineError, MediaFile, Mode, Result};
