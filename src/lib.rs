//! Synheart PulseLock - On-device heart-pattern biometric authentication engine
//!
//! PulseLock authenticates a user by comparing a freshly captured heart-rate
//! window against an enrolled baseline through a deterministic pipeline:
//! validation → feature extraction → fingerprinting → similarity scoring →
//! decision, with repeated failures gated behind a persistent, escalating
//! lockout.
//!
//! ## Modules
//!
//! - **Matching pipeline**: validator, features, fingerprint, similarity, decision
//! - **Lockout**: escalating failed-attempt state machine, persisted per user
//! - **Engine**: orchestration over an injected secure-storage port

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod features;
pub mod fingerprint;
pub mod lockout;
pub mod similarity;
pub mod storage;
pub mod types;
pub mod validator;

pub use config::{EngineConfig, LockoutConfig};
pub use engine::PulseLockEngine;
pub use error::{AuthError, StoreError};
pub use storage::{MemoryStore, SecureStore};
pub use types::{
    AuthDecision, AuthEvent, HeartRateSample, PatternFingerprint, SampleWindow, SecurityLevel,
};

/// Engine version embedded in logs and CLI output
pub const PULSELOCK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for logs and CLI output
pub const PRODUCER_NAME: &str = "synheart-pulselock";
