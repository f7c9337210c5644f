//! Dual-source meter reading engine.
//!
//! - **[`SourceArbitrator`]**: runs the LAN/WEB failover loop. Polls the
//!   meter box on the local network, switches to the cloud API after
//!   repeated LAN failures, and switches back on the first successful
//!   LAN probe. Published readings are strictly ordered by observation
//!   time and their counters never decrease.
//!
//! - **[`Arbitration`]**: the pure state machine behind the arbitrator,
//!   usable without a runtime.
//!
//! - **[`CredentialStore`]** / **[`BackupGuard`]**: atomic credential
//!   persistence with a write-through mirror that survives an overwrite
//!   of the primary location, restored before the first poll.
//!
//! - **[`MeterSource`]**: the per-call fetch seam, implemented by
//!   [`LanSource`] and [`WebSource`] on top of `meterbridge-api`.

pub mod arbitration;
pub mod arbitrator;
pub mod backup;
pub mod config;
pub mod credentials;
pub mod error;
pub mod model;
mod persist;
pub mod sink;
pub mod source;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use arbitration::{Arbitration, DropReason, Outcome, Poll};
pub use arbitrator::SourceArbitrator;
pub use backup::{BackupGuard, RestoreOutcome};
pub use config::ArbitratorConfig;
pub use credentials::Credentials;
pub use error::{CoreError, FetchError, StoreError};
pub use model::{
    ArbitratorStatus, EntityKey, HealthCounter, PublishedReading, SourceState, SourceTransition,
};
pub use sink::ReadingSink;
pub use store::CredentialStore;
pub use source::{LanSource, MeterSource, TokenManager, WebSource};
