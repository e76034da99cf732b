//! Moim attendance core
//!
//! The proximity attendance exchange and settlement backbone of the Moim
//! study-group app: a host device accepts one-line attendance assertions
//! over a discoverable proximity service, commits them transactionally to
//! the shared document store, and a daily settlement job credits reward
//! currencies and badges once a study ends.

pub mod config;
pub mod error;

use std::sync::Arc;

use moim_attendance::AttendanceCommit;
use moim_proximity::{
    AlwaysOnRadio, ClientOptions, HostOptions, PairedRegistry, ProximityClient, RadioAdapter,
    TransportHost,
};
use moim_settlement::{ScheduleOptions, SettlementJob, SettlementScheduler};
use moim_store::DocumentStore;

use crate::config::MoimOptions;

/// The main entry point wiring the attendance core together.
///
/// Owns the shared document store, the paired-endpoint registry, and the
/// radio adapter; each accessor constructs a fresh per-concern component
/// over that shared state.
pub struct Moim {
    /// The shared document store all components read and write
    pub store: DocumentStore,
    /// Paired endpoints visible to proximity discovery
    pub registry: PairedRegistry,
    /// Radio/permission collaborator
    pub radio: Arc<dyn RadioAdapter>,
    /// Client options
    pub options: MoimOptions,
}

impl Moim {
    /// Create a new instance with default options
    pub fn new() -> Self {
        Self::new_with_options(MoimOptions::default())
    }

    /// Create a new instance with custom options
    pub fn new_with_options(options: MoimOptions) -> Self {
        Self {
            store: DocumentStore::new(),
            registry: PairedRegistry::new(),
            radio: Arc::new(AlwaysOnRadio),
            options,
        }
    }

    /// Replace the radio adapter (the platform one on device, a fake in tests)
    pub fn with_radio(mut self, radio: Arc<dyn RadioAdapter>) -> Self {
        self.radio = radio;
        self
    }

    /// Get a handle to the shared document store
    pub fn store(&self) -> DocumentStore {
        self.store.clone()
    }

    /// Create the listening side of the proximity exchange
    pub fn proximity_host(&self) -> TransportHost {
        TransportHost::new(
            self.registry.clone(),
            self.radio.clone(),
            HostOptions::default()
                .with_service_name(&self.options.service_name)
                .with_read_timeout(self.options.read_timeout),
        )
    }

    /// Create the sending side of the proximity exchange
    pub fn proximity_client(&self) -> ProximityClient {
        ProximityClient::new(
            self.registry.clone(),
            self.radio.clone(),
            ClientOptions::default()
                .with_service_name(&self.options.service_name)
                .with_connect_timeout(self.options.connect_timeout),
        )
    }

    /// Create the attendance commit path (also the host's assertion sink)
    pub fn attendance(&self) -> AttendanceCommit {
        AttendanceCommit::new(self.store.clone())
    }

    /// Create the settlement batch job
    pub fn settlement(&self) -> SettlementJob {
        SettlementJob::new(self.store.clone())
    }

    /// Create the daily settlement scheduler
    pub fn settlement_scheduler(&self) -> SettlementScheduler {
        SettlementScheduler::new(
            self.settlement(),
            ScheduleOptions::default().with_run_at(self.options.settlement_run_at),
        )
    }
}

impl Default for Moim {
    fn default() -> Self {
        Self::new()
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::MoimOptions;
    pub use crate::error::Error;
    pub use crate::Moim;
    pub use moim_protocol::AttendanceAssertion;
}
