//! Configuration options for the Moim client

use std::time::Duration;

use chrono::NaiveTime;
use moim_protocol::SERVICE_NAME;

/// Configuration options shared by the components a [`crate::Moim`]
/// instance constructs.
#[derive(Debug, Clone)]
pub struct MoimOptions {
    /// Name the host advertises and clients filter on during discovery.
    pub service_name: String,

    /// Client-side connect deadline.
    pub connect_timeout: Duration,

    /// Host-side per-connection read deadline.
    pub read_timeout: Duration,

    /// UTC time of day the daily settlement fires.
    pub settlement_run_at: NaiveTime,
}

impl Default for MoimOptions {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            settlement_run_at: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
        }
    }
}

impl MoimOptions {
    /// Set the advertised/filtered service name
    pub fn with_service_name(mut self, value: &str) -> Self {
        self.service_name = value.to_string();
        self
    }

    /// Set the client connect timeout
    pub fn with_connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    /// Set the host read timeout
    pub fn with_read_timeout(mut self, value: Duration) -> Self {
        self.read_timeout = value;
        self
    }

    /// Set the daily settlement run time (UTC)
    pub fn with_settlement_run_at(mut self, value: NaiveTime) -> Self {
        self.settlement_run_at = value;
        self
    }
}
