//! Runtime configuration for the ledger core

use std::time::Duration;
use tracing::warn;

/// Tunables for the ledger core
///
/// Controls how long PIN session codes live and how often expired ones are
/// swept, plus the default window size for paged history.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerConfig {
    /// Lifetime of a PIN session code, measured from generation
    pub pin_ttl: Duration,
    /// How long a used code lingers before it is treated as gone
    pub pin_grace: Duration,
    /// Period of the background sweep of expired PIN sessions
    pub reaper_interval: Duration,
    /// Page size used when a history query does not give one
    pub default_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pin_ttl: Duration::from_secs(300),
            pin_grace: Duration::from_secs(1),
            reaper_interval: Duration::from_secs(1),
            default_page_size: 20,
        }
    }
}

impl LedgerConfig {
    /// Create a LedgerConfig with custom values
    ///
    /// Zero values are replaced by the defaults, with a warning.
    pub fn new(
        pin_ttl: Duration,
        pin_grace: Duration,
        reaper_interval: Duration,
        default_page_size: usize,
    ) -> Self {
        let default = Self::default();

        Self {
            pin_ttl: non_zero_duration("pin_ttl", pin_ttl, default.pin_ttl),
            pin_grace: non_zero_duration("pin_grace", pin_grace, default.pin_grace),
            reaper_interval: non_zero_duration(
                "reaper_interval",
                reaper_interval,
                default.reaper_interval,
            ),
            default_page_size: if default_page_size == 0 {
                warn!(
                    "Invalid default_page_size ({}), using default ({})",
                    default_page_size, default.default_page_size
                );
                default.default_page_size
            } else {
                default_page_size
            },
        }
    }
}

fn non_zero_duration(name: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        warn!("Invalid {} ({:?}), using default ({:?})", name, value, default);
        default
    } else {
        value
    }
}
