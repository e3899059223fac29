//! Router and query configuration.

use std::collections::BTreeSet;
use std::fmt;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::daily::{NoMaskProvider, TripMaskProvider};
use crate::domain::TravelMode;

/// Configuration of a single query.
///
/// Durations are in seconds and unsigned, so negative limits are
/// unrepresentable. Feature filters (`wheelchair_accessible`,
/// `bike_accessible`, `allowed_travel_modes`) are forwarded to the trip
/// mask provider and participate in the day view cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Longest walking transfer considered, in seconds.
    pub maximum_walking_duration: u32,

    /// Rest period added to every transfer, in seconds.
    pub minimum_transfer_duration: u32,

    /// Maximum number of transfers; bounds the number of rounds.
    pub maximum_transfer_number: u32,

    /// Maximum total travel time in seconds, `None` for unbounded.
    pub maximum_travel_time: Option<u32>,

    /// Restrict to wheelchair accessible trips.
    pub wheelchair_accessible: bool,

    /// Restrict to trips allowing bikes.
    pub bike_accessible: bool,

    /// Restrict to these travel modes; empty means no restriction.
    pub allowed_travel_modes: BTreeSet<TravelMode>,

    /// Whether a connection may start with a walking transfer.
    pub allow_source_transfer: bool,

    /// Whether a connection may end with a walking transfer.
    pub allow_target_transfer: bool,

    /// Timezone applied to leg ends that no route timezone covers.
    pub reference_timezone: Tz,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            maximum_walking_duration: u32::MAX,
            minimum_transfer_duration: 0,
            maximum_transfer_number: u32::MAX,
            maximum_travel_time: None,
            wheelchair_accessible: false,
            bike_accessible: false,
            allowed_travel_modes: BTreeSet::new(),
            allow_source_transfer: true,
            allow_target_transfer: true,
            reference_timezone: chrono_tz::UTC,
        }
    }
}

impl QueryConfig {
    /// True when the mode set actually restricts anything.
    pub fn needs_travel_mode_filtering(&self) -> bool {
        !self.allowed_travel_modes.is_empty()
    }

    /// Stable filter component of the day view cache key.
    pub(crate) fn filter_key(&self) -> String {
        let modes = if self.allowed_travel_modes.is_empty() {
            "all".to_string()
        } else {
            let codes: Vec<&str> = self
                .allowed_travel_modes
                .iter()
                .map(TravelMode::code)
                .collect();
            codes.join(",")
        };
        format!(
            "{}|{}|{}",
            self.wheelchair_accessible, self.bike_accessible, modes
        )
    }
}

/// Configuration of the router instance, supplied to the network builder.
pub struct RouterConfig {
    /// Same-stop transfer time in seconds for stops without an explicit
    /// override.
    pub default_same_stop_transfer_time: u32,

    /// Capacity of the day view cache (number of materialized day arrays).
    pub day_view_cache_size: u64,

    /// Decides which trips run on a given date under a given filter.
    pub mask_provider: Box<dyn TripMaskProvider>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            default_same_stop_transfer_time: 120,
            day_view_cache_size: 5,
            mask_provider: Box::new(NoMaskProvider::default()),
        }
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field(
                "default_same_stop_transfer_time",
                &self.default_same_stop_transfer_time,
            )
            .field("day_view_cache_size", &self.day_view_cache_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query_config_is_unrestricted() {
        let config = QueryConfig::default();
        assert_eq!(config.maximum_walking_duration, u32::MAX);
        assert_eq!(config.minimum_transfer_duration, 0);
        assert!(config.maximum_travel_time.is_none());
        assert!(!config.needs_travel_mode_filtering());
        assert!(config.allow_source_transfer);
        assert!(config.allow_target_transfer);
    }

    #[test]
    fn filter_key_reflects_filters() {
        let mut config = QueryConfig::default();
        assert_eq!(config.filter_key(), "false|false|all");

        config.wheelchair_accessible = true;
        config.allowed_travel_modes.insert(TravelMode::Rail);
        config.allowed_travel_modes.insert(TravelMode::Bus);
        // BTreeSet iteration keeps the key stable regardless of insertion order
        assert_eq!(config.filter_key(), "true|false|bus,rail");
    }

    #[test]
    fn default_router_config() {
        let config = RouterConfig::default();
        assert_eq!(config.default_same_stop_transfer_time, 120);
        assert_eq!(config.day_view_cache_size, 5);
    }
}
