//! Travel modes for trip filtering.

use serde::{Deserialize, Serialize};

/// Transport mode of a route, used to restrict queries to a subset of the
/// network (e.g. rail only).
///
/// An empty allowed-mode set in a query means "no restriction".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TravelMode {
    Bus,
    Tram,
    Rail,
    Subway,
    Ship,
    AerialLift,
    Funicular,
}

impl TravelMode {
    /// Stable short code, used in cache keys.
    pub fn code(&self) -> &'static str {
        match self {
            TravelMode::Bus => "bus",
            TravelMode::Tram => "tram",
            TravelMode::Rail => "rail",
            TravelMode::Subway => "subway",
            TravelMode::Ship => "ship",
            TravelMode::AerialLift => "aerial_lift",
            TravelMode::Funicular => "funicular",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        use std::collections::HashSet;

        let modes = [
            TravelMode::Bus,
            TravelMode::Tram,
            TravelMode::Rail,
            TravelMode::Subway,
            TravelMode::Ship,
            TravelMode::AerialLift,
            TravelMode::Funicular,
        ];

        let codes: HashSet<_> = modes.iter().map(TravelMode::code).collect();
        assert_eq!(codes.len(), modes.len());
    }
}
