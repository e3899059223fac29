//! Round-based public transit routing.
//!
//! Answers two classes of queries over a timetable: pareto-optimal
//! connections between source and target stops (earliest arrival or latest
//! departure, trading total time against transfers) and isolines (the best
//! connection to every reachable stop). The engine is a RAPTOR
//! implementation over an immutable, array-backed network, with per-day
//! trip materialization behind a DST-safe cache.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use chrono::{TimeZone, Utc};
//! use transit_router::{NetworkBuilder, QueryConfig, RouterConfig};
//!
//! let mut builder = NetworkBuilder::new(RouterConfig::default());
//! for stop in ["A", "B", "C", "D", "E", "F", "G"] {
//!     builder.add_stop(stop)?;
//! }
//! builder.add_route(
//!     "R1",
//!     vec!["A".into(), "B".into(), "C".into(), "D".into()],
//!     chrono_tz::UTC,
//! )?;
//! builder.add_route(
//!     "R2",
//!     vec!["D".into(), "E".into(), "F".into(), "G".into()],
//!     chrono_tz::UTC,
//! )?;
//! builder.add_trip("R1-T1", "R1")?;
//! for (position, (stop, minute)) in [("A", 0), ("B", 5), ("C", 10), ("D", 15)].iter().enumerate() {
//!     let seconds = 8 * 3600 + minute * 60;
//!     builder.add_stop_time("R1", "R1-T1", position, stop, seconds, seconds)?;
//! }
//! builder.add_trip("R2-T1", "R2")?;
//! for (position, (stop, minute)) in [("D", 20), ("E", 25), ("F", 30), ("G", 40)].iter().enumerate() {
//!     let seconds = 8 * 3600 + minute * 60;
//!     builder.add_stop_time("R2", "R2-T1", position, stop, seconds, seconds)?;
//! }
//! let router = builder.build()?;
//!
//! let departures = HashMap::from([(
//!     "A".to_string(),
//!     Utc.with_ymd_and_hms(2021, 1, 1, 8, 0, 0).unwrap(),
//! )]);
//! let arrivals = HashMap::from([("G".to_string(), 0u32)]);
//! let connections =
//!     router.route_earliest_arrival(&departures, &arrivals, &QueryConfig::default())?;
//!
//! assert_eq!(connections.len(), 1);
//! assert_eq!(connections[0].route_legs().count(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod daily;
mod domain;
mod network;
mod router;

pub use daily::{DayTripMask, NoMaskProvider, RouteTripMask, TripMaskProvider};
pub use domain::{Connection, DomainError, Leg, TravelMode};
pub use network::{BuildError, NetworkBuilder};
pub use router::{QueryConfig, QueryError, Router, RouterConfig, TimeType};
