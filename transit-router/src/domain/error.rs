//! Domain error types.
//!
//! These errors represent violations of connection assembly invariants.
//! They are distinct from build-time and query-time errors.

/// Domain-level errors for connection validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// Connection has no legs
    #[error("connection must have at least one leg")]
    EmptyConnection,

    /// Consecutive legs don't share a stop
    #[error("legs at stops {0} and {1} are not connected")]
    LegsNotConnected(String, String),

    /// A leg arrives before it departs, or a later leg departs before an
    /// earlier leg arrives
    #[error("leg times are not chronological")]
    NonChronologicalLegs,
}
