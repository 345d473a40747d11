//! Data access for vehicles, operators, and request state.
//!
//! [`VehicleRegistry`] and [`OperatorRoster`] are the read-only views the
//! ranking path needs. Transactional state (requests, inbox rows,
//! commitments) lives behind the SQLite store, whose write transactions
//! double as the locking primitive.

use std::error::Error;

use crate::{Operator, OperatorBacklog, VehicleSnapshot};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{ImportSummary, SqliteStore, SqliteStoreError, StoreSession, StoreWriter};

/// Read access to vehicle snapshots.
pub trait VehicleRegistry: Send + Sync {
    /// Failure raised by the backing store.
    type Error: Error + Send + Sync + 'static;

    /// Return up to `limit` vehicles across all operators, newest first.
    fn recent_vehicles(&self, limit: usize) -> Result<Vec<VehicleSnapshot>, Self::Error>;
}

/// Read access to operators and their inbox load.
pub trait OperatorRoster: Send + Sync {
    /// Failure raised by the backing store.
    type Error: Error + Send + Sync + 'static;

    /// Return every operator, ordered by identifier.
    fn operators(&self) -> Result<Vec<Operator>, Self::Error>;

    /// Count `NEW` and `CONTACTED` inbox rows for `operator_id`.
    fn backlog(&self, operator_id: &str) -> Result<OperatorBacklog, Self::Error>;
}
