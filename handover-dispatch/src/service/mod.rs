//! Transactional handover operations over the SQLite store.
//!
//! Each operation opens its own [`StoreSession`]. Operations that write read
//! their guarding state inside the session's `IMMEDIATE` transaction, so the
//! database writer lock serialises them against every other writer, in this
//! process or another one sharing the file.

use chrono::{DateTime, Utc};
use handover_core::{
    Clock, FleetSnapshot, FulfillmentRequest, ImportSummary, LaneAnchorResolver, RequestId,
    SqliteStore, StoreSession, SystemClock,
};

use crate::{DispatchError, RecommendQuery, Recommendation, Recommender, ServiceConfig};

mod accept;
mod availability;
mod commitments;
mod inbox;
mod pickups;
mod requests;


/// Entry point for every handover operation.
///
/// The service is `Sync` and holds no shared mutable state; any number of
/// services, in any number of processes, may share one database file.
#[derive(Debug)]
pub struct HandoverService<C = SystemClock>
where
    C: Clock,
{
    store: SqliteStore,
    clock: C,
    recommender: Recommender,
    config: ServiceConfig,
}

impl HandoverService<SystemClock> {
    /// Service reading the wall clock.
    #[must_use]
    pub fn new(store: SqliteStore, config: ServiceConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<C> HandoverService<C>
where
    C: Clock,
{
    /// Service reading time from `clock`.
    #[must_use]
    pub fn with_clock(store: SqliteStore, config: ServiceConfig, clock: C) -> Self {
        let resolver = LaneAnchorResolver::new(config.default_city);
        Self {
            store,
            clock,
            recommender: Recommender::new(resolver, config.scan_limit),
            config,
        }
    }

    /// Backing store.
    #[must_use]
    pub const fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Time source.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Rank vehicles for a lane without taking any locks.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Validation`] when the query fails
    ///   [`RecommendQuery::validate`]; nothing is scanned.
    /// - [`DispatchError::Internal`] when the store fails.
    pub fn recommend(&self, query: &RecommendQuery) -> Result<Recommendation, DispatchError> {
        query.validate()?;
        self.recommender
            .recommend(&self.store, &self.store, query, self.now())
    }

    /// Upsert operators, riders, and vehicles from a registry export.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the store fails.
    pub fn import_fleet(&self, fleet: &FleetSnapshot) -> Result<ImportSummary, DispatchError> {
        Ok(self.store.import_fleet(fleet)?)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn session(&self) -> Result<StoreSession, DispatchError> {
        Ok(self.store.session()?)
    }
}

fn load_request(
    session: &StoreSession,
    request_id: &RequestId,
) -> Result<FulfillmentRequest, DispatchError> {
    session
        .request(request_id)?
        .ok_or_else(|| DispatchError::request_not_found(request_id))
}

fn authorize(request: &FulfillmentRequest, operator_id: &str) -> Result<(), DispatchError> {
    if request.operator_id.as_deref() == Some(operator_id) {
        return Ok(());
    }
    Err(DispatchError::Authorization {
        operator_id: operator_id.to_owned(),
        request_id: request.id,
    })
}
