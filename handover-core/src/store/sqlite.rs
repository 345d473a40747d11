//! SQLite-backed store for fulfillment state and the fleet read model.
//!
//! Each [`StoreSession`] owns its own connection so concurrent callers never
//! share one. Writes go through [`StoreSession::write`], which runs the
//! closure inside an `IMMEDIATE` transaction and commits only if it succeeds.
//! The transaction holds the database writer lock, so reads made through the
//! [`StoreWriter`] are serialised against every other writer, whichever
//! process or handle it runs in. Timestamps are stored as Unix milliseconds
//! and reasons as JSON arrays.

use std::{
    collections::HashSet,
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use chrono::{DateTime, Utc};
use geo::{Coord, Rect};
use rusqlite::{Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior, params};
use thiserror::Error;

use crate::ids::ParseIdError;
use crate::labels::ParseLabelError;
use crate::{
    City, Commitment, CommitmentId, FleetSnapshot, FulfillmentRequest, InboxRecord, InboxState,
    Operator, OperatorBacklog, OperatorRecord, PickupLocation, RequestId, Requester,
    VehicleSnapshot,
};

use super::{OperatorRoster, VehicleRegistry};

/// How long a connection waits for a competing writer before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS operators (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS operator_hubs (
        operator_id TEXT NOT NULL,
        city TEXT NOT NULL,
        label TEXT NOT NULL,
        lat REAL NOT NULL,
        lon REAL NOT NULL,
        PRIMARY KEY (operator_id, city)
    );
    CREATE TABLE IF NOT EXISTS requesters (
        id TEXT PRIMARY KEY,
        display_name TEXT,
        phone TEXT
    );
    CREATE TABLE IF NOT EXISTS vehicles (
        id TEXT PRIMARY KEY,
        operator_id TEXT NOT NULL,
        registration_number TEXT NOT NULL,
        status TEXT NOT NULL,
        lat REAL,
        lon REAL,
        battery_pct REAL,
        telemetry_at INTEGER,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS vehicles_by_operator ON vehicles (operator_id, status);
    CREATE TABLE IF NOT EXISTS fulfillment_requests (
        id TEXT PRIMARY KEY,
        requester_id TEXT NOT NULL,
        lane_id TEXT NOT NULL,
        time_window TEXT,
        requirements TEXT,
        operator_id TEXT,
        pickup_label TEXT,
        pickup_lat REAL,
        pickup_lon REAL,
        assigned_vehicle_id TEXT,
        assigned_score REAL,
        assigned_reasons TEXT,
        pickup_verified_at INTEGER,
        pickup_verified_by TEXT,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS requests_by_requester ON fulfillment_requests (requester_id);
    CREATE INDEX IF NOT EXISTS requests_by_operator ON fulfillment_requests (operator_id);
    CREATE TABLE IF NOT EXISTS inbox_states (
        operator_id TEXT NOT NULL,
        request_id TEXT NOT NULL,
        state TEXT NOT NULL,
        note TEXT,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (operator_id, request_id)
    );
    CREATE TABLE IF NOT EXISTS commitments (
        id TEXT PRIMARY KEY,
        requester_id TEXT NOT NULL,
        operator_id TEXT NOT NULL,
        lane_id TEXT NOT NULL,
        lock_mode TEXT NOT NULL,
        status TEXT NOT NULL,
        starts_at INTEGER NOT NULL,
        ends_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        cancelled_at INTEGER,
        cancel_reason TEXT
    );
    CREATE INDEX IF NOT EXISTS commitments_by_requester
        ON commitments (requester_id, status, created_at);
";

const VEHICLE_COLUMNS: &str = "v.id, v.operator_id, v.registration_number, v.status, v.lat, \
     v.lon, v.battery_pct, v.telemetry_at, v.created_at";

const REQUEST_COLUMNS: &str = "r.id, r.requester_id, r.lane_id, r.time_window, r.requirements, \
     r.operator_id, r.pickup_label, r.pickup_lat, r.pickup_lon, r.assigned_vehicle_id, \
     r.assigned_score, r.assigned_reasons, r.pickup_verified_at, r.pickup_verified_by, \
     r.status, r.created_at";

const INBOX_COLUMNS: &str = "operator_id, request_id, state, note, updated_at";

const COMMITMENT_COLUMNS: &str = "id, requester_id, operator_id, lane_id, lock_mode, status, \
     starts_at, ends_at, created_at, cancelled_at, cancel_reason";

/// Errors raised by [`SqliteStore`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement failed.
    #[error("failed to {operation}: {source}")]
    Query {
        /// Operation that was running.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A stored label did not name a known variant.
    #[error("invalid value in column {column}: {source}")]
    InvalidLabel {
        /// Column holding the label.
        column: &'static str,
        /// Parse failure.
        #[source]
        source: ParseLabelError,
    },
    /// A stored identifier was malformed.
    #[error("invalid identifier in column {column}: {source}")]
    InvalidId {
        /// Column holding the identifier.
        column: &'static str,
        /// Parse failure.
        #[source]
        source: ParseIdError,
    },
    /// A stored timestamp was outside the representable range.
    #[error("timestamp {millis} in column {column} is out of range")]
    InvalidTimestamp {
        /// Column holding the timestamp.
        column: &'static str,
        /// Raw milliseconds since the Unix epoch.
        millis: i64,
    },
    /// A stored city was not recognised.
    #[error("unknown city {value:?} stored for operator {operator_id}")]
    InvalidCity {
        /// Operator owning the hub row.
        operator_id: String,
        /// Stored city text.
        value: String,
    },
    /// Assignment reasons could not be encoded or decoded.
    #[error("failed to process assignment reasons for request {request_id}: {source}")]
    Reasons {
        /// Request whose reasons failed.
        request_id: String,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
}

fn query(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> SqliteStoreError {
    move |source| SqliteStoreError::Query { operation, source }
}

/// Counts reported by [`SqliteStore::import_fleet`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    /// Operators written.
    pub operators: usize,
    /// Riders written.
    pub requesters: usize,
    /// Vehicles written.
    pub vehicles: usize,
}

/// Transactional store backed by a SQLite file.
///
/// Handles hold no shared state beyond the path; any number of handles, in
/// any number of processes, may open the same file.
#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteStoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let session = store.session()?;
        session
            .connection
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(query("enable write-ahead logging"))?;
        session
            .connection
            .execute_batch(SCHEMA)
            .map_err(query("create schema"))?;
        log::debug!("opened handover store at {}", store.path.display());
        Ok(store)
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection for one unit of work.
    pub fn session(&self) -> Result<StoreSession, SqliteStoreError> {
        let connection =
            Connection::open(&self.path).map_err(|source| SqliteStoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            })?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(query("configure busy timeout"))?;
        Ok(StoreSession { connection })
    }

    /// Upsert operators, riders, and vehicles from a registry export.
    pub fn import_fleet(&self, fleet: &FleetSnapshot) -> Result<ImportSummary, SqliteStoreError> {
        let mut session = self.session()?;
        session.write(|writer| {
            for operator in &fleet.operators {
                writer.save_operator(operator)?;
            }
            for requester in &fleet.requesters {
                writer.save_requester(requester)?;
            }
            for record in &fleet.vehicles {
                writer.save_vehicle(&VehicleSnapshot::from(record.clone()))?;
            }
            Ok::<_, SqliteStoreError>(ImportSummary {
                operators: fleet.operators.len(),
                requesters: fleet.requesters.len(),
                vehicles: fleet.vehicles.len(),
            })
        })
        .inspect(|summary| {
            log::info!(
                "imported {} operators, {} requesters, {} vehicles",
                summary.operators,
                summary.requesters,
                summary.vehicles
            );
        })
    }
}

impl VehicleRegistry for SqliteStore {
    type Error = SqliteStoreError;

    fn recent_vehicles(&self, limit: usize) -> Result<Vec<VehicleSnapshot>, Self::Error> {
        self.session()?.recent_vehicles(limit)
    }
}

impl OperatorRoster for SqliteStore {
    type Error = SqliteStoreError;

    fn operators(&self) -> Result<Vec<Operator>, Self::Error> {
        self.session()?.operators()
    }

    fn backlog(&self, operator_id: &str) -> Result<OperatorBacklog, Self::Error> {
        self.session()?.backlog(operator_id)
    }
}

/// One connection to the store.
pub struct StoreSession {
    connection: Connection,
}

impl fmt::Debug for StoreSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSession").finish_non_exhaustive()
    }
}

impl StoreSession {
    /// Run `operation` inside an `IMMEDIATE` transaction.
    ///
    /// The transaction commits when `operation` returns `Ok` and rolls back
    /// otherwise, so callers never observe partial writes. Checks that guard
    /// a write belong inside `operation`: the writer lock is taken before the
    /// closure runs, and a competing writer waits up to the busy timeout.
    pub fn write<T, E, F>(&mut self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&StoreWriter<'_>) -> Result<T, E>,
        E: From<SqliteStoreError>,
    {
        let session: &Self = self;
        let tx = Transaction::new_unchecked(&session.connection, TransactionBehavior::Immediate)
            .map_err(query("begin transaction"))?;
        let writer = StoreWriter { session, tx };
        let value = operation(&writer)?;
        writer.tx.commit().map_err(query("commit transaction"))?;
        Ok(value)
    }

    /// Load a request by identifier.
    pub fn request(&self, id: &RequestId) -> Result<Option<FulfillmentRequest>, SqliteStoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM fulfillment_requests r WHERE r.id = ?1");
        query_opt(&self.connection, "load request", &sql, [id.to_string()], RawRequest::read)?
            .map(RawRequest::decode)
            .transpose()
    }

    /// Requests routed to `operator_id`, newest first.
    pub fn operator_requests(
        &self,
        operator_id: &str,
        limit: usize,
    ) -> Result<Vec<FulfillmentRequest>, SqliteStoreError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM fulfillment_requests r
             WHERE r.operator_id = ?1
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT ?2"
        );
        query_all(
            &self.connection,
            "list operator requests",
            &sql,
            params![operator_id, sql_limit(limit)],
            RawRequest::read,
        )?
        .into_iter()
        .map(RawRequest::decode)
        .collect()
    }

    /// The rider's most recent request that is neither rejected nor picked up.
    pub fn active_request(
        &self,
        requester_id: &str,
    ) -> Result<Option<FulfillmentRequest>, SqliteStoreError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM fulfillment_requests r
             LEFT JOIN inbox_states i
                ON i.request_id = r.id AND i.operator_id = r.operator_id
             WHERE r.requester_id = ?1
               AND r.pickup_verified_at IS NULL
               AND r.status != 'REJECTED'
               AND (i.state IS NULL OR i.state != 'REJECTED')
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT 1"
        );
        query_opt(
            &self.connection,
            "find active request",
            &sql,
            [requester_id],
            RawRequest::read,
        )?
        .map(RawRequest::decode)
        .transpose()
    }

    /// Inbox row for `(operator_id, request_id)`, if one was saved.
    pub fn inbox(
        &self,
        operator_id: &str,
        request_id: &RequestId,
    ) -> Result<Option<InboxRecord>, SqliteStoreError> {
        let sql = format!(
            "SELECT {INBOX_COLUMNS} FROM inbox_states WHERE operator_id = ?1 AND request_id = ?2"
        );
        query_opt(
            &self.connection,
            "load inbox state",
            &sql,
            params![operator_id, request_id.to_string()],
            RawInbox::read,
        )?
        .map(RawInbox::decode)
        .transpose()
    }

    /// Vehicles bound to `ONBOARDED` requests of `operator_id`, ignoring
    /// `except`.
    pub fn bound_vehicles(
        &self,
        operator_id: &str,
        except: &RequestId,
    ) -> Result<HashSet<String>, SqliteStoreError> {
        let rows = query_all(
            &self.connection,
            "compute blocked vehicles",
            "SELECT r.assigned_vehicle_id FROM fulfillment_requests r
             JOIN inbox_states i ON i.request_id = r.id AND i.operator_id = ?1
             WHERE i.state = 'ONBOARDED'
               AND r.assigned_vehicle_id IS NOT NULL
               AND r.id != ?2",
            params![operator_id, except.to_string()],
            |row| row.get::<_, String>(0),
        )?;
        Ok(rows.into_iter().collect())
    }

    /// Another `ONBOARDED` request of `operator_id` holding `vehicle_id`.
    pub fn vehicle_binding(
        &self,
        operator_id: &str,
        vehicle_id: &str,
        except: &RequestId,
    ) -> Result<Option<RequestId>, SqliteStoreError> {
        let bound = query_opt(
            &self.connection,
            "check vehicle binding",
            "SELECT r.id FROM fulfillment_requests r
             JOIN inbox_states i ON i.request_id = r.id AND i.operator_id = ?1
             WHERE i.state = 'ONBOARDED'
               AND r.assigned_vehicle_id = ?2
               AND r.id != ?3
             LIMIT 1",
            params![operator_id, vehicle_id, except.to_string()],
            |row| row.get::<_, String>(0),
        )?;
        bound.map(|id| parse_id("fulfillment_requests.id", &id)).transpose()
    }

    /// Load a vehicle by registry identifier.
    pub fn vehicle(&self, id: &str) -> Result<Option<VehicleSnapshot>, SqliteStoreError> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles v WHERE v.id = ?1");
        query_opt(&self.connection, "load vehicle", &sql, [id], RawVehicle::read)?
            .map(RawVehicle::decode)
            .transpose()
    }

    /// `ACTIVE` vehicles of `operator_id` in assignment order.
    ///
    /// Ordered by battery (highest first), telemetry (freshest first), then
    /// registration age (oldest first); unknown values sort last. When `bbox`
    /// is given only vehicles with a position inside it are returned.
    pub fn assignable_vehicles(
        &self,
        operator_id: &str,
        bbox: Option<&Rect<f64>>,
        limit: usize,
    ) -> Result<Vec<VehicleSnapshot>, SqliteStoreError> {
        const ORDER: &str = "ORDER BY v.battery_pct IS NULL, v.battery_pct DESC,
                v.telemetry_at IS NULL, v.telemetry_at DESC,
                v.created_at ASC, v.id ASC";
        let rows = if let Some(bbox) = bbox {
            let sql = format!(
                "SELECT {VEHICLE_COLUMNS} FROM vehicles v
                 WHERE v.operator_id = ?1 AND v.status = 'ACTIVE'
                   AND v.lat BETWEEN ?2 AND ?3 AND v.lon BETWEEN ?4 AND ?5
                 {ORDER} LIMIT ?6"
            );
            query_all(
                &self.connection,
                "list vehicles in bounding box",
                &sql,
                params![
                    operator_id,
                    bbox.min().y,
                    bbox.max().y,
                    bbox.min().x,
                    bbox.max().x,
                    sql_limit(limit)
                ],
                RawVehicle::read,
            )?
        } else {
            let sql = format!(
                "SELECT {VEHICLE_COLUMNS} FROM vehicles v
                 WHERE v.operator_id = ?1 AND v.status = 'ACTIVE'
                 {ORDER} LIMIT ?2"
            );
            query_all(
                &self.connection,
                "list operator vehicles",
                &sql,
                params![operator_id, sql_limit(limit)],
                RawVehicle::read,
            )?
        };
        rows.into_iter().map(RawVehicle::decode).collect()
    }

    /// Up to `limit` vehicles across all operators, newest first.
    pub fn recent_vehicles(&self, limit: usize) -> Result<Vec<VehicleSnapshot>, SqliteStoreError> {
        let sql = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles v
             ORDER BY v.created_at DESC, v.id ASC LIMIT ?1"
        );
        query_all(
            &self.connection,
            "list recent vehicles",
            &sql,
            [sql_limit(limit)],
            RawVehicle::read,
        )?
        .into_iter()
        .map(RawVehicle::decode)
        .collect()
    }

    /// Every vehicle owned by `operator_id`, newest first.
    pub fn operator_vehicles(
        &self,
        operator_id: &str,
    ) -> Result<Vec<VehicleSnapshot>, SqliteStoreError> {
        let sql = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles v
             WHERE v.operator_id = ?1 ORDER BY v.created_at DESC, v.id ASC"
        );
        query_all(
            &self.connection,
            "list vehicles for operator",
            &sql,
            [operator_id],
            RawVehicle::read,
        )?
        .into_iter()
        .map(RawVehicle::decode)
        .collect()
    }

    /// Every operator, ordered by identifier.
    pub fn operators(&self) -> Result<Vec<Operator>, SqliteStoreError> {
        query_all(
            &self.connection,
            "list operators",
            "SELECT id, name FROM operators ORDER BY id",
            [],
            |row| {
                Ok(Operator {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
    }

    /// Load an operator by identifier.
    pub fn operator(&self, id: &str) -> Result<Option<Operator>, SqliteStoreError> {
        query_opt(
            &self.connection,
            "load operator",
            "SELECT id, name FROM operators WHERE id = ?1",
            [id],
            |row| {
                Ok(Operator {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
    }

    /// Count saved `NEW` and `CONTACTED` inbox rows for the operator's
    /// requests.
    pub fn backlog(&self, operator_id: &str) -> Result<OperatorBacklog, SqliteStoreError> {
        let counts = query_all(
            &self.connection,
            "count inbox backlog",
            "SELECT i.state, COUNT(*) FROM inbox_states i
             JOIN fulfillment_requests r ON r.id = i.request_id AND r.operator_id = i.operator_id
             WHERE i.operator_id = ?1
             GROUP BY i.state",
            [operator_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;
        let mut backlog = OperatorBacklog::default();
        for (state, count) in counts {
            let count = u32::try_from(count).unwrap_or(u32::MAX);
            match parse_label::<InboxState>("inbox_states.state", &state)? {
                InboxState::New => backlog.new = count,
                InboxState::Contacted => backlog.contacted = count,
                InboxState::Onboarded | InboxState::Rejected => {}
            }
        }
        Ok(backlog)
    }

    /// Hub of `operator_id` in `city`, else the operator's first hub.
    pub fn pickup_hub(
        &self,
        operator_id: &str,
        city: City,
    ) -> Result<Option<PickupLocation>, SqliteStoreError> {
        query_opt(
            &self.connection,
            "load pickup hub",
            "SELECT label, lat, lon FROM operator_hubs
             WHERE operator_id = ?1
             ORDER BY city = ?2 DESC, city ASC
             LIMIT 1",
            params![operator_id, city.as_str()],
            |row| {
                Ok(PickupLocation {
                    label: row.get(0)?,
                    position: Coord {
                        x: row.get(2)?,
                        y: row.get(1)?,
                    },
                })
            },
        )
    }

    /// Load a rider's identity.
    pub fn requester(&self, id: &str) -> Result<Option<Requester>, SqliteStoreError> {
        query_opt(
            &self.connection,
            "load requester",
            "SELECT id, display_name, phone FROM requesters WHERE id = ?1",
            [id],
            |row| {
                Ok(Requester {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    phone: row.get(2)?,
                })
            },
        )
    }

    /// Load a commitment by identifier.
    pub fn commitment(&self, id: &CommitmentId) -> Result<Option<Commitment>, SqliteStoreError> {
        let sql = format!("SELECT {COMMITMENT_COLUMNS} FROM commitments WHERE id = ?1");
        query_opt(
            &self.connection,
            "load commitment",
            &sql,
            [id.to_string()],
            RawCommitment::read,
        )?
        .map(RawCommitment::decode)
        .transpose()
    }

    /// The rider's `ACTIVE` commitments, newest first, whatever their window.
    pub fn active_commitments(
        &self,
        requester_id: &str,
    ) -> Result<Vec<Commitment>, SqliteStoreError> {
        let sql = format!(
            "SELECT {COMMITMENT_COLUMNS} FROM commitments
             WHERE requester_id = ?1 AND status = 'ACTIVE'
             ORDER BY created_at DESC, id DESC"
        );
        query_all(
            &self.connection,
            "list active commitments",
            &sql,
            [requester_id],
            RawCommitment::read,
        )?
        .into_iter()
        .map(RawCommitment::decode)
        .collect()
    }

    /// Every commitment of the rider, oldest first.
    pub fn commitments_for(
        &self,
        requester_id: &str,
    ) -> Result<Vec<Commitment>, SqliteStoreError> {
        let sql = format!(
            "SELECT {COMMITMENT_COLUMNS} FROM commitments
             WHERE requester_id = ?1 ORDER BY created_at ASC, id ASC"
        );
        query_all(
            &self.connection,
            "list commitments",
            &sql,
            [requester_id],
            RawCommitment::read,
        )?
        .into_iter()
        .map(RawCommitment::decode)
        .collect()
    }
}

/// Write access inside a [`StoreSession::write`] transaction.
///
/// Dereferences to the owning [`StoreSession`]; reads made that way run
/// inside the transaction and see its uncommitted writes.
pub struct StoreWriter<'c> {
    session: &'c StoreSession,
    tx: Transaction<'c>,
}

impl Deref for StoreWriter<'_> {
    type Target = StoreSession;

    fn deref(&self) -> &StoreSession {
        self.session
    }
}

impl fmt::Debug for StoreWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreWriter").finish_non_exhaustive()
    }
}

impl StoreWriter<'_> {
    /// Upsert an operator and replace its hubs.
    pub fn save_operator(&self, operator: &OperatorRecord) -> Result<(), SqliteStoreError> {
        self.tx
            .execute(
                "INSERT INTO operators (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                params![operator.id, operator.name],
            )
            .map_err(query("save operator"))?;
        self.tx
            .execute(
                "DELETE FROM operator_hubs WHERE operator_id = ?1",
                [&operator.id],
            )
            .map_err(query("clear operator hubs"))?;
        for hub in &operator.hubs {
            self.tx
                .execute(
                    "INSERT INTO operator_hubs (operator_id, city, label, lat, lon)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![operator.id, hub.city.as_str(), hub.label, hub.lat, hub.lon],
                )
                .map_err(query("save operator hub"))?;
        }
        Ok(())
    }

    /// Upsert a rider identity.
    pub fn save_requester(&self, requester: &Requester) -> Result<(), SqliteStoreError> {
        self.tx
            .execute(
                "INSERT INTO requesters (id, display_name, phone) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    display_name = excluded.display_name,
                    phone = excluded.phone",
                params![requester.id, requester.display_name, requester.phone],
            )
            .map_err(query("save requester"))?;
        Ok(())
    }

    /// Upsert a vehicle snapshot.
    pub fn save_vehicle(&self, vehicle: &VehicleSnapshot) -> Result<(), SqliteStoreError> {
        self.tx
            .execute(
                "INSERT INTO vehicles (id, operator_id, registration_number, status, lat, lon,
                    battery_pct, telemetry_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    operator_id = excluded.operator_id,
                    registration_number = excluded.registration_number,
                    status = excluded.status,
                    lat = excluded.lat,
                    lon = excluded.lon,
                    battery_pct = excluded.battery_pct,
                    telemetry_at = excluded.telemetry_at,
                    created_at = excluded.created_at",
                params![
                    vehicle.id,
                    vehicle.operator_id,
                    vehicle.registration_number,
                    vehicle.status.as_str(),
                    vehicle.position.map(|p| p.y),
                    vehicle.position.map(|p| p.x),
                    vehicle.battery_pct,
                    vehicle.telemetry_at.map(|at| at.timestamp_millis()),
                    vehicle.created_at.timestamp_millis(),
                ],
            )
            .map_err(query("save vehicle"))?;
        Ok(())
    }

    /// Insert or replace a request row.
    pub fn save_request(&self, request: &FulfillmentRequest) -> Result<(), SqliteStoreError> {
        let reasons = request
            .assigned_reasons
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| SqliteStoreError::Reasons {
                request_id: request.id.to_string(),
                source,
            })?;
        let pickup = request.pickup_location.as_ref();
        self.tx
            .execute(
                "INSERT INTO fulfillment_requests (id, requester_id, lane_id, time_window,
                    requirements, operator_id, pickup_label, pickup_lat, pickup_lon,
                    assigned_vehicle_id, assigned_score, assigned_reasons, pickup_verified_at,
                    pickup_verified_by, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                 ON CONFLICT(id) DO UPDATE SET
                    operator_id = excluded.operator_id,
                    pickup_label = excluded.pickup_label,
                    pickup_lat = excluded.pickup_lat,
                    pickup_lon = excluded.pickup_lon,
                    assigned_vehicle_id = excluded.assigned_vehicle_id,
                    assigned_score = excluded.assigned_score,
                    assigned_reasons = excluded.assigned_reasons,
                    pickup_verified_at = excluded.pickup_verified_at,
                    pickup_verified_by = excluded.pickup_verified_by,
                    status = excluded.status",
                params![
                    request.id.to_string(),
                    request.requester_id,
                    request.lane_id,
                    request.time_window,
                    request.requirements,
                    request.operator_id,
                    pickup.map(|p| p.label.as_str()),
                    pickup.map(|p| p.position.y),
                    pickup.map(|p| p.position.x),
                    request.assigned_vehicle_id,
                    request.assigned_score,
                    reasons,
                    request.pickup_verified_at.map(|at| at.timestamp_millis()),
                    request.pickup_verified_by,
                    request.status.as_str(),
                    request.created_at.timestamp_millis(),
                ],
            )
            .map_err(query("save request"))?;
        Ok(())
    }

    /// Insert or replace an inbox row.
    pub fn save_inbox(&self, record: &InboxRecord) -> Result<(), SqliteStoreError> {
        self.tx
            .execute(
                "INSERT INTO inbox_states (operator_id, request_id, state, note, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(operator_id, request_id) DO UPDATE SET
                    state = excluded.state,
                    note = excluded.note,
                    updated_at = excluded.updated_at",
                params![
                    record.operator_id,
                    record.request_id.to_string(),
                    record.state.as_str(),
                    record.note,
                    record.updated_at.timestamp_millis(),
                ],
            )
            .map_err(query("save inbox state"))?;
        Ok(())
    }

    /// Insert or replace a commitment.
    pub fn save_commitment(&self, commitment: &Commitment) -> Result<(), SqliteStoreError> {
        self.tx
            .execute(
                "INSERT INTO commitments (id, requester_id, operator_id, lane_id, lock_mode,
                    status, starts_at, ends_at, created_at, cancelled_at, cancel_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    cancelled_at = excluded.cancelled_at,
                    cancel_reason = excluded.cancel_reason",
                params![
                    commitment.id.to_string(),
                    commitment.requester_id,
                    commitment.operator_id,
                    commitment.lane_id,
                    commitment.lock_mode.as_str(),
                    commitment.status.as_str(),
                    commitment.starts_at.timestamp_millis(),
                    commitment.ends_at.timestamp_millis(),
                    commitment.created_at.timestamp_millis(),
                    commitment.cancelled_at.map(|at| at.timestamp_millis()),
                    commitment.cancel_reason,
                ],
            )
            .map_err(query("save commitment"))?;
        Ok(())
    }
}

fn query_all<P, T, F>(
    connection: &Connection,
    operation: &'static str,
    sql: &str,
    params: P,
    map: F,
) -> Result<Vec<T>, SqliteStoreError>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut statement = connection.prepare_cached(sql).map_err(query(operation))?;
    let rows = statement.query_map(params, map).map_err(query(operation))?;
    let collected = rows.collect::<Result<Vec<_>, _>>().map_err(query(operation));
    collected
}

fn query_opt<P, T, F>(
    connection: &Connection,
    operation: &'static str,
    sql: &str,
    params: P,
    map: F,
) -> Result<Option<T>, SqliteStoreError>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    connection
        .query_row(sql, params, map)
        .optional()
        .map_err(query(operation))
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn parse_label<T>(column: &'static str, text: &str) -> Result<T, SqliteStoreError>
where
    T: FromStr<Err = ParseLabelError>,
{
    text.parse()
        .map_err(|source| SqliteStoreError::InvalidLabel { column, source })
}

fn parse_id<T>(column: &'static str, text: &str) -> Result<T, SqliteStoreError>
where
    T: FromStr<Err = ParseIdError>,
{
    text.parse()
        .map_err(|source| SqliteStoreError::InvalidId { column, source })
}

fn timestamp(column: &'static str, millis: i64) -> Result<DateTime<Utc>, SqliteStoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(SqliteStoreError::InvalidTimestamp { column, millis })
}

fn optional_timestamp(
    column: &'static str,
    millis: Option<i64>,
) -> Result<Option<DateTime<Utc>>, SqliteStoreError> {
    millis.map(|value| timestamp(column, value)).transpose()
}

/// Columns of a `vehicles` row before validation.
struct RawVehicle {
    id: String,
    operator_id: String,
    registration_number: String,
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    battery_pct: Option<f64>,
    telemetry_at: Option<i64>,
    created_at: i64,
}

impl RawVehicle {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            operator_id: row.get(1)?,
            registration_number: row.get(2)?,
            status: row.get(3)?,
            lat: row.get(4)?,
            lon: row.get(5)?,
            battery_pct: row.get(6)?,
            telemetry_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<VehicleSnapshot, SqliteStoreError> {
        Ok(VehicleSnapshot {
            status: parse_label("vehicles.status", &self.status)?,
            position: self.lat.zip(self.lon).map(|(y, x)| Coord { x, y }),
            battery_pct: self.battery_pct,
            telemetry_at: optional_timestamp("vehicles.telemetry_at", self.telemetry_at)?,
            created_at: timestamp("vehicles.created_at", self.created_at)?,
            id: self.id,
            operator_id: self.operator_id,
            registration_number: self.registration_number,
        })
    }
}

/// Columns of a `fulfillment_requests` row before validation.
struct RawRequest {
    id: String,
    requester_id: String,
    lane_id: String,
    time_window: Option<String>,
    requirements: Option<String>,
    operator_id: Option<String>,
    pickup_label: Option<String>,
    pickup_lat: Option<f64>,
    pickup_lon: Option<f64>,
    assigned_vehicle_id: Option<String>,
    assigned_score: Option<f64>,
    assigned_reasons: Option<String>,
    pickup_verified_at: Option<i64>,
    pickup_verified_by: Option<String>,
    status: String,
    created_at: i64,
}

impl RawRequest {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            requester_id: row.get(1)?,
            lane_id: row.get(2)?,
            time_window: row.get(3)?,
            requirements: row.get(4)?,
            operator_id: row.get(5)?,
            pickup_label: row.get(6)?,
            pickup_lat: row.get(7)?,
            pickup_lon: row.get(8)?,
            assigned_vehicle_id: row.get(9)?,
            assigned_score: row.get(10)?,
            assigned_reasons: row.get(11)?,
            pickup_verified_at: row.get(12)?,
            pickup_verified_by: row.get(13)?,
            status: row.get(14)?,
            created_at: row.get(15)?,
        })
    }

    fn decode(self) -> Result<FulfillmentRequest, SqliteStoreError> {
        let assigned_reasons = self
            .assigned_reasons
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()
            .map_err(|source| SqliteStoreError::Reasons {
                request_id: self.id.clone(),
                source,
            })?;
        let pickup_location = match (self.pickup_label, self.pickup_lat, self.pickup_lon) {
            (Some(label), Some(y), Some(x)) => Some(PickupLocation {
                label,
                position: Coord { x, y },
            }),
            _ => None,
        };
        Ok(FulfillmentRequest {
            id: parse_id("fulfillment_requests.id", &self.id)?,
            requester_id: self.requester_id,
            lane_id: self.lane_id,
            time_window: self.time_window,
            requirements: self.requirements,
            operator_id: self.operator_id,
            pickup_location,
            assigned_vehicle_id: self.assigned_vehicle_id,
            assigned_score: self.assigned_score,
            assigned_reasons,
            pickup_verified_at: optional_timestamp(
                "fulfillment_requests.pickup_verified_at",
                self.pickup_verified_at,
            )?,
            pickup_verified_by: self.pickup_verified_by,
            status: parse_label("fulfillment_requests.status", &self.status)?,
            created_at: timestamp("fulfillment_requests.created_at", self.created_at)?,
        })
    }
}

/// Columns of an `inbox_states` row before validation.
struct RawInbox {
    operator_id: String,
    request_id: String,
    state: String,
    note: Option<String>,
    updated_at: i64,
}

impl RawInbox {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            operator_id: row.get(0)?,
            request_id: row.get(1)?,
            state: row.get(2)?,
            note: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn decode(self) -> Result<InboxRecord, SqliteStoreError> {
        Ok(InboxRecord {
            request_id: parse_id("inbox_states.request_id", &self.request_id)?,
            state: parse_label("inbox_states.state", &self.state)?,
            updated_at: timestamp("inbox_states.updated_at", self.updated_at)?,
            operator_id: self.operator_id,
            note: self.note,
        })
    }
}

/// Columns of a `commitments` row before validation.
struct RawCommitment {
    id: String,
    requester_id: String,
    operator_id: String,
    lane_id: String,
    lock_mode: String,
    status: String,
    starts_at: i64,
    ends_at: i64,
    created_at: i64,
    cancelled_at: Option<i64>,
    cancel_reason: Option<String>,
}

impl RawCommitment {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            requester_id: row.get(1)?,
            operator_id: row.get(2)?,
            lane_id: row.get(3)?,
            lock_mode: row.get(4)?,
            status: row.get(5)?,
            starts_at: row.get(6)?,
            ends_at: row.get(7)?,
            created_at: row.get(8)?,
            cancelled_at: row.get(9)?,
            cancel_reason: row.get(10)?,
        })
    }

    fn decode(self) -> Result<Commitment, SqliteStoreError> {
        Ok(Commitment {
            id: parse_id("commitments.id", &self.id)?,
            lock_mode: parse_label("commitments.lock_mode", &self.lock_mode)?,
            status: parse_label("commitments.status", &self.status)?,
            starts_at: timestamp("commitments.starts_at", self.starts_at)?,
            ends_at: timestamp("commitments.ends_at", self.ends_at)?,
            created_at: timestamp("commitments.created_at", self.created_at)?,
            cancelled_at: optional_timestamp("commitments.cancelled_at", self.cancelled_at)?,
            requester_id: self.requester_id,
            operator_id: self.operator_id,
            lane_id: self.lane_id,
            cancel_reason: self.cancel_reason,
        })
    }
}
