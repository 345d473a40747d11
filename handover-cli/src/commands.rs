//! Subcommand arguments and their execution against a service.

use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand};
use geo::Coord;
use handover_core::{
    AccessAction, Clock, CommitmentId, FleetSnapshot, InboxState, LockMode, MatchConstraints,
    RequestId,
};
use handover_dispatch::{CommitmentRequest, HandoverService, NewRequest, RecommendQuery};
use serde::Serialize;

use crate::CliError;

pub(crate) const ARG_SNAPSHOT: &str = "snapshot";

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Upsert operators, riders and vehicles from a JSON fleet snapshot.
    Import(ImportArgs),
    /// Rank vehicles for a lane.
    Recommend(RecommendArgs),
    /// Open a fulfilment request for a rider.
    Request(RequestArgs),
    /// Accept a request and bind a vehicle to it.
    Accept(AcceptArgs),
    /// Move a request to another inbox state.
    Inbox(InboxArgs),
    /// List an operator's requests, or show one of them.
    ListInbox(ListInboxArgs),
    /// Decide whether a rider may perform an action.
    Access(AccessArgs),
    /// Commit a rider to an operator for a number of days.
    Commit(CommitArgs),
    /// Cancel a rider commitment.
    CancelCommitment(CancelCommitmentArgs),
    /// Print the QR payload and short code for an onboarded request.
    PickupCode(RequestIdArg),
    /// Check a pickup code and record the handover.
    VerifyPickup(VerifyPickupArgs),
    /// Summarise each operator's supply around a lane.
    Availability(AvailabilityArgs),
}

/// Optional requester coordinates.
#[derive(Debug, Clone, Copy, Default, Args)]
pub(crate) struct PositionArgs {
    /// Requester latitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) lat: Option<f64>,
    /// Requester longitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) lon: Option<f64>,
}

impl PositionArgs {
    pub(crate) const fn coord(self) -> Result<Option<Coord<f64>>, CliError> {
        match (self.lat, self.lon) {
            (Some(y), Some(x)) => Ok(Some(Coord { x, y })),
            (None, None) => Ok(None),
            _ => Err(CliError::PartialPosition),
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct ImportArgs {
    /// Path to the fleet snapshot JSON.
    #[arg(value_name = "path")]
    pub(crate) snapshot: Utf8PathBuf,
}

#[derive(Debug, Args)]
pub(crate) struct RecommendArgs {
    /// Lane identifier, e.g. `store:PUNE:WAKAD`.
    #[arg(long)]
    pub(crate) lane: String,
    #[command(flatten)]
    pub(crate) position: PositionArgs,
    /// Furthest acceptable distance from the lane anchor, in km.
    #[arg(long, default_value_t = 8.0)]
    pub(crate) max_km: f64,
    /// Lowest acceptable battery level, in percent.
    #[arg(long, default_value_t = 20.0)]
    pub(crate) min_battery: f64,
    /// Oldest acceptable telemetry, in minutes.
    #[arg(long, default_value_t = 120.0)]
    pub(crate) max_telemetry_age: f64,
    /// Vehicles to return, including the recommendation.
    #[arg(long, default_value_t = 6)]
    pub(crate) limit: usize,
}

#[derive(Debug, Args)]
pub(crate) struct RequestArgs {
    /// Rider opening the request.
    #[arg(long)]
    pub(crate) rider: String,
    /// Lane the rider wants to work on.
    #[arg(long)]
    pub(crate) lane: String,
    /// Free-text availability window.
    #[arg(long)]
    pub(crate) time_window: Option<String>,
    /// Free-text vehicle requirements.
    #[arg(long)]
    pub(crate) requirements: Option<String>,
    /// Route to this operator instead of the recommended one.
    #[arg(long)]
    pub(crate) operator: Option<String>,
    #[command(flatten)]
    pub(crate) position: PositionArgs,
}

#[derive(Debug, Args)]
pub(crate) struct RequestIdArg {
    /// Request identifier.
    #[arg(value_name = "request")]
    pub(crate) request: RequestId,
}

#[derive(Debug, Args)]
pub(crate) struct AcceptArgs {
    /// Request identifier.
    #[arg(value_name = "request")]
    pub(crate) request: RequestId,
    /// Inbox note; defaults to the assigned registration.
    #[arg(long)]
    pub(crate) note: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct InboxArgs {
    /// Operator acting on the request.
    #[arg(long)]
    pub(crate) operator: String,
    /// Request identifier.
    #[arg(value_name = "request")]
    pub(crate) request: RequestId,
    /// Target state: NEW, CONTACTED, ONBOARDED or REJECTED.
    #[arg(long)]
    pub(crate) state: InboxState,
    /// Inbox note.
    #[arg(long)]
    pub(crate) note: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ListInboxArgs {
    /// Operator whose inbox is listed.
    #[arg(long)]
    pub(crate) operator: String,
    /// Show only this request.
    #[arg(long)]
    pub(crate) request: Option<RequestId>,
    /// Most rows to list.
    #[arg(long, default_value_t = 50)]
    pub(crate) limit: usize,
}

#[derive(Debug, Args)]
pub(crate) struct AccessArgs {
    /// Rider to check.
    #[arg(long)]
    pub(crate) rider: String,
    /// Action name, e.g. `VIEW_DEMAND`.
    #[arg(long, default_value = "VIEW_DEMAND")]
    pub(crate) action: String,
}

#[derive(Debug, Args)]
pub(crate) struct CommitArgs {
    /// Rider making the commitment.
    #[arg(long)]
    pub(crate) rider: String,
    /// Operator the rider commits to.
    #[arg(long)]
    pub(crate) operator: String,
    /// Lane of the commitment.
    #[arg(long)]
    pub(crate) lane: String,
    /// Commitment length, 1 to 30 days.
    #[arg(long)]
    pub(crate) min_days: i64,
    /// HIDE_ALL_DEMAND or RESTRICT_TO_LANE.
    #[arg(long, default_value = "HIDE_ALL_DEMAND")]
    pub(crate) lock_mode: LockMode,
}

#[derive(Debug, Args)]
pub(crate) struct CancelCommitmentArgs {
    /// Commitment identifier.
    #[arg(value_name = "commitment")]
    pub(crate) commitment: CommitmentId,
    /// Cancellation reason.
    #[arg(long)]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct VerifyPickupArgs {
    /// Request identifier.
    #[arg(value_name = "request")]
    pub(crate) request: RequestId,
    /// Short code or full QR payload shown by the rider.
    #[arg(long)]
    pub(crate) code: String,
    /// Staff member confirming the handover.
    #[arg(long)]
    pub(crate) verified_by: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct AvailabilityArgs {
    /// Lane identifier.
    #[arg(long)]
    pub(crate) lane: String,
    #[command(flatten)]
    pub(crate) position: PositionArgs,
    /// Radius for the nearest-vehicle list, in km.
    #[arg(long, default_value_t = 20.0)]
    pub(crate) max_km: f64,
}

/// Run `command` and print its result as pretty JSON.
pub(crate) fn execute<C: Clock>(
    service: &HandoverService<C>,
    command: Command,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Command::Import(args) => {
            let snapshot = load_snapshot(&args.snapshot)?;
            write_json(writer, &service.import_fleet(&snapshot)?)
        }
        Command::Recommend(args) => {
            let query = RecommendQuery {
                lane_id: args.lane,
                requester_position: args.position.coord()?,
                constraints: MatchConstraints::new(
                    args.max_km,
                    args.min_battery,
                    args.max_telemetry_age,
                ),
                limit: args.limit,
            };
            write_json(writer, &service.recommend(&query)?)
        }
        Command::Request(args) => {
            let request = NewRequest {
                requester_id: args.rider,
                lane_id: args.lane,
                time_window: args.time_window,
                requirements: args.requirements,
                requester_position: args.position.coord()?,
                operator_id: args.operator,
            };
            write_json(writer, &service.create_request(&request)?)
        }
        Command::Accept(args) => write_json(
            writer,
            &service.accept(&args.request, args.note.as_deref())?,
        ),
        Command::Inbox(args) => write_json(
            writer,
            &service.set_inbox_state(
                &args.operator,
                &args.request,
                args.state,
                args.note.as_deref(),
            )?,
        ),
        Command::ListInbox(args) => match args.request {
            Some(request) => write_json(writer, &service.inbox_detail(&args.operator, &request)?),
            None => write_json(writer, &service.list_inbox(&args.operator, args.limit)?),
        },
        Command::Access(args) => write_json(
            writer,
            &service.check_access(&args.rider, &AccessAction::parse(&args.action))?,
        ),
        Command::Commit(args) => {
            let request = CommitmentRequest {
                requester_id: args.rider,
                operator_id: args.operator,
                lane_id: args.lane,
                min_days: args.min_days,
                lock_mode: args.lock_mode,
            };
            write_json(writer, &service.create_commitment(&request)?)
        }
        Command::CancelCommitment(args) => write_json(
            writer,
            &service.cancel_commitment(&args.commitment, args.reason.as_deref())?,
        ),
        Command::PickupCode(args) => write_json(writer, &service.pickup_payload(&args.request)?),
        Command::VerifyPickup(args) => write_json(
            writer,
            &service.verify_pickup(&args.request, &args.code, args.verified_by.as_deref())?,
        ),
        Command::Availability(args) => write_json(
            writer,
            &service.availability(&args.lane, args.position.coord()?, args.max_km)?,
        ),
    }
}

/// Load a JSON-encoded [`FleetSnapshot`] from disk.
pub(crate) fn load_snapshot(path: &Utf8Path) -> Result<FleetSnapshot, CliError> {
    require_file(path)?;
    let file = handover_fs::open_utf8_file(path).map_err(|source| CliError::OpenSnapshot {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseSnapshot {
        path: path.to_path_buf(),
        source,
    })
}

fn require_file(path: &Utf8Path) -> Result<(), CliError> {
    match handover_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field: ARG_SNAPSHOT,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field: ARG_SNAPSHOT,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field: ARG_SNAPSHOT,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json<T: Serialize + ?Sized>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)
}
