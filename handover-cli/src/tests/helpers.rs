//! Test helpers for running the CLI against a temporary store.

use super::*;
use camino::Utf8PathBuf;
use chrono::{Duration, Utc};
use handover_core::{
    FleetSnapshot, LaneAnchorResolver, OperatorRecord, Requester, VehicleRecord, VehicleStatus,
};
use tempfile::TempDir;

pub(super) const LANE: &str = "store:PUNE:WAKAD";
pub(super) const SECRET: &str = "cli-secret";

/// Temporary directory holding the database and snapshot files.
#[derive(Debug)]
pub(super) struct Workspace {
    _tmp: TempDir,
    pub(super) root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self { _tmp: tmp, root }
    }

    /// Database path below a directory that does not exist yet.
    pub(super) fn db(&self) -> Utf8PathBuf {
        self.root.join("state/handover.db")
    }

    /// Write a snapshot with one operator, two riders and `vehicles` active
    /// vehicles next to [`LANE`].
    pub(super) fn write_snapshot(&self, vehicles: usize) -> Utf8PathBuf {
        let now = Utc::now();
        let anchor = LaneAnchorResolver::default().resolve(LANE, None).position;
        let snapshot = FleetSnapshot {
            operators: vec![OperatorRecord {
                id: "fleet".into(),
                name: "Fleet".into(),
                hubs: Vec::new(),
            }],
            requesters: ["rider-1", "rider-2"]
                .into_iter()
                .map(|id| Requester {
                    id: id.into(),
                    display_name: Some(id.to_uppercase()),
                    phone: None,
                })
                .collect(),
            vehicles: (1..=vehicles)
                .map(|n| VehicleRecord {
                    id: format!("v{n}"),
                    operator_id: "fleet".into(),
                    registration_number: format!("mh12cd{n:04}"),
                    status: VehicleStatus::Active,
                    lat: Some(anchor.y + 0.001),
                    lon: Some(anchor.x + 0.001),
                    battery_pct: Some(75.0),
                    telemetry_at: Some(now - Duration::minutes(3)),
                    created_at: now - Duration::days(10),
                })
                .collect(),
        };
        let path = self.root.join("fleet.json");
        let json = serde_json::to_string(&snapshot).expect("serialise snapshot");
        write_utf8(&path, json.as_bytes());
        path
    }

    /// Run the CLI with the store flags prepended.
    pub(super) fn run(&self, args: &[&str]) -> (Result<(), CliError>, String) {
        let db = self.db();
        let mut argv = vec![
            "handover".to_owned(),
            "--db".to_owned(),
            db.as_str().to_owned(),
            "--pickup-secret".to_owned(),
            SECRET.to_owned(),
        ];
        argv.extend(args.iter().map(|arg| (*arg).to_owned()));
        let mut stdout = Vec::new();
        let result = run_with(argv, &mut stdout);
        let output = String::from_utf8(stdout).expect("utf-8 output");
        (result, output)
    }

    /// Run the CLI, expecting success, and parse its JSON output.
    pub(super) fn json(&self, args: &[&str]) -> serde_json::Value {
        let (result, output) = self.run(args);
        if let Err(err) = result {
            panic!("command {args:?} failed: {err}");
        }
        serde_json::from_str(&output).expect("command prints JSON")
    }
}

pub(super) fn write_utf8(path: &camino::Utf8Path, contents: &[u8]) {
    std::fs::write(path.as_std_path(), contents).expect("write file");
}

pub(super) fn field<'a>(value: &'a serde_json::Value, name: &str) -> &'a str {
    value
        .get(name)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_else(|| panic!("field {name} should be a string in {value}"))
}
