//! End-to-end command tests against a temporary SQLite store.

use super::helpers::{LANE, Workspace, field};
use super::*;
use rstest::{fixture, rstest};

#[fixture]
fn imported() -> Workspace {
    let workspace = Workspace::new();
    let snapshot = workspace.write_snapshot(2);
    let summary = workspace.json(&["import", snapshot.as_str()]);
    assert_eq!(summary.get("vehicles").and_then(serde_json::Value::as_u64), Some(2));
    workspace
}

#[rstest]
fn import_creates_the_database_directory(imported: Workspace) {
    assert!(imported.db().is_file());
}

#[rstest]
fn recommend_prints_the_lane_and_a_vehicle(imported: Workspace) {
    let recommendation = imported.json(&["recommend", "--lane", LANE, "--limit", "2"]);
    let lane = recommendation.get("lane").expect("lane anchor");
    assert_eq!(field(lane, "lane_id"), LANE);
    let recommended = recommendation.get("recommended").expect("recommended vehicle");
    assert!(recommended.is_object());
    let alternatives = recommendation
        .get("alternatives")
        .and_then(serde_json::Value::as_array)
        .expect("alternatives array");
    assert_eq!(alternatives.len(), 1);
}

#[rstest]
fn request_accept_and_pickup_round_trip(imported: Workspace) {
    let request = imported.json(&["request", "--rider", "rider-1", "--lane", LANE]);
    let id = field(&request, "id").to_owned();

    let accepted = imported.json(&["accept", &id]);
    assert_eq!(field(&accepted, "state"), "ONBOARDED");
    assert!(field(&accepted, "matched_vehicle_registration").starts_with("MH12CD"));

    let code = imported.json(&["pickup-code", &id]);
    let short_code = field(&code, "short_code").to_owned();
    assert!(field(&code, "qr_payload").starts_with("HANDOVER|REQ:"));

    let verified = imported.json(&["verify-pickup", &id, "--code", &short_code]);
    assert_eq!(field(&verified, "request_id"), id);

    let access = imported.json(&["access", "--rider", "rider-1"]);
    assert_eq!(access.get("allowed"), Some(&serde_json::Value::Bool(false)));
}

#[rstest]
fn list_inbox_shows_one_request_or_all(imported: Workspace) {
    let request = imported.json(&["request", "--rider", "rider-2", "--lane", LANE]);
    let id = field(&request, "id").to_owned();
    imported.json(&[
        "inbox", &id, "--operator", "fleet", "--state", "CONTACTED", "--note", "called",
    ]);

    let listing = imported.json(&["list-inbox", "--operator", "fleet"]);
    let rows = listing.as_array().expect("inbox rows");
    assert_eq!(rows.len(), 1);

    let detail = imported.json(&["list-inbox", "--operator", "fleet", "--request", &id]);
    assert_eq!(field(&detail, "state"), "CONTACTED");
    assert_eq!(field(&detail, "note"), "called");
}

#[rstest]
fn commitments_can_be_created_and_cancelled(imported: Workspace) {
    let commitment = imported.json(&[
        "commit",
        "--rider",
        "rider-2",
        "--operator",
        "fleet",
        "--lane",
        LANE,
        "--min-days",
        "3",
        "--lock-mode",
        "RESTRICT_TO_LANE",
    ]);
    let id = field(&commitment, "id").to_owned();
    let access = imported.json(&["access", "--rider", "rider-2"]);
    assert_eq!(field(&access, "allowed_lane_id"), LANE);

    let cancelled = imported.json(&["cancel-commitment", &id, "--reason", "moved"]);
    assert_eq!(field(&cancelled, "status"), "CANCELLED");
    assert_eq!(field(&cancelled, "cancel_reason"), "moved");
}

#[rstest]
fn availability_lists_the_operator(imported: Workspace) {
    let summary = imported.json(&["availability", "--lane", LANE]);
    let operators = summary
        .get("operators")
        .and_then(serde_json::Value::as_array)
        .expect("operators array");
    let fleet = operators.first().expect("one operator");
    assert_eq!(field(fleet, "operator_id"), "fleet");
    assert_eq!(
        fleet.get("available_vehicles").and_then(serde_json::Value::as_u64),
        Some(2)
    );
}

#[rstest]
fn service_errors_surface_as_dispatch_errors(imported: Workspace) {
    let (result, output) = imported.run(&["accept", "req-01JQ0000000000000000000000"]);
    assert!(output.is_empty());
    match result {
        Err(CliError::Dispatch(handover_dispatch::DispatchError::NotFound { entity, .. })) => {
            assert_eq!(entity, "request");
        }
        other => panic!("expected NotFound, found {other:?}"),
    }
}

#[rstest]
fn invalid_request_ids_fail_argument_parsing(imported: Workspace) {
    let (result, _) = imported.run(&["accept", "not-an-id"]);
    assert!(matches!(result, Err(CliError::ArgumentParsing(_))));
}

#[rstest]
#[case::recommend(&["recommend", "--lane", LANE, "--max-km", "60"])]
#[case::availability(&["availability", "--lane", LANE, "--max-km", "0.1"])]
fn out_of_range_radii_are_refused(imported: Workspace, #[case] args: &[&str]) {
    let (result, output) = imported.run(args);
    assert!(output.is_empty());
    assert!(matches!(
        result,
        Err(CliError::Dispatch(handover_dispatch::DispatchError::Validation(
            handover_dispatch::ValidationKind::MeasureOutOfRange { field: "max_km", .. }
        )))
    ));
}
