//! Tests for the status transition table.

use chrono::Duration;
use ticketd::config::Config;
use ticketd::model::Status;
use ticketd::transitions::TransitionTable;

#[test]
fn progression_is_a_straight_line_to_done() {
    let table = TransitionTable::default();

    assert_eq!(table.next_status(Status::Open), Some(Status::InProgress));
    assert_eq!(table.next_status(Status::InProgress), Some(Status::Review));
    assert_eq!(table.next_status(Status::Review), Some(Status::Testing));
    assert_eq!(table.next_status(Status::Testing), Some(Status::Done));
}

#[test]
fn terminal_status_has_no_outgoing_transition() {
    let table = TransitionTable::default();
    assert_eq!(table.next_status(Status::Done), None);
}

#[test]
fn default_dwell_times_match_documented_values() {
    let table = TransitionTable::default();

    assert_eq!(table.min_dwell(Status::Open), Duration::minutes(2));
    assert_eq!(table.min_dwell(Status::InProgress), Duration::minutes(1));
    assert_eq!(table.min_dwell(Status::Review), Duration::minutes(3));
    assert_eq!(table.min_dwell(Status::Testing), Duration::minutes(2));
}

#[test]
fn dwell_times_come_from_config() {
    let config = Config::from_lookup(|name| match name {
        "OPEN_TO_INPROGRESS_MINUTES" => Some("10".to_string()),
        "TESTING_TO_DONE_MINUTES" => Some("7".to_string()),
        _ => None,
    });
    let table = TransitionTable::from_config(&config);

    assert_eq!(table.min_dwell(Status::Open), Duration::minutes(10));
    assert_eq!(table.min_dwell(Status::Testing), Duration::minutes(7));
    // Unconfigured states keep their defaults
    assert_eq!(table.min_dwell(Status::InProgress), Duration::minutes(1));
    assert_eq!(table.min_dwell(Status::Review), Duration::minutes(3));
}

#[test]
fn every_status_is_covered() {
    let table = TransitionTable::default();

    for status in Status::ALL {
        // Total function: exactly the terminal status maps to None
        assert_eq!(table.next_status(status).is_none(), status.is_terminal());
    }
}
