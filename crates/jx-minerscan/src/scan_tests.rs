// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn record(pid: u32, pgid: u32, comm: &str, cmdline: &str) -> ProcessRecord {
    ProcessRecord {
        pid,
        pgid,
        comm: comm.to_string(),
        exe_path: None,
        cmdline: cmdline.to_string(),
    }
}

#[test]
fn seed_scenario_miner_detection() {
    let records = vec![
        record(5001, 1234, "bash", "/bin/bash script.sh"),
        record(
            5002,
            1234,
            "xmrig",
            "/usr/bin/xmrig -o stratum+tcp://pool.com:3333",
        ),
        record(6001, 9999, "node", "node server.js"),
    ];

    let report = scan(&records, 1234);

    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].pid, 5002);
    assert_eq!(report.matches[0].comm, "xmrig");
}

#[test]
fn clean_process_group_reports_no_matches() {
    let records = vec![record(100, 1, "bash", "/bin/bash build.sh")];
    let report = scan(&records, 1);
    assert!(report.is_clean());
}

#[test]
fn processes_outside_the_root_pgid_are_ignored() {
    let records = vec![record(5002, 9999, "xmrig", "/usr/bin/xmrig")];
    let report = scan(&records, 1234);
    assert!(report.is_clean());
}

#[test]
fn benign_name_containing_banned_substring_does_not_match() {
    let records = vec![record(
        7000,
        1234,
        "run-ethminer-report.sh",
        "/bin/bash run-ethminer-report.sh",
    )];
    let report = scan(&records, 1234);
    assert!(report.is_clean());
}

#[test]
fn cmdline_pattern_match_is_reported_with_its_own_reason() {
    let records = vec![record(
        8000,
        1234,
        "custom-miner-bin",
        "./custom-miner-bin --pool stratum+ssl://eu1.ethermine.org:5555",
    )];
    let report = scan(&records, 1234);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].reason, MatchReason::BlockedCmdline);
}
