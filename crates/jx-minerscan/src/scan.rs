// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::blocklist::{is_blocked_name, matches_blocked_cmdline};

/// One process observed on the host, as gathered by a platform adapter.
/// Gathering never implements policy — only [`scan`] does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub pgid: u32,
    pub comm: String,
    pub exe_path: Option<String>,
    pub cmdline: String,
}

/// Why a process matched the block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    BlockedName,
    BlockedCmdline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    pub pid: u32,
    pub comm: String,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub matches: Vec<ScanMatch>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Scan every record whose `pgid` equals `root_pgid` against the block
/// list, returning every match found. Order follows `records`.
pub fn scan(records: &[ProcessRecord], root_pgid: u32) -> ScanReport {
    let mut matches = Vec::new();
    for record in records.iter().filter(|r| r.pgid == root_pgid) {
        if is_blocked_name(&record.comm) {
            matches.push(ScanMatch {
                pid: record.pid,
                comm: record.comm.clone(),
                reason: MatchReason::BlockedName,
            });
            continue;
        }
        if matches_blocked_cmdline(&record.cmdline) {
            matches.push(ScanMatch {
                pid: record.pid,
                comm: record.comm.clone(),
                reason: MatchReason::BlockedCmdline,
            });
        }
    }
    for m in &matches {
        tracing::warn!(pid = m.pid, comm = %m.comm, reason = ?m.reason, "miner scanner match");
    }
    ScanReport { matches }
}
