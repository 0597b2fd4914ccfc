// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform adapters that gather the process-record list fed to [`crate::scan`].
//! They only read process state — none of them apply the block list.

use crate::scan::ProcessRecord;

/// Reads `/proc/<pid>/{stat,cmdline,exe}` for every numeric entry under
/// `/proc`. Missing or unreadable entries (the process exited mid-scan,
/// or we lack permission) are skipped rather than treated as errors —
/// the scan operates on a best-effort snapshot.
#[cfg(target_os = "linux")]
pub fn gather_proc() -> Vec<ProcessRecord> {
    let mut records = Vec::new();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return records;
    };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        if let Some(record) = read_proc_entry(pid) {
            records.push(record);
        }
    }
    records
}

#[cfg(target_os = "linux")]
fn read_proc_entry(pid: u32) -> Option<ProcessRecord> {
    let dir = format!("/proc/{pid}");
    let stat = std::fs::read_to_string(format!("{dir}/stat")).ok()?;
    let (comm, pgid) = parse_stat(&stat)?;
    let cmdline_raw = std::fs::read(format!("{dir}/cmdline")).unwrap_or_default();
    let cmdline = cmdline_raw
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let exe_path = std::fs::read_link(format!("{dir}/exe"))
        .ok()
        .map(|p| p.to_string_lossy().into_owned());
    Some(ProcessRecord {
        pid,
        pgid,
        comm,
        exe_path,
        cmdline,
    })
}

/// `/proc/<pid>/stat` is `pid (comm) state ppid pgid ...` — `comm` may
/// itself contain spaces or parentheses, so split on the outermost
/// matching pair rather than whitespace.
#[cfg(target_os = "linux")]
fn parse_stat(stat: &str) -> Option<(String, u32)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let comm = stat[open + 1..close].to_string();
    let rest: Vec<&str> = stat[close + 1..].split_whitespace().collect();
    // rest[0] = state, rest[1] = ppid, rest[2] = pgid
    let pgid = rest.get(2)?.parse().ok()?;
    Some((comm, pgid))
}

/// Fallback for platforms without `/proc` (Darwin, Windows): shells out to
/// `ps` with a BSD-style format string giving pid, pgid, and the full
/// command line, which every `ps` implementation this agent targets
/// supports.
pub fn gather_ps() -> Vec<ProcessRecord> {
    let output = match std::process::Command::new("ps")
        .args(["-axo", "pid=,pgid=,comm=,command="])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return Vec::new(),
    };
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines().filter_map(parse_ps_line).collect()
}

fn parse_ps_line(line: &str) -> Option<ProcessRecord> {
    let mut parts = line.trim().splitn(4, char::is_whitespace);
    let pid = parts.next()?.parse().ok()?;
    let pgid = parts.next()?.parse().ok()?;
    let comm = parts.next()?.to_string();
    let cmdline = parts.next().unwrap_or_default().trim().to_string();
    Some(ProcessRecord {
        pid,
        pgid,
        comm,
        exe_path: None,
        cmdline,
    })
}

/// Picks the best adapter for the current platform.
pub fn gather() -> Vec<ProcessRecord> {
    #[cfg(target_os = "linux")]
    {
        gather_proc()
    }
    #[cfg(not(target_os = "linux"))]
    {
        gather_ps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ps_line_splits_four_fields() {
        let record = parse_ps_line("5002 1234 xmrig /usr/bin/xmrig -o stratum+tcp://pool.com:3333").unwrap();
        assert_eq!(record.pid, 5002);
        assert_eq!(record.pgid, 1234);
        assert_eq!(record.comm, "xmrig");
        assert_eq!(record.cmdline, "/usr/bin/xmrig -o stratum+tcp://pool.com:3333");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn parse_stat_handles_parens_in_comm() {
        let (comm, pgid) = parse_stat("123 (my (weird) proc) S 1 1234 1234 0 -1 0").unwrap();
        assert_eq!(comm, "my (weird) proc");
        assert_eq!(pgid, 1234);
    }
}
