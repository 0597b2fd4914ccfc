// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::OnceLock;

use regex::RegexSet;

/// Known-bad process names, matched exactly (case-insensitive, after
/// stripping a trailing `.exe`) — never a substring match, so a script
/// named `run-ethminer-report.sh` does not false-positive.
const BLOCKED_NAMES: &[&str] = &["xmrig", "nbminer", "ethminer", "t-rex", "phoenixminer"];

/// cmdline patterns: stratum URIs, known pool hostnames, wallet flags,
/// mining algorithm names.
const BLOCKED_CMDLINE_PATTERNS: &[&str] = &[
    r"(?i)stratum\+(tcp|ssl|udp)://",
    r"(?i)\b(pool\.|us1\.|eu1\.|asia1\.)?(minexmr|supportxmr|nanopool|ethermine|f2pool|poolbinance)\.(com|org|net)\b",
    r"(?i)--?(wallet|wallet-address|user)[= ][a-zA-Z0-9]{20,}",
    r"(?i)\b(randomx|ethash|kawpow|cryptonight|rx/0|autolykos2)\b",
];

fn cmdline_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(BLOCKED_CMDLINE_PATTERNS).expect("block list patterns are valid regexes")
    })
}

/// True if `comm` (a process name, possibly with a trailing `.exe`) is an
/// exact, case-insensitive match against the block list.
pub fn is_blocked_name(comm: &str) -> bool {
    let stripped = comm.strip_suffix(".exe").or_else(|| comm.strip_suffix(".EXE")).unwrap_or(comm);
    BLOCKED_NAMES.iter().any(|b| b.eq_ignore_ascii_case(stripped))
}

/// True if `cmdline` matches any known-bad pattern.
pub fn matches_blocked_cmdline(cmdline: &str) -> bool {
    cmdline_patterns().is_match(cmdline)
}
