// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interpreter detection for `Shell::run_script`: shebang first, then
//! platform-appropriate fallbacks.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpreter {
    /// Run the script directly (it has an executable bit and a shebang,
    /// or the platform can execute it by extension alone).
    Direct,
    /// Run `program` with the script path as its sole argument.
    Via { program: PathBuf },
}

/// Inspects `path` for a `#!` shebang line, falling back to a
/// platform-appropriate interpreter by file extension.
pub fn detect(path: &Path) -> Interpreter {
    if let Some(shebang) = read_shebang(path) {
        return Interpreter::Via { program: shebang };
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    if cfg!(windows) {
        match ext.as_str() {
            "ps1" => Interpreter::Via { program: PathBuf::from("powershell.exe") },
            "bat" | "cmd" => Interpreter::Direct,
            "sh" => Interpreter::Via { program: PathBuf::from("bash.exe") },
            _ => Interpreter::Direct,
        }
    } else {
        // No shebang on POSIX: bash, falling back to sh with a warning.
        match which_shell() {
            Some(bash) => Interpreter::Via { program: bash },
            None => {
                tracing::warn!("bash not found on PATH, falling back to sh");
                Interpreter::Via { program: PathBuf::from("/bin/sh") }
            }
        }
    }
}

fn which_shell() -> Option<PathBuf> {
    for candidate in ["/bin/bash", "/usr/bin/bash", "/usr/local/bin/bash"] {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

fn read_shebang(path: &Path) -> Option<PathBuf> {
    let contents = std::fs::read(path).ok()?;
    if !contents.starts_with(b"#!") {
        return None;
    }
    let line_end = contents.iter().position(|&b| b == b'\n').unwrap_or(contents.len());
    let line = std::str::from_utf8(&contents[2..line_end]).ok()?.trim();
    let program = line.split_whitespace().next()?;
    Some(PathBuf::from(program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_shebang_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hook");
        std::fs::write(&script, "#!/usr/bin/env python3\nprint('hi')\n").unwrap();
        assert_eq!(
            detect(&script),
            Interpreter::Via { program: PathBuf::from("/usr/bin/env") }
        );
    }

    #[test]
    fn no_shebang_falls_back_to_a_posix_shell() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hook.sh");
        std::fs::write(&script, "echo hi\n").unwrap();
        let interpreter = detect(&script);
        assert!(matches!(interpreter, Interpreter::Via { .. }));
    }
}
