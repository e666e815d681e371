//! Thin glue around the external sherlock executable: locating it on the
//! host and building the invocation. Everything interesting about the
//! process lifecycle lives in [`super::supervisor`].

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::warn;

/// Marker prefixes on recognized output lines.
pub const HIT_MARKER: &str = "[+]";
pub const MISS_MARKER: &str = "[-]";
pub const INCONCLUSIVE_MARKER: &str = "[!]";

/// Classification of one line of tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Hit,
    Miss,
    Inconclusive,
}

/// Classify a trimmed output line; `None` for banners, update notices and
/// other diagnostics that are not per-site results.
pub fn classify_line(line: &str) -> Option<LineKind> {
    if line.starts_with(HIT_MARKER) {
        Some(LineKind::Hit)
    } else if line.starts_with(MISS_MARKER) {
        Some(LineKind::Miss)
    } else if line.starts_with(INCONCLUSIVE_MARKER) {
        Some(LineKind::Inconclusive)
    } else {
        None
    }
}

/// Handle to a resolved sherlock executable.
#[derive(Debug, Clone)]
pub struct SherlockTool {
    path: PathBuf,
}

impl SherlockTool {
    pub fn from_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the executable once at startup: explicit override first, then
    /// `PATH`, then the usual install locations.
    pub fn resolve(override_path: Option<&Path>) -> Option<Self> {
        if let Some(path) = override_path {
            if path.is_file() {
                return Some(Self::from_path(path.to_path_buf()));
            }
            warn!(path = %path.display(), "SHERLOCK_PATH does not point at a file");
        }

        if let Some(path) = find_in_path("sherlock") {
            return Some(Self::from_path(path));
        }

        candidate_paths()
            .into_iter()
            .find(|candidate| candidate.is_file())
            .map(Self::from_path)
    }

    /// Build the scan invocation: unfiltered, uncolored line output, one
    /// line per checked site. Runs in the scratch directory so any files the
    /// tool drops stay out of the source tree, and is killed if its handle
    /// is dropped mid-stream.
    pub fn command(&self, username: &str, scratch_dir: &Path) -> Command {
        let mut command = Command::new(&self.path);
        command
            .arg(username)
            .arg("--print-all")
            .arg("--no-color")
            .current_dir(scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(".local/bin/sherlock"));
    }
    candidates.push(PathBuf::from("/usr/local/bin/sherlock"));
    candidates.push(PathBuf::from("/usr/bin/sherlock"));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_markers() {
        assert_eq!(classify_line("[+] GitHub: url"), Some(LineKind::Hit));
        assert_eq!(classify_line("[-] GitHub: url"), Some(LineKind::Miss));
        assert_eq!(
            classify_line("[!] GitHub: error"),
            Some(LineKind::Inconclusive)
        );
    }

    #[test]
    fn ignores_banners() {
        assert_eq!(classify_line("Checking username alice on:"), None);
        assert_eq!(classify_line("Update available!"), None);
        assert_eq!(classify_line(""), None);
    }

    #[test]
    fn resolve_rejects_missing_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("definitely-not-sherlock");
        // Falls through to PATH / well-known locations, which won't contain
        // sherlock inside the test sandbox either.
        let resolved = SherlockTool::resolve(Some(&bogus));
        if let Some(tool) = resolved {
            assert!(tool.path().is_file());
        }
    }

    #[test]
    fn resolve_accepts_existing_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sherlock");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        let tool = SherlockTool::resolve(Some(&path)).expect("override should resolve");
        assert_eq!(tool.path(), path);
    }
}
