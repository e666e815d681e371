//! Supervision of one sherlock process from spawn to terminal event.
//!
//! [`run`] yields the lazy event sequence for a single search: zero or more
//! progress events followed by exactly one terminal event, except on
//! cancellation where the stream simply ends. Every exit path — natural EOF,
//! timeout, cancellation, spawn failure, read failure, or the client
//! dropping the stream — removes the registry entry and reaps the process.

use std::io;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_stream::{StreamExt, wrappers::LinesStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::infra::app_state::AppState;
use crate::search::events::SearchEvent;
use crate::search::registry::RegistryGuard;
use crate::search::sherlock::{LineKind, classify_line};
use crate::search::validate_username;

/// How long a process gets to exit on its own after its output closes.
const EXIT_GRACE: Duration = Duration::from_secs(5);
/// How long a process gets after SIGTERM before it is killed outright.
const KILL_GRACE: Duration = Duration::from_secs(2);

pub const TOOL_MISSING_MESSAGE: &str =
    "Sherlock not found on the server. Set SHERLOCK_PATH or install sherlock-project.";
pub const TIMEOUT_MESSAGE: &str = "Search timed out.";

enum LoopEnd {
    Finished,
    Cancelled,
    TimedOut,
    StreamFailed(io::Error),
}

/// Run one search under supervision, yielding its event stream.
pub fn run(
    state: AppState,
    username: String,
    search_id: String,
) -> impl Stream<Item = SearchEvent> + Send + 'static {
    stream! {
        let username = username.trim().to_string();
        if let Err(reason) = validate_username(&username) {
            yield SearchEvent::error(reason);
            return;
        }

        let Some(tool) = state.sherlock.clone() else {
            error!("sherlock executable not found");
            yield SearchEvent::error(TOOL_MISSING_MESSAGE);
            return;
        };

        let mut child = match tool.command(&username, &state.config.scratch_dir).spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(%search_id, "failed to spawn sherlock: {err}");
                yield SearchEvent::error(format!("Error running sherlock: {err}"));
                return;
            }
        };

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                // Unreachable with piped stdio, but don't leave the process
                // running if it ever happens.
                let _ = child.start_kill();
                let _ = child.wait().await;
                yield SearchEvent::error("Error running sherlock: output pipes unavailable");
                return;
            }
        };

        let token = CancellationToken::new();
        state.registry.register(&search_id, token.clone());
        // Removes the entry on every exit path, including an early drop of
        // this stream by a disconnecting client. The child itself is
        // spawned with kill_on_drop for the same reason.
        let _registry_guard = RegistryGuard::new(state.registry.clone(), search_id.clone());

        let mut lines = merged_lines(stdout, stderr);
        let deadline = Instant::now() + state.config.search_timeout;
        let mut checked: u64 = 0;
        let mut hits: Vec<String> = Vec::new();

        let end = loop {
            // An external cancel request removes the registry entry; stop at
            // the next line boundary if we missed the token wakeup.
            if !state.registry.contains(&search_id) {
                break LoopEnd::Cancelled;
            }

            tokio::select! {
                _ = token.cancelled() => break LoopEnd::Cancelled,
                _ = sleep_until(deadline) => break LoopEnd::TimedOut,
                next = lines.next() => match next {
                    Some(Ok(line)) => {
                        let line = line.trim();
                        let Some(kind) = classify_line(line) else {
                            continue;
                        };
                        checked += 1;
                        if kind == LineKind::Hit {
                            hits.push(line.to_string());
                        }
                        yield SearchEvent::Progress {
                            result: line.to_string(),
                            checked,
                            total: state.config.total_sites,
                        };
                    }
                    Some(Err(err)) => break LoopEnd::StreamFailed(err),
                    None => break LoopEnd::Finished,
                }
            }
        };
        drop(lines);

        match end {
            LoopEnd::Cancelled => {
                info!(%search_id, "search cancelled, terminating sherlock");
                terminate(&mut child).await;
                // Cancellation ends the stream without further events.
            }
            LoopEnd::TimedOut => {
                warn!(
                    %search_id,
                    timeout_secs = state.config.search_timeout.as_secs(),
                    "search timed out"
                );
                terminate(&mut child).await;
                yield SearchEvent::error(TIMEOUT_MESSAGE);
            }
            LoopEnd::StreamFailed(err) => {
                error!(%search_id, "error reading sherlock output: {err}");
                terminate(&mut child).await;
                yield SearchEvent::error(format!("Error running sherlock: {err}"));
            }
            LoopEnd::Finished => {
                reap(&mut child, &search_id).await;

                let count = hits.len();
                let download = if hits.is_empty() {
                    None
                } else {
                    match state.store.write_results(&username, &hits).await {
                        Ok(filename) => Some(format!("/download/{filename}")),
                        Err(err) => {
                            // Degrade to a result-less completion rather
                            // than failing the whole search.
                            error!(%search_id, "failed to write results file: {err}");
                            None
                        }
                    }
                };
                yield SearchEvent::done(download, count);
            }
        }
    }
}

/// Line stream over stdout and stderr merged, the way the tool's own
/// terminal output interleaves them.
fn merged_lines(
    stdout: ChildStdout,
    stderr: ChildStderr,
) -> impl Stream<Item = io::Result<String>> + Unpin + Send {
    use tokio::io::AsyncBufReadExt;
    let stdout = LinesStream::new(BufReader::new(stdout).lines());
    let stderr = LinesStream::new(BufReader::new(stderr).lines());
    stdout.merge(stderr)
}

/// Wait out a process whose output has closed; escalate if it lingers.
async fn reap(child: &mut Child, search_id: &str) {
    match timeout(EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => info!(%search_id, code = ?status.code(), "sherlock finished"),
        Ok(Err(err)) => warn!(%search_id, "failed waiting for sherlock: {err}"),
        Err(_) => {
            warn!(%search_id, "sherlock still running after output closed, terminating");
            terminate(child).await;
        }
    }
}

/// Two-phase stop: graceful signal, short grace period, then a hard kill.
async fn terminate(child: &mut Child) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }

    request_stop(child);
    if timeout(KILL_GRACE, child.wait()).await.is_err() {
        if let Err(err) = child.start_kill() {
            warn!("failed to kill sherlock: {err}");
        }
        if let Err(err) = child.wait().await {
            warn!("failed reaping killed sherlock: {err}");
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!("failed to send SIGTERM to sherlock: {err}");
        }
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!("failed to kill sherlock: {err}");
    }
}
