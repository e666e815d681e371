//! One-time download of result files.

use std::io;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::Stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;
use crate::results::store::ResultStore;

const CHUNK_SIZE: usize = 8192;

/// `GET /download/{filename}` — stream a result file and delete it.
///
/// The filename is validated against the generation pattern before the
/// filesystem is consulted at all, so traversal input is a 400 regardless
/// of what exists on disk. The file is removed once the body has been
/// streamed (or abandoned), making each result retrievable at most once.
pub async fn download_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    if !ResultStore::is_valid_filename(&filename) {
        return Err(AppError::bad_request("invalid filename"));
    }

    let path = state.store.path_for(&filename);
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::not_found("file not found"));
        }
        Err(err) => {
            warn!(path = %path.display(), "failed to open result file: {err}");
            return Err(AppError::internal("failed to open result file"));
        }
    };

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|err| AppError::internal(format!("invalid disposition header: {err}")))?;

    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        ),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    let body = Body::from_stream(read_then_delete(file, path));
    Ok((headers, body).into_response())
}

/// Stream the file in fixed-size chunks; delete it when the stream ends or
/// is dropped mid-read.
fn read_then_delete(file: File, path: PathBuf) -> impl Stream<Item = io::Result<Bytes>> + Send {
    async_stream::stream! {
        let _cleanup = DeleteOnDrop { path };
        let mut file = file;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok(Bytes::copy_from_slice(&buf[..n])),
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
    }
}

struct DeleteOnDrop {
    path: PathBuf,
}

impl Drop for DeleteOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "deleted result file after download"),
            // Lost a race against the reaper; the file is gone either way.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), "failed to delete result file: {err}");
            }
        }
    }
}
