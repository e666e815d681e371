use serde::{Deserialize, Serialize};

/// Messages relayed to the client over the search event stream.
///
/// Serialized untagged so the wire shapes stay flat: `{"search_id": ...}`,
/// `{"result": ..., "checked": ..., "total": ...}`, `{"message": "done",
/// "download": ..., "count": ...}` and `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchEvent {
    /// First event on every stream; the id the client needs for cancellation.
    Opened { search_id: String },
    /// One recognized output line from the tool.
    Progress {
        result: String,
        checked: u64,
        total: u64,
    },
    /// Terminal success. `download` is absent when no site matched.
    Done {
        message: String,
        download: Option<String>,
        count: usize,
    },
    /// Terminal failure, including validation errors and timeouts.
    Error { error: String },
}

impl SearchEvent {
    pub fn opened(search_id: impl Into<String>) -> Self {
        Self::Opened {
            search_id: search_id.into(),
        }
    }

    pub fn done(download: Option<String>, count: usize) -> Self {
        Self::Done {
            message: "done".to_string(),
            download,
            count,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}
