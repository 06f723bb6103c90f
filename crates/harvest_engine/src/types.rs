use std::fmt;

use harvest_core::SkipReason;
use thiserror::Error;

use crate::page::PageError;
use crate::persist::PersistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub item_id: String,
    pub bytes: u64,
    /// Declared `Content-Length`, when the server sent one.
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Downloaded {
        item_id: String,
        file: String,
        bytes: Option<u64>,
    },
    Skipped {
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    PageLoaded {
        page: u32,
        links: usize,
        fresh: usize,
    },
    ItemStarted {
        url: String,
        item_id: Option<String>,
    },
    Progress(DownloadProgress),
    ItemFinished {
        url: String,
        outcome: ItemOutcome,
    },
    PageCompleted {
        page: u32,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: HarvestEvent) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    /// The item page could not be read.
    Page,
    Incomplete { expected: u64, actual: u64 },
    Io,
}

impl FailureKind {
    /// Failures worth retrying after a short pause.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::Network | FailureKind::Incomplete { .. }
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::Page => write!(f, "item page error"),
            FailureKind::Incomplete { expected, actual } => {
                write!(f, "incomplete body ({actual} of {expected} bytes)")
            }
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

/// Failures that end the whole run. Per-item problems never become one of
/// these.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("could not open listing page {page} ({url}): {source}")]
    Navigation {
        page: u32,
        url: String,
        #[source]
        source: PageError,
    },
    #[error("browser session failed: {0}")]
    Page(#[from] PageError),
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
}
