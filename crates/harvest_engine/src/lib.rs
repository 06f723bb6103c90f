//! Harvest engine: browser-driven listing walk, metadata resolution, asset
//! downloads and the on-disk run state.
mod download;
mod fetch;
mod orchestrator;
mod page;
mod persist;
mod poll;
mod record;
mod resolver;
mod retry;
mod scrape;
mod store;
mod types;
mod walker;

pub use download::{DownloadManager, DownloadReport, DownloadSettings, DownloadTask, CHUNK_SIZE};
pub use fetch::FetchSettings;
pub use orchestrator::{Clock, HarvestOrchestrator, HarvestSettings, RunSummary, StopReason};
pub use page::{wait_for, Locator, PageController, PageError};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use poll::{poll_until, PollOutcome, PollSpec, Poller, Probe};
pub use record::{ItemRecord, MetadataLog, METADATA_LOG_FILENAME};
pub use resolver::{
    select_asset, AssetSource, HttpMetadataSource, ItemResolver, MetadataSource, ResolveOutcome,
    ResolvedItem, ResolverSettings, SelectedAsset,
};
pub use retry::{FlowResult, RetryController, RetrySettings};
pub use scrape::{PageMetadataSource, ScrapeSettings};
pub use store::{ProgressStore, PROGRESS_FILENAME};
pub use types::{
    DownloadProgress, FailureKind, FetchError, HarvestError, HarvestEvent, ItemOutcome, NullSink,
    ProgressSink,
};
pub use walker::{
    PageCursor, PageResult, PaginationWalker, WalkerSettings, HEIGHT_SCRIPT, SCROLL_SCRIPT,
};
