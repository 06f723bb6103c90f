//! Harvest core: pure run state, selection policies and the download-flow
//! state machine. No IO lives here.
mod dedup;
mod flow;
mod item;
mod media;
mod progress;
mod scrape;
mod skip;
mod variant;

pub use dedup::DeduplicationIndex;
pub use flow::{DownloadFlow, FlowEvent, FlowState};
pub use item::{derive_item_id, output_filename, slug_words};
pub use media::{Delivery, InteractiveFlow, MediaKind, MediaPolicy, MetadataPlan};
pub use progress::ProgressState;
pub use scrape::{FieldCapture, PageScrape, ScrapedField};
pub use skip::SkipReason;
pub use variant::{select_best_available, select_tiered, AssetVariant, Resolution, VariantRule};
