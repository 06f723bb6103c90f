use std::fmt;

/// Why an item was finalized without a download. Every skip still counts as
/// processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoItemId,
    MetadataUnavailable { detail: String },
    EmptyResult,
    NoQualifyingVariant,
    NoMatchingOption,
    RetriesExhausted { attempts: u32 },
    DownloadFailed { detail: String },
    PageUnavailable { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoItemId => write!(f, "no item id in link"),
            SkipReason::MetadataUnavailable { detail } => {
                write!(f, "metadata lookup failed: {detail}")
            }
            SkipReason::EmptyResult => write!(f, "metadata lookup returned no hits"),
            SkipReason::NoQualifyingVariant => write!(f, "no qualifying asset variant"),
            SkipReason::NoMatchingOption => write!(f, "no matching resolution option"),
            SkipReason::RetriesExhausted { attempts } => {
                write!(f, "download flow failed after {attempts} attempts")
            }
            SkipReason::DownloadFailed { detail } => write!(f, "download failed: {detail}"),
            SkipReason::PageUnavailable { detail } => write!(f, "item page unavailable: {detail}"),
        }
    }
}
