use crate::{PageScrape, VariantRule};

const LISTING_LINK_SELECTOR: &str = "a.link--WHWzm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photos,
    Videos,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photos => "photos",
            MediaKind::Videos => "videos",
            MediaKind::Audio => "audio",
        }
    }
}

/// Selectors and markers for downloads that are produced by clicking through
/// the item page rather than by streaming a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveFlow {
    /// Control that opens the resolution menu, when the page has one.
    pub trigger_selector: Option<String>,
    /// One element per resolution choice.
    pub option_selector: String,
    /// Attribute on each option that identifies its file.
    pub option_value_attribute: String,
    /// Substring of the identifying value that marks the wanted quality.
    pub quality_marker: String,
    /// Confirmation control some flows show after an option is picked.
    pub confirm_selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Direct(VariantRule),
    Interactive(InteractiveFlow),
}

/// Where an item's metadata comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataPlan {
    /// `GET <endpoint>?key=..&id=..`, answered with a `hits` array.
    Api { endpoint: String },
    /// Read off the item page itself.
    Page(PageScrape),
}

/// Everything that differs between media kinds. One orchestrator runs any of
/// these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPolicy {
    pub name: String,
    pub kind: MediaKind,
    /// Listing address with a `{page}` placeholder.
    pub listing_url_template: String,
    pub link_selector: String,
    pub metadata: MetadataPlan,
    pub extension: String,
    pub delivery: Delivery,
}

impl MediaPolicy {
    pub const NAMES: &'static [&'static str] = &["photos", "videos", "videos-interactive", "audio"];

    pub fn photos() -> Self {
        Self {
            name: "photos".to_string(),
            kind: MediaKind::Photos,
            listing_url_template: "https://pixabay.com/photos/search/?order=ec&pagi={page}"
                .to_string(),
            link_selector: LISTING_LINK_SELECTOR.to_string(),
            metadata: MetadataPlan::Api {
                endpoint: "https://pixabay.com/api/".to_string(),
            },
            extension: "jpg".to_string(),
            delivery: Delivery::Direct(VariantRule::image_fields()),
        }
    }

    pub fn videos() -> Self {
        Self {
            name: "videos".to_string(),
            kind: MediaKind::Videos,
            listing_url_template: "https://pixabay.com/videos/search/?order=ec&pagi={page}"
                .to_string(),
            link_selector: LISTING_LINK_SELECTOR.to_string(),
            metadata: MetadataPlan::Api {
                endpoint: "https://pixabay.com/api/videos/".to_string(),
            },
            extension: "mp4".to_string(),
            delivery: Delivery::Direct(VariantRule::video_tiers()),
        }
    }

    /// Videos fetched through the item page's own download menu.
    pub fn videos_interactive() -> Self {
        Self {
            name: "videos-interactive".to_string(),
            delivery: Delivery::Interactive(InteractiveFlow {
                trigger_selector: Some("button.fullWidthTrigger--c4aeO".to_string()),
                option_selector: "label.input--b6Wi1 input".to_string(),
                option_value_attribute: "value".to_string(),
                quality_marker: "_source.mp4".to_string(),
                confirm_selector: Some(
                    "a.buttonBase--r4opq:not([target='_blank'])".to_string(),
                ),
            }),
            ..Self::videos()
        }
    }

    /// Music tracks. There is no lookup endpoint; the item page carries both
    /// the details and the `audio` source.
    pub fn audio() -> Self {
        Self {
            name: "audio".to_string(),
            kind: MediaKind::Audio,
            listing_url_template: "https://pixabay.com/music/search/?order=ec&pagi={page}"
                .to_string(),
            link_selector: "a.media__item".to_string(),
            metadata: MetadataPlan::Page(PageScrape::audio_details()),
            extension: "mp3".to_string(),
            delivery: Delivery::Direct(VariantRule::audio_source()),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "photos" => Some(Self::photos()),
            "videos" => Some(Self::videos()),
            "videos-interactive" => Some(Self::videos_interactive()),
            "audio" => Some(Self::audio()),
            _ => None,
        }
    }

    /// Read video statistics off the item page instead of the API. Only
    /// click-through policies can do without the API's asset URLs, so any
    /// other policy is returned unchanged.
    pub fn with_page_metadata(mut self) -> Self {
        if self.is_interactive() {
            self.metadata = MetadataPlan::Page(PageScrape::video_stats());
        }
        self
    }

    pub fn needs_api_key(&self) -> bool {
        matches!(self.metadata, MetadataPlan::Api { .. })
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.delivery, Delivery::Interactive(_))
    }
}
