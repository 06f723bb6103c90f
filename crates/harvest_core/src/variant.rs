use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const FULL_HD: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions must reach the floor; area alone is not enough.
    pub fn meets(&self, floor: Resolution) -> bool {
        self.width >= floor.width && self.height >= floor.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One quality option returned by the metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetVariant {
    pub tier: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl AssetVariant {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// How an item's asset URL is chosen from its metadata.
///
/// Each strategy applies to differently shaped media; they are never
/// substituted for each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantRule {
    /// Walk `preference` in order inside the object stored under `field` and
    /// take the first tier meeting `floor`.
    TieredFloor {
        field: String,
        preference: Vec<String>,
        floor: Resolution,
    },
    /// Take the `primary` URL field, or `fallback` when the primary is absent.
    BestAvailable { primary: String, fallback: String },
    /// A single URL field captured from the item page.
    PageField { field: String },
}

impl VariantRule {
    /// `videos.{large,medium,small}` with a 1920x1080 floor.
    pub fn video_tiers() -> Self {
        VariantRule::TieredFloor {
            field: "videos".to_string(),
            preference: ["large", "medium", "small"]
                .iter()
                .map(|tier| tier.to_string())
                .collect(),
            floor: Resolution::FULL_HD,
        }
    }

    /// The `audio_file` source scraped from a track page.
    pub fn audio_source() -> Self {
        VariantRule::PageField {
            field: "audio_file".to_string(),
        }
    }

    /// `largeImageURL`, falling back to `webformatURL`.
    pub fn image_fields() -> Self {
        VariantRule::BestAvailable {
            primary: "largeImageURL".to_string(),
            fallback: "webformatURL".to_string(),
        }
    }
}

/// First tier in `preference` order whose dimensions meet `floor`.
///
/// Tiers missing from `variants` or carrying an empty URL are passed over. A
/// large tier below the floor is never chosen.
pub fn select_tiered<'a, S: AsRef<str>>(
    variants: &'a [AssetVariant],
    preference: &[S],
    floor: Resolution,
) -> Option<&'a AssetVariant> {
    preference.iter().find_map(|tier| {
        variants
            .iter()
            .find(|variant| variant.tier == tier.as_ref())
            .filter(|variant| !variant.url.is_empty() && variant.resolution().meets(floor))
    })
}

/// The primary URL if present and non-empty, otherwise the fallback.
pub fn select_best_available<'a>(
    primary: Option<&'a str>,
    fallback: Option<&'a str>,
) -> Option<&'a str> {
    primary
        .filter(|url| !url.is_empty())
        .or_else(|| fallback.filter(|url| !url.is_empty()))
}
