//! Descriptions of metadata read off an item page instead of an API.

/// How one field's value is taken from the elements matching its selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCapture {
    /// Text of the first match.
    Text,
    /// Text of the match at this position.
    TextAt(usize),
    /// Text of every match, as a list.
    AllText,
    /// The named attribute of the first match.
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedField {
    /// Key the value is stored under in the metadata object.
    pub name: String,
    pub selector: String,
    pub capture: FieldCapture,
}

impl ScrapedField {
    pub fn new(name: &str, selector: &str, capture: FieldCapture) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            capture,
        }
    }
}

/// Fields read from an item page once `ready_selector` shows up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScrape {
    pub ready_selector: String,
    pub fields: Vec<ScrapedField>,
    /// When set, the words of the item URL's slug are stored under this key.
    pub slug_field: Option<String>,
}

impl PageScrape {
    /// Track pages: title, genre, artist, description and the `audio` source.
    pub fn audio_details() -> Self {
        Self {
            ready_selector: "audio".to_string(),
            fields: vec![
                ScrapedField::new("title", "h1", FieldCapture::Text),
                ScrapedField::new("genre", ".category", FieldCapture::Text),
                ScrapedField::new("singer_album", ".artist", FieldCapture::Text),
                ScrapedField::new("description", ".description", FieldCapture::Text),
                ScrapedField::new(
                    "audio_file",
                    "audio",
                    FieldCapture::Attribute("src".to_string()),
                ),
            ],
            slug_field: None,
        }
    }

    /// Video pages: like count, view and download counters, and tags.
    pub fn video_stats() -> Self {
        Self {
            ready_selector: "div.text--MrmlD".to_string(),
            fields: vec![
                ScrapedField::new("likes", "div.text--MrmlD", FieldCapture::Text),
                ScrapedField::new("views", "span.rowLabel--VPSZI", FieldCapture::TextAt(0)),
                ScrapedField::new("downloads", "span.rowLabel--VPSZI", FieldCapture::TextAt(1)),
                ScrapedField::new(
                    "tags",
                    "div.tagsSection--8gH54 .label--Ngqjq",
                    FieldCapture::AllText,
                ),
            ],
            slug_field: Some("description".to_string()),
        }
    }
}
