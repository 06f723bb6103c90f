//! Metadata read from the item page in a throwaway tab.

use std::time::Duration;

use harvest_core::{slug_words, FieldCapture, PageScrape, ScrapedField};
use harvest_logging::{harvest_debug, harvest_warn};
use serde_json::{Map, Value};

use crate::page::{wait_for, PageController, PageError};
use crate::poll::{PollOutcome, PollSpec};
use crate::resolver::MetadataSource;
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Wait for the page's ready marker after the tab opens.
    pub ready_wait: PollSpec,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            ready_wait: PollSpec::new(Duration::from_millis(500), Duration::from_secs(20)),
        }
    }
}

/// [`MetadataSource`] that opens the item in a new tab, reads the configured
/// fields into one JSON object and closes the tab again.
///
/// A page whose ready marker never shows up yields no hits. Fields without a
/// match are stored as `null`.
#[derive(Debug, Clone)]
pub struct PageMetadataSource {
    scrape: PageScrape,
    settings: ScrapeSettings,
}

impl PageMetadataSource {
    pub fn new(scrape: PageScrape, settings: ScrapeSettings) -> Self {
        Self { scrape, settings }
    }

    async fn read_active(
        &self,
        page: &mut dyn PageController,
        item_url: &str,
    ) -> Result<Option<Value>, PageError> {
        let ready = wait_for(page, &self.scrape.ready_selector, self.settings.ready_wait).await?;
        if let PollOutcome::TimedOut = ready {
            harvest_warn!(
                "{} never showed {:?}; no metadata",
                item_url,
                self.scrape.ready_selector
            );
            return Ok(None);
        }

        let mut hit = Map::new();
        for field in &self.scrape.fields {
            let value = capture(page, field).await?;
            hit.insert(field.name.clone(), value);
        }
        if let Some(key) = &self.scrape.slug_field {
            hit.insert(
                key.clone(),
                slug_words(item_url).map_or(Value::Null, Value::from),
            );
        }
        harvest_debug!("Scraped {} fields from {}", hit.len(), item_url);
        Ok(Some(Value::Object(hit)))
    }
}

#[async_trait::async_trait]
impl MetadataSource for PageMetadataSource {
    async fn lookup(
        &self,
        _item_id: &str,
        item_url: &str,
        page: &mut dyn PageController,
    ) -> Result<Vec<Value>, FetchError> {
        page.open_tab(item_url).await.map_err(page_error)?;
        let read = self.read_active(page, item_url).await;
        let closed = if page.tab_count() > 1 {
            page.close_tab().await
        } else {
            Ok(())
        };
        let hit = read.map_err(page_error)?;
        closed.map_err(page_error)?;
        Ok(hit.into_iter().collect())
    }
}

async fn capture(
    page: &mut dyn PageController,
    field: &ScrapedField,
) -> Result<Value, PageError> {
    let matches = page.find(&field.selector).await?;
    let text = match &field.capture {
        FieldCapture::Text => match matches.first() {
            Some(first) => page.text(first).await?,
            None => None,
        },
        FieldCapture::TextAt(index) => match matches.get(*index) {
            Some(element) => page.text(element).await?,
            None => None,
        },
        FieldCapture::Attribute(name) => match matches.first() {
            Some(first) => page.attribute(first, name).await?,
            None => None,
        },
        FieldCapture::AllText => {
            let mut all = Vec::with_capacity(matches.len());
            for element in &matches {
                if let Some(text) = page.text(element).await? {
                    all.push(Value::from(text));
                }
            }
            return Ok(Value::Array(all));
        }
    };
    Ok(text.map_or(Value::Null, Value::from))
}

fn page_error(err: PageError) -> FetchError {
    let kind = match err {
        PageError::Navigation { .. } => FailureKind::Network,
        _ => FailureKind::Page,
    };
    FetchError::new(kind, err.to_string())
}
