use std::time::Duration;

use harvest_core::MediaPolicy;
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use url::Url;

use crate::page::{PageController, PageError};
use crate::poll::{PollSpec, Poller};
use crate::HarvestError;

pub const HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
pub const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Wall-clock backstop on top of `max_scrolls`, for controllers whose calls
/// are slow.
const SETTLE_BACKSTOP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WalkerSettings {
    /// Wait between a scroll and the next height measurement.
    pub settle_delay: Duration,
    /// Upper bound on scroll triggers per page.
    pub max_scrolls: u32,
    pub height_script: String,
    pub scroll_script: String,
}

impl Default for WalkerSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            max_scrolls: 50,
            height_script: HEIGHT_SCRIPT.to_string(),
            scroll_script: SCROLL_SCRIPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub page: u32,
    pub url: String,
    /// Item links in document order; may contain duplicates.
    pub links: Vec<String>,
    /// `false` when the scroll limit was hit before the height settled.
    pub stabilized: bool,
}

/// Loads listing pages one at a time through a [`PageController`].
#[derive(Debug, Clone)]
pub struct PaginationWalker {
    listing_url_template: String,
    link_selector: String,
    settings: WalkerSettings,
}

impl PaginationWalker {
    pub fn new(policy: &MediaPolicy, settings: WalkerSettings) -> Self {
        Self {
            listing_url_template: policy.listing_url_template.clone(),
            link_selector: policy.link_selector.clone(),
            settings,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        self.listing_url_template.replace("{page}", &page.to_string())
    }

    /// Endless cursor over listing pages starting at `start_page`.
    pub fn pages(&self, start_page: u32) -> PageCursor<'_> {
        PageCursor {
            walker: self,
            next: start_page.max(1),
        }
    }

    /// Navigate to `number`, scroll until the content stops growing, and
    /// collect the item links.
    pub async fn load(
        &self,
        page: &mut dyn PageController,
        number: u32,
    ) -> Result<PageResult, HarvestError> {
        let url = self.page_url(number);
        harvest_info!("Opening listing page {} at {}", number, url);
        page.navigate(&url)
            .await
            .map_err(|source| HarvestError::Navigation {
                page: number,
                url: url.clone(),
                source,
            })?;

        let stabilized = self.settle(page).await?;
        if !stabilized {
            harvest_warn!(
                "Page {} still growing after {} scrolls; taking what is loaded",
                number,
                self.settings.max_scrolls
            );
        }

        let links = self.extract_links(page, &url).await?;
        harvest_info!("Found {} links on page {}", links.len(), number);
        Ok(PageResult {
            page: number,
            url,
            links,
            stabilized,
        })
    }

    /// Scroll and re-measure until two consecutive heights agree. The content
    /// loaded by the last allowed scroll is still waited for and measured.
    async fn settle(&self, page: &mut dyn PageController) -> Result<bool, PageError> {
        let max_scrolls = self.settings.max_scrolls.max(1);
        let backstop = self
            .settings
            .settle_delay
            .saturating_mul(max_scrolls.saturating_add(1))
            .saturating_add(SETTLE_BACKSTOP);
        let mut poller = Poller::new(
            PollSpec::new(self.settings.settle_delay, backstop)
                .with_max_attempts(max_scrolls.saturating_add(1)),
        );

        let mut last_height: Option<f64> = None;
        loop {
            let height = self.measure_height(page).await?;
            if last_height == Some(height) {
                harvest_debug!(
                    "Content settled at height {} after {} scrolls",
                    height,
                    poller.attempts()
                );
                return Ok(true);
            }
            if poller.attempts() >= max_scrolls {
                return Ok(false);
            }
            last_height = Some(height);
            page.execute(&self.settings.scroll_script).await?;
            if !poller.wait().await {
                return Ok(false);
            }
        }
    }

    async fn measure_height(&self, page: &mut dyn PageController) -> Result<f64, PageError> {
        let value = page.execute(&self.settings.height_script).await?;
        value
            .as_f64()
            .ok_or_else(|| PageError::Script(format!("height proxy returned {value}")))
    }

    async fn extract_links(
        &self,
        page: &mut dyn PageController,
        page_url: &str,
    ) -> Result<Vec<String>, PageError> {
        let base = Url::parse(page_url).ok();
        let locators = page.find(&self.link_selector).await?;
        let mut links = Vec::with_capacity(locators.len());
        for locator in &locators {
            let Some(href) = page.attribute(locator, "href").await? else {
                continue;
            };
            match resolve_link(&href, base.as_ref()) {
                Some(link) => links.push(link),
                None => harvest_debug!("Ignoring unusable link {:?}", href),
            }
        }
        Ok(links)
    }
}

/// Cursor returned by [`PaginationWalker::pages`]. A failed load does not
/// advance it, so the same page can be retried by a new run.
#[derive(Debug)]
pub struct PageCursor<'w> {
    walker: &'w PaginationWalker,
    next: u32,
}

impl PageCursor<'_> {
    pub fn next_page(&self) -> u32 {
        self.next
    }

    pub async fn next(
        &mut self,
        page: &mut dyn PageController,
    ) -> Result<PageResult, HarvestError> {
        let result = self.walker.load(page, self.next).await?;
        self.next = self.next.saturating_add(1);
        Ok(result)
    }
}

fn resolve_link(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url.into());
    }
    base.and_then(|base| base.join(trimmed).ok()).map(Into::into)
}
