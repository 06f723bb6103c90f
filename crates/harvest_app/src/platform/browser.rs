//! [`PageController`] backed by a Chromium instance over CDP.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures_util::StreamExt;
use harvest_engine::{Locator, PageController, PageError};
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use serde_json::Value;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Where click-through downloads land.
    pub download_dir: PathBuf,
    pub request_timeout: Duration,
}

pub struct ChromiumPage {
    browser: Browser,
    handler: JoinHandle<()>,
    tabs: Vec<Page>,
    active: usize,
}

fn session(err: impl std::fmt::Display) -> PageError {
    PageError::Session(err.to_string())
}

fn script(err: impl std::fmt::Display) -> PageError {
    PageError::Script(err.to_string())
}

impl ChromiumPage {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, PageError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(settings.request_timeout)
            .window_size(1920, 1080);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(PageError::Session)?;

        let (browser, mut events) = Browser::launch(config).await.map_err(session)?;
        let handler = tokio::task::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    harvest_debug!("Browser event error: {}", err);
                }
            }
        });

        let download_dir = settings.download_dir.canonicalize().map_err(session)?;
        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy())
            .build()
            .map_err(PageError::Session)?;
        browser.execute(behavior).await.map_err(session)?;

        let first = browser.new_page("about:blank").await.map_err(session)?;
        harvest_info!("Browser ready; downloads go to {:?}", download_dir);
        Ok(Self {
            browser,
            handler,
            tabs: vec![first],
            active: 0,
        })
    }

    fn page(&self) -> Result<&Page, PageError> {
        self.tabs
            .get(self.active)
            .ok_or(PageError::NoSuchTab(self.active))
    }

    async fn element(&self, locator: &Locator) -> Result<Element, PageError> {
        self.page()?
            .find_elements(locator.selector.as_str())
            .await
            .map_err(script)?
            .into_iter()
            .nth(locator.index)
            .ok_or_else(|| PageError::stale(locator))
    }
}

#[async_trait::async_trait]
impl PageController for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|err| PageError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        Ok(())
    }

    async fn execute(&mut self, script_text: &str) -> Result<Value, PageError> {
        let result = self.page()?.evaluate(script_text).await.map_err(script)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn find(&mut self, selector: &str) -> Result<Vec<Locator>, PageError> {
        let count = self
            .page()?
            .find_elements(selector)
            .await
            .map_err(script)?
            .len();
        Ok((0..count).map(|index| Locator::new(selector, index)).collect())
    }

    async fn attribute(
        &mut self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        self.element(locator)
            .await?
            .attribute(name)
            .await
            .map_err(script)
    }

    async fn text(&mut self, locator: &Locator) -> Result<Option<String>, PageError> {
        let text = self
            .element(locator)
            .await?
            .inner_text()
            .await
            .map_err(script)?;
        Ok(text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), PageError> {
        self.element(locator).await?.click().await.map_err(script)?;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), PageError> {
        self.page()?.reload().await.map_err(session)?;
        Ok(())
    }

    async fn open_tab(&mut self, url: &str) -> Result<(), PageError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|err| PageError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        self.tabs.push(page);
        self.active = self.tabs.len() - 1;
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<(), PageError> {
        if self.active != 0 && self.active < self.tabs.len() {
            let page = self.tabs.remove(self.active);
            page.close().await.map_err(session)?;
        }
        self.switch_tab(0).await
    }

    async fn switch_tab(&mut self, index: usize) -> Result<(), PageError> {
        let page = self.tabs.get(index).ok_or(PageError::NoSuchTab(index))?;
        page.bring_to_front().await.map_err(session)?;
        self.active = index;
        Ok(())
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    async fn shutdown(&mut self) -> Result<(), PageError> {
        for page in self.tabs.drain(..) {
            if let Err(err) = page.close().await {
                harvest_warn!("Failed to close tab: {}", err);
            }
        }
        self.active = 0;
        let closed = self.browser.close().await.map_err(session);
        if let Err(err) = self.browser.wait().await {
            harvest_warn!("Browser process did not exit cleanly: {}", err);
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}
