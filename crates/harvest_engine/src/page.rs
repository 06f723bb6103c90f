use thiserror::Error;

use crate::poll::{PollOutcome, PollSpec, Poller};

/// Address of an element: the `index`-th match of `selector` on the active
/// tab. Locators are resolved afresh on every use, so they stay valid across
/// refreshes as long as the page still has that many matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub selector: String,
    pub index: usize,
}

impl Locator {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("no element {index} for selector {selector}")]
    Stale { selector: String, index: usize },
    #[error("script failed: {0}")]
    Script(String),
    #[error("no tab at index {0}")]
    NoSuchTab(usize),
    #[error("browser session error: {0}")]
    Session(String),
}

impl PageError {
    pub fn stale(locator: &Locator) -> Self {
        PageError::Stale {
            selector: locator.selector.clone(),
            index: locator.index,
        }
    }
}

/// The browser capability the pipeline drives. Implementations own the tabs;
/// tab 0 is the listing tab.
#[async_trait::async_trait]
pub trait PageController: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), PageError>;

    /// Evaluate a JavaScript expression on the active tab.
    async fn execute(&mut self, script: &str) -> Result<serde_json::Value, PageError>;

    /// Locators for every current match of `selector`, in document order.
    async fn find(&mut self, selector: &str) -> Result<Vec<Locator>, PageError>;

    async fn attribute(&mut self, locator: &Locator, name: &str)
        -> Result<Option<String>, PageError>;

    /// Rendered text of the element, trimmed; `None` when empty.
    async fn text(&mut self, locator: &Locator) -> Result<Option<String>, PageError>;

    async fn click(&mut self, locator: &Locator) -> Result<(), PageError>;

    async fn refresh(&mut self) -> Result<(), PageError>;

    /// Open `url` in a new tab and make it active.
    async fn open_tab(&mut self, url: &str) -> Result<(), PageError>;

    /// Close the active tab and fall back to tab 0.
    async fn close_tab(&mut self) -> Result<(), PageError>;

    async fn switch_tab(&mut self, index: usize) -> Result<(), PageError>;

    fn tab_count(&self) -> usize;

    /// Tear the session down. Called once, on every exit path.
    async fn shutdown(&mut self) -> Result<(), PageError>;
}

/// Wait until `selector` matches at least one element.
pub async fn wait_for(
    page: &mut dyn PageController,
    selector: &str,
    spec: PollSpec,
) -> Result<PollOutcome<Vec<Locator>>, PageError> {
    let mut poller = Poller::new(spec);
    loop {
        let found = page.find(selector).await?;
        if !found.is_empty() {
            return Ok(PollOutcome::Found(found));
        }
        if !poller.wait().await {
            return Ok(PollOutcome::TimedOut);
        }
    }
}
