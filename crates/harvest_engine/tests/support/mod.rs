//! Scripted [`PageController`] for driving the pipeline without a browser.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, Once};

use harvest_engine::{
    HarvestEvent, Locator, PageController, PageError, ProgressSink, HEIGHT_SCRIPT, SCROLL_SCRIPT,
};
use serde_json::Value;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(harvest_logging::initialize_for_tests);
}

/// Pseudo-attribute holding an element's rendered text.
pub const TEXT: &str = "#text";

type Attributes = HashMap<String, String>;
type ClickHook = Box<dyn FnMut(&str, &Locator) + Send>;

pub struct FakePage {
    /// `(page url, selector)` -> one attribute map per matching element.
    elements: HashMap<(String, String), Vec<Attributes>>,
    failing: HashSet<String>,
    heights: VecDeque<f64>,
    last_height: f64,
    grow_forever: bool,
    on_click: Option<ClickHook>,
    tabs: Vec<String>,
    active: usize,
    pub navigations: Vec<String>,
    pub clicks: Vec<(String, Locator)>,
    pub scrolls: u32,
    pub refreshes: u32,
    pub opened_tabs: Vec<String>,
    pub closed_tabs: u32,
    pub shut_down: bool,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            failing: HashSet::new(),
            heights: VecDeque::new(),
            last_height: 1000.0,
            grow_forever: false,
            on_click: None,
            tabs: vec!["about:blank".to_string()],
            active: 0,
            navigations: Vec::new(),
            clicks: Vec::new(),
            scrolls: 0,
            refreshes: 0,
            opened_tabs: Vec::new(),
            closed_tabs: 0,
            shut_down: false,
        }
    }

    /// Listing page at `url` whose `selector` matches one anchor per href.
    pub fn with_listing(mut self, url: &str, selector: &str, hrefs: &[&str]) -> Self {
        let anchors = hrefs
            .iter()
            .map(|href| HashMap::from([("href".to_string(), href.to_string())]))
            .collect();
        self.elements
            .insert((url.to_string(), selector.to_string()), anchors);
        self
    }

    /// Elements on `url` matching `selector`, each with the given attributes.
    pub fn with_elements(mut self, url: &str, selector: &str, attrs: &[&[(&str, &str)]]) -> Self {
        let elements = attrs
            .iter()
            .map(|pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect();
        self.elements
            .insert((url.to_string(), selector.to_string()), elements);
        self
    }

    /// Elements on `url` matching `selector`, one per text.
    pub fn with_texts(mut self, url: &str, selector: &str, texts: &[&str]) -> Self {
        let elements = texts
            .iter()
            .map(|text| HashMap::from([(TEXT.to_string(), text.to_string())]))
            .collect();
        self.elements
            .insert((url.to_string(), selector.to_string()), elements);
        self
    }

    pub fn with_heights(mut self, heights: &[f64]) -> Self {
        self.heights = heights.iter().copied().collect();
        self
    }

    pub fn growing_forever(mut self) -> Self {
        self.grow_forever = true;
        self
    }

    pub fn failing_navigation(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn on_click(mut self, hook: impl FnMut(&str, &Locator) + Send + 'static) -> Self {
        self.on_click = Some(Box::new(hook));
        self
    }

    pub fn active_url(&self) -> &str {
        &self.tabs[self.active]
    }

    fn element(&self, locator: &Locator) -> Result<&Attributes, PageError> {
        self.elements
            .get(&(self.active_url().to_string(), locator.selector.clone()))
            .and_then(|all| all.get(locator.index))
            .ok_or_else(|| PageError::stale(locator))
    }

    fn next_height(&mut self) -> f64 {
        if self.grow_forever {
            self.last_height += 500.0;
        } else if let Some(height) = self.heights.pop_front() {
            self.last_height = height;
        }
        self.last_height
    }
}

#[async_trait::async_trait]
impl PageController for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.navigations.push(url.to_string());
        if self.failing.contains(url) {
            return Err(PageError::Navigation {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }
        self.tabs[self.active] = url.to_string();
        Ok(())
    }

    async fn execute(&mut self, script: &str) -> Result<Value, PageError> {
        if script == HEIGHT_SCRIPT {
            return Ok(Value::from(self.next_height()));
        }
        if script == SCROLL_SCRIPT {
            self.scrolls += 1;
        }
        Ok(Value::Null)
    }

    async fn find(&mut self, selector: &str) -> Result<Vec<Locator>, PageError> {
        let count = self
            .elements
            .get(&(self.active_url().to_string(), selector.to_string()))
            .map_or(0, Vec::len);
        Ok((0..count).map(|index| Locator::new(selector, index)).collect())
    }

    async fn attribute(
        &mut self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        Ok(self.element(locator)?.get(name).cloned())
    }

    async fn text(&mut self, locator: &Locator) -> Result<Option<String>, PageError> {
        Ok(self
            .element(locator)?
            .get(TEXT)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), PageError> {
        self.element(locator)?;
        let url = self.active_url().to_string();
        self.clicks.push((url.clone(), locator.clone()));
        if let Some(hook) = self.on_click.as_mut() {
            hook(&url, locator);
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), PageError> {
        self.refreshes += 1;
        Ok(())
    }

    async fn open_tab(&mut self, url: &str) -> Result<(), PageError> {
        self.opened_tabs.push(url.to_string());
        self.tabs.push(url.to_string());
        self.active = self.tabs.len() - 1;
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<(), PageError> {
        if self.active != 0 {
            self.tabs.remove(self.active);
            self.closed_tabs += 1;
        }
        self.active = 0;
        Ok(())
    }

    async fn switch_tab(&mut self, index: usize) -> Result<(), PageError> {
        if index >= self.tabs.len() {
            return Err(PageError::NoSuchTab(index));
        }
        self.active = index;
        Ok(())
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    async fn shutdown(&mut self) -> Result<(), PageError> {
        self.shut_down = true;
        Ok(())
    }
}

/// Sink that keeps every event for inspection.
#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<HarvestEvent>>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<HarvestEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: HarvestEvent) {
        self.events.lock().unwrap().push(event);
    }
}
