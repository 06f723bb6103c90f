//! Drives click-through downloads: open the resolution menu, pick the wanted
//! quality, confirm, then wait for the browser to drop the file in the
//! download directory. Transient failures refresh the page and start over, up
//! to a fixed number of attempts.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harvest_core::{DownloadFlow, FlowEvent, FlowState, InteractiveFlow, SkipReason};
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};

use crate::page::{wait_for, Locator, PageController};
use crate::poll::{poll_until, PollOutcome, PollSpec, Probe};

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    /// Wait for the menu trigger and the resolution options.
    pub element_wait: PollSpec,
    /// Wait for the optional confirmation control.
    pub confirm_wait: PollSpec,
    /// Wait for the downloaded file.
    pub file_wait: PollSpec,
    /// Pause after each click for the page to react.
    pub step_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            element_wait: PollSpec::new(Duration::from_millis(500), Duration::from_secs(10)),
            confirm_wait: PollSpec::new(Duration::from_millis(500), Duration::from_secs(10)),
            file_wait: PollSpec::new(Duration::from_secs(2), Duration::from_secs(10)),
            step_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    Done { file_name: String, attempts: u32 },
    Skipped { reason: SkipReason },
}

pub struct RetryController {
    flow: InteractiveFlow,
    extension: String,
    download_dir: PathBuf,
    settings: RetrySettings,
}

impl RetryController {
    pub fn new(
        flow: InteractiveFlow,
        extension: impl Into<String>,
        download_dir: PathBuf,
        settings: RetrySettings,
    ) -> Self {
        Self {
            flow,
            extension: extension.into(),
            download_dir,
            settings,
        }
    }

    /// Run the flow on the active tab. Never fails: every problem ends in a
    /// skip reason.
    pub async fn run(&self, page: &mut dyn PageController) -> FlowResult {
        let mut machine = DownloadFlow::new(self.settings.max_attempts);
        let mut baseline = HashSet::new();
        let mut matched_value = String::new();

        loop {
            let event = match machine.state().clone() {
                FlowState::SelectingResolution => {
                    harvest_debug!(
                        "Download flow attempt {}/{}",
                        machine.attempt(),
                        machine.max_attempts()
                    );
                    match baseline_files(&self.download_dir) {
                        Ok(files) => {
                            baseline = files;
                            match self.select_resolution(page).await {
                                Ok(value) => {
                                    matched_value = value;
                                    FlowEvent::OptionMatched
                                }
                                Err(event) => event,
                            }
                        }
                        Err(err) => FlowEvent::InteractionFailed(format!(
                            "cannot list {:?}: {err}",
                            self.download_dir
                        )),
                    }
                }
                FlowState::Confirming => self.confirm(page, &matched_value).await,
                FlowState::AwaitingFile => self.await_file(&baseline).await,
                FlowState::TransientFail { reason } => {
                    harvest_warn!(
                        "Download flow attempt {}/{} failed: {}",
                        machine.attempt(),
                        machine.max_attempts(),
                        reason
                    );
                    if machine.attempt() < machine.max_attempts() {
                        if let Err(err) = page.refresh().await {
                            harvest_warn!("Refresh after failed attempt did not succeed: {}", err);
                        }
                        tokio::time::sleep(self.settings.step_delay).await;
                    }
                    FlowEvent::Retry
                }
                FlowState::Done { file_name } => {
                    harvest_info!("Download detected: {}", file_name);
                    return FlowResult::Done {
                        file_name,
                        attempts: machine.attempt(),
                    };
                }
                FlowState::PermanentSkip { .. } | FlowState::Exhausted { .. } => {
                    let reason = machine
                        .skip_reason()
                        .unwrap_or(SkipReason::NoMatchingOption);
                    return FlowResult::Skipped { reason };
                }
            };
            machine.apply(event);
        }
    }

    /// Open the menu and find the option carrying the quality marker. Returns
    /// the option's identifying value.
    async fn select_resolution(&self, page: &mut dyn PageController) -> Result<String, FlowEvent> {
        if let Some(trigger) = &self.flow.trigger_selector {
            let found = wait_for(page, trigger, self.settings.element_wait)
                .await
                .map_err(|err| FlowEvent::InteractionFailed(err.to_string()))?;
            let Some(locator) = found.found().and_then(|all| all.into_iter().next()) else {
                return Err(FlowEvent::InteractionFailed(
                    "download menu trigger not found".to_string(),
                ));
            };
            page.click(&locator)
                .await
                .map_err(|err| FlowEvent::InteractionFailed(err.to_string()))?;
            tokio::time::sleep(self.settings.step_delay).await;
        }

        let options = match wait_for(page, &self.flow.option_selector, self.settings.element_wait)
            .await
        {
            Ok(PollOutcome::Found(options)) => options,
            Ok(PollOutcome::TimedOut) => {
                harvest_warn!("No resolution options were presented");
                return Err(FlowEvent::OptionMissing);
            }
            Err(err) => return Err(FlowEvent::InteractionFailed(err.to_string())),
        };

        match self.find_option(page, &options, None).await? {
            Some((_, value)) => {
                harvest_debug!("Matched resolution option {}", value);
                Ok(value)
            }
            None => {
                harvest_warn!(
                    "No option contains {:?} among {} presented",
                    self.flow.quality_marker,
                    options.len()
                );
                Err(FlowEvent::OptionMissing)
            }
        }
    }

    /// Click the option selected earlier (located again by its value), then
    /// the confirmation control if one shows up.
    async fn confirm(&self, page: &mut dyn PageController, matched_value: &str) -> FlowEvent {
        let options = match page.find(&self.flow.option_selector).await {
            Ok(options) => options,
            Err(err) => return FlowEvent::InteractionFailed(err.to_string()),
        };
        let locator = match self.find_option(page, &options, Some(matched_value)).await {
            Ok(Some((locator, _))) => locator,
            Ok(None) => {
                return FlowEvent::InteractionFailed("resolution option disappeared".to_string())
            }
            Err(event) => return event,
        };
        if let Err(err) = page.click(&locator).await {
            return FlowEvent::InteractionFailed(err.to_string());
        }
        tokio::time::sleep(self.settings.step_delay).await;

        let Some(confirm) = &self.flow.confirm_selector else {
            return FlowEvent::Confirmed;
        };
        match wait_for(page, confirm, self.settings.confirm_wait).await {
            Ok(PollOutcome::Found(controls)) => {
                if let Some(control) = controls.first() {
                    if let Err(err) = page.click(control).await {
                        return FlowEvent::InteractionFailed(err.to_string());
                    }
                    harvest_debug!("Clicked download confirmation");
                }
                FlowEvent::Confirmed
            }
            Ok(PollOutcome::TimedOut) => {
                harvest_debug!("No confirmation needed, proceeding");
                FlowEvent::Confirmed
            }
            Err(err) => FlowEvent::InteractionFailed(err.to_string()),
        }
    }

    async fn await_file(&self, baseline: &HashSet<String>) -> FlowEvent {
        let dir = self.download_dir.as_path();
        let extension = self.extension.as_str();
        let outcome = poll_until(self.settings.file_wait, move || async move {
            Ok::<_, io::Error>(match new_file_with_extension(dir, baseline, extension)? {
                Some(name) => Probe::Found(name),
                None => Probe::NotFound,
            })
        })
        .await;
        match outcome {
            Ok(PollOutcome::Found(name)) => FlowEvent::FileDetected(name),
            Ok(PollOutcome::TimedOut) => FlowEvent::FileWaitTimedOut,
            Err(err) => FlowEvent::InteractionFailed(format!("cannot list {dir:?}: {err}")),
        }
    }

    /// First option whose identifying value contains the marker (and equals
    /// `exact` when given).
    async fn find_option(
        &self,
        page: &mut dyn PageController,
        options: &[Locator],
        exact: Option<&str>,
    ) -> Result<Option<(Locator, String)>, FlowEvent> {
        for locator in options {
            let value = page
                .attribute(locator, &self.flow.option_value_attribute)
                .await
                .map_err(|err| FlowEvent::InteractionFailed(err.to_string()))?;
            let Some(value) = value else {
                continue;
            };
            let wanted = match exact {
                Some(exact) => value == exact,
                None => value.contains(&self.flow.quality_marker),
            };
            if wanted {
                return Ok(Some((locator.clone(), value)));
            }
        }
        Ok(None)
    }
}

/// Suffixes browsers give a download while it is still being written.
const PARTIAL_SUFFIXES: &[&str] = &[".crdownload", ".part"];

/// Files already present, plus the final names of downloads still in flight.
/// A download left over from an earlier attempt or item must not be taken
/// for the one this attempt starts.
fn baseline_files(dir: &Path) -> io::Result<HashSet<String>> {
    let mut names = list_files(dir)?;
    let pending: Vec<String> = names
        .iter()
        .filter_map(|name| {
            PARTIAL_SUFFIXES
                .iter()
                .find_map(|suffix| name.strip_suffix(suffix))
        })
        .map(str::to_string)
        .collect();
    names.extend(pending);
    Ok(names)
}

fn list_files(dir: &Path) -> io::Result<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn new_file_with_extension(
    dir: &Path,
    baseline: &HashSet<String>,
    extension: &str,
) -> io::Result<Option<String>> {
    let mut fresh: Vec<String> = list_files(dir)?
        .into_iter()
        .filter(|name| !baseline.contains(name))
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    fresh.sort();
    Ok(fresh.into_iter().next())
}
