use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use harvest_engine::{DownloadProgress, HarvestEvent, ItemOutcome, ProgressSink};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const OVERALL_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} downloads {msg}";
const BYTES_TEMPLATE: &str = "  {prefix} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "  {spinner} {prefix} {bytes} ({bytes_per_sec})";

/// Terminal progress: one bar for the run, one transient bar per download.
pub struct ProgressDisplay {
    multi: MultiProgress,
    overall: ProgressBar,
    current: Mutex<Option<ProgressBar>>,
}

impl ProgressDisplay {
    pub fn new(target: u64, already_downloaded: u64) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(target));
        overall.set_style(
            ProgressStyle::default_bar()
                .template(OVERALL_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        overall.set_position(already_downloaded.min(target));
        overall.enable_steady_tick(Duration::from_millis(200));
        Self {
            multi,
            overall,
            current: Mutex::new(None),
        }
    }

    pub fn finish(&self) {
        self.clear_current();
        self.overall.finish();
    }

    fn item_bar(&self, progress: &DownloadProgress) -> ProgressBar {
        let bar = match progress.total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(BYTES_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_prefix(progress.item_id.clone());
        self.multi.add(bar)
    }

    fn clear_current(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = current.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for ProgressDisplay {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::PageLoaded { page, links, fresh } => {
                self.overall
                    .set_message(format!("page {page}: {fresh} new of {links}"));
            }
            HarvestEvent::ItemStarted { .. } => self.clear_current(),
            HarvestEvent::Progress(progress) => {
                let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
                let bar = current.get_or_insert_with(|| self.item_bar(&progress));
                bar.set_position(progress.bytes);
            }
            HarvestEvent::ItemFinished { outcome, .. } => {
                self.clear_current();
                if let ItemOutcome::Downloaded { .. } = outcome {
                    self.overall.inc(1);
                }
            }
            HarvestEvent::PageCompleted { page } => {
                self.overall.set_message(format!("page {page} done"));
            }
        }
    }
}
