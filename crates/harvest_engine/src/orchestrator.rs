use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use harvest_core::{
    output_filename, DeduplicationIndex, Delivery, MediaPolicy, ProgressState, SkipReason,
};
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};

use crate::download::DownloadManager;
use crate::page::PageController;
use crate::persist::ensure_output_dir;
use crate::record::{ItemRecord, MetadataLog};
use crate::resolver::{AssetSource, ItemResolver, MetadataSource, ResolveOutcome, ResolvedItem};
use crate::retry::{FlowResult, RetryController, RetrySettings};
use crate::store::ProgressStore;
use crate::walker::{PaginationWalker, WalkerSettings};
use crate::{HarvestError, HarvestEvent, ItemOutcome, NullSink, ProgressSink};

/// Produces the `timestamp` written into each record.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct HarvestSettings {
    /// Stop once this many items have been downloaded in total.
    pub target_downloads: u64,
    /// Stop after visiting this many pages in one run.
    pub max_pages: Option<u32>,
    pub download_dir: PathBuf,
    /// Pause after opening an item tab before interacting with it.
    pub item_open_delay: Duration,
    pub clock: Clock,
}

impl HarvestSettings {
    pub fn new(download_dir: PathBuf, target_downloads: u64) -> Self {
        Self {
            target_downloads,
            max_pages: None,
            download_dir,
            item_open_delay: Duration::from_secs(3),
            clock: Arc::new(|| chrono::Utc::now().to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// A listing page came back without any item links.
    PagesExhausted,
    PageLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_visited: u32,
    pub downloaded: u64,
    pub skipped: u64,
    pub stop: StopReason,
}

/// The page -> item -> download loop for one media policy.
pub struct HarvestOrchestrator<M> {
    walker: PaginationWalker,
    resolver: ItemResolver<M>,
    downloader: DownloadManager,
    retry: Option<RetryController>,
    store: ProgressStore,
    log: MetadataLog,
    sink: Arc<dyn ProgressSink>,
    extension: String,
    settings: HarvestSettings,
}

impl<M: MetadataSource> HarvestOrchestrator<M> {
    pub fn new(
        policy: &MediaPolicy,
        settings: HarvestSettings,
        resolver: ItemResolver<M>,
        downloader: DownloadManager,
        store: ProgressStore,
        log: MetadataLog,
    ) -> Self {
        let retry = match &policy.delivery {
            Delivery::Interactive(flow) => Some(RetryController::new(
                flow.clone(),
                policy.extension.clone(),
                settings.download_dir.clone(),
                RetrySettings::default(),
            )),
            Delivery::Direct(_) => None,
        };
        Self {
            walker: PaginationWalker::new(policy, WalkerSettings::default()),
            resolver,
            downloader,
            retry,
            store,
            log,
            sink: Arc::new(NullSink),
            extension: policy.extension.clone(),
            settings,
        }
    }

    pub fn with_walker_settings(mut self, policy: &MediaPolicy, settings: WalkerSettings) -> Self {
        self.walker = PaginationWalker::new(policy, settings);
        self
    }

    pub fn with_retry_settings(mut self, policy: &MediaPolicy, settings: RetrySettings) -> Self {
        if let Delivery::Interactive(flow) = &policy.delivery {
            self.retry = Some(RetryController::new(
                flow.clone(),
                policy.extension.clone(),
                self.settings.download_dir.clone(),
                settings,
            ));
        }
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Harvest until the target is reached, the listing runs dry, or the
    /// page limit is hit. `state` is saved after every item and every page.
    pub async fn run(
        &self,
        page: &mut dyn PageController,
        state: &mut ProgressState,
    ) -> Result<RunSummary, HarvestError> {
        ensure_output_dir(&self.settings.download_dir)?;
        self.reconcile(state)?;
        let target = self.settings.target_downloads;
        let mut cursor = self.walker.pages(state.current_page());
        let mut summary = RunSummary {
            pages_visited: 0,
            downloaded: 0,
            skipped: 0,
            stop: StopReason::TargetReached,
        };

        let result = loop {
            if state.target_reached(target) {
                harvest_info!("Reached target of {} downloads", target);
                break Ok(StopReason::TargetReached);
            }
            if self
                .settings
                .max_pages
                .is_some_and(|max| summary.pages_visited >= max)
            {
                break Ok(StopReason::PageLimit);
            }

            let number = cursor.next_page();
            harvest_logging::set_current_page(number);
            let listing = match cursor.next(page).await {
                Ok(listing) => listing,
                Err(err) => break Err(err),
            };
            summary.pages_visited += 1;

            if listing.links.is_empty() {
                harvest_info!("Page {} has no items; listing exhausted", number);
                break Ok(StopReason::PagesExhausted);
            }

            let fresh: Vec<String> = DeduplicationIndex::new(state)
                .filter_new(&listing.links)
                .into_iter()
                .map(str::to_string)
                .collect();
            self.sink.emit(HarvestEvent::PageLoaded {
                page: number,
                links: listing.links.len(),
                fresh: fresh.len(),
            });

            let mut page_complete = true;
            for url in &fresh {
                if state.target_reached(target) {
                    page_complete = false;
                    break;
                }
                if !DeduplicationIndex::new(state).is_new(url) {
                    continue;
                }
                match self.process_item(page, state, number, url).await {
                    Ok(ItemOutcome::Downloaded { .. }) => summary.downloaded += 1,
                    Ok(ItemOutcome::Skipped { .. }) => summary.skipped += 1,
                    Err(err) => return self.finish(Err(err)),
                }
                harvest_info!("Progress: {}/{}", state.total_downloaded(), target);
            }

            if !page_complete {
                // Remaining links on this page are picked up by the next run.
                break Ok(StopReason::TargetReached);
            }
            state.advance_page();
            if let Err(err) = self.store.save(state) {
                break Err(err.into());
            }
            self.sink.emit(HarvestEvent::PageCompleted { page: number });
        };

        self.finish(result.map(|stop| RunSummary { stop, ..summary }))
    }

    /// Mark items that made it into the metadata log but not into the saved
    /// progress (a run that stopped between the two writes) as downloaded.
    fn reconcile(&self, state: &mut ProgressState) -> Result<(), HarvestError> {
        let mut recovered = 0;
        for record in self.log.read_all()? {
            if state.record_success(&record.source_url) {
                recovered += 1;
            }
        }
        if recovered > 0 {
            harvest_warn!(
                "Recovered {} logged items missing from saved progress",
                recovered
            );
            self.store.save(state)?;
        }
        Ok(())
    }

    fn finish(&self, result: Result<RunSummary, HarvestError>) -> Result<RunSummary, HarvestError> {
        harvest_logging::set_current_page(0);
        result
    }

    /// Resolve, download and record one item, then persist its terminal
    /// outcome. Only persistence and session failures escape.
    async fn process_item(
        &self,
        page: &mut dyn PageController,
        state: &mut ProgressState,
        page_number: u32,
        url: &str,
    ) -> Result<ItemOutcome, HarvestError> {
        harvest_info!("Processing {}", url);

        let resolved = self.resolver.resolve(page, url).await;
        // A metadata source may have left its tab open on failure.
        if page.tab_count() > 1 {
            page.close_tab().await?;
        }

        let (item_id, outcome) = match resolved {
            ResolveOutcome::Skip { item_id, reason } => {
                self.sink.emit(HarvestEvent::ItemStarted {
                    url: url.to_string(),
                    item_id: item_id.clone(),
                });
                (item_id, ItemOutcome::Skipped { reason })
            }
            ResolveOutcome::Resolved(item) => {
                self.sink.emit(HarvestEvent::ItemStarted {
                    url: url.to_string(),
                    item_id: Some(item.item_id.clone()),
                });
                let outcome = match &item.asset {
                    AssetSource::Direct(selected) => {
                        self.download_direct(page_number, url, &item, &selected.url)
                            .await?
                    }
                    AssetSource::Interactive => {
                        self.download_interactive(page, page_number, url, &item)
                            .await?
                    }
                };
                (Some(item.item_id), outcome)
            }
        };

        let id = item_id.as_deref().unwrap_or("-");
        match &outcome {
            ItemOutcome::Downloaded { file, .. } => {
                state.record_success(url);
                harvest_info!("Downloaded {} (item {}) as {}", url, id, file);
            }
            ItemOutcome::Skipped { reason } => {
                state.record_skip(url);
                harvest_warn!("Skipped {} (item {}): {}", url, id, reason);
            }
        }
        self.store.save(state)?;
        self.sink.emit(HarvestEvent::ItemFinished {
            url: url.to_string(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    async fn download_direct(
        &self,
        page_number: u32,
        url: &str,
        item: &ResolvedItem,
        asset_url: &str,
    ) -> Result<ItemOutcome, HarvestError> {
        let file = output_filename(&item.item_id, &self.extension);
        let target = self.settings.download_dir.join(&file);
        let report = match self
            .downloader
            .fetch(&item.item_id, asset_url, &target, self.sink.as_ref())
            .await
        {
            Ok(report) => report,
            Err(err) => {
                return Ok(ItemOutcome::Skipped {
                    reason: SkipReason::DownloadFailed {
                        detail: err.to_string(),
                    },
                })
            }
        };

        self.record(ItemRecord {
            page: page_number,
            source_url: url.to_string(),
            item_id: item.item_id.clone(),
            download_file: file,
            download_path: report.path.display().to_string(),
            metadata: item.metadata.clone(),
            timestamp: (self.settings.clock)(),
            bytes: Some(report.bytes_written),
            sha256: Some(report.sha256),
        })
    }

    async fn download_interactive(
        &self,
        page: &mut dyn PageController,
        page_number: u32,
        url: &str,
        item: &ResolvedItem,
    ) -> Result<ItemOutcome, HarvestError> {
        let Some(retry) = &self.retry else {
            return Ok(ItemOutcome::Skipped {
                reason: SkipReason::DownloadFailed {
                    detail: "interactive delivery is not configured".to_string(),
                },
            });
        };

        if let Err(err) = page.open_tab(url).await {
            return Ok(ItemOutcome::Skipped {
                reason: SkipReason::PageUnavailable {
                    detail: err.to_string(),
                },
            });
        }
        tokio::time::sleep(self.settings.item_open_delay).await;
        let result = retry.run(page).await;
        if page.tab_count() > 1 {
            page.close_tab().await?;
        }

        let file_name = match result {
            FlowResult::Done { file_name, .. } => file_name,
            FlowResult::Skipped { reason } => return Ok(ItemOutcome::Skipped { reason }),
        };

        let file = output_filename(&item.item_id, &self.extension);
        let path = self.settings.download_dir.join(&file);
        if file_name != file {
            let detected = self.settings.download_dir.join(&file_name);
            if let Err(err) = fs::rename(&detected, &path) {
                return Ok(ItemOutcome::Skipped {
                    reason: SkipReason::DownloadFailed {
                        detail: format!("cannot rename {file_name} to {file}: {err}"),
                    },
                });
            }
            harvest_debug!("Renamed {} to {}", file_name, file);
        }
        let bytes = fs::metadata(&path).ok().map(|meta| meta.len());
        self.record(ItemRecord {
            page: page_number,
            source_url: url.to_string(),
            item_id: item.item_id.clone(),
            download_file: file,
            download_path: path.display().to_string(),
            metadata: item.metadata.clone(),
            timestamp: (self.settings.clock)(),
            bytes,
            sha256: None,
        })
    }

    /// Append a record for a file that must already be on disk.
    fn record(&self, record: ItemRecord) -> Result<ItemOutcome, HarvestError> {
        if !PathBuf::from(&record.download_path).is_file() {
            return Ok(ItemOutcome::Skipped {
                reason: SkipReason::DownloadFailed {
                    detail: format!("{} missing after download", record.download_path),
                },
            });
        }
        self.log.append(&record)?;
        Ok(ItemOutcome::Downloaded {
            item_id: record.item_id,
            file: record.download_file,
            bytes: record.bytes,
        })
    }
}
