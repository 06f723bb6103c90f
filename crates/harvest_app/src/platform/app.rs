use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use harvest_core::{MediaPolicy, MetadataPlan, ProgressState};
use harvest_engine::{
    ensure_output_dir, DownloadManager, DownloadSettings, FetchSettings, HarvestOrchestrator,
    HarvestSettings, HttpMetadataSource, ItemResolver, MetadataLog, MetadataSource,
    PageController, PageMetadataSource, ProgressStore, ResolverSettings, RunSummary,
    ScrapeSettings, WalkerSettings,
};
use harvest_logging::{harvest_error, harvest_info, harvest_warn, LogDestination};
use log::LevelFilter;

use super::browser::{BrowserSettings, ChromiumPage};
use super::cli::Cli;
use super::config::{load_config, HarvestConfig};
use super::progress::ProgressDisplay;

const BROWSER_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn run_app() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match &cli.log_file {
        Some(path) => harvest_logging::initialize(LogDestination::Both, level, path),
        None => {
            harvest_logging::initialize(LogDestination::Terminal, level, Path::new("harvest.log"))
        }
    }

    let config = load_config(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    runtime.block_on(harvest(cli, config))
}

async fn harvest(cli: Cli, config: HarvestConfig) -> Result<()> {
    let mut policy = MediaPolicy::from_name(&cli.media)
        .with_context(|| format!("unknown media kind {:?}", cli.media))?;
    if cli.page_metadata || config.page_metadata {
        if !policy.is_interactive() && policy.needs_api_key() {
            harvest_warn!("{} needs the API for asset URLs; ignoring page metadata", policy.name);
        }
        policy = policy.with_page_metadata();
    }
    let source = metadata_source(&policy, cli.api_key)?;

    let kind_dir = config.kind_dir(policy.kind.as_str());
    let files_dir = kind_dir.join("files");
    let store = ProgressStore::in_dir(&kind_dir);
    let mut state = store
        .load()
        .with_context(|| format!("cannot resume from {:?}", store.path()))?;

    let target = cli.target.unwrap_or(config.target_downloads);
    if state.target_reached(target) {
        harvest_info!(
            "Already have {} of {} {}; nothing to do",
            state.total_downloaded(),
            target,
            policy.name
        );
        return Ok(());
    }
    harvest_info!(
        "Harvesting {} from page {} ({} of {} downloaded)",
        policy.name,
        state.current_page(),
        state.total_downloaded(),
        target
    );

    let resolver = ItemResolver::new(source, policy.delivery.clone(), ResolverSettings::default());
    let downloader =
        DownloadManager::new(DownloadSettings::default()).context("cannot build download client")?;

    let mut settings = HarvestSettings::new(files_dir.clone(), target);
    settings.max_pages = cli.max_pages.or(config.max_pages);
    settings.item_open_delay = config.item_open_delay();
    settings.clock = Arc::new(|| Utc::now().to_rfc3339());

    let display = Arc::new(ProgressDisplay::new(target, state.total_downloaded()));
    let orchestrator = HarvestOrchestrator::new(
        &policy,
        settings,
        resolver,
        downloader,
        store,
        MetadataLog::in_dir(&kind_dir),
    )
    .with_walker_settings(
        &policy,
        WalkerSettings {
            settle_delay: config.settle_delay(),
            max_scrolls: config.max_scrolls,
            ..WalkerSettings::default()
        },
    )
    .with_sink(display.clone());

    ensure_output_dir(&files_dir)?;
    let mut page = ChromiumPage::launch(&BrowserSettings {
        executable: config.browser_executable.clone(),
        headless: cli.headless || config.headless,
        download_dir: files_dir,
        request_timeout: BROWSER_REQUEST_TIMEOUT,
    })
    .await
    .context("cannot launch browser")?;

    let result = run_until_interrupted(&orchestrator, &mut page, &mut state).await;
    if let Err(err) = page.shutdown().await {
        harvest_warn!("Browser shutdown failed: {}", err);
    }
    display.finish();

    match result {
        Ok(Some(summary)) => {
            harvest_info!(
                "Run finished ({:?}): {} downloaded, {} skipped over {} pages; {} of {} total",
                summary.stop,
                summary.downloaded,
                summary.skipped,
                summary.pages_visited,
                state.total_downloaded(),
                target
            );
            Ok(())
        }
        Ok(None) => {
            harvest_warn!(
                "Interrupted; progress saved at page {} with {} downloaded",
                state.current_page(),
                state.total_downloaded()
            );
            Ok(())
        }
        Err(err) => {
            harvest_error!("Run aborted: {}", err);
            Err(err).context("harvest run aborted")
        }
    }
}

fn metadata_source(
    policy: &MediaPolicy,
    api_key: Option<String>,
) -> Result<Box<dyn MetadataSource>> {
    match &policy.metadata {
        MetadataPlan::Api { endpoint } => {
            let api_key = api_key
                .filter(|key| !key.trim().is_empty())
                .context("no API key: set API_KEY or pass --api-key")?;
            let source = HttpMetadataSource::new(endpoint, api_key, &FetchSettings::default())
                .context("cannot build metadata client")?;
            Ok(Box::new(source))
        }
        MetadataPlan::Page(scrape) => Ok(Box::new(PageMetadataSource::new(
            scrape.clone(),
            ScrapeSettings::default(),
        ))),
    }
}

/// `Ok(None)` when Ctrl-C arrived first. The in-flight item is dropped; its
/// URL is not yet marked processed, so the next run retries it.
async fn run_until_interrupted(
    orchestrator: &HarvestOrchestrator<Box<dyn MetadataSource>>,
    page: &mut dyn PageController,
    state: &mut ProgressState,
) -> Result<Option<RunSummary>, harvest_engine::HarvestError> {
    tokio::select! {
        result = orchestrator.run(page, state) => result.map(Some),
        _ = tokio::signal::ctrl_c() => Ok(None),
    }
}
