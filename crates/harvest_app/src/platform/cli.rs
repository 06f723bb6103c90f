use std::path::PathBuf;

use clap::builder::PossibleValuesParser;
use clap::Parser;
use harvest_core::MediaPolicy;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Resumable media harvester",
    long_about = "Walks a paginated media listing in a real browser, looks up each item's \
    metadata and downloads its best asset. Progress is saved after every item, so an \
    interrupted run picks up where it stopped."
)]
pub struct Cli {
    #[arg(
        long,
        default_value = "photos",
        value_parser = PossibleValuesParser::new(MediaPolicy::NAMES.iter().copied()),
        help = "Which media policy to run."
    )]
    pub media: String,
    #[arg(long, help = "Path to a RON config file. Defaults to ./harvest.ron when present.")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Total downloads to reach, overriding the config file.")]
    pub target: Option<u64>,
    #[arg(long, help = "Stop after this many listing pages in this run.")]
    pub max_pages: Option<u32>,
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, help = "Also write the log to this file.")]
    pub log_file: Option<PathBuf>,
    #[arg(long, short, help = "Log at debug level.")]
    pub verbose: bool,
    #[arg(long, help = "Run the browser without a window, overriding the config file.")]
    pub headless: bool,
    #[arg(
        long,
        help = "Read click-through video metadata from the item page instead of the API."
    )]
    pub page_metadata: bool,
}
