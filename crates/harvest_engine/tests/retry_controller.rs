mod support;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use harvest_core::{Delivery, InteractiveFlow, MediaPolicy, SkipReason};
use harvest_engine::{FlowResult, PageController, PollSpec, RetryController, RetrySettings};
use pretty_assertions::assert_eq;
use support::{init_logging, FakePage};
use tempfile::TempDir;

const ITEM: &str = "https://pixabay.com/videos/clip-7/";
const TRIGGER: &str = "button.fullWidthTrigger--c4aeO";
const OPTIONS: &str = "label.input--b6Wi1 input";
const CONFIRM: &str = "a.buttonBase--r4opq:not([target='_blank'])";

fn flow() -> InteractiveFlow {
    match MediaPolicy::videos_interactive().delivery {
        Delivery::Interactive(flow) => flow,
        Delivery::Direct(_) => unreachable!("interactive preset"),
    }
}

fn settings() -> RetrySettings {
    let quick = PollSpec::new(Duration::from_millis(1), Duration::from_millis(20));
    RetrySettings {
        max_attempts: 3,
        element_wait: quick,
        confirm_wait: quick,
        file_wait: PollSpec::new(Duration::from_millis(5), Duration::from_millis(30)),
        step_delay: Duration::from_millis(1),
    }
}

fn item_page(options: &[&str]) -> FakePage {
    let attrs: Vec<[(&str, &str); 1]> = options.iter().map(|value| [("value", *value)]).collect();
    let attrs: Vec<&[(&str, &str)]> = attrs.iter().map(|pair| pair.as_slice()).collect();
    FakePage::new()
        .with_elements(ITEM, TRIGGER, &[&[]])
        .with_elements(ITEM, OPTIONS, &attrs)
        .with_elements(ITEM, CONFIRM, &[&[]])
}

async fn run(mut page: FakePage, dir: PathBuf) -> (FlowResult, FakePage) {
    page.navigate(ITEM).await.unwrap();
    let controller = RetryController::new(flow(), "mp4", dir, settings());
    let result = controller.run(&mut page).await;
    (result, page)
}

#[tokio::test]
async fn picks_source_option_and_detects_file() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let drop_dir = dir.clone();
    let page = item_page(&["clip_1280.mp4", "clip_source.mp4"]).on_click(move |_, locator| {
        if locator.selector == CONFIRM {
            fs::write(drop_dir.join("clip_source.mp4"), b"video").unwrap();
        }
    });

    let (result, page) = run(page, dir).await;

    assert_eq!(
        result,
        FlowResult::Done {
            file_name: "clip_source.mp4".to_string(),
            attempts: 1
        }
    );
    let clicked: Vec<(&str, usize)> = page
        .clicks
        .iter()
        .map(|(_, locator)| (locator.selector.as_str(), locator.index))
        .collect();
    assert_eq!(clicked, vec![(TRIGGER, 0), (OPTIONS, 1), (CONFIRM, 0)]);
    assert_eq!(page.refreshes, 0);
}

#[tokio::test]
async fn missing_file_exhausts_exactly_max_attempts() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let page = item_page(&["clip_source.mp4"]);

    let (result, page) = run(page, temp.path().to_path_buf()).await;

    assert_eq!(
        result,
        FlowResult::Skipped {
            reason: SkipReason::RetriesExhausted { attempts: 3 }
        }
    );
    let triggers = page
        .clicks
        .iter()
        .filter(|(_, locator)| locator.selector == TRIGGER)
        .count();
    assert_eq!(triggers, 3);
    // No refresh after the last attempt.
    assert_eq!(page.refreshes, 2);
}

#[tokio::test]
async fn files_present_before_the_attempt_do_not_count() {
    init_logging();
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("older_source.mp4"), b"old").unwrap();
    let page = item_page(&["clip_source.mp4"]);

    let (result, _) = run(page, temp.path().to_path_buf()).await;

    assert_eq!(
        result,
        FlowResult::Skipped {
            reason: SkipReason::RetriesExhausted { attempts: 3 }
        }
    );
}

#[tokio::test]
async fn files_with_other_extensions_are_ignored() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let drop_dir = dir.clone();
    let page = item_page(&["clip_source.mp4"]).on_click(move |_, locator| {
        if locator.selector == CONFIRM {
            fs::write(drop_dir.join("clip_source.mp4.crdownload"), b"partial").unwrap();
        }
    });

    let (result, _) = run(page, dir).await;
    assert!(matches!(
        result,
        FlowResult::Skipped {
            reason: SkipReason::RetriesExhausted { .. }
        }
    ));
}

#[tokio::test]
async fn download_in_flight_before_the_attempt_is_not_taken_for_this_one() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    fs::write(dir.join("a_earlier.mp4.crdownload"), b"partial").unwrap();
    let drop_dir = dir.clone();
    let page = item_page(&["clip_source.mp4"]).on_click(move |_, locator| {
        if locator.selector == CONFIRM {
            fs::remove_file(drop_dir.join("a_earlier.mp4.crdownload")).ok();
            fs::write(drop_dir.join("a_earlier.mp4"), b"earlier").unwrap();
            fs::write(drop_dir.join("b_clip_source.mp4"), b"video").unwrap();
        }
    });

    let (result, _) = run(page, dir).await;

    assert_eq!(
        result,
        FlowResult::Done {
            file_name: "b_clip_source.mp4".to_string(),
            attempts: 1
        }
    );
}

#[tokio::test]
async fn only_an_earlier_download_finishing_is_not_a_success() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    fs::write(dir.join("earlier.mp4.crdownload"), b"partial").unwrap();
    let drop_dir = dir.clone();
    let page = item_page(&["clip_source.mp4"]).on_click(move |_, locator| {
        if locator.selector == CONFIRM && !drop_dir.join("earlier.mp4").exists() {
            fs::write(drop_dir.join("earlier.mp4"), b"earlier").unwrap();
        }
    });

    let (result, _) = run(page, dir).await;

    assert_eq!(
        result,
        FlowResult::Skipped {
            reason: SkipReason::RetriesExhausted { attempts: 3 }
        }
    );
}

#[tokio::test]
async fn no_matching_option_is_a_permanent_skip() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let page = item_page(&["clip_640.mp4", "clip_1280.mp4"]);

    let (result, page) = run(page, temp.path().to_path_buf()).await;

    assert_eq!(
        result,
        FlowResult::Skipped {
            reason: SkipReason::NoMatchingOption
        }
    );
    assert_eq!(page.refreshes, 0);
    assert_eq!(page.clicks.len(), 1);
}

#[tokio::test]
async fn absent_options_are_a_permanent_skip() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let page = FakePage::new().with_elements(ITEM, TRIGGER, &[&[]]);

    let (result, _) = run(page, temp.path().to_path_buf()).await;
    assert_eq!(
        result,
        FlowResult::Skipped {
            reason: SkipReason::NoMatchingOption
        }
    );
}

#[tokio::test]
async fn missing_trigger_is_retried() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let page = FakePage::new().with_elements(ITEM, OPTIONS, &[&[("value", "clip_source.mp4")]]);

    let (result, page) = run(page, temp.path().to_path_buf()).await;

    assert_eq!(
        result,
        FlowResult::Skipped {
            reason: SkipReason::RetriesExhausted { attempts: 3 }
        }
    );
    assert!(page.clicks.is_empty());
}

#[tokio::test]
async fn confirmation_control_is_optional() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let drop_dir = dir.clone();
    let page = FakePage::new()
        .with_elements(ITEM, TRIGGER, &[&[]])
        .with_elements(ITEM, OPTIONS, &[&[("value", "clip_source.mp4")]])
        .on_click(move |_, locator| {
            if locator.selector == OPTIONS {
                fs::write(drop_dir.join("clip_source.mp4"), b"video").unwrap();
            }
        });

    let (result, _) = run(page, dir).await;
    assert!(matches!(result, FlowResult::Done { attempts: 1, .. }));
}
