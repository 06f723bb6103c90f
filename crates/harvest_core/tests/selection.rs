use harvest_core::{
    derive_item_id, output_filename, select_best_available, select_tiered, slug_words,
    AssetVariant, Delivery, MediaKind, MediaPolicy, MetadataPlan, PageScrape, Resolution,
    VariantRule,
};
use pretty_assertions::assert_eq;

fn variant(tier: &str, width: u32, height: u32) -> AssetVariant {
    AssetVariant {
        tier: tier.to_string(),
        url: format!("https://cdn.example/{tier}.mp4"),
        width,
        height,
    }
}

const TIERS: [&str; 3] = ["large", "medium", "small"];

#[test]
fn tiered_selects_first_tier_meeting_floor() {
    let variants = vec![
        variant("large", 1920, 1080),
        variant("medium", 1280, 720),
        variant("small", 640, 360),
    ];
    let chosen = select_tiered(&variants, &TIERS, Resolution::FULL_HD).unwrap();
    assert_eq!(chosen.tier, "large");
}

#[test]
fn tiered_skips_when_nothing_meets_floor() {
    let variants = vec![variant("large", 1600, 900), variant("medium", 1280, 720)];
    assert_eq!(select_tiered(&variants, &TIERS, Resolution::FULL_HD), None);
}

#[test]
fn tiered_requires_both_dimensions() {
    // Wide but short: area beats the floor, height does not.
    let variants = vec![variant("large", 3840, 1000)];
    assert_eq!(select_tiered(&variants, &TIERS, Resolution::FULL_HD), None);
}

#[test]
fn tiered_follows_preference_not_input_order() {
    let variants = vec![variant("medium", 2560, 1440), variant("large", 3840, 2160)];
    let chosen = select_tiered(&variants, &TIERS, Resolution::FULL_HD).unwrap();
    assert_eq!(chosen.tier, "large");
}

#[test]
fn tiered_ignores_tiers_without_url() {
    let mut large = variant("large", 3840, 2160);
    large.url.clear();
    let variants = vec![large, variant("medium", 1920, 1080)];
    let chosen = select_tiered(&variants, &TIERS, Resolution::FULL_HD).unwrap();
    assert_eq!(chosen.tier, "medium");
}

#[test]
fn best_available_prefers_primary_then_fallback() {
    assert_eq!(
        select_best_available(Some("https://a/large.jpg"), Some("https://a/web.jpg")),
        Some("https://a/large.jpg")
    );
    assert_eq!(
        select_best_available(None, Some("https://a/web.jpg")),
        Some("https://a/web.jpg")
    );
    assert_eq!(
        select_best_available(Some(""), Some("https://a/web.jpg")),
        Some("https://a/web.jpg")
    );
    assert_eq!(select_best_available(None, None), None);
    assert_eq!(select_best_available(Some(""), Some("")), None);
}

#[test]
fn item_id_is_suffix_of_last_segment() {
    assert_eq!(
        derive_item_id("https://pixabay.com/videos/ocean-waves-beach-12345/").as_deref(),
        Some("12345")
    );
    assert_eq!(
        derive_item_id("https://pixabay.com/photos/tree-sunset-98765").as_deref(),
        Some("98765")
    );
    assert_eq!(derive_item_id("/videos/river-42/").as_deref(), Some("42"));
    assert_eq!(derive_item_id("https://pixabay.com/"), None);
    assert_eq!(derive_item_id("https://pixabay.com/videos/trailing-/"), None);
}

#[test]
fn item_id_is_stable() {
    let url = "https://pixabay.com/videos/ocean-waves-12345/";
    assert_eq!(derive_item_id(url), derive_item_id(url));
}

#[test]
fn output_filename_is_deterministic() {
    assert_eq!(output_filename("12345", "mp4"), "12345_source.mp4");
}

#[test]
fn presets_keep_strategies_separate() {
    assert_eq!(
        MediaPolicy::videos().delivery,
        Delivery::Direct(VariantRule::video_tiers())
    );
    assert_eq!(
        MediaPolicy::photos().delivery,
        Delivery::Direct(VariantRule::image_fields())
    );
    assert!(MediaPolicy::videos_interactive().is_interactive());
    assert!(MediaPolicy::photos()
        .listing_url_template
        .ends_with("/photos/search/?order=ec&pagi={page}"));
    for name in MediaPolicy::NAMES {
        assert_eq!(MediaPolicy::from_name(name).unwrap().name, *name);
    }
    assert_eq!(MediaPolicy::from_name("music"), None);
}

#[test]
fn slug_words_drop_the_trailing_id() {
    assert_eq!(
        slug_words("https://pixabay.com/videos/ocean-waves-beach-12345/").as_deref(),
        Some("ocean waves beach")
    );
    assert_eq!(slug_words("https://pixabay.com/videos/12345/"), None);
    assert_eq!(slug_words("https://pixabay.com/"), None);
}

#[test]
fn audio_reads_everything_from_the_item_page() {
    let audio = MediaPolicy::audio();
    assert_eq!(audio.kind, MediaKind::Audio);
    assert_eq!(audio.extension, "mp3");
    assert_eq!(audio.metadata, MetadataPlan::Page(PageScrape::audio_details()));
    assert_eq!(audio.delivery, Delivery::Direct(VariantRule::audio_source()));
    assert!(!audio.needs_api_key());
    assert!(MediaPolicy::photos().needs_api_key());
}

#[test]
fn page_metadata_only_replaces_the_api_for_click_through_videos() {
    let interactive = MediaPolicy::videos_interactive().with_page_metadata();
    assert_eq!(
        interactive.metadata,
        MetadataPlan::Page(PageScrape::video_stats())
    );
    assert_eq!(MediaPolicy::videos().with_page_metadata(), MediaPolicy::videos());
}
