use url::Url;

/// Derive the stable item identifier from a listing link.
///
/// The identifier is the suffix after the last hyphen of the final non-empty
/// path segment: `https://host/videos/ocean-waves-12345/` yields `12345`.
/// Returns `None` when no usable identifier exists or when it would not be a
/// safe filename component.
pub fn derive_item_id(item_url: &str) -> Option<String> {
    let segment = last_path_segment(item_url)?;
    let id = segment.rsplit('-').next()?.trim();
    if id.is_empty() || !id.chars().all(is_id_char) {
        return None;
    }
    Some(id.to_string())
}

/// Deterministic output filename: `{item_id}_source.{extension}`.
pub fn output_filename(item_id: &str, extension: &str) -> String {
    format!("{item_id}_source.{extension}")
}

/// Human words of the item slug, without the trailing id:
/// `https://host/videos/ocean-waves-12345/` yields `ocean waves`.
pub fn slug_words(item_url: &str) -> Option<String> {
    let segment = last_path_segment(item_url)?;
    let mut words: Vec<&str> = segment.split('-').filter(|w| !w.is_empty()).collect();
    words.pop()?;
    if words.is_empty() {
        return None;
    }
    Some(words.join(" "))
}

fn last_path_segment(item_url: &str) -> Option<String> {
    match Url::parse(item_url) {
        Ok(url) => url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()
            .map(str::to_string),
        // Not absolute; fall back to plain splitting.
        Err(_) => item_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string),
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
