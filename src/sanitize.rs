use lazy_regex::lazy_regex;

pub const MAX_LEN: usize = 50;

/// Turns arbitrary text (pack titles, emoji) into something usable as part of
/// a file name: strips `<>:"/\|?*`, replaces line breaks with spaces, trims
/// and keeps at most [`MAX_LEN`] characters.
pub fn sanitize(name: &str) -> String {
    let stripped = lazy_regex!(r#"[<>:"/\\|?*]"#).replace_all(name, "");
    let spaced = stripped.replace(['\n', '\r'], " ");
    spaced.trim().chars().take(MAX_LEN).collect()
}
