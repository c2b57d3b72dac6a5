//! Request handlers.

mod anime;
mod stats;
mod tags;

pub use anime::{get_anime, get_relations};
pub use stats::get_stats;
pub use tags::{list_tags, search_tags};

/// Lenient boolean query flag. Unknown values fall back to `default`.
pub(crate) fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(None, false));
        assert!(!parse_flag(Some("false"), true));
        assert!(!parse_flag(Some("0"), true));
        assert!(parse_flag(Some("Yes"), false));
        assert!(parse_flag(Some("maybe"), true));
    }
}
