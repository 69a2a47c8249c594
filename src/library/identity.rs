// src/library/identity.rs
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::FolderIdentity;

static FOLDER_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)\s*\((\d{4})\)").expect("folder year regex"));

/// Split a folder name like `"Inception (2010)"` into title and year.
///
/// A name without a `(dddd)` group comes back whole with `year: None`; the walker reads
/// that as "organizational folder, recurse into it".
pub fn parse_folder_name(name: &str) -> FolderIdentity {
    if let Some(caps) = FOLDER_YEAR_RE.captures(name) {
        let title = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let year = caps.get(2).and_then(|m| m.as_str().parse::<i32>().ok());
        if !title.is_empty() {
            if let Some(year) = year {
                return FolderIdentity {
                    title: title.to_string(),
                    year: Some(year),
                };
            }
        }
    }

    FolderIdentity {
        title: name.to_string(),
        year: None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_folder_name;

    fn parsed(name: &str) -> (String, Option<i32>) {
        let id = parse_folder_name(name);
        (id.title, id.year)
    }

    #[test]
    fn title_and_year() {
        assert_eq!(parsed("Inception (2010)"), ("Inception".into(), Some(2010)));
        assert_eq!(parsed("  Alien(1979)"), ("Alien".into(), Some(1979)));
        assert_eq!(
            parsed("The Good, the Bad and the Ugly (1966)"),
            ("The Good, the Bad and the Ugly".into(), Some(1966))
        );
    }

    #[test]
    fn trailing_text_after_year_is_ignored() {
        assert_eq!(parsed("Heat (1995) [1080p]"), ("Heat".into(), Some(1995)));
    }

    #[test]
    fn numeric_titles_keep_their_digits() {
        assert_eq!(parsed("2012 (2009)"), ("2012".into(), Some(2009)));
        assert_eq!(parsed("1917 (2019)"), ("1917".into(), Some(2019)));
    }

    #[test]
    fn names_without_year_are_containers() {
        assert_eq!(parsed("Christopher Nolan"), ("Christopher Nolan".into(), None));
        assert_eq!(parsed("Heat (95)"), ("Heat (95)".into(), None));
        assert_eq!(parsed("(1999)"), ("(1999)".into(), None));
        assert_eq!(parsed("Up (20100)"), ("Up (20100)".into(), None));
    }
}
