use chrono::{DateTime, Utc};
use serde::Serialize;

const TITLE_PREVIEW_CHARS: usize = 25;
const DESCRIPTION_PREVIEW_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsSource {
    pub name: String,
    pub url: Option<String>,
}

/// A local news article, already validated at the backend boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub image: Option<String>,
    pub source: Option<NewsSource>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn title_preview(&self) -> String {
        truncate_chars(&self.title, TITLE_PREVIEW_CHARS)
    }

    pub fn description_preview(&self) -> String {
        truncate_chars(&self.description, DESCRIPTION_PREVIEW_CHARS)
    }

    pub fn source_name(&self) -> &str {
        self.source.as_ref().map(|s| s.name.as_str()).unwrap_or("")
    }

    pub fn published_date(&self) -> String {
        self.published_at
            .map(|d| d.format("%Y/%m/%d").to_string())
            .unwrap_or_default()
    }

    fn matches(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }
}

/// Case-insensitive search over title and description. An empty query keeps everything.
pub fn filter_news<'a>(items: &'a [NewsItem], query: &str) -> Vec<&'a NewsItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    items.iter().filter(|n| n.matches(&needle)).collect()
}

/// Cut to `max` characters (not bytes) and append an ellipsis when shortened.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, description: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            description: description.to_string(),
            url: "https://news.example/a".to_string(),
            image: None,
            source: None,
            published_at: None,
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("大阪府のニュース", 3), "大阪府...");
        assert_eq!(truncate_chars("short", 25), "short");
        assert_eq!(truncate_chars("exactly5", 8), "exactly5");
    }

    #[test]
    fn filter_matches_title_or_description() {
        let items = vec![
            item("Rain in Osaka", "weather"),
            item("Festival", "Osaka castle lights"),
            item("Tokyo", "trains"),
        ];

        let hits = filter_news(&items, "osaka");
        assert_eq!(hits.len(), 2);
        assert_eq!(filter_news(&items, "").len(), 3);
        assert!(filter_news(&items, "kyoto").is_empty());
    }

    #[test]
    fn previews_use_fixed_lengths() {
        let n = item(&"a".repeat(30), &"b".repeat(50));
        assert_eq!(n.title_preview(), format!("{}...", "a".repeat(25)));
        assert_eq!(n.description_preview(), format!("{}...", "b".repeat(40)));
    }
}
