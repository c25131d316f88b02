use serde::Serialize;

/// Canonical form of one source market document, ready to write to the graph.
///
/// Produced by [`crate::normalize`]. An empty `id` means no identifier could
/// be extracted and the record must be rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub ticker: String,
    pub volume: f64,
    pub comment_count: i64,
    pub image: String,
    pub icon: String,
    pub resolution_source: String,
    pub published_at: String,
    pub updated_at: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: Option<String>,
    pub closed_time: Option<String>,
    pub category: Option<String>,
    pub series_slug: Option<String>,
}

impl MarketRecord {
    /// Something a human can use to find the document again when it is
    /// logged, even if it has no usable id.
    pub fn label(&self) -> &str {
        [&self.id, &self.slug, &self.title]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("<unidentified>")
    }
}
