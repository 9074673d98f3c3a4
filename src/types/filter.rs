//! Catalog filters and pagination

use serde::{Deserialize, Serialize};

use super::video::{Resolution, VideoStatus, VideoSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    CreatedAt,
    Title,
    Duration,
    FileSize,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::CreatedAt => "createdAt",
            SortBy::Title => "title",
            SortBy::Duration => "duration",
            SortBy::FileSize => "fileSize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Catalog filters. `None` means "all" and is left out of the query.
///
/// ```rust
/// # use weub::types::{VideoFilters, SortBy, VideoStatus};
/// let filters = VideoFilters::new()
///     .status(VideoStatus::Ready)
///     .search("cats")
///     .tag("funny")
///     .sort_by(SortBy::Title);
/// assert_eq!(filters.active_count(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFilters {
    pub status: Option<VideoStatus>,
    pub search: Option<String>,
    pub tags: Vec<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub date_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub date_to: Option<String>,
    pub resolution: Option<Resolution>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl VideoFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: VideoStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn date_range(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    /// Number of filters that narrow the result set (sorting counts as one).
    pub fn active_count(&self) -> usize {
        [
            self.status.is_some(),
            self.search_term().is_some(),
            !self.tags.is_empty(),
            self.date_from.is_some() || self.date_to.is_some(),
            self.resolution.is_some(),
            self.sort_by.is_some() || self.sort_order.is_some(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Query pairs in a stable order. Tags repeat the `tags` key.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(status) = &self.status {
            query.push(("status".to_string(), status.to_string()));
        }
        if let Some(search) = self.search_term() {
            query.push(("search".to_string(), search.to_string()));
        }
        for tag in &self.tags {
            query.push(("tags".to_string(), tag.clone()));
        }
        if let Some(from) = &self.date_from {
            query.push(("dateFrom".to_string(), from.clone()));
        }
        if let Some(to) = &self.date_to {
            query.push(("dateTo".to_string(), to.clone()));
        }
        if let Some(resolution) = &self.resolution {
            query.push(("resolution".to_string(), resolution.to_string()));
        }
        if let Some(sort_by) = &self.sort_by {
            query.push(("sortBy".to_string(), sort_by.as_str().to_string()));
        }
        if let Some(order) = &self.sort_order {
            query.push(("sortOrder".to_string(), order.as_str().to_string()));
        }
        query
    }
}

/// Requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// One page of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoPage {
    pub videos: Vec<VideoSummary>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_produce_no_query() {
        assert!(VideoFilters::new().to_query().is_empty());
        assert_eq!(VideoFilters::new().active_count(), 0);
    }

    #[test]
    fn blank_search_is_ignored() {
        let filters = VideoFilters::new().search("   ");
        assert!(filters.to_query().is_empty());
        assert_eq!(filters.active_count(), 0);
    }

    #[test]
    fn tags_repeat_the_key() {
        let query = VideoFilters::new().tag("a").tag("b").to_query();
        assert_eq!(
            query,
            vec![
                ("tags".to_string(), "a".to_string()),
                ("tags".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn full_filter_order_is_stable() {
        let query = VideoFilters::new()
            .status(VideoStatus::Ready)
            .search(" cats ")
            .date_range(Some("2025-01-01".into()), None)
            .resolution(Resolution::P720)
            .sort_by(SortBy::CreatedAt)
            .sort_order(SortOrder::Desc)
            .to_query();
        let keys: Vec<&str> = query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            ["status", "search", "dateFrom", "resolution", "sortBy", "sortOrder"]
        );
        assert_eq!(query[1].1, "cats");
        assert_eq!(query[3].1, "720p");
    }
}
