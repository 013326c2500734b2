//! Search request model.

use serde::{Deserialize, Serialize};

/// Search query parameters handed to every provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Maximum number of results to return per provider
    pub max_results: usize,

    /// Publication year filter
    pub year: Option<i32>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            year: None,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set year filter
    pub fn year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    /// Whether a date string (ISO or bare year) falls inside the year filter
    pub fn matches_year(&self, date: &str) -> bool {
        match self.year {
            None => true,
            Some(year) => date
                .get(..4)
                .and_then(|y| y.parse::<i32>().ok())
                .is_some_and(|y| y == year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("protein folding").max_results(5).year(Some(2024));
        assert_eq!(query.query, "protein folding");
        assert_eq!(query.max_results, 5);
        assert_eq!(query.year, Some(2024));
    }

    #[test]
    fn test_matches_year() {
        let any = SearchQuery::new("q");
        assert!(any.matches_year(""));

        let filtered = SearchQuery::new("q").year(Some(2024));
        assert!(filtered.matches_year("2024-03-01"));
        assert!(!filtered.matches_year("2023-12-31"));
        assert!(!filtered.matches_year(""));
    }
}
