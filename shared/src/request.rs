//! Common request types
//!
//! Query parameter types shared across API endpoints

/// Pagination query parameters
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PaginationQuery {
    /// Page number (1-based, default: 1)
    #[serde(default = "default_page")]
    pub page: u32,

    /// Items per page (default: 20, max: 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl PaginationQuery {
    /// Get the offset for storage queries
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1)) as u64 * self.limit() as u64
    }

    /// Get the limit (clamped to max 100)
    pub fn limit(&self) -> u32 {
        std::cmp::min(self.per_page, 100)
    }
}
