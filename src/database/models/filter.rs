use serde::{Deserialize, Serialize};

/// Predicates and pagination for listing entities
///
/// Absent predicates impose no constraint. Pagination only applies when
/// both `page` and `per_page` are present and `per_page > 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Exact title match
    pub title: Option<String>,
    /// Exact verification status match
    pub verified: Option<bool>,
    /// 1-based page number; 0 is treated as 1
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl EntityFilter {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    /// LIMIT/OFFSET to apply, if any
    pub fn pagination(&self) -> Option<Pagination> {
        match (self.page, self.per_page) {
            (Some(page), Some(per_page)) => Pagination::new(page, per_page),
            _ => None,
        }
    }
}

/// Resolved LIMIT/OFFSET pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Returns `None` when `per_page` is zero
    ///
    /// The offset saturates at `i64::MAX`; a page that far out is simply empty.
    pub fn new(page: u32, per_page: u32) -> Option<Self> {
        if per_page == 0 {
            return None;
        }

        let page = i64::from(page.max(1));
        let per_page = i64::from(per_page);

        Some(Self {
            limit: per_page,
            offset: (page - 1).saturating_mul(per_page),
        })
    }
}
