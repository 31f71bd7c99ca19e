use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    /// Returns `(page, per_page, offset)`. Pages whose offset overflows are rejected.
    pub fn normalize(&self) -> AppResult<(i64, i64, i64)> {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::BadRequest("Page is out of range".into()))?;
        Ok((page, per_page, offset))
    }
}

// Not flattened: serde_urlencoded cannot parse numbers through #[serde(flatten)].
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ItemQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Case-sensitive substring of the title or description.
    pub q: Option<String>,
}

impl ItemQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn search(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
