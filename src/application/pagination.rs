//! Offset pagination over a schema's member index.
//!
//! Card pages are cut from the ordered `member_ids` array rather than from a
//! table scan: page `p` of size `l` is `member_ids[p*l .. min(len, (p+1)*l)]`.

use std::collections::HashMap;
use std::num::NonZeroU32;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::SchemaListWindow;
use crate::domain::entities::CardRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("card limit is 0 but page is not")]
    ZeroLimitWithPage,
    #[error("`{field}` must not be negative")]
    Negative { field: &'static str },
}

/// A validated page request over a member index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardPage {
    limit: usize,
    page: usize,
}

impl CardPage {
    /// Resolve raw query arguments. `limit == 0 && page == 0` means no
    /// pagination was requested and falls back to `default_limit`.
    pub fn resolve(limit: i64, page: i64, default_limit: NonZeroU32) -> Result<Self, PaginationError> {
        if limit < 0 {
            return Err(PaginationError::Negative { field: "limit" });
        }
        if page < 0 {
            return Err(PaginationError::Negative { field: "page" });
        }
        if limit == 0 && page != 0 {
            return Err(PaginationError::ZeroLimitWithPage);
        }

        let limit = if limit == 0 {
            default_limit.get() as usize
        } else {
            usize::try_from(limit).unwrap_or(usize::MAX)
        };
        let page = usize::try_from(page).unwrap_or(usize::MAX);

        Ok(Self { limit, page })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Slice the window for this page, or `None` when the page starts past
    /// the end of the index.
    pub fn window<'a, T>(&self, ids: &'a [T]) -> Option<&'a [T]> {
        let start = self.page.checked_mul(self.limit)?;
        if start >= ids.len() {
            return None;
        }
        let end = start.saturating_add(self.limit).min(ids.len());
        Some(&ids[start..end])
    }
}

/// Resolve `limit`/`offset` for the schema listing; `limit <= 0` is unbounded.
pub fn schema_list_window(limit: i64, offset: i64) -> Result<SchemaListWindow, PaginationError> {
    if offset < 0 {
        return Err(PaginationError::Negative { field: "offset" });
    }
    let limit = u64::try_from(limit).ok().filter(|value| *value > 0);
    Ok(SchemaListWindow {
        limit,
        offset: offset as u64,
    })
}

/// Re-order fetched rows to match `window`. Ids with no row are returned
/// separately so callers can report the divergence.
pub fn order_by_window(window: &[Uuid], rows: Vec<CardRecord>) -> (Vec<CardRecord>, Vec<Uuid>) {
    let mut by_id: HashMap<Uuid, CardRecord> = rows.into_iter().map(|row| (row.id, row)).collect();
    let mut ordered = Vec::with_capacity(window.len());
    let mut missing = Vec::new();

    for id in window {
        match by_id.remove(id) {
            Some(row) => ordered.push(row),
            None => missing.push(*id),
        }
    }

    (ordered, missing)
}
