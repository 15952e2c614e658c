//! Paging for directory listings

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// Input for paginated queries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaginationInput {
    pub offset: usize,
    pub limit: usize,
}

impl PaginationInput {
    pub const MAX_LIMIT: usize = 100;

    pub fn validate(&self) -> Result<(), DirectoryError> {
        if self.limit > Self::MAX_LIMIT {
            return Err(DirectoryError::Validation(format!(
                "Limit cannot exceed {}",
                Self::MAX_LIMIT
            )));
        }
        if self.limit == 0 {
            return Err(DirectoryError::Validation(
                "Limit must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PaginationInput {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// One page of results
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Cut a page out of the full result set
    pub fn slice(all: Vec<T>, pagination: &PaginationInput) -> Self {
        let total = all.len();
        let items: Vec<T> = all
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .collect();
        Self {
            has_more: pagination.offset + items.len() < total,
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }
}
