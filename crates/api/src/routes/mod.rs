//! Route handlers.

pub mod carts;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use market_store::PageRequest;

/// Builds a [`PageRequest`] from optional query parameters.
pub(crate) fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    PageRequest::new(
        page.unwrap_or(1),
        per_page.unwrap_or(PageRequest::DEFAULT_PER_PAGE),
    )
}
