//! Link extraction from a loaded page

use crate::session::{Page, RenderResult};

/// Returns the first `max_links` anchor targets of the page's document
///
/// Targets come back in document order, unfiltered and undeduplicated. When
/// `max_links` is zero the page is not consulted at all.
pub async fn extract_links(page: &mut dyn Page, max_links: usize) -> RenderResult<Vec<String>> {
    if max_links == 0 {
        return Ok(Vec::new());
    }

    let mut links = page.anchor_targets(max_links).await?;
    links.truncate(max_links);
    Ok(links)
}
