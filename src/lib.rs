//! Scraper for DD Property rental listings: paginated search results are
//! fetched with a warmed-up spoofed session, listing records are lifted
//! out of the JSON payload embedded in the page markup, and each record
//! is enriched with geocoded coordinates and distances to a configurable
//! set of reference points. Geocoder lookups go through a file-backed
//! cache.

use tracing::info;

pub mod error;
pub mod extract;
pub mod fetch;
pub mod geocode;
pub mod listing;
pub mod location;
pub mod pagination;
pub mod reference;
pub mod search;

pub use error::CrawlError;
pub use listing::Listing;

use geocode::Geocoder;
use location::LocationResolver;
use pagination::PageSource;
use reference::ReferencePointStore;

/// Run one full scrape: collect listings across result pages, then
/// resolve each listing's location and distances. Enrichment failures
/// degrade per listing; only a transport failure aborts.
pub async fn scrape_and_enrich<S: PageSource + Send, G: Geocoder>(
    fetcher: &mut S,
    resolver: &mut LocationResolver<G>,
    points: &ReferencePointStore,
    base_url: &str,
    max_pages: Option<usize>,
) -> Result<Vec<Listing>, CrawlError> {
    let mut listings = pagination::scrape_all_pages(fetcher, base_url, max_pages).await?;
    info!("Scraped {} listings, resolving locations", listings.len());

    for listing in &mut listings {
        resolver.enrich(listing, points).await;
    }
    Ok(listings)
}
