use crate::error::CrawlError;
use crate::extract;
use crate::fetch::PageFetcher;
use crate::listing::Listing;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::{debug, info};

/// Path component after which the page-number segment is injected.
const LISTING_TYPE_SEGMENT: &str = "/property-for-rent";

lazy_static! {
    static ref PAGE_LINK: Selector = Selector::parse("ul.pagination a").expect("Invalid selector");
}

/// Source of page bodies, keyed by URL. The scrape loop runs against
/// this seam so it can be driven by canned pages in tests.
#[async_trait::async_trait]
pub trait PageSource {
    async fn fetch(&mut self, url: &str) -> Result<String, CrawlError>;
}

#[async_trait::async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&mut self, url: &str) -> Result<String, CrawlError> {
        PageFetcher::fetch(self, url).await
    }
}

/// Highest numeric page indicator in the pagination widget; a page
/// without the widget is a single-page result set.
pub fn total_pages(doc: &Html) -> usize {
    doc.select(&PAGE_LINK)
        .filter_map(|a| a.text().collect::<String>().trim().parse::<usize>().ok())
        .max()
        .unwrap_or(1)
}

/// Build the URL for page `page` of a search. Page 1 is the base URL
/// unchanged; later pages get a page-number path segment directly after
/// the listing-type component (or at the end of the path when that
/// component is absent), preserving the query string as-is.
pub fn page_url(base: &str, page: usize) -> String {
    if page <= 1 {
        return base.to_string();
    }
    let (path, query) = match base.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (base, None),
    };
    let path = match path.find(LISTING_TYPE_SEGMENT) {
        Some(idx) => {
            let after = idx + LISTING_TYPE_SEGMENT.len();
            format!("{}/{}{}", &path[..after], page, &path[after..])
        }
        None => format!("{}/{}", path.trim_end_matches('/'), page),
    };
    match query {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    }
}

/// Drive the fetch/extract cycle across result pages.
///
/// The total page count is derived from page 1. The loop stops at the
/// first of: an empty page, the caller's `max_pages`, the derived total.
/// Accumulated listings are returned in page order; a transport failure
/// propagates.
pub async fn scrape_all_pages<S: PageSource + Send>(
    fetcher: &mut S,
    base_url: &str,
    max_pages: Option<usize>,
) -> Result<Vec<Listing>, CrawlError> {
    let mut listings = Vec::new();
    if max_pages == Some(0) {
        return Ok(listings);
    }

    let html = fetcher.fetch(base_url).await?;
    let (page_listings, total) = {
        let doc = Html::parse_document(&html);
        (extract::extract(&doc), total_pages(&doc))
    };
    info!("Page 1/{}: {} listings", total, page_listings.len());
    if page_listings.is_empty() {
        return Ok(listings);
    }
    listings.extend(page_listings);

    let last = match max_pages {
        Some(max_pages) => total.min(max_pages),
        None => total,
    };

    for page in 2..=last {
        let url = page_url(base_url, page);
        let html = fetcher.fetch(&url).await?;
        let page_listings = {
            let doc = Html::parse_document(&html);
            extract::extract(&doc)
        };
        info!("Page {}/{}: {} listings", page, total, page_listings.len());
        if page_listings.is_empty() {
            debug!("Empty page before total_pages, treating as end of results");
            break;
        }
        listings.extend(page_listings);
    }

    Ok(listings)
}
