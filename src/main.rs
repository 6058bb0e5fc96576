use chrono::{DateTime, FixedOffset};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use thai_property_crawler::fetch::PageFetcher;
use thai_property_crawler::geocode::{GeocodeCache, NominatimGeocoder};
use thai_property_crawler::listing::Listing;
use thai_property_crawler::location::LocationResolver;
use thai_property_crawler::reference::ReferencePointStore;
use thai_property_crawler::search::SearchParams;
use thai_property_crawler::scrape_and_enrich;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(about = "Scrape DD Property rental listings with distances to reference points")]
struct Args {
    /// City to search in (Phuket, Bangkok, Chiang Mai, Chiang Rai).
    #[arg(long, default_value = "Phuket")]
    city: String,

    /// Number of result pages to scrape.
    #[arg(long, default_value_t = 1, conflicts_with = "all_pages")]
    max_pages: usize,

    /// Scrape every available result page.
    #[arg(long)]
    all_pages: bool,

    /// Minimum monthly price in THB.
    #[arg(long)]
    min_price: Option<u32>,

    /// Maximum monthly price in THB.
    #[arg(long)]
    max_price: Option<u32>,

    /// Bedroom count filter, repeatable (1..5, 5+).
    #[arg(long = "beds")]
    bedrooms: Vec<String>,

    /// Bathroom count filter, repeatable (1..5, 5+).
    #[arg(long = "baths")]
    bathrooms: Vec<String>,

    /// Property type code, repeatable (CONDO, BUNG, VIL, TOWN, LAND, APT).
    #[arg(long = "property-type")]
    property_types: Vec<String>,

    /// Furnishing code, repeatable (FULL, PART, UNFUR).
    #[arg(long)]
    furnishing: Vec<String>,

    /// Maximum floor area in sqm.
    #[arg(long)]
    max_size: Option<u32>,

    /// Geocode cache file.
    #[arg(long, default_value = "location_cache.json")]
    cache_file: PathBuf,

    /// Write the enriched listings as JSON to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ScrapeReport {
    scraped_at: DateTime<FixedOffset>,
    search_url: String,
    listings: Vec<Listing>,
}

fn get_now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(
        &chrono::offset::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    )
    .unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "debug,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();

    let params = SearchParams {
        city: args.city.clone(),
        min_price: args.min_price,
        max_price: args.max_price,
        bedrooms: args.bedrooms,
        bathrooms: args.bathrooms,
        property_types: args.property_types,
        furnishing: args.furnishing,
        max_size: args.max_size,
    };
    let search_url = params.build_url();
    let max_pages = if args.all_pages {
        None
    } else {
        Some(args.max_pages)
    };

    let mut fetcher = PageFetcher::new()?;
    let mut resolver = LocationResolver::new(
        NominatimGeocoder::new()?,
        GeocodeCache::load(&args.cache_file),
    );
    resolver.set_city(&args.city);
    let points = ReferencePointStore::default();

    info!("Search URL: {}", search_url);
    let listings = scrape_and_enrich(
        &mut fetcher,
        &mut resolver,
        &points,
        &search_url,
        max_pages,
    )
    .await?;

    for (i, listing) in listings.iter().enumerate() {
        println!("--- Listing {} ---", i + 1);
        println!("{}", listing);
    }
    info!(
        "{} listings, {} cached locations",
        listings.len(),
        resolver.cache().len()
    );

    if let Some(output) = args.output {
        let report = ScrapeReport {
            scraped_at: get_now(),
            search_url,
            listings,
        };
        tokio::fs::write(&output, serde_json::to_string_pretty(&report)?).await?;
        info!("Wrote report to {}", output.display());
    }

    Ok(())
}
