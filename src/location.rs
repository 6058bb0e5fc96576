use crate::geocode::{GeocodeCache, Geocoder};
use crate::listing::{Listing, Location};
use crate::reference::ReferencePointStore;
use tracing::{debug, warn};

/// Join the non-empty parts of (area, district, region) with ", ", in
/// that fixed order. All-empty yields `None` and must trigger no lookup.
pub fn synthesize_address(location: &Location) -> Option<String> {
    let parts: Vec<&str> = [&location.area, &location.district, &location.region]
        .iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Key under which a coordinate groups with others at 6-decimal
/// precision; listings resolving to the same key are one map location.
pub fn coordinate_key((lat, lon): (f64, f64)) -> String {
    format!("{:.6},{:.6}", lat, lon)
}

/// Resolves free-text addresses to coordinates, cache first, geocoder on
/// miss. Geocoding failures degrade to absent coordinates and are never
/// surfaced to the caller.
pub struct LocationResolver<G: Geocoder> {
    geocoder: G,
    cache: GeocodeCache,
    city: String,
}

impl<G: Geocoder> LocationResolver<G> {
    pub fn new(geocoder: G, cache: GeocodeCache) -> LocationResolver<G> {
        LocationResolver {
            geocoder,
            cache,
            city: "Phuket".to_string(),
        }
    }

    /// Switch the city qualifier appended to simplified geocoder queries.
    pub fn set_city(&mut self, city: &str) {
        self.city = city.to_string();
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    /// Resolve a synthesized address. The cache is keyed by the full
    /// address; the live query is simplified to the first address
    /// component plus the city/country qualifier, which Nominatim matches
    /// far more reliably than the full marketplace address.
    pub async fn resolve_address(&mut self, address: &str) -> Option<(f64, f64)> {
        if let Some(coordinates) = self.cache.get(address) {
            debug!("Cache hit for \"{}\"", address);
            return Some(coordinates);
        }

        let query = self.simplified_query(address);
        match self.geocoder.geocode(&query).await {
            Ok(Some(coordinates)) => {
                self.cache.insert(address.to_string(), coordinates);
                Some(coordinates)
            }
            Ok(None) => {
                debug!("No geocoder result for \"{}\"", query);
                None
            }
            Err(e) => {
                warn!("Geocoding \"{}\" failed: {}", query, e);
                None
            }
        }
    }

    fn simplified_query(&self, address: &str) -> String {
        let first_component = address.split(", ").next().unwrap_or(address);
        if first_component.contains(&self.city) {
            format!("{}, Thailand", first_component)
        } else {
            format!("{}, {}, Thailand", first_component, self.city)
        }
    }

    /// Fill in a listing's derived location fields: synthesized address,
    /// resolved coordinates, and distances to every current reference
    /// point. Absent inputs propagate as absent outputs.
    pub async fn enrich(&mut self, listing: &mut Listing, points: &ReferencePointStore) {
        let address = synthesize_address(&listing.location);
        let coordinates = match &address {
            Some(address) => self.resolve_address(address).await,
            None => None,
        };
        listing.location.address = address;
        listing.location.coordinates = coordinates;
        listing.location.distances = points.distances(coordinates);
    }
}
