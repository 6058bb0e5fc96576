use crate::error::CrawlError;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Free-text query to optional (latitude, longitude). The trait is the
/// seam that lets the resolver and the reference-point store run against
/// a stub in tests.
#[async_trait::async_trait]
pub trait Geocoder {
    async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>, CrawlError>;
}

const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
/// Nominatim's usage policy: at most one request per second.
const GEOCODE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// Nominatim client with fixed request pacing.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new() -> Result<NominatimGeocoder, CrawlError> {
        Self::with_endpoint(NOMINATIM_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<NominatimGeocoder, CrawlError> {
        let client = Client::builder()
            .user_agent("thai-property-crawler")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(NominatimGeocoder {
            client,
            endpoint: endpoint.to_string(),
            last_request: Mutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>, CrawlError> {
        {
            let mut last_request = self.last_request.lock().await;
            if let Some(last) = last_request.take() {
                let elapsed = last.elapsed();
                if elapsed < GEOCODE_DELAY {
                    tokio::time::sleep(GEOCODE_DELAY - elapsed).await;
                }
            }
            last_request.replace(Instant::now());
        }

        debug!("Geocode \"{}\"", query);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::BadStatus {
                status,
                url: self.endpoint.clone(),
            });
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        Ok(places.first().and_then(|place| {
            match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
                (Ok(lat), Ok(lon)) => Some((lat, lon)),
                _ => {
                    warn!("Unparsable coordinates in geocoder response for \"{}\"", query);
                    None
                }
            }
        }))
    }
}

/// Address-to-coordinates lookup cache, optionally backed by a JSON file
/// (a flat object of address to `[lat, lon]`). A hit is reused verbatim,
/// never re-validated against the live geocoder.
pub struct GeocodeCache {
    entries: HashMap<String, (f64, f64)>,
    path: Option<PathBuf>,
}

impl GeocodeCache {
    pub fn in_memory() -> GeocodeCache {
        GeocodeCache {
            entries: HashMap::new(),
            path: None,
        }
    }

    /// File-backed cache. A missing or unreadable file starts empty; it
    /// is (re)written on the first successful insert.
    pub fn load(path: impl AsRef<Path>) -> GeocodeCache {
        let path = path.as_ref();
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Corrupt geocode cache {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) => {
                debug!("No geocode cache at {}: {}", path.display(), e);
                HashMap::new()
            }
        };
        debug!(
            "Loaded {} cached locations from {}",
            entries.len(),
            path.display()
        );
        GeocodeCache {
            entries,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn get(&self, address: &str) -> Option<(f64, f64)> {
        self.entries.get(address).copied()
    }

    /// Store a resolved address and persist the cache when file-backed.
    /// A save failure is logged, not surfaced; the in-memory entry stays.
    pub fn insert(&mut self, address: String, coordinates: (f64, f64)) {
        self.entries.insert(address, coordinates);
        if let Some(path) = &self.path {
            if let Err(e) = self.save(path) {
                warn!("Failed to save geocode cache {}: {}", path.display(), e);
            }
        }
    }

    fn save(&self, path: &Path) -> Result<(), CrawlError> {
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) struct StubGeocoder {
    pub places: HashMap<String, (f64, f64)>,
    pub calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl StubGeocoder {
    pub fn new(places: &[(&str, (f64, f64))]) -> StubGeocoder {
        StubGeocoder {
            places: places
                .iter()
                .map(|(q, c)| (q.to_string(), *c))
                .collect(),
            calls: std::sync::Mutex::new(vec![]),
        }
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Geocoder for StubGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>, CrawlError> {
        self.calls.lock().unwrap().push(query.to_string());
        Ok(self.places.get(query).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn cache_save_then_load_round_trips_coordinates() {
        let path = scratch_path("geocode_cache_roundtrip.json");
        let _ = std::fs::remove_file(&path);

        let mut cache = GeocodeCache::load(&path);
        assert!(cache.is_empty());
        cache.insert("Rawai, Muang Phuket, Phuket".to_string(), (7.7781, 98.3307));
        cache.insert("Patong, Kathu, Phuket".to_string(), (7.9039, 98.2970));

        let reloaded = GeocodeCache::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get("Rawai, Muang Phuket, Phuket"),
            Some((7.7781, 98.3307))
        );
        assert_eq!(reloaded.get("Patong, Kathu, Phuket"), Some((7.9039, 98.2970)));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn corrupt_cache_file_starts_empty() {
        let path = scratch_path("geocode_cache_corrupt.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = GeocodeCache::load(&path);
        assert!(cache.is_empty());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn in_memory_cache_has_no_backing_file() {
        let mut cache = GeocodeCache::in_memory();
        cache.insert("Kathu, Phuket".to_string(), (7.9191, 98.3332));
        assert_eq!(cache.get("Kathu, Phuket"), Some((7.9191, 98.3332)));
        assert_eq!(cache.get("Chalong, Phuket"), None);
    }
}
