use crate::geocode::Geocoder;
use crate::location::LocationResolver;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Default distance anchors, reseeded whenever the store would otherwise
/// end up empty.
pub const DEFAULT_REFERENCE_POINTS: &[(&str, (f64, f64))] = &[
    ("Patong Beach", (7.9039, 98.2970)),
    ("Phuket Old Town", (7.8847, 98.3884)),
    ("Phuket Airport", (8.1132, 98.3169)),
];

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two (lat, lon) pairs.
pub fn haversine_km((lat1, lon1): (f64, f64), (lat2, lon2): (f64, f64)) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

fn round2(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReferencePointError {
    #[error("Reference point \"{0}\" already exists")]
    DuplicateLabel(String),
    #[error("Could not resolve \"{0}\" to coordinates")]
    Unresolvable(String),
}

/// Named label-to-coordinate mapping the distance computation runs
/// against. Never left empty: removing the last entry reseeds the
/// defaults.
pub struct ReferencePointStore {
    points: BTreeMap<String, (f64, f64)>,
}

impl Default for ReferencePointStore {
    fn default() -> Self {
        ReferencePointStore {
            points: DEFAULT_REFERENCE_POINTS
                .iter()
                .map(|(label, coordinates)| (label.to_string(), *coordinates))
                .collect(),
        }
    }
}

impl ReferencePointStore {
    /// Resolve `address` and add it under `label`. The store is left
    /// unchanged when the label already exists or the address does not
    /// resolve; the error carries the report for the caller.
    pub async fn add<G: Geocoder>(
        &mut self,
        label: &str,
        address: &str,
        resolver: &mut LocationResolver<G>,
    ) -> Result<(f64, f64), ReferencePointError> {
        if self.points.contains_key(label) {
            return Err(ReferencePointError::DuplicateLabel(label.to_string()));
        }
        let coordinates = resolver
            .resolve_address(address)
            .await
            .ok_or_else(|| ReferencePointError::Unresolvable(address.to_string()))?;
        self.points.insert(label.to_string(), coordinates);
        info!("Added reference point \"{}\" at {:?}", label, coordinates);
        Ok(coordinates)
    }

    /// Remove a point if present. Removing the last entry immediately
    /// reseeds the default set.
    pub fn remove(&mut self, label: &str) -> bool {
        let removed = self.points.remove(label).is_some();
        if removed && self.points.is_empty() {
            info!("Last reference point removed, reseeding defaults");
            *self = ReferencePointStore::default();
        }
        removed
    }

    /// Replace the store wholesale with the default set.
    pub fn reset(&mut self) {
        *self = ReferencePointStore::default();
    }

    /// Distance in km from `coordinates` to every stored point, rounded
    /// to 2 decimals. Absent coordinates yield an empty mapping; an entry
    /// whose distance comes out non-finite is skipped with a warning.
    pub fn distances(&self, coordinates: Option<(f64, f64)>) -> BTreeMap<String, f64> {
        let coordinates = match coordinates {
            Some(coordinates) => coordinates,
            None => return BTreeMap::new(),
        };
        let mut distances = BTreeMap::new();
        for (label, point) in &self.points {
            let km = haversine_km(coordinates, *point);
            if km.is_finite() {
                distances.insert(label.clone(), round2(km));
            } else {
                warn!("Unusable distance to reference point \"{}\"", label);
            }
        }
        distances
    }

    pub fn contains(&self, label: &str) -> bool {
        self.points.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, (f64, f64))> {
        self.points
            .iter()
            .map(|(label, coordinates)| (label.as_str(), *coordinates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{GeocodeCache, StubGeocoder};
    use pretty_assertions::assert_eq;

    const PATONG: (f64, f64) = (7.9039, 98.2970);
    const RAWAI: (f64, f64) = (7.7781, 98.3307);

    fn resolver(places: &[(&str, (f64, f64))]) -> LocationResolver<StubGeocoder> {
        LocationResolver::new(StubGeocoder::new(places), GeocodeCache::in_memory())
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(PATONG, PATONG), 0.0);
    }

    #[test]
    fn distance_is_symmetric_and_rounded() {
        let there = round2(haversine_km(PATONG, RAWAI));
        let back = round2(haversine_km(RAWAI, PATONG));
        assert_eq!(there, back);
        // Patong Beach to Rawai is roughly 14.4 km.
        assert!(there > 13.0 && there < 16.0, "got {}", there);
        // Exactly two decimal places survive the rounding.
        assert_eq!(there, (there * 100.0).round() / 100.0);
    }

    #[test]
    fn absent_coordinates_yield_empty_mapping() {
        let store = ReferencePointStore::default();
        assert!(store.distances(None).is_empty());
    }

    #[test]
    fn distances_cover_every_stored_point() {
        let store = ReferencePointStore::default();
        let distances = store.distances(Some(RAWAI));
        assert_eq!(distances.len(), DEFAULT_REFERENCE_POINTS.len());
        for (label, _) in DEFAULT_REFERENCE_POINTS {
            assert!(distances.contains_key(*label));
        }
    }

    #[tokio::test]
    async fn add_rejects_duplicate_labels_without_mutation() {
        let mut store = ReferencePointStore::default();
        let mut resolver = resolver(&[("Patong, Phuket, Thailand", PATONG)]);
        let before = store.len();

        let result = store.add("Patong Beach", "Patong", &mut resolver).await;

        assert_eq!(
            result,
            Err(ReferencePointError::DuplicateLabel("Patong Beach".to_string()))
        );
        assert_eq!(store.len(), before);
    }

    #[tokio::test]
    async fn add_with_unresolvable_address_leaves_store_unchanged() {
        let mut store = ReferencePointStore::default();
        let mut resolver = resolver(&[]);
        let before = store.len();

        let result = store
            .add("Pier", "unresolvable-address-xyz", &mut resolver)
            .await;

        assert_eq!(
            result,
            Err(ReferencePointError::Unresolvable(
                "unresolvable-address-xyz".to_string()
            ))
        );
        assert_eq!(store.len(), before);
        assert!(!store.contains("Pier"));
    }

    #[tokio::test]
    async fn add_stores_resolved_coordinate() {
        let mut store = ReferencePointStore::default();
        let mut resolver = resolver(&[("Rawai, Phuket, Thailand", RAWAI)]);

        let result = store.add("Rawai Pier", "Rawai", &mut resolver).await;

        assert_eq!(result, Ok(RAWAI));
        assert!(store.contains("Rawai Pier"));
        assert_eq!(store.len(), DEFAULT_REFERENCE_POINTS.len() + 1);
    }

    #[test]
    fn removing_the_last_point_reseeds_defaults() {
        let mut store = ReferencePointStore::default();
        let labels: Vec<String> = store.iter().map(|(label, _)| label.to_string()).collect();
        for label in labels {
            assert!(store.remove(&label));
        }

        assert!(!store.is_empty());
        assert_eq!(store.len(), DEFAULT_REFERENCE_POINTS.len());
        for (label, coordinates) in DEFAULT_REFERENCE_POINTS {
            assert!(store.contains(label));
            assert_eq!(store.distances(Some(*coordinates))[*label], 0.0);
        }
    }

    #[test]
    fn remove_of_missing_label_reports_false() {
        let mut store = ReferencePointStore::default();
        assert!(!store.remove("Big Buddha"));
        assert_eq!(store.len(), DEFAULT_REFERENCE_POINTS.len());
    }

    #[test]
    fn reset_restores_the_default_set() {
        let mut store = ReferencePointStore::default();
        store.remove("Phuket Airport");
        store.reset();
        assert_eq!(store.len(), DEFAULT_REFERENCE_POINTS.len());
        assert!(store.contains("Phuket Airport"));
    }
}
