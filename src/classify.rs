//! Ecosystem classification from coordinates or fixed station ids.
//!
//! Both lookups are immutable data handed in at construction; the defaults
//! carry the production tables.

use std::collections::HashMap;

/// Inclusive latitude/longitude box tagged with an ecosystem id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub ecosystem_id: i32,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    // ---
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// First-match bounding-box classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct EcosystemClassifier {
    boxes: Vec<BoundingBox>,
}

impl EcosystemClassifier {
    // ---
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes }
    }

    /// Ecosystem of the first box containing the point, `None` when unclassified.
    pub fn classify(&self, lat: f64, lon: f64) -> Option<i32> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        self.boxes
            .iter()
            .find(|b| b.contains(lat, lon))
            .map(|b| b.ecosystem_id)
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }
}

impl Default for EcosystemClassifier {
    /// Coarse boxes: the Arctic circle, Europe, and the Sahara.
    fn default() -> Self {
        Self::new(vec![
            BoundingBox {
                ecosystem_id: 3,
                min_lat: 66.5,
                max_lat: 90.0,
                min_lon: -180.0,
                max_lon: 180.0,
            },
            BoundingBox {
                ecosystem_id: 5,
                min_lat: 35.0,
                max_lat: 60.0,
                min_lon: -10.0,
                max_lon: 40.0,
            },
            BoundingBox {
                ecosystem_id: 6,
                min_lat: 15.0,
                max_lat: 35.0,
                min_lon: -15.0,
                max_lon: 35.0,
            },
        ])
    }
}

/// Fixed provider station id → ecosystem id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StationMap {
    stations: HashMap<String, i32>,
}

impl StationMap {
    // ---
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (S, i32)>) -> Self {
        Self {
            stations: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn lookup(&self, station_id: &str) -> Option<i32> {
        self.stations.get(station_id).copied()
    }
}

/// New York Central Park and London Heathrow, both temperate.
pub fn default_station_map() -> StationMap {
    StationMap::new([("GHCND:USW00014733", 5), ("GHCND:UK000003772", 5)])
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_point_inside_single_box() {
        // ---
        let classifier = EcosystemClassifier::default();
        assert_eq!(classifier.classify(75.0, -100.0), Some(3));
        assert_eq!(classifier.classify(48.8, 2.3), Some(5));
        assert_eq!(classifier.classify(25.0, 10.0), Some(6));
    }

    #[test]
    fn test_point_outside_all_boxes_is_unclassified() {
        // ---
        let classifier = EcosystemClassifier::default();
        assert_eq!(classifier.classify(0.0, 0.0), None);
        assert_eq!(classifier.classify(-75.0, 0.0), None);
        assert_eq!(classifier.classify(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_box_edges_are_inclusive() {
        // ---
        let classifier = EcosystemClassifier::default();
        assert_eq!(classifier.classify(66.5, 0.0), Some(3));
        assert_eq!(classifier.classify(90.0, 180.0), Some(3));
        assert_eq!(classifier.classify(60.0, 40.0), Some(5));
    }

    #[test]
    fn test_overlap_resolves_to_first_box() {
        // ---
        // Latitude 35 sits on the shared edge of the Europe and Sahara boxes
        let classifier = EcosystemClassifier::default();
        assert_eq!(classifier.classify(35.0, 10.0), Some(5));

        let swapped = EcosystemClassifier::new(vec![
            classifier.boxes()[2],
            classifier.boxes()[1],
        ]);
        assert_eq!(swapped.classify(35.0, 10.0), Some(6));
    }

    #[test]
    fn test_injected_boxes_replace_defaults() {
        // ---
        let classifier = EcosystemClassifier::new(vec![BoundingBox {
            ecosystem_id: 42,
            min_lat: -1.0,
            max_lat: 1.0,
            min_lon: -1.0,
            max_lon: 1.0,
        }]);
        assert_eq!(classifier.classify(0.0, 0.0), Some(42));
        assert_eq!(classifier.classify(75.0, -100.0), None);
    }

    #[test]
    fn test_station_lookup() {
        // ---
        let stations = default_station_map();
        assert_eq!(stations.lookup("GHCND:USW00014733"), Some(5));
        assert_eq!(stations.lookup("GHCND:UNKNOWN"), None);
    }
}
