//! Map visualization artifact: the terminal output of an analysis run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single stop along the extracted route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteItem {
    /// Place name as mentioned in the video
    pub location: String,

    /// WGS84 `[lon, lat]` pair, when geocoding succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<[f64; 2]>,

    /// Free-form context about the stop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Timecode into the source video, `HH:MM:SS,mmm`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timecode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

/// The ordered geographic route for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapVisualization {
    pub video_id: String,
    pub routes: Vec<RouteItem>,
}

/// Validation failures for persisted map artifacts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapValidationError {
    #[error("routes must not be empty")]
    EmptyRoutes,
    #[error("route '{location}' has out-of-range coordinates [{lon}, {lat}]")]
    CoordinatesOutOfRange {
        location: String,
        lon: f64,
        lat: f64,
    },
    #[error("only {geocoded} of {total} routes carry coordinates (at least half required)")]
    InsufficientCoverage { geocoded: usize, total: usize },
}

impl MapVisualization {
    /// Validate the invariants required before persisting a result:
    /// non-empty routes, in-range coordinates, and coordinates on at least
    /// half of the items.
    pub fn validate(&self) -> Result<(), MapValidationError> {
        if self.routes.is_empty() {
            return Err(MapValidationError::EmptyRoutes);
        }

        let mut geocoded = 0usize;
        for route in &self.routes {
            if let Some([lon, lat]) = route.coordinates {
                if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                    return Err(MapValidationError::CoordinatesOutOfRange {
                        location: route.location.clone(),
                        lon,
                        lat,
                    });
                }
                geocoded += 1;
            }
        }

        if geocoded * 2 < self.routes.len() {
            return Err(MapValidationError::InsufficientCoverage {
                geocoded,
                total: self.routes.len(),
            });
        }

        Ok(())
    }
}

/// Format a second offset as an `HH:MM:SS,mmm` timecode.
pub fn format_timecode(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let (h, m, s) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(location: &str, coordinates: Option<[f64; 2]>) -> RouteItem {
        RouteItem {
            location: location.to_string(),
            coordinates,
            description: None,
            timecode: None,
            tags: None,
            marker: None,
        }
    }

    #[test]
    fn test_valid_visualization() {
        let map = MapVisualization {
            video_id: "dQw4w9WgXcQ".to_string(),
            routes: vec![
                item("Taipei 101", Some([121.5645, 25.0340])),
                item("Somewhere unknown", None),
            ],
        };
        assert!(map.validate().is_ok());
    }

    #[test]
    fn test_empty_routes_rejected() {
        let map = MapVisualization {
            video_id: "dQw4w9WgXcQ".to_string(),
            routes: vec![],
        };
        assert_eq!(map.validate(), Err(MapValidationError::EmptyRoutes));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let map = MapVisualization {
            video_id: "dQw4w9WgXcQ".to_string(),
            routes: vec![item("Nowhere", Some([181.0, 0.0]))],
        };
        assert!(matches!(
            map.validate(),
            Err(MapValidationError::CoordinatesOutOfRange { .. })
        ));
    }

    #[test]
    fn test_coverage_threshold() {
        // 1 of 3 geocoded: below the 50% floor.
        let map = MapVisualization {
            video_id: "dQw4w9WgXcQ".to_string(),
            routes: vec![
                item("A", Some([0.0, 0.0])),
                item("B", None),
                item("C", None),
            ],
        };
        assert_eq!(
            map.validate(),
            Err(MapValidationError::InsufficientCoverage {
                geocoded: 1,
                total: 3
            })
        );

        // Exactly half passes.
        let map = MapVisualization {
            video_id: "dQw4w9WgXcQ".to_string(),
            routes: vec![item("A", Some([0.0, 0.0])), item("B", None)],
        };
        assert!(map.validate().is_ok());
    }

    #[test]
    fn test_format_timecode() {
        assert_eq!(format_timecode(0.0), "00:00:00,000");
        assert_eq!(format_timecode(61.5), "00:01:01,500");
        assert_eq!(format_timecode(3723.042), "01:02:03,042");
    }

    #[test]
    fn test_route_item_roundtrip() {
        let original = item("Taipei 101", Some([121.5645, 25.0340]));
        let json = serde_json::to_string(&original).unwrap();
        let parsed: RouteItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
        // Optional fields stay off the wire when unset.
        assert!(!json.contains("description"));
    }
}
