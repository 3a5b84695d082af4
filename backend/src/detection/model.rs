use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    /// Pixel coordinates, truncated toward zero.
    pub fn to_pixel(self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// A single detection as returned by the inference service.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    pub x: Option<f64>,
    pub y: Option<f64>,
    #[serde(default)]
    pub points: Vec<Vertex>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, rename = "class")]
    pub class_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub predictions: Vec<RawPrediction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Polygon {
        points: Vec<Vertex>,
        /// Box center reported alongside the outline, when present.
        center: Option<Vertex>,
        confidence: f64,
        class_name: String,
    },
    Point {
        center: Vertex,
        confidence: f64,
        class_name: String,
    },
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("prediction {index} has neither polygon points nor a center")]
pub struct MalformedPrediction {
    pub index: usize,
}

impl Prediction {
    pub fn from_raw(index: usize, raw: RawPrediction) -> Result<Self, MalformedPrediction> {
        let reported = match (raw.x, raw.y) {
            (Some(x), Some(y)) => Some(Vertex { x, y }),
            _ => None,
        };
        if !raw.points.is_empty() {
            return Ok(Prediction::Polygon {
                points: raw.points,
                center: reported,
                confidence: raw.confidence,
                class_name: raw.class_name,
            });
        }
        match reported {
            Some(center) => Ok(Prediction::Point {
                center,
                confidence: raw.confidence,
                class_name: raw.class_name,
            }),
            None => Err(MalformedPrediction { index }),
        }
    }

    pub fn polygon(&self) -> Option<&[Vertex]> {
        match self {
            Prediction::Polygon { points, .. } => Some(points),
            Prediction::Point { .. } => None,
        }
    }

    /// The center reported by the service; polygons without one fall back to
    /// the vertex mean.
    pub fn center(&self) -> Vertex {
        match self {
            Prediction::Point { center, .. }
            | Prediction::Polygon {
                center: Some(center),
                ..
            } => *center,
            Prediction::Polygon { points, .. } => {
                let n = points.len() as f64;
                let (sx, sy) = points
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
                Vertex { x: sx / n, y: sy / n }
            }
        }
    }
}

impl DetectionResponse {
    pub fn into_predictions(self) -> Result<Vec<Prediction>, MalformedPrediction> {
        self.predictions
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Prediction::from_raw(i, raw))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_predictions() {
        let json = r#"{
            "predictions": [
                {"x": 10.5, "y": 20.0, "width": 4, "height": 4,
                 "points": [{"x": 1.0, "y": 2.0}, {"x": 5.9, "y": 2.0}, {"x": 5.0, "y": 7.0}],
                 "confidence": 0.91, "class": "knot"},
                {"x": 120.7, "y": 88.2, "confidence": 0.7, "class": "pith"}
            ]
        }"#;
        let response: DetectionResponse = serde_json::from_str(json).unwrap();
        let predictions = response.into_predictions().unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].polygon().map(|p| p.len()), Some(3));
        assert!(predictions[1].polygon().is_none());
        assert_eq!(predictions[1].center().to_pixel(), (120, 88));
    }

    #[test]
    fn missing_predictions_key_is_empty() {
        let response: DetectionResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_predictions().unwrap().is_empty());
    }

    #[test]
    fn entry_without_geometry_is_rejected() {
        let json = r#"{"predictions": [{"confidence": 0.5}]}"#;
        let response: DetectionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.into_predictions(),
            Err(MalformedPrediction { index: 0 })
        );
    }

    #[test]
    fn reported_center_wins_over_the_outline() {
        let json = r#"{"predictions": [{
            "x": 50.0, "y": 40.0,
            "points": [{"x": 40.0, "y": 0.0}, {"x": 90.0, "y": 5.0}, {"x": 80.0, "y": 30.0},
                       {"x": 60.0, "y": 35.0}, {"x": 20.0, "y": 30.0}],
            "confidence": 0.8, "class": "pith"
        }]}"#;
        let response: DetectionResponse = serde_json::from_str(json).unwrap();
        let predictions = response.into_predictions().unwrap();
        assert_eq!(predictions[0].polygon().map(|p| p.len()), Some(5));
        assert_eq!(predictions[0].center().to_pixel(), (50, 40));
    }

    #[test]
    fn polygon_center_is_vertex_mean() {
        let p = Prediction::Polygon {
            center: None,
            points: vec![
                Vertex { x: 0.0, y: 0.0 },
                Vertex { x: 4.0, y: 0.0 },
                Vertex { x: 4.0, y: 2.0 },
                Vertex { x: 0.0, y: 2.0 },
            ],
            confidence: 1.0,
            class_name: "log".into(),
        };
        assert_eq!(p.center(), Vertex { x: 2.0, y: 1.0 });
    }
}
