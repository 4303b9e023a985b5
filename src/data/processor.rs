//! Data Processor Module
//! Joins statistics onto the boundary attributes and normalizes coordinates.

use crate::data::crs::{Crs, CrsError};
use crate::data::loader::{BoundaryLayer, FEATURE_INDEX};
use geo::Geometry;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Join key '{key}' not found in {side} table")]
    MissingKey { key: String, side: &'static str },
    #[error("Reprojection failed for feature {index}: {source}")]
    Reprojection { index: usize, source: CrsError },
}

/// Suffixes for column names present on both sides of the join.
pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

/// Result of the attribute join.
#[derive(Debug, Clone)]
pub struct JoinedTable {
    pub frame: DataFrame,
    /// Name of the boundary key column in `frame`
    pub boundary_key: String,
    /// Statistics column name -> name of the merged column holding its values.
    /// Empty when the join fell back to the boundary attributes.
    pub statistics_columns: HashMap<String, String>,
}

/// Handles the attribute join and coordinate normalization.
pub struct DataProcessor;

impl DataProcessor {
    /// Left join of the statistics onto the boundary attributes.
    ///
    /// Every boundary row is kept, in boundary order; unmatched provinces get
    /// nulls. Both key columns are kept unless they share a name. Any other
    /// name present on both sides is suffixed on both sides with `_x`
    /// (boundary) and `_y` (statistics).
    pub fn left_join(
        boundaries: &DataFrame,
        statistics: &DataFrame,
        left_key: &str,
        right_key: &str,
    ) -> Result<JoinedTable, ProcessorError> {
        if boundaries.get_column_index(left_key).is_none() {
            return Err(ProcessorError::MissingKey {
                key: left_key.to_string(),
                side: "boundary",
            });
        }
        if statistics.get_column_index(right_key).is_none() {
            return Err(ProcessorError::MissingKey {
                key: right_key.to_string(),
                side: "statistics",
            });
        }

        let shared_key = left_key == right_key;
        let mut left = boundaries.clone();
        let mut right = statistics.clone();
        let mut left_key = left_key.to_string();
        let mut right_key = right_key.to_string();
        let mut statistics_columns = HashMap::new();

        for name in statistics.get_column_names_owned() {
            let name = name.to_string();
            let clashes = boundaries.get_column_index(&name).is_some();
            if !clashes || (shared_key && name == left_key) {
                statistics_columns.insert(name.clone(), name);
                continue;
            }

            if name != FEATURE_INDEX {
                let renamed = format!("{}{}", name, LEFT_SUFFIX);
                left.rename(&name, renamed.as_str().into())?;
                if name == left_key {
                    left_key = renamed;
                }
            }
            let renamed = format!("{}{}", name, RIGHT_SUFFIX);
            right.rename(&name, renamed.as_str().into())?;
            if name == right_key {
                right_key = renamed.clone();
            }
            statistics_columns.insert(name, renamed);
        }

        let coalesce = if shared_key {
            JoinCoalesce::CoalesceColumns
        } else {
            JoinCoalesce::KeepColumns
        };

        let frame = left
            .lazy()
            .join(
                right.lazy(),
                [col(left_key.as_str())],
                [col(right_key.as_str())],
                JoinArgs::new(JoinType::Left).with_coalesce(coalesce),
            )
            .sort_by_exprs(
                [col(FEATURE_INDEX)],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;

        Ok(JoinedTable {
            frame,
            boundary_key: left_key,
            statistics_columns,
        })
    }

    /// Join, falling back to an unmodified copy of the boundary attributes.
    pub fn merge_or_fallback(
        boundaries: &DataFrame,
        statistics: &DataFrame,
        left_key: &str,
        right_key: &str,
    ) -> JoinedTable {
        match Self::left_join(boundaries, statistics, left_key, right_key) {
            Ok(joined) => {
                tracing::info!(
                    "Merged statistics onto {} boundary rows ({} columns)",
                    joined.frame.height(),
                    joined.frame.width()
                );
                joined
            }
            Err(e) => {
                tracing::error!("Error merging statistics onto boundaries: {}", e);
                JoinedTable {
                    frame: boundaries.clone(),
                    boundary_key: left_key.to_string(),
                    statistics_columns: HashMap::new(),
                }
            }
        }
    }

    /// Reproject every feature of the layer to WGS84.
    ///
    /// The layer is only modified when all features reproject successfully.
    pub fn to_wgs84(layer: &mut BoundaryLayer) -> Result<(), ProcessorError> {
        if layer.crs.is_wgs84() {
            return Ok(());
        }

        let crs = layer.crs.clone();
        let reprojected = layer
            .features
            .par_iter()
            .enumerate()
            .map(|(index, feature)| -> Result<Option<Geometry<f64>>, ProcessorError> {
                let mut geometry = feature.geometry.clone();
                if let Some(g) = geometry.as_mut() {
                    crs.reproject_to_wgs84(g)
                        .map_err(|source| ProcessorError::Reprojection { index, source })?;
                }
                Ok(geometry)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (feature, geometry) in layer.features.iter_mut().zip(reprojected) {
            feature.geometry = geometry;
        }
        tracing::info!(
            "Reprojected {} features from {} to EPSG:4326",
            layer.features.len(),
            crs
        );
        layer.crs = Crs::Wgs84;
        Ok(())
    }

    /// Reproject, leaving coordinates untouched when that is not possible.
    pub fn normalize_crs(layer: &mut BoundaryLayer) {
        if let Err(e) = Self::to_wgs84(layer) {
            tracing::warn!("Keeping source coordinates ({}): {}", layer.crs, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::PROVINCES;
    use crate::data::loader::DataLoader;
    use geo::{BoundingRect, Geometry};

    fn statistics() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Provincia".into(), vec!["Chubut", "Salta", "Jujuy"]),
            Column::new("NDVI_Mean".into(), vec![0.22, 0.61, 0.48]),
        ])
        .unwrap()
    }

    #[test]
    fn left_join_keeps_boundary_rows_in_order() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        let boundaries = layer.attribute_frame().unwrap();

        let merged =
            DataProcessor::left_join(&boundaries, &statistics(), "provincia", "Provincia")
                .unwrap()
                .frame;

        assert_eq!(merged.height(), 3);
        let names = merged.column("provincia").unwrap().str().unwrap();
        assert_eq!(names.get(0), Some("Salta"));
        assert_eq!(names.get(1), Some("Chubut"));
        assert_eq!(names.get(2), Some("Sin geometria"));
        let ndvi = merged.column("NDVI_Mean").unwrap().f64().unwrap();
        assert_eq!(ndvi.get(0), Some(0.61));
        assert_eq!(ndvi.get(1), Some(0.22));
        assert_eq!(ndvi.get(2), None);
    }

    #[test]
    fn both_key_columns_are_kept() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        let boundaries = layer.attribute_frame().unwrap();

        let joined =
            DataProcessor::left_join(&boundaries, &statistics(), "provincia", "Provincia")
                .unwrap();
        let keys = joined.frame.column("Provincia").unwrap().str().unwrap();
        assert_eq!(keys.get(0), Some("Salta"));
        assert_eq!(keys.get(2), None);
        assert_eq!(joined.statistics_columns["NDVI_Mean"], "NDVI_Mean");
    }

    #[test]
    fn shared_key_name_is_coalesced() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        let boundaries = layer.attribute_frame().unwrap();
        let stats = DataFrame::new(vec![
            Column::new("provincia".into(), vec!["Chubut"]),
            Column::new("NDVI_Mean".into(), vec![0.22]),
        ])
        .unwrap();

        let merged = DataProcessor::left_join(&boundaries, &stats, "provincia", "provincia")
            .unwrap()
            .frame;
        assert!(merged.get_column_index("provincia_x").is_none());
        assert!(merged.get_column_index("provincia_y").is_none());
        let ndvi = merged.column("NDVI_Mean").unwrap().f64().unwrap();
        assert_eq!(ndvi.get(1), Some(0.22));
    }

    #[test]
    fn clashing_columns_are_suffixed_on_both_sides() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        let boundaries = layer.attribute_frame().unwrap();
        let stats = DataFrame::new(vec![
            Column::new("Provincia".into(), vec!["Salta", "Chubut"]),
            Column::new("codigo".into(), vec![0.9, 0.1]),
        ])
        .unwrap();

        let joined =
            DataProcessor::left_join(&boundaries, &stats, "provincia", "Provincia").unwrap();
        let merged = &joined.frame;

        assert!(merged.get_column_index("codigo").is_none());
        let boundary = merged.column("codigo_x").unwrap().f64().unwrap();
        assert_eq!(boundary.get(0), Some(66.0));
        let statistics = merged.column("codigo_y").unwrap().f64().unwrap();
        assert_eq!(statistics.get(0), Some(0.9));
        assert_eq!(statistics.get(1), Some(0.1));
        assert_eq!(joined.statistics_columns["codigo"], "codigo_y");
    }

    #[test]
    fn unmatched_provinces_get_nulls() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        let boundaries = layer.attribute_frame().unwrap();
        let stats = DataFrame::new(vec![
            Column::new("Provincia".into(), vec!["Salta"]),
            Column::new("NDVI_Mean".into(), vec![0.61]),
        ])
        .unwrap();

        let merged = DataProcessor::left_join(&boundaries, &stats, "provincia", "Provincia")
            .unwrap()
            .frame;
        let ndvi = merged.column("NDVI_Mean").unwrap().f64().unwrap();
        assert_eq!(ndvi.get(0), Some(0.61));
        assert_eq!(ndvi.get(1), None);
    }

    #[test]
    fn missing_key_falls_back_to_boundaries() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        let boundaries = layer.attribute_frame().unwrap();

        let err = DataProcessor::left_join(&boundaries, &statistics(), "provincia", "Region")
            .unwrap_err();
        assert!(matches!(err, ProcessorError::MissingKey { side: "statistics", .. }));

        let joined =
            DataProcessor::merge_or_fallback(&boundaries, &statistics(), "provincia", "Region");
        assert!(joined.frame.equals_missing(&boundaries));
        assert!(joined.frame.get_column_index("NDVI_Mean").is_none());
        assert!(joined.statistics_columns.is_empty());
    }

    #[test]
    fn reprojects_web_mercator_layers() {
        let content = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
            "features": [{"type": "Feature", "properties": {"provincia": "Salta"},
                "geometry": {"type": "Polygon", "coordinates":
                    [[[-7347086,-2875744],[-7124447,-2875744],[-7124447,-2632018],[-7347086,-2875744]]]}}]
        }"#;
        let mut layer = DataLoader::parse_boundaries(content).unwrap();
        DataProcessor::normalize_crs(&mut layer);

        assert_eq!(layer.crs, Crs::Wgs84);
        let Some(Geometry::Polygon(polygon)) = &layer.features[0].geometry else {
            panic!("expected a polygon");
        };
        let rect = polygon.bounding_rect().unwrap();
        assert!((rect.min().x - -66.0).abs() < 0.01);
        assert!((rect.max().x - -64.0).abs() < 0.01);
        assert!(rect.min().y > -26.0 && rect.max().y < -22.0);
    }

    #[test]
    fn unsupported_crs_keeps_coordinates() {
        let mut layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        layer.crs = Crs::Unknown("local-grid".to_string());
        let before = layer.features[0].geometry.clone();

        DataProcessor::normalize_crs(&mut layer);

        assert_eq!(layer.features[0].geometry, before);
        assert_eq!(layer.crs, Crs::Unknown("local-grid".to_string()));
    }
}
