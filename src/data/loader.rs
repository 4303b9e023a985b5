//! Input Loader Module
//! Loads the province boundaries (GeoJSON) and the NDVI statistics table (CSV).

use crate::data::crs::Crs;
use geo::Geometry;
use geojson::{Feature, GeoJson, JsonObject};
use polars::prelude::*;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column that ties a merged row back to its boundary feature
pub const FEATURE_INDEX: &str = "__feature";

/// Fallback index column when the statistics table has no numeric columns
pub const DEFAULT_INDEX_COLUMN: &str = "NDVI_Mean";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse GeoJSON {path}: {source}")]
    GeoJson {
        path: PathBuf,
        source: Box<geojson::Error>,
    },
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
}

/// One province outline with its feature properties.
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    /// `None` for features with a null geometry; they still get a row
    pub geometry: Option<Geometry<f64>>,
    pub properties: JsonObject,
}

/// All boundary features of a GeoJSON file plus its declared CRS.
#[derive(Debug, Clone, Default)]
pub struct BoundaryLayer {
    pub features: Vec<BoundaryFeature>,
    pub crs: Crs,
}

impl BoundaryLayer {
    /// Feature properties as a DataFrame, one row per feature.
    ///
    /// Properties whose values are all numbers become `Float64` columns,
    /// anything else is rendered as text. The `FEATURE_INDEX` column holds the
    /// feature position.
    pub fn attribute_frame(&self) -> PolarsResult<DataFrame> {
        let keys: BTreeSet<&str> = self
            .features
            .iter()
            .flat_map(|f| f.properties.keys().map(String::as_str))
            .collect();

        let index: Vec<u32> = (0..self.features.len() as u32).collect();
        let mut columns = vec![Column::new(FEATURE_INDEX.into(), index)];

        for key in keys {
            let values: Vec<Option<&JsonValue>> = self
                .features
                .iter()
                .map(|f| f.properties.get(key).filter(|v| !v.is_null()))
                .collect();

            let all_numeric = values.iter().flatten().all(|v| v.is_number())
                && values.iter().any(Option::is_some);

            let column = if all_numeric {
                let numbers: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| v.and_then(JsonValue::as_f64))
                    .collect();
                Column::new(key.into(), numbers)
            } else {
                let text: Vec<Option<String>> = values
                    .iter()
                    .map(|v| {
                        v.map(|v| match v {
                            JsonValue::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                    })
                    .collect();
                Column::new(key.into(), text)
            };
            columns.push(column);
        }

        DataFrame::new(columns)
    }
}

/// Loads the two dashboard inputs.
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file using Polars.
    pub fn load_statistics(path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.is_file() {
            return Err(LoaderError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }

        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;

        tracing::info!(
            "Loaded {} rows, {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(df)
    }

    /// Load a GeoJSON file into a boundary layer.
    pub fn load_boundaries(path: &Path) -> Result<BoundaryLayer, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layer = Self::parse_boundaries(&content).map_err(|source| LoaderError::GeoJson {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        tracing::info!(
            "Loaded {} features ({}) from {}",
            layer.features.len(),
            layer.crs,
            path.display()
        );
        Ok(layer)
    }

    /// Parse GeoJSON text into a boundary layer.
    pub fn parse_boundaries(content: &str) -> Result<BoundaryLayer, geojson::Error> {
        let geojson: GeoJson = content.parse()?;

        let (features, crs) = match geojson {
            GeoJson::FeatureCollection(fc) => {
                let crs = Crs::from_geojson_member(
                    fc.foreign_members.as_ref().and_then(|m| m.get("crs")),
                );
                (fc.features, crs)
            }
            GeoJson::Feature(f) => {
                let crs = Crs::from_geojson_member(
                    f.foreign_members.as_ref().and_then(|m| m.get("crs")),
                );
                (vec![f], crs)
            }
            GeoJson::Geometry(g) => (
                vec![Feature {
                    bbox: None,
                    geometry: Some(g),
                    id: None,
                    properties: None,
                    foreign_members: None,
                }],
                Crs::default(),
            ),
        };

        let mut boundaries = Vec::with_capacity(features.len());
        for (index, feature) in features.into_iter().enumerate() {
            let geometry = match feature.geometry {
                Some(geometry) => Some(Geometry::<f64>::try_from(geometry)?),
                None => {
                    tracing::debug!("Feature {} has no geometry", index);
                    None
                }
            };
            boundaries.push(BoundaryFeature {
                geometry,
                properties: feature.properties.unwrap_or_default(),
            });
        }

        Ok(BoundaryLayer {
            features: boundaries,
            crs,
        })
    }

    /// Get list of numeric column names.
    ///
    /// Falls back to `NDVI_Mean` when nothing numeric was inferred but the
    /// column exists.
    pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
        let numeric: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|col| col.dtype().is_primitive_numeric() || col.dtype().is_decimal())
            .map(|col| col.name().to_string())
            .collect();

        if numeric.is_empty() && df.get_column_index(DEFAULT_INDEX_COLUMN).is_some() {
            return vec![DEFAULT_INDEX_COLUMN.to_string()];
        }
        numeric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::PROVINCES;
    use std::io::Write;

    #[test]
    fn parses_features_including_missing_geometry() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        assert_eq!(layer.features.len(), 3);
        assert_eq!(layer.crs, Crs::Wgs84);
        assert_eq!(
            layer.features[1].properties.get("provincia"),
            Some(&JsonValue::from("Chubut"))
        );
        assert!(matches!(layer.features[0].geometry, Some(Geometry::Polygon(_))));
        assert!(layer.features[2].geometry.is_none());
        assert_eq!(
            layer.features[2].properties.get("provincia"),
            Some(&JsonValue::from("Sin geometria"))
        );
    }

    #[test]
    fn attribute_frame_types_properties() {
        let layer = DataLoader::parse_boundaries(PROVINCES).unwrap();
        let df = layer.attribute_frame().unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.column("codigo").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("provincia").unwrap().dtype(), &DataType::String);
        let names = df.column("provincia").unwrap().str().unwrap();
        assert_eq!(names.get(0), Some("Salta"));
        assert_eq!(names.get(1), Some("Chubut"));
        assert_eq!(df.column("codigo").unwrap().f64().unwrap().get(2), None);
    }

    #[test]
    fn reads_declared_crs() {
        let content = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "features": []
        }"#;
        let layer = DataLoader::parse_boundaries(content).unwrap();
        assert_eq!(layer.crs, Crs::WebMercator);
        assert!(layer.features.is_empty());
    }

    #[test]
    fn missing_files_are_reported() {
        let missing = Path::new("/definitely/not/here/Provincias.geojson");
        assert!(matches!(
            DataLoader::load_boundaries(missing),
            Err(LoaderError::Io { .. })
        ));
        let missing = Path::new("/definitely/not/here/NDVI.csv");
        assert!(matches!(
            DataLoader::load_statistics(missing),
            Err(LoaderError::Io { .. })
        ));
    }

    #[test]
    fn loads_statistics_and_detects_numeric_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Provincia,NDVI_Mean,NDVI_Max,Fuente").unwrap();
        writeln!(file, "Salta,0.61,0.83,MODIS").unwrap();
        writeln!(file, "Chubut,0.22,0.47,MODIS").unwrap();

        let df = DataLoader::load_statistics(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            DataLoader::numeric_columns(&df),
            vec!["NDVI_Mean".to_string(), "NDVI_Max".to_string()]
        );
    }

    #[test]
    fn falls_back_to_ndvi_mean_when_nothing_is_numeric() {
        let df = DataFrame::new(vec![
            Column::new("Provincia".into(), vec!["Salta", "Chubut"]),
            Column::new(DEFAULT_INDEX_COLUMN.into(), vec!["n/d", "0,22"]),
        ])
        .unwrap();
        assert_eq!(
            DataLoader::numeric_columns(&df),
            vec![DEFAULT_INDEX_COLUMN.to_string()]
        );

        let df = DataFrame::new(vec![Column::new("Provincia".into(), vec!["Salta"])]).unwrap();
        assert!(DataLoader::numeric_columns(&df).is_empty());
    }

    #[test]
    fn numeric_columns_cover_integers_but_not_flags() {
        let df = DataFrame::new(vec![
            Column::new("Pixeles".into(), vec![120i32, 80]),
            Column::new("Clase".into(), vec![1u8, 2]),
            Column::new("Urbana".into(), vec![true, false]),
        ])
        .unwrap();
        assert_eq!(
            DataLoader::numeric_columns(&df),
            vec!["Pixeles".to_string(), "Clase".to_string()]
        );
    }
}
