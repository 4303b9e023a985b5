//! Map Dataset Module
//! The joined province table with geometry, loaded once at start-up.

use crate::config::Config;
use crate::data::loader::{BoundaryLayer, DataLoader, FEATURE_INDEX};
use crate::data::processor::DataProcessor;
use std::collections::HashMap;
use geo::Geometry;
use geojson::{Feature, FeatureCollection, JsonObject};
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value as JsonValue;
use statrs::statistics::Statistics;

/// Summary statistics for one column of the merged table.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Boundaries joined with statistics, one row per merged record.
#[derive(Debug, Clone)]
pub struct MapDataset {
    frame: DataFrame,
    geometries: Vec<Option<Geometry<f64>>>,
    index_columns: Vec<String>,
    /// Statistics column -> merged column that holds its values
    statistics_columns: HashMap<String, String>,
    key: String,
    feature_collection: JsonValue,
}

impl MapDataset {
    /// Run the join and CRS normalization over already-loaded inputs.
    pub fn build(
        mut layer: BoundaryLayer,
        statistics: &DataFrame,
        boundary_key: &str,
        statistics_key: &str,
    ) -> PolarsResult<Self> {
        DataProcessor::normalize_crs(&mut layer);

        let attributes = layer.attribute_frame()?;
        let joined =
            DataProcessor::merge_or_fallback(&attributes, statistics, boundary_key, statistics_key);
        let geometries: Vec<Option<Geometry<f64>>> =
            layer.features.into_iter().map(|f| f.geometry).collect();
        let index_columns = DataLoader::numeric_columns(statistics);

        let mut dataset = Self {
            frame: joined.frame,
            geometries,
            index_columns,
            statistics_columns: joined.statistics_columns,
            key: joined.boundary_key,
            feature_collection: JsonValue::Null,
        };
        dataset.feature_collection = dataset.build_feature_collection()?;
        Ok(dataset)
    }

    /// Numeric columns of the statistics table, offered in the dropdown.
    pub fn index_columns(&self) -> &[String] {
        &self.index_columns
    }

    /// Feature property used as the map location key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    /// Whether `column` can be drawn from the merged table.
    pub fn has_column(&self, column: &str) -> bool {
        self.merged_column(column).is_some()
    }

    /// Name of the merged column holding the values of `column`.
    ///
    /// Statistics columns resolve through the join's renames, so a statistics
    /// column never reads a same-named boundary property. Without a join they
    /// do not resolve at all.
    fn merged_column<'a>(&'a self, column: &'a str) -> Option<&'a str> {
        let merged = match self.statistics_columns.get(column) {
            Some(merged) => merged.as_str(),
            None if self.index_columns.iter().any(|c| c == column) => return None,
            None => column,
        };
        (merged != FEATURE_INDEX && self.frame.get_column_index(merged).is_some())
            .then_some(merged)
    }

    /// Location key of every row, as text.
    pub fn locations(&self) -> Vec<Option<String>> {
        let Ok(column) = self.frame.column(&self.key) else {
            return vec![None; self.frame.height()];
        };
        column
            .cast(&DataType::String)
            .ok()
            .and_then(|c| {
                c.str()
                    .ok()
                    .map(|ca| ca.into_iter().map(|v| v.map(str::to_string)).collect())
            })
            .unwrap_or_else(|| vec![None; self.frame.height()])
    }

    /// Values of `column` as floats; `None` when the column does not exist.
    pub fn values(&self, column: &str) -> Option<Vec<Option<f64>>> {
        let series = self.frame.column(self.merged_column(column)?).ok()?;
        let floats = series.cast(&DataType::Float64).ok()?;
        let values = floats
            .f64()
            .ok()?
            .into_iter()
            .map(|v| v.filter(|v| !v.is_nan()))
            .collect();
        Some(values)
    }

    /// Geometry of each merged row.
    pub fn row_geometries(&self) -> Vec<Option<&Geometry<f64>>> {
        let indices = self
            .frame
            .column(FEATURE_INDEX)
            .and_then(|c| c.cast(&DataType::UInt32));
        match indices {
            Ok(indices) => match indices.u32() {
                Ok(ca) => ca
                    .into_iter()
                    .map(|i| {
                        i.and_then(|i| self.geometries.get(i as usize))
                            .and_then(Option::as_ref)
                    })
                    .collect(),
                Err(_) => vec![None; self.frame.height()],
            },
            Err(_) => vec![None; self.frame.height()],
        }
    }

    /// The merged table as a GeoJSON feature collection.
    pub fn feature_collection(&self) -> &JsonValue {
        &self.feature_collection
    }

    fn build_feature_collection(&self) -> PolarsResult<JsonValue> {
        let columns: Vec<&Column> = self
            .frame
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() != FEATURE_INDEX)
            .collect();

        let mut features = Vec::with_capacity(self.frame.height());
        for (row, geometry) in self.row_geometries().into_iter().enumerate() {
            let mut properties = JsonObject::new();
            for column in &columns {
                properties.insert(column.name().to_string(), any_value_to_json(column.get(row)?));
            }
            features.push(Feature {
                bbox: None,
                geometry: geometry.map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: Some(geojson::feature::Id::String(row.to_string())),
                properties: Some(properties),
                foreign_members: None,
            });
        }

        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        Ok(serde_json::to_value(&collection).unwrap_or(JsonValue::Null))
    }

    /// Descriptive statistics of a column, ignoring missing values.
    pub fn summary(&self, column: &str) -> Option<ColumnSummary> {
        let values = self.values(column)?;
        let present: Vec<f64> = values.iter().flatten().copied().collect();

        Some(ColumnSummary {
            column: column.to_string(),
            count: present.len(),
            missing: values.len() - present.len(),
            min: Statistics::min(&present),
            max: Statistics::max(&present),
            mean: Statistics::mean(&present),
            std_dev: Statistics::std_dev(&present),
        })
    }
}

/// Convert a single cell to JSON; NaN becomes null.
fn any_value_to_json(value: AnyValue) -> JsonValue {
    match value {
        AnyValue::Null => JsonValue::Null,
        AnyValue::Boolean(v) => JsonValue::from(v),
        AnyValue::String(v) => JsonValue::from(v),
        AnyValue::StringOwned(v) => JsonValue::from(v.as_str()),
        AnyValue::Int8(v) => JsonValue::from(v),
        AnyValue::Int16(v) => JsonValue::from(v),
        AnyValue::Int32(v) => JsonValue::from(v),
        AnyValue::Int64(v) => JsonValue::from(v),
        AnyValue::UInt8(v) => JsonValue::from(v),
        AnyValue::UInt16(v) => JsonValue::from(v),
        AnyValue::UInt32(v) => JsonValue::from(v),
        AnyValue::UInt64(v) => JsonValue::from(v),
        AnyValue::Float32(v) => float_to_json(v as f64),
        AnyValue::Float64(v) => float_to_json(v),
        other => JsonValue::from(other.to_string()),
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Dashboard state for the lifetime of the process.
#[derive(Debug, Clone)]
pub enum Dashboard {
    Ready(MapDataset),
    /// Inputs could not be loaded; the server shows the fallback page.
    Unavailable { reason: String },
}

impl Dashboard {
    /// Load both inputs and build the dataset, never failing.
    pub fn load(config: &Config) -> Self {
        let layer = DataLoader::load_boundaries(&config.boundaries_path);
        if let Err(e) = &layer {
            tracing::error!("Error reading GeoJSON: {}", e);
        }
        let statistics = DataLoader::load_statistics(&config.statistics_path);
        if let Err(e) = &statistics {
            tracing::error!("Error reading CSV: {}", e);
        }

        let (layer, statistics) = match (layer, statistics) {
            (Ok(layer), Ok(statistics)) => (layer, statistics),
            (Err(e), _) => return Self::Unavailable { reason: e.to_string() },
            (_, Err(e)) => return Self::Unavailable { reason: e.to_string() },
        };

        match MapDataset::build(
            layer,
            &statistics,
            &config.boundary_key,
            &config.statistics_key,
        ) {
            Ok(dataset) => {
                tracing::info!(
                    "Dashboard ready: {} rows, index columns {:?}",
                    dataset.row_count(),
                    dataset.index_columns()
                );
                Self::Ready(dataset)
            }
            Err(e) => {
                tracing::error!("Error building map dataset: {}", e);
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn dataset(&self) -> Option<&MapDataset> {
        match self {
            Self::Ready(dataset) => Some(dataset),
            Self::Unavailable { .. } => None,
        }
    }
}
