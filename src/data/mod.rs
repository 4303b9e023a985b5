//! Data module - input loading, joining and reprojection

mod crs;
mod dataset;
mod loader;
mod processor;

pub use dataset::{Dashboard, MapDataset};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::loader::DataLoader;
    use super::MapDataset;
    use polars::prelude::*;

    pub const PROVINCES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"provincia": "Salta", "codigo": 66},
             "geometry": {"type": "Polygon", "coordinates": [[[-66,-25],[-64,-25],[-64,-23],[-66,-23],[-66,-25]]]}},
            {"type": "Feature",
             "properties": {"provincia": "Chubut", "codigo": 26},
             "geometry": {"type": "Polygon", "coordinates": [[[-71,-46],[-65,-46],[-65,-42],[-71,-42],[-71,-46]]]}},
            {"type": "Feature", "properties": {"provincia": "Sin geometria"}, "geometry": null}
        ]
    }"#;

    pub const STATISTICS_CSV: &str = "Provincia,NDVI_Mean,NDVI_Max\n\
        Salta,0.61,0.83\n\
        Chubut,0.22,0.47\n\
        Jujuy,0.48,0.7\n";

    pub fn statistics() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Provincia".into(), vec!["Salta", "Chubut", "Jujuy"]),
            Column::new("NDVI_Mean".into(), vec![0.61, 0.22, 0.48]),
            Column::new("NDVI_Max".into(), vec![0.83, 0.47, 0.7]),
        ])
        .unwrap()
    }

    /// The sample provinces joined with `statistics`.
    pub fn dataset_with(statistics: &DataFrame) -> MapDataset {
        dataset_from(PROVINCES, statistics)
    }

    /// `boundaries` (GeoJSON text) joined with `statistics` on the default keys.
    pub fn dataset_from(boundaries: &str, statistics: &DataFrame) -> MapDataset {
        let layer = DataLoader::parse_boundaries(boundaries).unwrap();
        MapDataset::build(layer, statistics, "provincia", "Provincia").unwrap()
    }

    /// Two mapped provinces and one without geometry, joined with the sample statistics.
    pub fn sample_dataset() -> MapDataset {
        dataset_with(&statistics())
    }
}
