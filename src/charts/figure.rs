//! Choropleth Figure Module
//! Builds the map figure shown for the selected index column.
//!
//! The figure serializes to the `{data, layout}` JSON that plotly.js renders
//! in the browser.

use crate::charts::colorscale::{plotly_scale, uniform_scale, BASE_FILL, VIRIDIS};
use crate::data::MapDataset;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Label shown for the location key in hover text
pub const LOCATION_LABEL: &str = "Provincia";
/// Label shown for the selected value in hover text
pub const VALUE_LABEL: &str = "indice promedio";

/// Fixed map viewport: tile style, center and zoom.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MapView {
    pub style: &'static str,
    pub center: Center,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            style: "carto-positron",
            center: Center {
                lat: -40.4,
                lon: -63.6,
            },
            zoom: 3.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Figure<'a> {
    pub data: Vec<ChoroplethTrace<'a>>,
    pub layout: Layout,
}

#[derive(Debug, Serialize)]
pub struct ChoroplethTrace<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geojson: &'a JsonValue,
    pub featureidkey: String,
    pub locations: Vec<Option<String>>,
    pub z: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coloraxis: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<Vec<(f64, String)>>,
    pub showscale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovertext: Option<Vec<Option<String>>>,
    pub hovertemplate: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Marker {
    pub opacity: f64,
}

#[derive(Debug, Serialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    pub mapbox: MapView,
    pub margin: Margin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coloraxis: Option<ColorAxis>,
    pub showlegend: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub r: u32,
    pub t: u32,
    pub l: u32,
    pub b: u32,
}

#[derive(Debug, Serialize)]
pub struct ColorAxis {
    pub colorscale: Vec<(f64, String)>,
    pub colorbar: ColorBar,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmax: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ColorBar {
    pub title: Title,
}

impl Figure<'_> {
    /// Whether the figure is colored by a data column.
    pub fn is_colored(&self) -> bool {
        self.layout.coloraxis.is_some()
    }
}

/// Builds choropleth figures over a map dataset.
pub struct ChoroplethBuilder;

impl ChoroplethBuilder {
    /// The dropdown callback: a figure colored by `column`, or the uncolored
    /// base map when no valid column is given.
    pub fn update_map<'a>(dataset: &'a MapDataset, column: Option<&str>) -> Figure<'a> {
        match column.filter(|c| dataset.has_column(c)) {
            Some(column) => Self::colored_map(dataset, column),
            None => Self::base_map(dataset),
        }
    }

    /// Provinces drawn in a single color, no color scale.
    pub fn base_map(dataset: &MapDataset) -> Figure<'_> {
        let locations = dataset.locations();
        let key = dataset.key();

        let trace = ChoroplethTrace {
            kind: "choroplethmapbox",
            geojson: dataset.feature_collection(),
            featureidkey: format!("properties.{}", key),
            z: vec![Some(1.0); locations.len()],
            locations,
            coloraxis: None,
            colorscale: Some(uniform_scale(BASE_FILL)),
            showscale: false,
            marker: None,
            hovertext: None,
            hovertemplate: format!("{}=%{{location}}<extra></extra>", key),
            name: String::new(),
        };

        Figure {
            data: vec![trace],
            layout: Layout {
                title: None,
                mapbox: MapView::default(),
                margin: Margin {
                    r: 0,
                    t: 30,
                    l: 0,
                    b: 0,
                },
                coloraxis: None,
                showlegend: false,
            },
        }
    }

    /// Provinces colored by `column` on the Viridis scale.
    pub fn colored_map<'a>(dataset: &'a MapDataset, column: &str) -> Figure<'a> {
        let locations = dataset.locations();
        let z = dataset.values(column).unwrap_or_default();
        let summary = dataset.summary(column);
        let range = summary
            .filter(|s| s.count > 0)
            .map(|s| (s.min, s.max));

        let trace = ChoroplethTrace {
            kind: "choroplethmapbox",
            geojson: dataset.feature_collection(),
            featureidkey: format!("properties.{}", dataset.key()),
            hovertext: Some(locations.clone()),
            locations,
            z,
            coloraxis: Some("coloraxis"),
            colorscale: None,
            showscale: true,
            marker: Some(Marker { opacity: 0.75 }),
            hovertemplate: format!(
                "<b>%{{hovertext}}</b><br><br>{}=%{{location}}<br>{}=%{{z}}<extra></extra>",
                LOCATION_LABEL, VALUE_LABEL
            ),
            name: String::new(),
        };

        Figure {
            data: vec![trace],
            layout: Layout {
                title: Some(Title {
                    text: format!("{} por Provincia", column),
                }),
                mapbox: MapView::default(),
                margin: Margin {
                    r: 0,
                    t: 40,
                    l: 0,
                    b: 0,
                },
                coloraxis: Some(ColorAxis {
                    colorscale: plotly_scale(&VIRIDIS),
                    colorbar: ColorBar {
                        title: Title {
                            text: column.to_string(),
                        },
                    },
                    cmin: range.map(|r| r.0),
                    cmax: range.map(|r| r.1),
                }),
                showlegend: false,
            },
        }
    }
}
