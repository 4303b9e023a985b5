//! Static Map Renderer
//! Exports the choropleth as a standalone SVG.
//!
//! Layout:
//! 1. Map area on the left, provinces projected with Web Mercator and fitted
//!    to the area with a small padding
//! 2. Vertical Viridis color bar on the right (colored maps only)

use crate::charts::colorscale::{viridis, BASE_FILL, VIRIDIS};
use crate::data::MapDataset;
use geo::{BoundingRect, Coord, Geometry, LineString, Polygon, Rect};
use plotters::prelude::*;
use thiserror::Error;

const BACKGROUND: RGBColor = RGBColor(255, 255, 255);
const OUTLINE: RGBColor = RGBColor(255, 255, 255);
const NO_DATA: RGBColor = RGBColor(200, 200, 200);

const PADDING: i32 = 10;
const COLORBAR_WIDTH: i32 = 18;
const COLORBAR_GAP: i32 = 24;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing error: {0}")]
    Drawing(String),
    #[error("Image size {0}x{1} is too small")]
    TooSmall(u32, u32),
}

/// Maps Web Mercator coordinates into the pixel box of the map area.
struct Viewport {
    min: Coord<f64>,
    scale: f64,
    offset: (f64, f64),
    height: f64,
}

impl Viewport {
    fn fit(bounds: Rect<f64>, width: f64, height: f64) -> Self {
        let min = mercator(bounds.min());
        let max = mercator(bounds.max());
        let span_x = (max.x - min.x).max(f64::EPSILON);
        let span_y = (max.y - min.y).max(f64::EPSILON);
        let scale = (width / span_x).min(height / span_y);
        // Center the shorter dimension
        let offset = (
            (width - span_x * scale) / 2.0,
            (height - span_y * scale) / 2.0,
        );
        Self {
            min,
            scale,
            offset,
            height,
        }
    }

    fn project(&self, coord: Coord<f64>) -> (i32, i32) {
        let p = mercator(coord);
        let x = PADDING as f64 + self.offset.0 + (p.x - self.min.x) * self.scale;
        // Screen y grows downwards
        let y = PADDING as f64 + self.height - self.offset.1 - (p.y - self.min.y) * self.scale;
        (x.round() as i32, y.round() as i32)
    }
}

/// Spherical Mercator in radians; latitude clamped to the tile limit.
fn mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-85.0511, 85.0511).to_radians();
    Coord {
        x: coord.x.to_radians(),
        y: (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

pub struct StaticMapRenderer;

impl StaticMapRenderer {
    /// Render the map as an SVG document.
    ///
    /// With a valid `column` provinces are filled on the Viridis scale and a
    /// color bar is drawn; otherwise every province gets the base fill.
    pub fn render_svg(
        dataset: &MapDataset,
        column: Option<&str>,
        width: u32,
        height: u32,
    ) -> Result<String, RenderError> {
        let min_size = (2 * PADDING + COLORBAR_WIDTH + COLORBAR_GAP) as u32 + 1;
        if width <= min_size || height <= (2 * PADDING) as u32 {
            return Err(RenderError::TooSmall(width, height));
        }

        let values = column.and_then(|c| dataset.values(c));
        let range = column
            .and_then(|c| dataset.summary(c))
            .filter(|s| s.count > 0)
            .map(|s| (s.min, s.max));

        let geometries = dataset.row_geometries();
        let fills: Vec<RGBColor> = match (&values, range) {
            (Some(values), Some((min, max))) => values
                .iter()
                .map(|v| v.map(|v| viridis(v, min, max)).unwrap_or(NO_DATA))
                .collect(),
            _ => vec![BASE_FILL; geometries.len()],
        };

        let map_width = if range.is_some() {
            width as i32 - 2 * PADDING - COLORBAR_WIDTH - COLORBAR_GAP
        } else {
            width as i32 - 2 * PADDING
        };
        let map_height = height as i32 - 2 * PADDING;

        let bounds = geometries
            .iter()
            .flatten()
            .filter_map(|g| g.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            });

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
            root.fill(&BACKGROUND).map_err(drawing_error)?;

            if let Some(bounds) = bounds {
                let viewport = Viewport::fit(bounds, map_width as f64, map_height as f64);
                let mut polygons = Vec::new();
                for (geometry, fill) in geometries.iter().zip(&fills) {
                    if let Some(geometry) = geometry {
                        collect_polygons(geometry, *fill, &mut polygons);
                    }
                }
                // Holes are painted over, so anything sitting inside one
                // (an enclave) has to come later
                polygons.sort_by_key(|(polygon, _)| polygon.interiors().is_empty());
                for (polygon, fill) in polygons {
                    Self::draw_polygon(&root, &viewport, polygon, fill)?;
                }
            } else {
                tracing::warn!("No drawable geometry for static export");
            }

            if range.is_some() {
                Self::draw_colorbar(&root, width as i32 - PADDING - COLORBAR_WIDTH, map_height)?;
            }

            root.present().map_err(drawing_error)?;
        }
        Ok(svg)
    }

    fn draw_polygon(
        root: &DrawingArea<SVGBackend, plotters::coord::Shift>,
        viewport: &Viewport,
        polygon: &Polygon<f64>,
        fill: RGBColor,
    ) -> Result<(), RenderError> {
        let ring = |line: &LineString<f64>| -> Vec<(i32, i32)> {
            line.coords().map(|&c| viewport.project(c)).collect()
        };

        let exterior = ring(polygon.exterior());
        root.draw(&plotters::element::Polygon::new(exterior.clone(), fill.filled()))
            .map_err(drawing_error)?;
        for hole in polygon.interiors() {
            root.draw(&plotters::element::Polygon::new(ring(hole), BACKGROUND.filled()))
                .map_err(drawing_error)?;
        }
        root.draw(&PathElement::new(exterior, OUTLINE.stroke_width(1)))
            .map_err(drawing_error)?;
        Ok(())
    }

    fn draw_colorbar(
        root: &DrawingArea<SVGBackend, plotters::coord::Shift>,
        left: i32,
        map_height: i32,
    ) -> Result<(), RenderError> {
        let steps = 64;
        let top = PADDING;
        let bar_height = map_height.max(steps);
        for i in 0..steps {
            // Highest values at the top
            let t = 1.0 - (i as f64 + 0.5) / steps as f64;
            let y0 = top + bar_height * i / steps;
            let y1 = top + bar_height * (i + 1) / steps;
            root.draw(&Rectangle::new(
                [(left, y0), (left + COLORBAR_WIDTH, y1)],
                viridis(t, 0.0, 1.0).filled(),
            ))
            .map_err(drawing_error)?;
        }
        root.draw(&Rectangle::new(
            [(left, top), (left + COLORBAR_WIDTH, top + bar_height)],
            VIRIDIS[0].stroke_width(1),
        ))
        .map_err(drawing_error)?;
        Ok(())
    }
}

/// Flatten a geometry into its fillable polygons.
fn collect_polygons<'a>(
    geometry: &'a Geometry<f64>,
    fill: RGBColor,
    out: &mut Vec<(&'a Polygon<f64>, RGBColor)>,
) {
    match geometry {
        Geometry::Polygon(polygon) => out.push((polygon, fill)),
        Geometry::MultiPolygon(multi) => out.extend(multi.iter().map(|p| (p, fill))),
        Geometry::GeometryCollection(collection) => collection
            .iter()
            .for_each(|g| collect_polygons(g, fill, out)),
        // Points and lines carry no area to fill
        _ => {}
    }
}

fn drawing_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Drawing(e.to_string())
}
