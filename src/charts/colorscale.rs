//! Color scales shared by the interactive figure and the static export.

use plotters::style::RGBColor;

/// Plotly's sequential Viridis scale
pub const VIRIDIS: [RGBColor; 10] = [
    RGBColor(0x44, 0x01, 0x54),
    RGBColor(0x48, 0x28, 0x78),
    RGBColor(0x3e, 0x49, 0x89),
    RGBColor(0x31, 0x68, 0x8e),
    RGBColor(0x26, 0x82, 0x8e),
    RGBColor(0x1f, 0x9e, 0x89),
    RGBColor(0x35, 0xb7, 0x79),
    RGBColor(0x6e, 0xce, 0x58),
    RGBColor(0xb5, 0xde, 0x2b),
    RGBColor(0xfd, 0xe7, 0x25),
];

/// Fill used by the uncolored base map (Plotly's first qualitative color)
pub const BASE_FILL: RGBColor = RGBColor(0x63, 0x6e, 0xfa);

pub fn to_hex(color: RGBColor) -> String {
    format!("#{:02x}{:02x}{:02x}", color.0, color.1, color.2)
}

/// The scale as Plotly `[[position, color], ...]` pairs.
pub fn plotly_scale(stops: &[RGBColor]) -> Vec<(f64, String)> {
    let last = stops.len().saturating_sub(1).max(1) as f64;
    stops
        .iter()
        .enumerate()
        .map(|(i, &c)| (i as f64 / last, to_hex(c)))
        .collect()
}

/// Single-color scale, as used for an uncolored choropleth.
pub fn uniform_scale(color: RGBColor) -> Vec<(f64, String)> {
    vec![(0.0, to_hex(color)), (1.0, to_hex(color))]
}

/// Interpolate `value` within `[min, max]` along the Viridis stops.
///
/// A degenerate range maps to the middle of the scale.
pub fn viridis(value: f64, min: f64, max: f64) -> RGBColor {
    let t = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    interpolate(&VIRIDIS, t)
}

fn interpolate(stops: &[RGBColor], t: f64) -> RGBColor {
    if stops.len() < 2 {
        return stops.first().copied().unwrap_or(BASE_FILL);
    }
    let scaled = t * (stops.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(stops.len() - 2);
    let frac = scaled - lower as f64;
    let (a, b) = (stops[lower], stops[lower + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}
