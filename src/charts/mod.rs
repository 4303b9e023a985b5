//! Charts module - Choropleth figures and static export

mod colorscale;
mod figure;
mod renderer;

pub use figure::ChoroplethBuilder;
pub use renderer::{RenderError, StaticMapRenderer};
