//! Page layout: the dashboard page and the fallback error page.

pub const APP_TITLE: &str = "Índices del futuro";

const THEME_CSS: &str = "https://cdn.jsdelivr.net/npm/bootswatch@5.3.3/dist/minty/bootstrap.min.css";
const PLOTLY_JS: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Escape text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn document(body: &str, scripts: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="stylesheet" href="{theme}">
    <link rel="stylesheet" href="/assets/dashboard.css">
</head>
<body>
{body}
{scripts}
</body>
</html>"#,
        title = APP_TITLE,
        theme = THEME_CSS,
        body = body,
        scripts = scripts,
    )
}

/// Dropdown options; the first column starts selected.
fn column_options(columns: &[String]) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let c = escape(c);
            let selected = if i == 0 { " selected" } else { "" };
            format!(r#"<option value="{c}"{selected}>{c}</option>"#)
        })
        .collect::<Vec<_>>()
        .join("\n                        ")
}

/// Main dashboard: controls card on the left, map on the right.
pub fn dashboard_page(columns: &[String]) -> String {
    let body = format!(
        r#"<div class="container-fluid app-container">
    <div class="row py-3">
        <div class="col-12"><h1 class="app-title">{title}</h1></div>
    </div>
    <div class="row g-0">
        <div class="col-md-3">
            <div class="card"><div class="card-body">
                <div class="mb-3">
                    <label class="form-label" for="col-dropdown">Seleccionar índice</label>
                    <select id="col-dropdown" class="form-select">
                        {options}
                    </select>
                </div>
                <div id="column-summary" class="small text-muted"></div>
                <hr>
                <details class="ndvi-help">
                    <summary>🌿 ¿Qué es el NDVI?</summary>
                    <p>El NDVI (Índice de Vegetación de Diferencia Normalizada) es el indicador más usado para medir la salud y la densidad de la vegetación desde el espacio.</p>
                    <p>Compara la luz Roja (que las plantas absorben) con la luz Infrarroja Cercana (NIR) (que las plantas reflejan).</p>
                    <h5>Valores del Índice (-1 a +1):</h5>
                    <ul>
                        <li><strong>Valores Altos (+1):</strong> Vegetación densa y saludable.</li>
                        <li><strong>Valores Medios (0.2-0.5):</strong> Pastizales o matorrales.</li>
                        <li><strong>Valores Bajos (0):</strong> Suelo desnudo o rocas.</li>
                        <li><strong>Valores Negativos (-1):</strong> Agua o nieve.</li>
                    </ul>
                </details>
                <hr>
                <p>Interactúa con el mapa: acercar/alejar y pasar el mouse sobre una provincia.</p>
                <a id="svg-export" href="/api/map.svg" download="mapa.svg">Descargar mapa (SVG)</a>
            </div></div>
        </div>
        <div class="col-md-9">
            <div id="map-loading" class="map-loading"><div class="spinner-border text-primary" role="status"></div></div>
            <div id="map-graph" class="map-graph"></div>
        </div>
    </div>
    <div class="row">
        <div class="col py-4"><footer class="footer">Datos: NDVI por provincia · Visualización con Plotly</footer></div>
    </div>
</div>"#,
        title = APP_TITLE,
        options = column_options(columns),
    );

    let scripts = format!(
        r#"<script src="{PLOTLY_JS}"></script>
<script src="/assets/dashboard.js"></script>"#
    );
    document(&body, &scripts)
}

/// Shown instead of the dashboard when an input file could not be loaded.
pub fn error_page(boundaries_file: &str, statistics_file: &str) -> String {
    let body = format!(
        r#"<div class="container p-4">
    <h1 class="app-title">{title}</h1>
    <p>No se pudieron cargar los archivos {boundaries} o {statistics}. Revisa la consola.</p>
</div>"#,
        title = APP_TITLE,
        boundaries = escape(boundaries_file),
        statistics = escape(statistics_file),
    );
    document(&body, "")
}
