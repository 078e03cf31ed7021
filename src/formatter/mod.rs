use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

use crate::collector::Series;

pub mod json;
pub mod svg;

pub use json::JsonFormatter;
pub use svg::SvgRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write series output: {0}")]
    Output(#[source] std::io::Error),
}

/// Превращает готовый ряд в сохранённый артефакт.
///
/// Рендерер берёт ряд по ссылке: при ошибке данные остаются у вызывающего.
pub trait SeriesRenderer {
    /// Возвращает путь к записанному артефакту.
    fn render(&self, series: &Series, title: &str) -> Result<PathBuf, RenderError>;
}

/// Пишет ряд в `out` как JSON, затем рендерит его.
///
/// JSON пишется первым, поэтому при ошибке рендера данные уже выведены, и
/// только потом возвращается ошибка.
pub fn emit_series<R, W>(
    series: &Series,
    renderer: &R,
    title: &str,
    out: &mut W,
) -> Result<PathBuf, RenderError>
where
    R: SeriesRenderer + ?Sized,
    W: Write,
{
    let json = JsonFormatter::series_to_json_string(series)?;
    writeln!(out, "{json}").map_err(RenderError::Output)?;
    out.flush().map_err(RenderError::Output)?;
    renderer.render(series, title)
}
