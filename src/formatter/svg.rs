//! Линейный график замера в отдельном SVG-файле.

use std::path::{Path, PathBuf};

use super::{RenderError, SeriesRenderer};
use crate::collector::Series;

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const GRID_LINES: usize = 10;

/// Пишет `<prefix>_<device>_<YYYYmmdd_HHMMSS>.svg` в выходной каталог.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    output_dir: PathBuf,
    file_prefix: String,
    y_label: String,
}

impl SvgRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: "cpu_usage".to_string(),
            y_label: "CPU Usage (%)".to_string(),
        }
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    /// Детерминированный путь артефакта для ряда.
    pub fn artifact_path(&self, series: &Series) -> PathBuf {
        let timestamp = series.started_at().format("%Y%m%d_%H%M%S");
        let file_name = format!(
            "{}_{}_{}.svg",
            self.file_prefix,
            sanitize(series.device()),
            timestamp
        );
        self.output_dir.join(file_name)
    }

    /// SVG-документ для ряда.
    pub fn to_svg(&self, series: &Series, title: &str) -> String {
        let points: Vec<(f64, f64)> = series.points().collect();

        let x_max = points
            .iter()
            .map(|(x, _)| *x)
            .chain(series.samples().iter().map(|s| s.offset_seconds))
            .fold(series.duration().as_secs_f64(), f64::max)
            .max(1.0);
        // Шкала в процентах, если значения в неё помещаются.
        let y_max = points.iter().map(|(_, y)| *y).fold(100.0, f64::max);

        let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let sx = |x: f64| MARGIN_LEFT + x / x_max * plot_w;
        let sy = |y: f64| MARGIN_TOP + plot_h - y / y_max * plot_h;

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n"
        ));
        svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"30\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"18\">{}</text>\n",
            WIDTH / 2.0,
            escape(title)
        ));

        // Сетка и подписи делений.
        for i in 0..=GRID_LINES {
            let fraction = i as f64 / GRID_LINES as f64;
            let gx = MARGIN_LEFT + fraction * plot_w;
            let gy = MARGIN_TOP + plot_h - fraction * plot_h;
            svg.push_str(&format!(
                "<line x1=\"{gx:.1}\" y1=\"{MARGIN_TOP}\" x2=\"{gx:.1}\" y2=\"{:.1}\" stroke=\"#dddddd\"/>\n",
                MARGIN_TOP + plot_h
            ));
            svg.push_str(&format!(
                "<line x1=\"{MARGIN_LEFT}\" y1=\"{gy:.1}\" x2=\"{:.1}\" y2=\"{gy:.1}\" stroke=\"#dddddd\"/>\n",
                MARGIN_LEFT + plot_w
            ));
            svg.push_str(&format!(
                "<text x=\"{gx:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"11\">{:.0}</text>\n",
                MARGIN_TOP + plot_h + 18.0,
                fraction * x_max
            ));
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-family=\"sans-serif\" font-size=\"11\">{:.0}</text>\n",
                MARGIN_LEFT - 8.0,
                gy + 4.0,
                fraction * y_max
            ));
        }

        // Оси.
        svg.push_str(&format!(
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{MARGIN_TOP}\" x2=\"{MARGIN_LEFT}\" y2=\"{:.1}\" stroke=\"black\"/>\n",
            MARGIN_TOP + plot_h
        ));
        svg.push_str(&format!(
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"black\"/>\n",
            MARGIN_TOP + plot_h,
            MARGIN_LEFT + plot_w,
            MARGIN_TOP + plot_h
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"13\">Time (seconds)</text>\n",
            MARGIN_LEFT + plot_w / 2.0,
            HEIGHT - 15.0
        ));
        svg.push_str(&format!(
            "<text x=\"20\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"13\" transform=\"rotate(-90 20 {:.1})\">{}</text>\n",
            MARGIN_TOP + plot_h / 2.0,
            MARGIN_TOP + plot_h / 2.0,
            escape(&self.y_label)
        ));

        if !points.is_empty() {
            let coords: Vec<String> = points
                .iter()
                .map(|(x, y)| format!("{:.1},{:.1}", sx(*x), sy(*y)))
                .collect();
            svg.push_str(&format!(
                "<polyline fill=\"none\" stroke=\"#1f77b4\" stroke-width=\"2\" points=\"{}\"/>\n",
                coords.join(" ")
            ));
        }

        // Сбойные тики рисуем на оси времени.
        for sample in series.failures() {
            svg.push_str(&format!(
                "<circle class=\"failed\" cx=\"{:.1}\" cy=\"{:.1}\" r=\"4\" fill=\"#d62728\"/>\n",
                sx(sample.offset_seconds),
                MARGIN_TOP + plot_h
            ));
        }

        svg.push_str("</svg>\n");
        svg
    }
}

impl SeriesRenderer for SvgRenderer {
    fn render(&self, series: &Series, title: &str) -> Result<PathBuf, RenderError> {
        let path = self.artifact_path(series);
        write_file(&path, self.to_svg(series, title).as_bytes())?;
        tracing::info!(device = %series.device(), path = %path.display(), "chart written");
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), RenderError> {
    std::fs::write(path, contents).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::collector::Sample;
    use crate::formatter::emit_series;
    use crate::snmp::{ObjectId, ProtoError, SnmpValue, TransportError};

    fn series() -> Series {
        Series::new(
            "R1/core",
            ObjectId::new([1, 3, 6, 1, 4, 1, 9, 2, 1, 57, 0]),
            Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 5).unwrap(),
            Duration::from_secs(10),
            Duration::from_secs(2),
            vec![
                Sample::ok(0.0, SnmpValue::Integer(12)),
                Sample::failed(
                    2.0,
                    ProtoError::Transport(TransportError::Timeout(Duration::from_secs(3))),
                ),
                Sample::ok(4.0, SnmpValue::Integer(30)),
            ],
        )
    }

    #[test]
    fn test_artifact_name_is_deterministic() {
        let renderer = SvgRenderer::new("/tmp/out");
        assert_eq!(
            renderer.artifact_path(&series()),
            PathBuf::from("/tmp/out/cpu_usage_R1_core_20261019_083005.svg")
        );
    }

    #[test]
    fn test_svg_contents() {
        let svg = SvgRenderer::new(".").to_svg(&series(), "CPU Usage for <R1>");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("CPU Usage for &lt;R1&gt;"));
        assert!(svg.contains("<polyline"));
        assert_eq!(svg.matches("class=\"failed\"").count(), 1);
    }

    #[test]
    fn test_render_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgRenderer::new(dir.path());
        let path = renderer.render(&series(), "CPU").unwrap();
        assert!(path.starts_with(dir.path()));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("</svg>"));
    }

    #[test]
    fn test_render_failure_keeps_series() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let renderer = SvgRenderer::new(&missing);
        let series = series();

        let err = renderer.render(&series, "CPU").unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_failed_render_still_emits_json() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgRenderer::new(dir.path().join("does-not-exist"));
        let mut out = Vec::new();

        let err = emit_series(&series(), &renderer, "CPU", &mut out).unwrap_err();

        assert!(matches!(err, RenderError::Io { .. }));
        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(printed.is_object());
    }

    #[test]
    fn test_emit_series_returns_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgRenderer::new(dir.path());
        let mut out = Vec::new();

        let path = emit_series(&series(), &renderer, "CPU", &mut out).unwrap();

        assert!(path.exists());
        assert!(!out.is_empty());
    }
}
