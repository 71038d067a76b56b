//! Text and graph renderings of an aligned matrix.

use std::fmt::Write as _;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::ApiError;
use crate::matrix::Matrix;

/// Output selected by the `format` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Borderless table of `<duration> code:<ok>` cells.
    Standard,
    /// Bordered table with a header row and source column.
    Fancy,
    /// Borderless table of bare durations.
    Simple,
    Json,
    Svg,
    Dot,
}

impl Format {
    /// Unknown tokens fall back to [`Format::Standard`].
    pub fn from_query(token: Option<&str>) -> Self {
        match token {
            Some("fancy") => Format::Fancy,
            Some("simple") => Format::Simple,
            Some("json") => Format::Json,
            Some("svg") => Format::Svg,
            Some("dot") => Format::Dot,
            _ => Format::Standard,
        }
    }
}

pub fn format_duration(d: Duration) -> String {
    format!("{:?}", d)
}

fn cell(d: Duration, ok: bool) -> String {
    format!("{} code:{}", format_duration(d), ok)
}

/// Render `m` as one of the table formats.
pub fn table(m: &Matrix, format: Format) -> String {
    if m.is_empty() {
        return "\n".to_string();
    }
    match format {
        Format::Fancy => {
            let mut header = vec!["SOURCE\\DEST".to_string()];
            header.extend(m.rows()[0].latencies.iter().map(|l| l.label().to_string()));
            let rows = m
                .rows()
                .iter()
                .map(|v| {
                    let mut line = vec![v.label().to_string()];
                    line.extend(v.latencies.iter().map(|l| cell(l.duration, l.ok)));
                    line
                })
                .collect();
            Table::bordered(header, rows).render()
        }
        Format::Simple => Table::plain(
            m.rows()
                .iter()
                .map(|v| v.latencies.iter().map(|l| format_duration(l.duration)).collect())
                .collect(),
        )
        .render(),
        _ => Table::plain(
            m.rows()
                .iter()
                .map(|v| v.latencies.iter().map(|l| cell(l.duration, l.ok)).collect())
                .collect(),
        )
        .render(),
    }
}

struct Table {
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    border: bool,
}

impl Table {
    fn bordered(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header: Some(header),
            rows,
            border: true,
        }
    }

    fn plain(rows: Vec<Vec<String>>) -> Self {
        Self {
            header: None,
            rows,
            border: false,
        }
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths = Vec::new();
        for line in self.header.iter().chain(self.rows.iter()) {
            for (i, c) in line.iter().enumerate() {
                let w = c.chars().count();
                match widths.get_mut(i) {
                    Some(max) if *max < w => *max = w,
                    Some(_) => {}
                    None => widths.push(w),
                }
            }
        }
        widths
    }

    fn render(&self) -> String {
        let widths = self.widths();
        let pad = |line: &[String]| -> Vec<String> {
            widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let c = line.get(i).map(String::as_str).unwrap_or("");
                    format!("{:<w$}", c, w = *w)
                })
                .collect()
        };

        let mut out = String::new();
        if !self.border {
            for line in &self.rows {
                let _ = writeln!(out, "{}", pad(line).join("  ").trim_end());
            }
            return out;
        }

        let rule = format!(
            "+{}+",
            widths
                .iter()
                .map(|w| "-".repeat(w + 2))
                .collect::<Vec<_>>()
                .join("+")
        );
        let _ = writeln!(out, "{}", rule);
        if let Some(header) = &self.header {
            let _ = writeln!(out, "| {} |", pad(header).join(" | "));
            let _ = writeln!(out, "{}", rule);
        }
        for line in &self.rows {
            let _ = writeln!(out, "| {} |", pad(line).join(" | "));
        }
        let _ = writeln!(out, "{}", rule);
        out
    }
}

/// Edge style for a measured duration, from healthy to broken.
pub fn edge_style(d: Duration) -> &'static str {
    if d > Duration::from_secs(10) {
        "dotted"
    } else if d > Duration::from_millis(100) {
        "dashed"
    } else if d > Duration::from_millis(10) {
        "solid"
    } else {
        "bold"
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Build a Graphviz document with one edge per measured cell.
///
/// With `self_targets` the destinations are the row nodes themselves;
/// otherwise they are drawn as a separate set of dashed nodes taken
/// from the first row.
pub fn dot(m: &Matrix, self_targets: bool) -> String {
    let mut out = String::from("digraph {\n");
    for (i, v) in m.rows().iter().enumerate() {
        let _ = writeln!(out, "  n{} [label={}];", i, quote(v.label()));
    }

    let targets: Vec<String> = if self_targets {
        (0..m.rows().len()).map(|i| format!("n{}", i)).collect()
    } else {
        let first = m.rows().first().map(|v| v.latencies.as_slice()).unwrap_or(&[]);
        first
            .iter()
            .enumerate()
            .map(|(j, l)| {
                let _ = writeln!(out, "  t{} [label={}, style=dashed];", j, quote(l.label()));
                format!("t{}", j)
            })
            .collect()
    };

    for (i, v) in m.rows().iter().enumerate() {
        for (l, target) in v.latencies.iter().zip(&targets) {
            if l.placeholder {
                continue;
            }
            let _ = writeln!(
                out,
                "  n{} -> {} [label={}, style={}];",
                i,
                target,
                quote(&format_duration(l.duration)),
                edge_style(l.duration)
            );
        }
    }
    out.push_str("}\n");
    out
}

/// Lay out a DOT document as SVG with the Graphviz command `cmd`.
pub async fn svg(dot: &str, cmd: &str) -> Result<Vec<u8>, ApiError> {
    let mut child = Command::new(cmd)
        .arg("-Tsvg")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ApiError::Render(format!("failed to start {}: {}", cmd, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(dot.as_bytes())
            .await
            .map_err(|e| ApiError::Render(format!("failed to write to {}: {}", cmd, e)))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ApiError::Render(format!("failed to wait for {}: {}", cmd, e)))?;
    if !output.status.success() {
        return Err(ApiError::Render(format!(
            "{} exited with {}: {}",
            cmd,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Latency, Vector};

    fn matrix() -> Matrix {
        let lat = |dest: &str, ip: &str, ms: u64| Latency {
            destination: dest.into(),
            resolved_ip: Some(ip.into()),
            resolved_host: None,
            duration: Duration::from_millis(ms),
            ok: true,
            strategy: None,
            placeholder: false,
        };
        let row = |src: &str, ip: &str, cells: Vec<Latency>| Vector {
            source: src.into(),
            resolved_ip: Some(ip.into()),
            resolved_host: None,
            latencies: cells,
            ok: true,
        };
        Matrix(vec![
            row("a", "10.0.0.1", vec![lat("a", "10.0.0.1", 1), lat("b", "10.0.0.2", 50)]),
            row("b", "10.0.0.2", vec![lat("a", "10.0.0.1", 500), Latency::placeholder()]),
        ])
    }

    #[test]
    fn format_tokens() {
        assert_eq!(Format::from_query(Some("fancy")), Format::Fancy);
        assert_eq!(Format::from_query(Some("svg")), Format::Svg);
        assert_eq!(Format::from_query(Some("nope")), Format::Standard);
        assert_eq!(Format::from_query(None), Format::Standard);
    }

    #[test]
    fn fancy_table_has_header_and_border() {
        let out = table(&matrix(), Format::Fancy);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("+-"));
        assert!(lines[1].contains("SOURCE\\DEST"));
        assert!(lines[1].contains("10.0.0.2"));
        assert!(lines[3].starts_with("| 10.0.0.1"));
        assert!(lines[3].contains("1ms code:true"));
        assert_eq!(lines.len(), 6);
        // Every line has the same width.
        assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
    }

    #[test]
    fn simple_and_standard_tables() {
        let simple = table(&matrix(), Format::Simple);
        assert_eq!(simple.lines().next().unwrap().split_whitespace().collect::<Vec<_>>(), ["1ms", "50ms"]);

        let standard = table(&matrix(), Format::Standard);
        assert!(standard.lines().nth(1).unwrap().starts_with("500ms code:true"));
        assert!(!standard.contains('|'));
    }

    #[test]
    fn empty_matrix_renders_a_newline() {
        assert_eq!(table(&Matrix::default(), Format::Fancy), "\n");
    }

    #[test]
    fn edge_styles_by_bucket() {
        assert_eq!(edge_style(Duration::from_millis(10)), "bold");
        assert_eq!(edge_style(Duration::from_millis(11)), "solid");
        assert_eq!(edge_style(Duration::from_millis(100)), "solid");
        assert_eq!(edge_style(Duration::from_secs(10)), "dashed");
        assert_eq!(edge_style(Duration::from_secs(11)), "dotted");
    }

    #[test]
    fn dot_skips_placeholder_cells() {
        let out = dot(&matrix(), true);
        assert!(out.starts_with("digraph {"));
        assert!(out.contains("n0 [label=\"10.0.0.1\"];"));
        assert!(out.contains("n0 -> n1 [label=\"50ms\", style=solid];"));
        assert!(out.contains("n1 -> n0 [label=\"500ms\", style=dashed];"));
        assert!(!out.contains("n1 -> n1"));
    }

    #[test]
    fn dot_draws_foreign_targets_separately() {
        let out = dot(&matrix(), false);
        assert!(out.contains("t1 [label=\"10.0.0.2\", style=dashed];"));
        assert!(out.contains("n0 -> t0"));
    }

    #[tokio::test]
    async fn missing_layout_binary_is_a_render_error() {
        let err = svg("digraph {}", "/nonexistent/dot").await.unwrap_err();
        assert!(matches!(err, ApiError::Render(_)));
    }
}
