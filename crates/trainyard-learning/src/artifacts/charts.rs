//! SVG chart primitives on plotters' SVG backend.
//!
//! Every function returns a complete SVG document. Drawing errors are
//! reported as [`LearningError::Diagnostic`] naming the chart.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::stats::{Histogram, padded_range};
use crate::config::{RenderConfig, Rgb};
use crate::error::{LearningError, Result};
use crate::metrics::curves::NamedCurve;

fn err<E: std::fmt::Display>(chart: &'static str) -> impl Fn(E) -> LearningError {
    move |e| LearningError::Diagnostic {
        chart: chart.to_string(),
        message: e.to_string(),
    }
}

fn rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

fn series_color(config: &RenderConfig, i: usize) -> RGBColor {
    if config.series.is_empty() {
        rgb(config.primary)
    } else {
        rgb(config.series[i % config.series.len()])
    }
}

fn render<F>(config: &RenderConfig, chart: &'static str, draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (config.width, config.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(err(chart))?;
        draw(&root)?;
        root.present().map_err(err(chart))?;
    }
    Ok(svg)
}

/// Label of the category at integer tick `v`, empty between ticks.
fn category_tick(v: f64, names: &[String]) -> String {
    let index = v.round();
    if (v - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    names.get(index as usize).cloned().unwrap_or_default()
}

/// A reference line drawn across a scatter plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceLine {
    Horizontal(f64),
    Line { slope: f64, intercept: f64 },
}

impl ReferenceLine {
    pub const IDENTITY: ReferenceLine = ReferenceLine::Line {
        slope: 1.0,
        intercept: 0.0,
    };

    fn at(&self, x: f64) -> f64 {
        match *self {
            ReferenceLine::Horizontal(y) => y,
            ReferenceLine::Line { slope, intercept } => slope * x + intercept,
        }
    }
}

/// Annotated heatmap. Rows are true classes (first at the top), columns
/// predicted classes.
pub fn confusion_matrix(
    title: &str,
    matrix: &[Vec<usize>],
    labels: &[String],
    config: &RenderConfig,
) -> Result<String> {
    const CHART: &str = "confusion matrix";
    let n = matrix.len();
    if n == 0 || labels.len() != n {
        return Err(LearningError::Diagnostic {
            chart: CHART.to_string(),
            message: "matrix and labels disagree in size".to_string(),
        });
    }
    let max = matrix.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
    let base = config.primary;
    let family = config.font_family.as_str();
    // Row labels read top to bottom.
    let row_labels: Vec<String> = labels.iter().rev().cloned().collect();

    render(config, CHART, |root| {
        let span = -0.5..n as f64 - 0.5;
        let mut chart = ChartBuilder::on(root)
            .caption(title, (family, config.caption_size as f64))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(span.clone(), span)
            .map_err(err(CHART))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n)
            .y_labels(n)
            .x_label_formatter(&|v| category_tick(*v, labels))
            .y_label_formatter(&|v| category_tick(*v, &row_labels))
            .x_desc("Predicted")
            .y_desc("Actual")
            .label_style((family, config.label_size as f64))
            .draw()
            .map_err(err(CHART))?;

        let cells = matrix.iter().enumerate().flat_map(|(i, row)| {
            row.iter().enumerate().map(move |(j, &count)| (i, j, count))
        });
        let shade = |t: f64| {
            let mix = |c: u8| (255.0 - (255.0 - c as f64) * t).round() as u8;
            RGBColor(mix(base.0), mix(base.1), mix(base.2))
        };

        chart
            .draw_series(cells.clone().map(|(i, j, count)| {
                let (x, y) = (j as f64, (n - 1 - i) as f64);
                Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    shade(count as f64 / max).filled(),
                )
            }))
            .map_err(err(CHART))?;

        chart
            .draw_series(cells.map(|(i, j, count)| {
                let text_color = if count as f64 / max > 0.5 { WHITE } else { BLACK };
                let style = (family, config.label_size as f64 + 4.0)
                    .into_font()
                    .color(&text_color)
                    .pos(Pos::new(HPos::Center, VPos::Center));
                Text::new(count.to_string(), (j as f64, (n - 1 - i) as f64), style)
            }))
            .map_err(err(CHART))?;
        Ok(())
    })
}

/// One line per curve with a legend entry `"{name} (AUC = …)"`.
///
/// `chance_line` adds the diagonal of a random classifier, as on ROC plots.
pub fn curves(
    title: &str,
    x_desc: &str,
    y_desc: &str,
    curves: &[NamedCurve],
    chance_line: bool,
    config: &RenderConfig,
) -> Result<String> {
    const CHART: &str = "curve";
    if curves.is_empty() {
        return Err(LearningError::Diagnostic {
            chart: CHART.to_string(),
            message: "no curves to draw".to_string(),
        });
    }
    let family = config.font_family.as_str();

    render(config, CHART, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (family, config.caption_size as f64))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..1.0, 0.0..1.05)
            .map_err(err(CHART))?;

        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .label_style((family, config.label_size as f64))
            .draw()
            .map_err(err(CHART))?;

        if chance_line {
            let grey = RGBColor(150, 150, 150);
            chart
                .draw_series(LineSeries::new(vec![(0.0, 0.0), (1.0, 1.0)], grey.stroke_width(1)))
                .map_err(err(CHART))?
                .label("chance")
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], grey));
        }

        for (i, named) in curves.iter().enumerate() {
            let color = series_color(config, i);
            let points: Vec<(f64, f64)> = named
                .curve
                .x
                .iter()
                .copied()
                .zip(named.curve.y.iter().copied())
                .collect();
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))
                .map_err(err(CHART))?
                .label(format!("{} (AUC = {:.3})", named.name, named.curve.auc))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }

        chart
            .configure_series_labels()
            .position(if chance_line {
                SeriesLabelPosition::LowerRight
            } else {
                SeriesLabelPosition::LowerLeft
            })
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((family, config.label_size as f64))
            .draw()
            .map_err(err(CHART))?;
        Ok(())
    })
}

/// Horizontal bars, largest importance at the top.
pub fn feature_importance(
    title: &str,
    importances: &[(String, f64)],
    config: &RenderConfig,
) -> Result<String> {
    const CHART: &str = "feature importance";
    if importances.is_empty() {
        return Err(LearningError::Diagnostic {
            chart: CHART.to_string(),
            message: "no features to draw".to_string(),
        });
    }
    let mut sorted = importances.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    let n = sorted.len();
    // Tick k (bottom to top) names the feature drawn at height k.
    let names: Vec<String> = sorted.iter().rev().map(|(name, _)| name.clone()).collect();
    let max = sorted[0].1.max(f64::EPSILON);
    let color = rgb(config.primary);
    let family = config.font_family.as_str();

    render(config, CHART, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (family, config.caption_size as f64))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(140)
            .build_cartesian_2d(0.0..max * 1.1, -0.5..n as f64 - 0.5)
            .map_err(err(CHART))?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(n)
            .y_label_formatter(&|v| category_tick(*v, &names))
            .x_desc("Importance")
            .label_style((family, config.label_size as f64))
            .draw()
            .map_err(err(CHART))?;

        chart
            .draw_series(sorted.iter().enumerate().map(|(i, (_, value))| {
                let y = (n - 1 - i) as f64;
                Rectangle::new([(0.0, y - 0.4), (*value, y + 0.4)], color.filled())
            }))
            .map_err(err(CHART))?;
        Ok(())
    })
}

/// Scatter of `points` with an optional reference line across the x range.
pub fn scatter(
    title: &str,
    x_desc: &str,
    y_desc: &str,
    points: &[(f64, f64)],
    reference: Option<ReferenceLine>,
    config: &RenderConfig,
) -> Result<String> {
    const CHART: &str = "scatter";
    if points.is_empty() {
        return Err(LearningError::Diagnostic {
            chart: CHART.to_string(),
            message: "no points to draw".to_string(),
        });
    }
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let mut ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let x_range = padded_range(&xs);
    if let Some(line) = reference {
        ys.push(line.at(x_range.start));
        ys.push(line.at(x_range.end));
    }
    let y_range = padded_range(&ys);
    let (dot, line_color) = (rgb(config.primary), rgb(config.accent));
    let family = config.font_family.as_str();

    render(config, CHART, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (family, config.caption_size as f64))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), y_range)
            .map_err(err(CHART))?;

        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .label_style((family, config.label_size as f64))
            .draw()
            .map_err(err(CHART))?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, dot.mix(0.6).filled())),
            )
            .map_err(err(CHART))?;

        if let Some(line) = reference {
            let ends = vec![
                (x_range.start, line.at(x_range.start)),
                (x_range.end, line.at(x_range.end)),
            ];
            chart
                .draw_series(LineSeries::new(ends, line_color.stroke_width(2)))
                .map_err(err(CHART))?;
        }
        Ok(())
    })
}

/// Density-scaled histogram with an optional density curve on top.
pub fn histogram(
    title: &str,
    x_desc: &str,
    hist: &Histogram,
    density: Option<&[(f64, f64)]>,
    config: &RenderConfig,
) -> Result<String> {
    const CHART: &str = "histogram";
    let heights = hist.densities();
    let top = heights
        .iter()
        .copied()
        .chain(density.into_iter().flatten().map(|p| p.1))
        .fold(0.0, f64::max)
        .max(f64::EPSILON);
    let (lo, hi) = (hist.edges[0], hist.edges[hist.edges.len() - 1]);
    let (bar, curve) = (rgb(config.primary), rgb(config.accent));
    let family = config.font_family.as_str();

    render(config, CHART, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (family, config.caption_size as f64))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(lo..hi, 0.0..top * 1.1)
            .map_err(err(CHART))?;

        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc("Density")
            .label_style((family, config.label_size as f64))
            .draw()
            .map_err(err(CHART))?;

        chart
            .draw_series(hist.edges.windows(2).zip(&heights).map(|(edge, h)| {
                Rectangle::new([(edge[0], 0.0), (edge[1], *h)], bar.mix(0.7).filled())
            }))
            .map_err(err(CHART))?;

        if let Some(points) = density {
            chart
                .draw_series(LineSeries::new(points.to_vec(), curve.stroke_width(2)))
                .map_err(err(CHART))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::curves::Curve;

    #[test]
    fn test_confusion_matrix_svg_contains_counts() {
        let svg = confusion_matrix(
            "Confusion Matrix",
            &[vec![7, 1], vec![2, 9]],
            &["no".to_string(), "yes".to_string()],
            &RenderConfig::default(),
        )
        .unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains(">9<"));
        assert!(svg.contains("Confusion Matrix"));
    }

    #[test]
    fn test_confusion_matrix_rejects_mismatched_labels() {
        let err = confusion_matrix("cm", &[vec![1]], &[], &RenderConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "DIAGNOSTIC_RENDER_ERROR");
    }

    #[test]
    fn test_curves_legend_shows_auc() {
        let curve = NamedCurve {
            name: "yes".to_string(),
            curve: Curve {
                x: vec![0.0, 0.5, 1.0],
                y: vec![0.0, 1.0, 1.0],
                auc: 0.75,
            },
        };
        let svg = curves("ROC Curve", "FPR", "TPR", &[curve], true, &RenderConfig::default())
            .unwrap();
        assert!(svg.contains("AUC = 0.750"));
    }

    #[test]
    fn test_scatter_with_constant_points() {
        let svg = scatter(
            "Residual Plot",
            "Predicted",
            "Residual",
            &[(1.0, 0.0), (1.0, 0.0)],
            Some(ReferenceLine::Horizontal(0.0)),
            &RenderConfig::default(),
        )
        .unwrap();
        assert!(svg.contains("Residual Plot"));
    }
}
