//! Self-contained SVG chart rendering.
//!
//! Charts are pure projections of already-computed values: a category axis
//! (trace names), a value axis (percentage or absolute), and one of four
//! kinds — stacked bar, grouped bar, boxplot, line. The output is a single
//! SVG document with no external references, written as-is into the output
//! directory.

use std::fmt::Write as _;

/// One named series of values, one value per category.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub values: Vec<f64>,
}

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 110.0;

/// Fill palette, cycled per series.
const PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
    "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

fn plot_width() -> f64 {
    WIDTH - MARGIN_LEFT - MARGIN_RIGHT
}

fn plot_height() -> f64 {
    HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
}

fn color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Rounds a data maximum up to a tick-friendly value.
fn nice_max(max: f64) -> f64 {
    if max <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(max.log10().floor());
    let scaled = max / magnitude;
    let nice = if scaled <= 1.0 {
        1.0
    } else if scaled <= 2.0 {
        2.0
    } else if scaled <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn open_svg(out: &mut String) {
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif" font-size="11">"#
    );
    let _ = writeln!(
        out,
        r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="white"/>"#
    );
}

/// Value axis with horizontal gridlines and tick labels. `min` is 0 for
/// non-negative data and a nice negative limit otherwise.
fn value_axis(out: &mut String, min: f64, max: f64, label: &str) {
    let ticks = 5;
    let span = max - min;
    for i in 0..=ticks {
        let value = min + span * f64::from(i) / f64::from(ticks);
        let y = MARGIN_TOP + plot_height() * (max - value) / span;
        let _ = writeln!(
            out,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#dddddd"/>"##,
            WIDTH - MARGIN_RIGHT
        );
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{value:.0}</text>"#,
            MARGIN_LEFT - 6.0,
            y + 4.0
        );
    }
    let _ = writeln!(
        out,
        r#"<text x="16" y="{:.1}" transform="rotate(-90 16 {:.1})" text-anchor="middle">{}</text>"#,
        MARGIN_TOP + plot_height() / 2.0,
        MARGIN_TOP + plot_height() / 2.0,
        escape(label)
    );
}

/// Rotated category labels along the bottom edge.
fn category_labels(out: &mut String, categories: &[String]) {
    let slot = plot_width() / categories.len().max(1) as f64;
    for (i, name) in categories.iter().enumerate() {
        let x = MARGIN_LEFT + slot * (i as f64 + 0.5);
        let y = HEIGHT - MARGIN_BOTTOM + 14.0;
        let _ = writeln!(
            out,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="end" transform="rotate(-30 {x:.1} {y:.1})">{}</text>"#,
            escape(name)
        );
    }
}

/// Legend swatches across the top edge.
fn legend(out: &mut String, labels: &[&str]) {
    let mut x = MARGIN_LEFT;
    for (i, label) in labels.iter().enumerate() {
        let _ = writeln!(
            out,
            r#"<rect x="{x:.1}" y="14" width="10" height="10" fill="{}"/>"#,
            color(i)
        );
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="23">{}</text>"#,
            x + 14.0,
            escape(label)
        );
        x += 14.0 + 7.0 * label.len() as f64 + 24.0;
    }
}

/// Grouped vertical bars: one group per category, one bar per series.
///
/// Values may be negative (a contender faster than its baseline has a
/// negative overhead ratio); those bars hang below a zero baseline.
pub fn grouped_bar(
    categories: &[String],
    series: &[Series],
    value_label: &str,
) -> String {
    let data_max = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(0.0, f64::max);
    let data_min = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(0.0, f64::min);
    let max = nice_max(data_max);
    let min = if data_min < 0.0 { -nice_max(-data_min) } else { 0.0 };
    let span = max - min;

    let mut out = String::new();
    open_svg(&mut out);
    value_axis(&mut out, min, max, value_label);
    category_labels(&mut out, categories);
    let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
    legend(&mut out, &labels);

    let to_y = |value: f64| MARGIN_TOP + plot_height() * (max - value) / span;
    let zero = to_y(0.0);
    if min < 0.0 {
        let _ = writeln!(
            out,
            r#"<line x1="{MARGIN_LEFT}" y1="{zero:.1}" x2="{:.1}" y2="{zero:.1}" stroke="black"/>"#,
            WIDTH - MARGIN_RIGHT
        );
    }

    let slot = plot_width() / categories.len().max(1) as f64;
    let bar = (slot * 0.8) / series.len().max(1) as f64;
    for (ci, _) in categories.iter().enumerate() {
        for (si, s) in series.iter().enumerate() {
            let value = s.values.get(ci).copied().unwrap_or(0.0);
            let x = MARGIN_LEFT + slot * ci as f64 + slot * 0.1
                + bar * si as f64;
            let end = to_y(value);
            let y = end.min(zero);
            let h = (end - zero).abs();
            let _ = writeln!(
                out,
                r#"<rect x="{x:.1}" y="{y:.1}" width="{bar:.1}" height="{h:.1}" fill="{}"/>"#,
                color(si)
            );
        }
    }
    out.push_str("</svg>\n");
    out
}

/// Stacked bars: one bar per category, segments stacked in series order.
///
/// `horizontal` lays categories down the left edge instead (the event-type
/// breakdown reads better that way, as does the original's barh).
pub fn stacked_bar(
    categories: &[String],
    series: &[Series],
    value_label: &str,
    horizontal: bool,
) -> String {
    let totals: Vec<f64> = (0..categories.len())
        .map(|ci| {
            series
                .iter()
                .map(|s| s.values.get(ci).copied().unwrap_or(0.0))
                .sum()
        })
        .collect();
    let max = nice_max(totals.iter().copied().fold(0.0, f64::max));

    let mut out = String::new();
    open_svg(&mut out);
    let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
    legend(&mut out, &labels);

    if horizontal {
        // Value axis along the bottom, category names on the left.
        let ticks = 5;
        for i in 0..=ticks {
            let value = max * f64::from(i) / f64::from(ticks);
            let x = MARGIN_LEFT + plot_width() * value / max;
            let _ = writeln!(
                out,
                r##"<line x1="{x:.1}" y1="{MARGIN_TOP}" x2="{x:.1}" y2="{:.1}" stroke="#dddddd"/>"##,
                HEIGHT - MARGIN_BOTTOM
            );
            let _ = writeln!(
                out,
                r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle">{value:.0}</text>"#,
                HEIGHT - MARGIN_BOTTOM + 14.0
            );
        }
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            MARGIN_LEFT + plot_width() / 2.0,
            HEIGHT - MARGIN_BOTTOM + 32.0,
            escape(value_label)
        );

        let slot = plot_height() / categories.len().max(1) as f64;
        for (ci, name) in categories.iter().enumerate() {
            let y = MARGIN_TOP + slot * ci as f64 + slot * 0.15;
            let h = slot * 0.7;
            let _ = writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
                MARGIN_LEFT - 6.0,
                y + h / 2.0 + 4.0,
                escape(name)
            );
            let mut x = MARGIN_LEFT;
            for (si, s) in series.iter().enumerate() {
                let value = s.values.get(ci).copied().unwrap_or(0.0);
                let w = plot_width() * value / max;
                let _ = writeln!(
                    out,
                    r#"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="{}"/>"#,
                    color(si)
                );
                x += w;
            }
        }
    } else {
        value_axis(&mut out, 0.0, max, value_label);
        category_labels(&mut out, categories);
        let slot = plot_width() / categories.len().max(1) as f64;
        for (ci, _) in categories.iter().enumerate() {
            let x = MARGIN_LEFT + slot * ci as f64 + slot * 0.15;
            let w = slot * 0.7;
            let mut top = MARGIN_TOP + plot_height();
            for (si, s) in series.iter().enumerate() {
                let value = s.values.get(ci).copied().unwrap_or(0.0);
                let h = plot_height() * value / max;
                top -= h;
                let _ = writeln!(
                    out,
                    r#"<rect x="{x:.1}" y="{top:.1}" width="{w:.1}" height="{h:.1}" fill="{}"/>"#,
                    color(si)
                );
            }
        }
    }
    out.push_str("</svg>\n");
    out
}

/// Quartiles of a sorted slice by linear interpolation.
fn quartiles(sorted: &[f64]) -> (f64, f64, f64) {
    fn at(sorted: &[f64], q: f64) -> f64 {
        let pos = q * (sorted.len() - 1) as f64;
        let low = pos.floor() as usize;
        let high = pos.ceil() as usize;
        let frac = pos - low as f64;
        sorted[low] * (1.0 - frac) + sorted[high] * frac
    }
    (at(sorted, 0.25), at(sorted, 0.5), at(sorted, 0.75))
}

/// Horizontal boxplots: one box per category, whiskers at min/max.
pub fn boxplot(
    categories: &[String],
    data: &[Vec<f64>],
    value_label: &str,
) -> String {
    let max = nice_max(
        data.iter()
            .flat_map(|d| d.iter().copied())
            .fold(0.0, f64::max),
    );
    let mut out = String::new();
    open_svg(&mut out);

    let ticks = 5;
    for i in 0..=ticks {
        let value = max * f64::from(i) / f64::from(ticks);
        let x = MARGIN_LEFT + plot_width() * value / max;
        let _ = writeln!(
            out,
            r##"<line x1="{x:.1}" y1="{MARGIN_TOP}" x2="{x:.1}" y2="{:.1}" stroke="#dddddd"/>"##,
            HEIGHT - MARGIN_BOTTOM
        );
        let _ = writeln!(
            out,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle">{value:.0}</text>"#,
            HEIGHT - MARGIN_BOTTOM + 14.0
        );
    }
    let _ = writeln!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
        MARGIN_LEFT + plot_width() / 2.0,
        HEIGHT - MARGIN_BOTTOM + 32.0,
        escape(value_label)
    );

    let to_x = |value: f64| MARGIN_LEFT + plot_width() * value / max;
    let slot = plot_height() / categories.len().max(1) as f64;
    for (ci, name) in categories.iter().enumerate() {
        let mut sorted = data[ci].clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        if sorted.is_empty() {
            continue;
        }
        let (q1, median, q3) = quartiles(&sorted);
        let (low, high) = (sorted[0], sorted[sorted.len() - 1]);

        let mid = MARGIN_TOP + slot * (ci as f64 + 0.5);
        let h = slot * 0.5;
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            MARGIN_LEFT - 6.0,
            mid + 4.0,
            escape(name)
        );
        // Whisker line, box, median tick.
        let _ = writeln!(
            out,
            r#"<line x1="{:.1}" y1="{mid:.1}" x2="{:.1}" y2="{mid:.1}" stroke="black"/>"#,
            to_x(low),
            to_x(high)
        );
        let _ = writeln!(
            out,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{h:.1}" fill="#9ecae1" stroke="black"/>"##,
            to_x(q1),
            mid - h / 2.0,
            (to_x(q3) - to_x(q1)).max(1.0)
        );
        let _ = writeln!(
            out,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black" stroke-width="2"/>"#,
            to_x(median),
            mid - h / 2.0,
            to_x(median),
            mid + h / 2.0
        );
    }
    out.push_str("</svg>\n");
    out
}

/// Line chart with one line per series over a shared numeric x axis.
///
/// `log_x` maps x through log10 (all x values must be positive then),
/// used for build-limit sweeps that span orders of magnitude.
pub fn line_chart(
    xs: &[f64],
    series: &[Series],
    x_label: &str,
    y_label: &str,
    log_x: bool,
) -> String {
    let map_x = |x: f64| if log_x { x.log10() } else { x };
    let (x_min, x_max) = xs.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), &x| (lo.min(map_x(x)), hi.max(map_x(x))),
    );
    let span = (x_max - x_min).max(f64::EPSILON);
    let max = nice_max(
        series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0, f64::max),
    );

    let mut out = String::new();
    open_svg(&mut out);
    value_axis(&mut out, 0.0, max, y_label);
    let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
    legend(&mut out, &labels);

    let to_x =
        |x: f64| MARGIN_LEFT + plot_width() * (map_x(x) - x_min) / span;
    // One tick per sampled x value, as the sweep grid is explicit.
    for &x in xs {
        let px = to_x(x);
        let _ = writeln!(
            out,
            r#"<text x="{px:.1}" y="{:.1}" text-anchor="middle">{x:.0}</text>"#,
            HEIGHT - MARGIN_BOTTOM + 14.0
        );
    }
    let _ = writeln!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
        MARGIN_LEFT + plot_width() / 2.0,
        HEIGHT - MARGIN_BOTTOM + 32.0,
        escape(x_label)
    );

    for (si, s) in series.iter().enumerate() {
        let points: Vec<String> = xs
            .iter()
            .zip(&s.values)
            .map(|(&x, &y)| {
                format!(
                    "{:.1},{:.1}",
                    to_x(x),
                    MARGIN_TOP + plot_height() * (1.0 - y / max)
                )
            })
            .collect();
        let _ = writeln!(
            out,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="1.5"/>"#,
            points.join(" "),
            color(si)
        );
    }
    out.push_str("</svg>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn series(label: &str, values: &[f64]) -> Series {
        Series {
            label: label.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn nice_max_rounds_up_to_tick_friendly_values() {
        assert_eq!(nice_max(87.0), 100.0);
        assert_eq!(nice_max(42.0), 50.0);
        assert_eq!(nice_max(13.0), 20.0);
        assert_eq!(nice_max(0.0), 1.0);
    }

    #[test]
    fn quartiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        let (q1, median, q3) = quartiles(&sorted);
        assert_eq!(median, 2.5);
        assert_eq!(q1, 1.75);
        assert_eq!(q3, 3.25);
    }

    #[test]
    fn grouped_bar_emits_one_rect_per_bar() {
        let svg = grouped_bar(
            &categories(&["a", "b"]),
            &[series("s1", &[1.0, 2.0]), series("s2", &[3.0, 4.0])],
            "[%]",
        );
        // Background rect plus 4 bars plus 1 legend swatch per series.
        let rects = svg.matches("<rect").count();
        assert_eq!(rects, 1 + 4 + 2);
        assert!(svg.contains("</svg>"));
    }

    #[test]
    fn grouped_bar_hangs_negative_values_below_zero() {
        let svg = grouped_bar(
            &categories(&["fast.std", "slow.std"]),
            &[series("overhead", &[-33.33, 50.0])],
            "overhead [%]",
        );
        assert!(
            !svg.contains("height=\"-"),
            "rect heights must never be negative"
        );
        // Scale is [-50, 50], so zero sits mid-plot and the negative bar
        // starts at the baseline.
        assert!(svg.contains(r#"y2="210.0" stroke="black""#));
        assert!(svg.contains(r#"y="210.0" width="#));
        assert!(svg.contains(">-50</text>"));
    }

    #[test]
    fn stacked_bar_segments_accumulate() {
        let svg = stacked_bar(
            &categories(&["a"]),
            &[series("s1", &[40.0]), series("s2", &[60.0])],
            "[%]",
            false,
        );
        assert_eq!(svg.matches("<rect").count(), 1 + 2 + 2);
    }

    #[test]
    fn boxplot_renders_each_category() {
        let svg = boxplot(
            &categories(&["a", "b"]),
            &[vec![1.0, 2.0, 3.0, 10.0], vec![4.0, 5.0, 6.0]],
            "[%]",
        );
        // One box rect per category plus the background.
        assert_eq!(svg.matches("fill=\"#9ecae1\"").count(), 2);
        assert!(svg.contains("a</text>"));
    }

    #[test]
    fn line_chart_emits_one_polyline_per_series() {
        let svg = line_chart(
            &[1.0, 10.0, 100.0],
            &[series("t1", &[5.0, 4.0, 3.0]), series("t2", &[9.0, 9.0, 9.0])],
            "limit",
            "ms",
            true,
        );
        assert_eq!(svg.matches("<polyline").count(), 2);
    }

    #[test]
    fn category_names_are_xml_escaped() {
        let svg = grouped_bar(
            &categories(&["a<b&c"]),
            &[series("s", &[1.0])],
            "ms",
        );
        assert!(svg.contains("a&lt;b&amp;c"));
        assert!(!svg.contains("a<b&c"));
    }
}
