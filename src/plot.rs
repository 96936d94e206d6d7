//! PNG rendering of the presenter's views.

use std::path::Path;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use palette::{LinSrgb, Mix, Srgb};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::info;

use crate::present::CorrelationMatrix;

pub const ORANGE: RGBColor = RGBColor(255, 127, 14);

const COOL: (f32, f32, f32) = (59.0, 76.0, 192.0);
const NEUTRAL: (f32, f32, f32) = (221.0, 221.0, 221.0);
const WARM: (f32, f32, f32) = (180.0, 4.0, 38.0);

fn linear((r, g, b): (f32, f32, f32)) -> LinSrgb {
    Srgb::new(r / 255.0, g / 255.0, b / 255.0).into_linear()
}

/// Diverging blue-grey-red scale for correlations in `-1.0..=1.0`.
pub fn coolwarm(r: f64) -> RGBColor {
    if r.is_nan() {
        return RGBColor(255, 255, 255);
    }
    let t = r.clamp(-1.0, 1.0) as f32;
    let end = if t < 0.0 { COOL } else { WARM };
    let mixed = linear(NEUTRAL).mix(linear(end), t.abs());
    let c: Srgb<u8> = Srgb::<f32>::from_linear(mixed).into_format();
    RGBColor(c.red, c.green, c.blue)
}

pub fn line_chart(
    path: &Path,
    title: &str,
    y_desc: &str,
    label: &str,
    color: RGBColor,
    points: &[(NaiveDate, f64)],
) -> Result<()> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        bail!("no points to plot for {}", title);
    };
    let min_date = first.0;
    let max_date = if last.0 > min_date {
        last.0
    } else {
        min_date + chrono::Duration::days(1)
    };
    let max_y = points.iter().map(|p| p.1).fold(1.0, f64::max) * 1.05;

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(title, ("sans-serif", 30))
        .set_label_area_size(LabelAreaPosition::Left, 90)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(min_date..max_date, 0f64..max_y)?;
    chart
        .configure_mesh()
        .x_labels(8)
        .x_desc("Date")
        .y_desc(y_desc)
        .y_label_formatter(&|y| format!("{:.0}", y))
        .draw()?;
    chart
        .draw_series(LineSeries::new(points.iter().copied(), color))?
        .label(label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;
    root.present()?;
    info!("wrote {}", path.display());
    Ok(())
}

pub fn heatmap(path: &Path, matrix: &CorrelationMatrix) -> Result<()> {
    let n = matrix.labels.len() as i32;
    let labels = matrix.labels;
    // Row 0 goes on top, so flip the y index.
    let row_label = move |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => labels
            .get((n - 1 - i) as usize)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    let col_label = move |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => labels
            .get(*i as usize)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    let root = BitMapBackend::new(path, (800, 650)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("Correlation Between COVID-19 Metrics", ("sans-serif", 30))
        .set_label_area_size(LabelAreaPosition::Left, 110)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d((0..n).into_segmented(), (0..n).into_segmented())?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n as usize)
        .y_labels(n as usize)
        .x_label_formatter(&col_label)
        .y_label_formatter(&row_label)
        .draw()?;

    let cells: Vec<(i32, i32, f64)> = matrix
        .values
        .iter()
        .enumerate()
        .flat_map(|(row, line)| {
            line.iter()
                .enumerate()
                .map(move |(col, v)| (col as i32, n - 1 - row as i32, *v))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        Rectangle::new(
            [
                (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
            ],
            coolwarm(v).filled(),
        )
    }))?;
    let annotation =
        TextStyle::from(("sans-serif", 22).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        Text::new(
            format!("{:.2}", v),
            (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
            annotation.clone(),
        )
    }))?;
    root.present()?;
    info!("wrote {}", path.display());
    Ok(())
}

pub fn totals_bar(path: &Path, region: &str, bars: &[(&'static str, f64); 2]) -> Result<()> {
    let max_y = bars.iter().map(|b| b.1).fold(1.0, f64::max) * 1.1;
    let names = [bars[0].0, bars[1].0];
    let bar_label = move |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => names
            .get(*i as usize)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            format!("Total Cases vs Total Deaths ({})", region),
            ("sans-serif", 30),
        )
        .set_label_area_size(LabelAreaPosition::Left, 100)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d((0..2).into_segmented(), 0f64..max_y)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Count")
        .x_labels(2)
        .x_label_formatter(&bar_label)
        .y_label_formatter(&|y| format!("{:.0}", y))
        .draw()?;
    chart.draw_series(
        Histogram::vertical(&chart)
            .style_func(|x, _| match x {
                SegmentValue::Exact(0) | SegmentValue::CenterOf(0) => BLUE.filled(),
                _ => ORANGE.filled(),
            })
            .margin(60)
            .data(bars.iter().enumerate().map(|(i, b)| (i as i32, b.1))),
    )?;
    root.present()?;
    info!("wrote {}", path.display());
    Ok(())
}
