// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::pipeline::ChartSeries;

const LINE_COLOR: RGBColor = RGBColor(63, 81, 181);
const CHART_SIZE: (u32, u32) = (1200, 600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartFormat {
    Svg,
    Bitmap,
}

fn chart_format(output_path: &Path) -> ChartFormat {
    match output_path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("svg") => ChartFormat::Svg,
        _ => ChartFormat::Bitmap,
    }
}

/// Render the series as a filled line chart. `.svg` paths get an SVG, anything else a bitmap.
pub fn render_line_chart(series: &ChartSeries, output_path: &Path) -> Result<()> {
    match chart_format(output_path) {
        ChartFormat::Svg => {
            let root = SVGBackend::new(output_path, CHART_SIZE).into_drawing_area();
            draw_line_chart(&root, series)
        }
        ChartFormat::Bitmap => {
            let root = BitMapBackend::new(output_path, CHART_SIZE).into_drawing_area();
            draw_line_chart(&root, series)
        }
    }
}

fn draw_line_chart<DB>(root: &DrawingArea<DB, Shift>, series: &ChartSeries) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let Some((y_min, y_max)) = series.value_bounds() else {
        let style = ("sans-serif", 28).into_font().color(&BLACK);
        root.draw_text(&series.title, &style, (40, 40))?;
        root.draw_text(
            "No samples in the selected time range",
            &("sans-serif", 20).into_font().color(&BLACK),
            (40, 100),
        )?;
        root.present()?;
        return Ok(());
    };

    let x_max = (series.len().saturating_sub(1)).max(1) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption(&series.title, ("sans-serif", 28).into_font().color(&BLACK))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(series.len().min(10))
        .x_label_formatter(&|x| series.label_at(*x))
        .y_label_formatter(&|y| format!("{:.4}", y))
        .y_desc("Conversion rate")
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    chart
        .draw_series(
            AreaSeries::new(series.points(), y_min, &LINE_COLOR.mix(0.3))
                .border_style(ShapeStyle::from(&LINE_COLOR).stroke_width(2)),
        )?
        .label(series.title.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &LINE_COLOR));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
