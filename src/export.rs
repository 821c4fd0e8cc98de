// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::pipeline::ChartSeries;

/// Write the series as CSV rows to any writer
pub fn write_series_csv<W: Write>(series: &ChartSeries, out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);

    // Write headers
    writer.write_record([
        "Bucket",
        "Label",
        "Bucket Start (UTC)",
        "Conversion Rate",
        "Samples",
    ])?;

    for (bucket, label) in series.buckets.iter().zip(&series.labels) {
        let start = bucket.start.to_rfc3339();
        let rate = bucket.conversion_rate.to_string();
        let samples = bucket.samples.to_string();
        writer.write_record([
            bucket.key.as_str(),
            label.as_str(),
            start.as_str(),
            rate.as_str(),
            samples.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Export the series to `<output_dir>/historical_rates_<interval>_<timestamp>.csv`
pub fn export_series_csv(series: &ChartSeries, output_dir: &Path) -> Result<PathBuf> {
    // Create output directory if it doesn't exist
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let csv_path = output_dir.join(format!(
        "historical_rates_{}_{}.csv",
        series.selection.interval, timestamp
    ));
    let file = fs::File::create(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;

    write_series_csv(series, file)?;
    Ok(csv_path)
}
