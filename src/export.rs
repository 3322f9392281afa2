use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use roboanim_path::{ExportRow, ExportSink};
use serde::Serialize;

use crate::settings::ExportFormat;

/// Engineering rows written as CSV with a header line.
pub struct CsvRowSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvRowSink<W> {
    pub fn new(inner: W) -> Self {
        CsvRowSink {
            writer: csv::Writer::from_writer(inner),
        }
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.writer.flush().context("failed to flush CSV")?;
        Ok(())
    }
}

impl<W: Write> ExportSink for CsvRowSink<W> {
    type Error = anyhow::Error;

    fn write_row(&mut self, row: &ExportRow) -> anyhow::Result<()> {
        self.writer.serialize(row).context("failed to write CSV row")?;
        Ok(())
    }
}

/// One key of the chassis animation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyframeRow {
    pub channel: String,
    pub frame: i32,
    pub value: f64,
}

/// Write keyframe rows to `path`; returns the number of rows.
pub fn write_keyframes(path: &Path, rows: &[KeyframeRow], format: ExportFormat) -> anyhow::Result<usize> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(file);
            for row in rows {
                writer.serialize(row).context("failed to write CSV row")?;
            }
            writer.flush().context("failed to flush CSV")?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(file, rows).context("failed to write JSON")?;
        }
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_have_named_columns() {
        let mut sink = CsvRowSink::new(Vec::new());
        let row = ExportRow {
            t: 0.5,
            x: 1.0,
            y: 2.0,
            yaw: 0.25,
            theta_r: 3.0,
            theta_l: 4.0,
            rate_r: 5.0,
            rate_l: 6.0,
        };
        sink.write_row(&row).unwrap();
        let bytes = sink.writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("t,x,y,yaw,thetaR,thetaL,rateR,rateL"));
        assert_eq!(lines.next(), Some("0.5,1.0,2.0,0.25,3.0,4.0,5.0,6.0"));
    }

    #[test]
    fn test_keyframe_export_formats() {
        let dir = std::env::temp_dir().join(format!("roboanim-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let rows = vec![KeyframeRow {
            channel: "location[0]".into(),
            frame: 1,
            value: 0.5,
        }];

        let csv_path = dir.join("keys.csv");
        assert_eq!(write_keyframes(&csv_path, &rows, ExportFormat::Csv).unwrap(), 1);
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(text, "channel,frame,value\nlocation[0],1,0.5\n");

        let json_path = dir.join("keys.json");
        write_keyframes(&json_path, &rows, ExportFormat::Json).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed[0]["channel"], "location[0]");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
