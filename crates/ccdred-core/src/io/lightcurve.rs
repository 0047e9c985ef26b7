use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::lightcurve::LightCurveReport;

/// Write the full report (points, failures, flags) as pretty JSON.
pub fn save_report_json(report: &LightCurveReport, path: &Path) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

pub fn load_report_json(path: &Path) -> Result<LightCurveReport> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Write `time_minutes,flux_ratio` rows for period analysis.
pub fn save_ratio_csv(report: &LightCurveReport, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "time_minutes,flux_ratio,flagged")?;
    for (minutes, point) in report
        .curve
        .relative_minutes()
        .into_iter()
        .zip(&report.curve.points)
    {
        writeln!(out, "{minutes:.6},{:.8},{}", point.ratio, point.flagged)?;
    }
    out.flush()?;
    Ok(())
}
