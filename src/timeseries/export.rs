//! Export of time-series results for external plotting.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::Writer;

use super::state::TimeSeriesResult;
use crate::error::IoError;

/// Header of the wide CSV layout, one column per recorded quantity.
pub fn csv_header(res: &TimeSeriesResult) -> Vec<String> {
    let mut header = vec![
        "t".to_string(),
        "converged".to_string(),
        "fault_active".to_string(),
    ];
    if let Some(s) = res.snapshots.first() {
        header.extend((0..s.vm_pu.len()).map(|b| format!("vm_pu_{b}")));
        header.extend((0..s.va_degree.len()).map(|b| format!("va_degree_{b}")));
        header.extend((0..s.gen_p_mw.len()).map(|g| format!("gen_p_mw_{g}")));
        header.extend((0..s.line_loading_percent.len()).map(|l| format!("line_loading_percent_{l}")));
    }
    header
}

/// Writes one row per time step.
pub fn write_csv<W: Write>(res: &TimeSeriesResult, out: W) -> Result<(), IoError> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(csv_header(res))?;
    for i in 0..res.len() {
        let s = &res.snapshots[i];
        let mut row = vec![
            res.time[i].to_string(),
            res.converged[i].to_string(),
            res.fault_active[i].to_string(),
        ];
        row.extend(
            s.vm_pu
                .iter()
                .chain(&s.va_degree)
                .chain(&s.gen_p_mw)
                .chain(&s.line_loading_percent)
                .map(|v| v.to_string()),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_csv(res: &TimeSeriesResult, path: impl AsRef<Path>) -> Result<(), IoError> {
    write_csv(res, BufWriter::new(File::create(path)?))
}

pub fn write_json<W: Write>(res: &TimeSeriesResult, out: W) -> Result<(), IoError> {
    serde_json::to_writer_pretty(out, res)?;
    Ok(())
}

pub fn save_json(res: &TimeSeriesResult, path: impl AsRef<Path>) -> Result<(), IoError> {
    let mut out = BufWriter::new(File::create(path)?);
    write_json(res, &mut out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::state::StepSnapshot;

    fn sample() -> TimeSeriesResult {
        let mut r = TimeSeriesResult::with_capacity(2);
        let snap = StepSnapshot {
            vm_pu: vec![1.0, 0.99],
            va_degree: vec![0.0, -2.5],
            gen_p_mw: vec![80.0],
            line_loading_percent: vec![12.5],
        };
        r.push(0.0, snap.clone(), true, false, 3);
        r.push(0.5, snap, false, true, 0);
        r
    }

    #[test]
    fn test_csv_layout() {
        let mut buf = Vec::new();
        write_csv(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "t,converged,fault_active,vm_pu_0,vm_pu_1,va_degree_0,va_degree_1,gen_p_mw_0,line_loading_percent_0"
        );
        assert_eq!(lines.next().unwrap(), "0,true,false,1,0.99,0,-2.5,80,12.5");
        assert_eq!(lines.next().unwrap(), "0.5,false,true,1,0.99,0,-2.5,80,12.5");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_json_file() {
        let path = std::env::temp_dir().join("gridstep_export_run.json");
        save_json(&sample(), &path).unwrap();
        let back: TimeSeriesResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_empty_result_has_base_header() {
        let mut buf = Vec::new();
        write_csv(&TimeSeriesResult::default(), &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim(), "t,converged,fault_active");
    }
}
