//! CSV export of the realized dispatch trace.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::trace::DispatchTrace;

/// Writes the trace to a CSV file, one row per cycle.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn export_csv(path: &Path, trace: &DispatchTrace) -> Result<(), csv::Error> {
    let file = File::create(path)?;
    write_csv(file, trace)
}

/// Writes the trace as CSV to any writer.
///
/// The header carries two columns per market, named after the market, so the
/// schema follows the configured market set:
///
/// ```text
/// cycle,start_time,start_soc,import_mw,export_mw,epex_hh_buy_mw,epex_hh_sell_mw,realized_profit,planned_objective
/// ```
///
/// Timestamps are RFC 3339 in UTC. Rows appear in cycle order.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_csv<W: Write>(writer: W, trace: &DispatchTrace) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);

    let mut header = vec![
        "cycle".to_string(),
        "start_time".to_string(),
        "start_soc".to_string(),
        "import_mw".to_string(),
        "export_mw".to_string(),
    ];
    for name in &trace.market_names {
        header.push(format!("{name}_buy_mw"));
        header.push(format!("{name}_sell_mw"));
    }
    header.push("realized_profit".to_string());
    header.push("planned_objective".to_string());
    csv_writer.write_record(&header)?;

    for record in trace.records() {
        let mut row = vec![
            record.cycle.to_string(),
            record.start.to_rfc3339(),
            format!("{:.6}", record.start_soc),
            format!("{:.6}", record.import_mw),
            format!("{:.6}", record.export_mw),
        ];
        for m in 0..record.buy_mw.len() {
            row.push(format!("{:.6}", record.buy_mw[m]));
            row.push(format!("{:.6}", record.sell_mw[m]));
        }
        row.push(format!("{:.6}", record.realized_profit));
        row.push(format!("{:.6}", record.planned_objective));
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceRecord;
    use chrono::{TimeZone, Utc};

    fn sample_trace() -> DispatchTrace {
        let mut trace = DispatchTrace::new(vec!["epex_hh".to_string()]);
        trace.push(TraceRecord {
            cycle: 0,
            start: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            start_soc: 0.5,
            import_mw: -1.0,
            export_mw: 0.0,
            buy_mw: vec![-1.0],
            sell_mw: vec![0.0],
            realized_profit: -42.5,
            planned_objective: 10.0,
        });
        trace
    }

    fn rendered(trace: &DispatchTrace) -> String {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, trace).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn header_names_market_columns() {
        let output = rendered(&sample_trace());
        let header = output.lines().next().unwrap();
        assert_eq!(
            header,
            "cycle,start_time,start_soc,import_mw,export_mw,\
             epex_hh_buy_mw,epex_hh_sell_mw,realized_profit,planned_objective"
        );
    }

    #[test]
    fn rows_carry_cycle_and_rfc3339_time() {
        let output = rendered(&sample_trace());
        let row = output.lines().nth(1).unwrap();
        assert!(row.starts_with("0,2024-06-01T00:00:00+00:00,0.500000,"));
        assert!(row.ends_with("-42.500000,10.000000"));
    }

    #[test]
    fn empty_trace_writes_header_only() {
        let trace = DispatchTrace::new(vec!["epex_hh".to_string()]);
        let output = rendered(&trace);
        assert_eq!(output.lines().count(), 1);
    }

    #[test]
    fn output_is_deterministic() {
        let trace = sample_trace();
        assert_eq!(rendered(&trace), rendered(&trace));
    }
}
