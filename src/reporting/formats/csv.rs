//! CSV Report Generator
//!
//! One row per ladder step, spreadsheet-compatible.

use anyhow::Result;

use crate::reporting::ProbeReport;

/// Generate CSV report
pub fn generate(report: &ProbeReport) -> Result<String> {
    let mut csv = String::new();

    // Header row
    csv.push_str(
        "Target,Algorithm,Step,Batch Size,Samples,Successes,Median (ms),Min (ms),Max (ms),Growth Ratio,Flagged,Confidence,Outcome\n",
    );

    // Data rows
    for verdict in &report.verdicts {
        for step in &verdict.steps {
            let row = vec![
                csv_escape(&verdict.target),
                csv_escape(&verdict.algorithm),
                step.step.to_string(),
                step.batch_size.to_string(),
                step.samples.to_string(),
                step.successes.to_string(),
                fmt_ms(step.median_ms),
                fmt_ms(step.min_ms),
                fmt_ms(step.max_ms),
                verdict.growth_ratio.map(|r| format!("{:.2}", r)).unwrap_or_default(),
                verdict.flagged.to_string(),
                format!("{:.2}", verdict.confidence),
                csv_escape(verdict.outcome.name()),
            ];

            csv.push_str(&row.join(","));
            csv.push('\n');
        }
    }

    Ok(csv)
}

fn fmt_ms(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_default()
}

/// Escape a value for CSV (handle commas, quotes, newlines)
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::tests::sample_report;

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("simple"), "simple");
        assert_eq!(csv_escape("with,comma"), "\"with,comma\"");
        assert_eq!(csv_escape("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(csv_escape("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_generate_csv_report() {
        let csv = generate(&sample_report()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert!(lines[0].starts_with("Target,Algorithm,Step,Batch Size"));
        // Two verdicts with three steps each
        assert_eq!(lines.len(), 7);
        assert!(lines[1].starts_with("http://vulnerable.test/,v8,0,100,1,1,2.000"));
        assert!(lines[3].contains(",10000.00,true,0.81,completed"));
    }
}
