//! JSON Report Generator
//!
//! Generates machine-readable JSON reports.

use anyhow::Result;

use crate::reporting::ProbeReport;

/// Generate JSON report
pub fn generate(report: &ProbeReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::tests::sample_report;

    #[test]
    fn test_generate_json_report() {
        let json = generate(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["verdicts"][0]["target"], "http://vulnerable.test/");
        assert_eq!(value["verdicts"][0]["flagged"], true);
        assert_eq!(value["verdicts"][0]["confidence_level"], "high");
        assert_eq!(value["verdicts"][0]["outcome"]["type"], "completed");
        assert_eq!(value["verdicts"][0]["samples"].as_array().unwrap().len(), 3);
        assert_eq!(value["failures"][0]["algorithm"], "perl");
    }
}
