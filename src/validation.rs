//! Round-trip verification of encoded records.

use anyhow::Result;
use ndarray::ArrayView2;

use crate::pipeline::PhoneticEncoder;

/// Outcome of checking `decode(encode(x))` for a set of lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundTripReport {
    pub checked: usize,
    /// Decoded text equal to the prepared input.
    pub exact: usize,
    /// Decoded text equal to the prepared input cut at a word boundary.
    pub truncated: usize,
    /// Line indices whose decoded text matched neither.
    pub mismatches: Vec<usize>,
    /// Record indices with no end marker or with invalid codes.
    pub malformed: Vec<usize>,
}

impl RoundTripReport {
    pub fn passes(&self) -> bool {
        self.mismatches.is_empty() && self.malformed.is_empty()
    }
}

impl std::fmt::Display for RoundTripReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "checked={} exact={} truncated={} mismatches={} malformed={}",
            self.checked,
            self.exact,
            self.truncated,
            self.mismatches.len(),
            self.malformed.len()
        )
    }
}

/// Encode each line, decode it again and compare with the prepared text.
pub fn verify_lines<S: AsRef<str>>(encoder: &PhoneticEncoder, lines: &[S]) -> Result<RoundTripReport> {
    let mut report = RoundTripReport::default();
    for (index, line) in lines.iter().enumerate() {
        let prepared = encoder.prepare(line.as_ref());
        let record = encoder.encode_line(line.as_ref())?;
        let decoded = encoder.decode_record(record.view());
        report.checked += 1;

        if !decoded.is_well_formed() {
            report.malformed.push(index);
        }
        if decoded.text == prepared {
            report.exact += 1;
        } else if decoded.text == encoder.table().truncate(&prepared, encoder.maxlen()) {
            report.truncated += 1;
        } else {
            tracing::warn!(index, "round trip mismatch");
            report.mismatches.push(index);
        }
    }
    Ok(report)
}

/// Check a batch of stored records for missing end markers and bad codes.
pub fn verify_records(encoder: &PhoneticEncoder, records: ArrayView2<u8>) -> RoundTripReport {
    let mut report = RoundTripReport::default();
    for (index, record) in records.rows().into_iter().enumerate() {
        report.checked += 1;
        let decoded = encoder.decode_record(record);
        if decoded.is_well_formed() {
            report.exact += 1;
        } else {
            tracing::warn!(
                index,
                terminated = decoded.terminated,
                invalid_codes = decoded.invalid_codes,
                "malformed record"
            );
            report.malformed.push(index);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::tests::cat_codebook;
    use ndarray::array;

    #[test]
    fn test_verify_lines_counts_truncation() {
        let encoder = PhoneticEncoder::new(cat_codebook(), 10).unwrap();
        let lines = ["a cat", "the cat sat on the mat", "x"];
        let report = verify_lines(&encoder, &lines).unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.exact, 2);
        assert_eq!(report.truncated, 1);
        assert!(report.passes());
        assert!(report.to_string().contains("truncated=1"));
    }

    #[test]
    fn test_verify_records_flags_malformed() {
        let encoder = PhoneticEncoder::new(cat_codebook(), 4).unwrap();
        let a = encoder.table().code('a').unwrap();
        let records = array![[a, 1, 0, 0], [a, a, a, a], [a, 0, 1, 0]];
        let report = verify_records(&encoder, records.view());
        assert_eq!(report.exact, 1);
        assert_eq!(report.malformed, vec![1, 2]);
        assert!(!report.passes());
    }
}
