//! Momentary loudness extraction from ebur128 diagnostic output
//!
//! The filter prints periodic lines such as:
//!
//! ```text
//! [Parsed_ebur128_0 @ 0x55d0] t: 4.1  TARGET:-23 LUFS    M: -24.3 S: -25.0     I: -24.8 LUFS ...
//! ```
//!
//! Only the `M:` field is collected. Output arrives in arbitrary byte chunks,
//! so bytes are buffered until a `\n` or `\r` terminates the line.

use crate::models::LoudnessSummary;

/// Label token preceding a momentary loudness value
pub const MOMENTARY_LABEL: &str = "M:";

/// Upper bound on a buffered unterminated line
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Incremental parser over a diagnostic byte stream
#[derive(Debug, Default)]
pub struct MomentaryParser {
    pending: Vec<u8>,
    samples: Vec<f64>,
    lines_seen: usize,
}

impl MomentaryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, parsing every line it completes
    pub fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.flush_line();
            } else {
                self.pending.push(byte);
            }
        }

        // A stream that never terminates lines would grow this forever
        if self.pending.len() > MAX_PENDING_BYTES {
            self.pending.clear();
        }
    }

    /// Parse the trailing unterminated line (stream ended naturally)
    pub fn finish(&mut self) {
        self.flush_line();
    }

    /// Drop the trailing unterminated line (stream was cut mid-write)
    pub fn discard_partial(&mut self) {
        self.pending.clear();
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    pub fn summary(&self) -> Option<LoudnessSummary> {
        LoudnessSummary::from_samples(&self.samples)
    }

    fn flush_line(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending);
        self.samples.extend(momentary_values(&line));
        self.lines_seen += 1;
        self.pending.clear();
    }
}

/// Every well-formed momentary value on one line
///
/// The label must start the line or follow whitespace, so `FTPK:`-style
/// labels ending in `M:` never match. Malformed and non-finite numbers are
/// skipped.
pub fn momentary_values(line: &str) -> impl Iterator<Item = f64> + '_ {
    line.match_indices(MOMENTARY_LABEL)
        .filter_map(move |(idx, label)| {
            let at_token_start = line[..idx]
                .chars()
                .next_back()
                .map_or(true, char::is_whitespace);
            if !at_token_start {
                return None;
            }

            let rest = line[idx + label.len()..].trim_start();
            let end = rest
                .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
                .unwrap_or(rest.len());

            rest[..end].parse::<f64>().ok().filter(|v| v.is_finite())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EBUR128_LINE: &str = "[Parsed_ebur128_0 @ 0x55d0c4] t: 4.1       TARGET:-23 LUFS    M: -24.3 S: -25.0     I: -24.8 LUFS       LRA:   0.0 LU  FTPK: -3.1 dBFS  TPK: -3.1 dBFS";

    #[test]
    fn test_parses_real_filter_line() {
        let values: Vec<f64> = momentary_values(EBUR128_LINE).collect();
        assert_eq!(values, vec![-24.3]);
    }

    #[test]
    fn test_label_without_space() {
        let values: Vec<f64> = momentary_values("M:-19.75 S:-20.0").collect();
        assert_eq!(values, vec![-19.75]);
    }

    #[test]
    fn test_positive_and_signed_values() {
        let values: Vec<f64> = momentary_values("M: +1.5").collect();
        assert_eq!(values, vec![1.5]);
    }

    #[test]
    fn test_malformed_numbers_skipped() {
        assert_eq!(momentary_values("M: -inf S: -120").count(), 0);
        assert_eq!(momentary_values("M: nan").count(), 0);
        assert_eq!(momentary_values("M: --3..2").count(), 0);
        assert_eq!(momentary_values("M: ").count(), 0);
    }

    #[test]
    fn test_label_inside_word_ignored() {
        assert_eq!(momentary_values("FOOM: -10.0").count(), 0);
    }

    #[test]
    fn test_multiple_fields_on_one_line() {
        let values: Vec<f64> = momentary_values("M: -20.0 junk M: -21.0").collect();
        assert_eq!(values, vec![-20.0, -21.0]);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut parser = MomentaryParser::new();
        parser.feed(b"t: 1.0 M: -2");
        parser.feed(b"2.5 S: -22.0\nt: 1.1 M: -23");
        parser.feed(b".5\n");

        assert_eq!(parser.samples(), &[-22.5, -23.5]);
        assert_eq!(parser.lines_seen(), 2);
    }

    #[test]
    fn test_carriage_return_terminates_line() {
        let mut parser = MomentaryParser::new();
        parser.feed(b"M: -20.0\rM: -21.0\r\n");
        assert_eq!(parser.samples(), &[-20.0, -21.0]);
    }

    #[test]
    fn test_noise_lines_do_not_fail_parsing() {
        let mut parser = MomentaryParser::new();
        parser.feed(b"Input #0, mpegts, from 'udp://239.0.0.1:1234':\n");
        parser.feed(b"\xff\xfe garbage bytes\n");
        parser.feed(b"M: -24.0\n");

        assert_eq!(parser.samples(), &[-24.0]);
    }

    #[test]
    fn test_finish_parses_trailing_line() {
        let mut parser = MomentaryParser::new();
        parser.feed(b"M: -24.0\nM: -25.0");
        assert_eq!(parser.samples(), &[-24.0]);

        parser.finish();
        assert_eq!(parser.samples(), &[-24.0, -25.0]);
    }

    #[test]
    fn test_discard_partial_drops_cut_line() {
        let mut parser = MomentaryParser::new();
        parser.feed(b"M: -24.0\nM: -2");
        parser.discard_partial();
        parser.finish();

        assert_eq!(parser.samples(), &[-24.0]);
    }

    #[test]
    fn test_summary_absent_without_samples() {
        let mut parser = MomentaryParser::new();
        parser.feed(b"Connection refused\n");
        parser.finish();
        assert!(parser.summary().is_none());
    }

    #[test]
    fn test_summary_from_samples() {
        let mut parser = MomentaryParser::new();
        parser.feed(b"M: -25.0\nM: -24.0\nM: -23.5\n");
        let summary = parser.summary().unwrap();

        assert_eq!(summary.min_db, -25.0);
        assert_eq!(summary.max_db, -23.5);
        assert!((summary.avg_db + 24.1667).abs() < 1e-3);
    }
}
