//! Parser for GDAL's terminal progress output.
//!
//! GDAL command-line tools print progress to stdout as
//! `0...10...20...30...40...50...60...70...80...90...100 - done.`, possibly
//! split across arbitrary read boundaries. Only the decade markers are
//! reported; the dots between them are ignored.

/// Incremental progress parser.
///
/// Feed raw stdout bytes with [`ProgressParser::push`]; each call returns
/// the new progress fractions in `[0.0, 1.0]`, strictly increasing across
/// the lifetime of the parser.
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    digits: String,
    last: Option<u32>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk of output and returns any progress it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<f64> {
        let mut values = Vec::new();
        for &byte in chunk {
            match byte {
                b'0'..=b'9' => {
                    // Anything longer than "100" is not a progress marker
                    if self.digits.len() < 4 {
                        self.digits.push(byte as char);
                    }
                }
                b'.' => {
                    if let Some(value) = self.take_marker() {
                        values.push(value);
                    }
                }
                b' ' => {
                    // "100 - done." ends without a dot after the number
                    if self.digits == "100" {
                        if let Some(value) = self.take_marker() {
                            values.push(value);
                        }
                    }
                    self.digits.clear();
                }
                _ => self.digits.clear(),
            }
        }
        values
    }

    /// Most recent progress seen, as a fraction.
    pub fn last(&self) -> Option<f64> {
        self.last.map(|p| p as f64 / 100.0)
    }

    fn take_marker(&mut self) -> Option<f64> {
        let percent: u32 = self.digits.parse().ok()?;
        self.digits.clear();
        if percent > 100 || percent % 10 != 0 {
            return None;
        }
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent as f64 / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let mut parser = ProgressParser::new();
        let values = parser.push(b"0...10...20...30...40...50...60...70...80...90...100 - done.\n");
        let expected: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        assert_eq!(values, expected);
        assert_eq!(parser.last(), Some(1.0));
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = ProgressParser::new();
        let mut values = Vec::new();
        for chunk in [&b"0.."[..], b".1", b"0..", b".2", b"0...30", b"..."] {
            values.extend(parser.push(chunk));
        }
        assert_eq!(values, vec![0.0, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_ignores_header_lines() {
        let mut parser = ProgressParser::new();
        let values = parser.push(b"Input file size is 1024, 768\nGDAL 3.8.4, released\n0...10");
        assert_eq!(values, vec![0.0]);
        assert_eq!(parser.push(b"..."), vec![0.1]);
    }

    #[test]
    fn test_never_goes_backwards() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.push(b"0...10...20..."), vec![0.0, 0.1, 0.2]);
        // A second tool run on the same stream restarts at zero
        assert!(parser.push(b"0...10...").is_empty());
        assert_eq!(parser.push(b"30..."), vec![0.3]);
    }

    #[test]
    fn test_empty_input() {
        let mut parser = ProgressParser::new();
        assert!(parser.push(b"").is_empty());
        assert_eq!(parser.last(), None);
    }
}
