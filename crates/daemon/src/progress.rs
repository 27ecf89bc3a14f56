//! Encoder output line classification.
//!
//! HandBrakeCLI reports progress as
//! `Encoding: task 1 of 1, 45.67 % (23.45 fps, avg 24.12 fps, ETA 00h05m23s)`.
//! A line is a progress line when it contains both `Encoding:` and `%`. The
//! percentage is the text between the first comma and the following `%`; the
//! ETA is the text between `ETA` and the next `)`.

const PROGRESS_TOKEN: &str = "Encoding:";
const ETA_TOKEN: &str = "ETA";

/// Parsed progress report from one encoder line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    /// 0-100
    pub percent: f64,
    pub eta: Option<String>,
}

impl ProgressSample {
    pub fn eta_or_default(&self) -> &str {
        self.eta.as_deref().unwrap_or("calculating...")
    }
}

/// What a single line of encoder output turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    /// Progress line that parsed cleanly
    Progress(ProgressSample),
    /// Looked like progress but the percentage could not be extracted
    Malformed,
    /// Mentions an error or warning
    Diagnostic,
    Other,
}

/// Classify one line of encoder output
pub fn classify_line(line: &str) -> LineKind {
    if line.contains(PROGRESS_TOKEN) && line.contains('%') {
        return match parse_progress(line) {
            Some(sample) => LineKind::Progress(sample),
            None => LineKind::Malformed,
        };
    }

    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("warning") {
        LineKind::Diagnostic
    } else {
        LineKind::Other
    }
}

fn parse_progress(line: &str) -> Option<ProgressSample> {
    let start = line.find(',')? + 1;
    let end = start + line[start..].find('%')?;
    let percent: f64 = line[start..end].trim().parse().ok()?;
    if !percent.is_finite() {
        return None;
    }

    Some(ProgressSample { percent, eta: parse_eta(line) })
}

fn parse_eta(line: &str) -> Option<String> {
    let start = line.find(ETA_TOKEN)? + ETA_TOKEN.len();
    let end = start + line[start..].find(')')?;
    let eta = line[start..end].trim();
    if eta.is_empty() {
        None
    } else {
        Some(eta.to_string())
    }
}

/// Decides which progress samples are worth displaying: only those whose
/// whole-number percentage is above the last one shown.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    last_shown: f64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self { last_shown: -1.0 }
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `sample` should be displayed, and records it as shown
    pub fn offer(&mut self, sample: &ProgressSample) -> bool {
        if (sample.percent as i64) > (self.last_shown as i64) {
            self.last_shown = sample.percent;
            true
        } else {
            false
        }
    }

    pub fn last_shown(&self) -> Option<f64> {
        (self.last_shown >= 0.0).then_some(self.last_shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_progress_line() {
        let line = "Encoding: task 1 of 1, 45.67 % (23.45 fps, avg 24.12 fps, ETA 00h05m23s)";
        assert_eq!(
            classify_line(line),
            LineKind::Progress(ProgressSample {
                percent: 45.67,
                eta: Some("00h05m23s".to_string()),
            })
        );
    }

    #[test]
    fn test_progress_without_eta() {
        match classify_line("Encoding: task 1 of 1, 3.10 %") {
            LineKind::Progress(sample) => {
                assert_eq!(sample.percent, 3.1);
                assert_eq!(sample.eta, None);
                assert_eq!(sample.eta_or_default(), "calculating...");
            }
            other => panic!("expected progress, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_progress() {
        assert_eq!(classify_line("Encoding: 45 %"), LineKind::Malformed);
        assert_eq!(classify_line("Encoding: task 1 of 1, abc %"), LineKind::Malformed);
        assert_eq!(classify_line("Encoding: task 1 of 1, nan %"), LineKind::Malformed);
    }

    #[test]
    fn test_malformed_progress_is_not_diagnostic() {
        assert_eq!(classify_line("Encoding: error, x %"), LineKind::Malformed);
    }

    #[test]
    fn test_diagnostics() {
        assert_eq!(classify_line("[12:00:01] ERROR: bad stream"), LineKind::Diagnostic);
        assert_eq!(classify_line("libav: Warning deprecated pixel format"), LineKind::Diagnostic);
        assert_eq!(classify_line("Encoding: task 1 of 1 error"), LineKind::Diagnostic);
        assert_eq!(classify_line("[12:00:01] scan: 1 title(s)"), LineKind::Other);
    }

    #[test]
    fn test_eta_without_closing_paren() {
        match classify_line("Encoding: task 1 of 1, 50.0 % (ETA 00h01m00s") {
            LineKind::Progress(sample) => assert_eq!(sample.eta, None),
            other => panic!("expected progress, got {:?}", other),
        }
    }

    #[test]
    fn test_tracker_suppresses_same_integer() {
        let mut tracker = ProgressTracker::new();
        let lines = ["Encoding: task 1 of 1, 10.0 %", "Encoding: task 1 of 1, 10.4 %"];
        let shown = lines
            .iter()
            .filter_map(|l| match classify_line(l) {
                LineKind::Progress(s) => Some(s),
                _ => None,
            })
            .filter(|s| tracker.offer(s))
            .count();
        assert_eq!(shown, 1);
        assert_eq!(tracker.last_shown(), Some(10.0));
    }

    #[test]
    fn test_tracker_shows_zero_first() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.last_shown(), None);
        assert!(tracker.offer(&ProgressSample { percent: 0.0, eta: None }));
        assert!(!tracker.offer(&ProgressSample { percent: 0.9, eta: None }));
        assert!(tracker.offer(&ProgressSample { percent: 1.0, eta: None }));
        assert!(!tracker.offer(&ProgressSample { percent: 0.5, eta: None }));
    }

    proptest! {
        /// Displayed integer percentages are strictly increasing, whatever the input order.
        #[test]
        fn prop_tracker_strictly_increasing(values in proptest::collection::vec(0.0f64..100.0, 0..64)) {
            let mut tracker = ProgressTracker::new();
            let mut last: i64 = -1;
            for v in values {
                if tracker.offer(&ProgressSample { percent: v, eta: None }) {
                    prop_assert!((v as i64) > last);
                    last = v as i64;
                }
            }
        }

        /// Any well-formed progress line round-trips its percentage.
        #[test]
        fn prop_percent_extracted(percent in 0.0f64..100.0, task in 1u32..5) {
            let line = format!("Encoding: task {} of {}, {:.2} % (1.00 fps, avg 1.00 fps, ETA 00h00m01s)", task, task, percent);
            match classify_line(&line) {
                LineKind::Progress(s) => {
                    prop_assert!((s.percent - percent).abs() < 0.01);
                    prop_assert_eq!(s.eta.as_deref(), Some("00h00m01s"));
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        /// Classification never panics on arbitrary text.
        #[test]
        fn prop_classify_total(line in ".*") {
            let _ = classify_line(&line);
        }
    }
}
