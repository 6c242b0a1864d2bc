use crate::backup::format::{format_eta, format_speed};
use std::io::{IsTerminal, Stdout, Write};
use std::time::Duration;

/// Overwriting status line for an interactive terminal.
///
/// Tracks one archive within a batch: `bytes_done` is what earlier archives of
/// the batch already sent and `bytes_total` the size of the whole batch.
pub struct ProgressReporter<W: Write> {
    out: Option<W>,
    prefix: String,
    name: String,
    archive_size: u64,
    bytes_done: u64,
    bytes_total: u64,
}

impl ProgressReporter<Stdout> {
    /// Reports to stdout when it is a terminal, otherwise stays silent.
    pub fn stdout(prefix: String, name: String, archive_size: u64, bytes_done: u64, bytes_total: u64) -> Self {
        let stdout = std::io::stdout();
        let out = stdout.is_terminal().then_some(stdout);
        Self::new(out, prefix, name, archive_size, bytes_done, bytes_total)
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(
        out: Option<W>,
        prefix: String,
        name: String,
        archive_size: u64,
        bytes_done: u64,
        bytes_total: u64,
    ) -> Self {
        Self {
            out,
            prefix,
            name,
            archive_size,
            bytes_done,
            bytes_total: bytes_total.max(bytes_done + archive_size),
        }
    }

    pub fn is_active(&self) -> bool {
        self.out.is_some()
    }

    pub fn render(&self, sent: u64, elapsed: Duration) -> String {
        let secs = elapsed.as_secs_f64().max(1.0);
        let rate = sent as f64 / secs;
        let done = self.bytes_done + sent;
        let eta = if rate > 0.0 {
            let remaining = self.bytes_total.saturating_sub(done) as f64;
            format!(", {} remaining", format_eta(remaining / rate))
        } else {
            String::new()
        };
        // Trailing spaces wipe leftovers of a longer previous line.
        format!(
            "{}{} @ {}, {:.2}% done ({:.2}% total{})          \r",
            self.prefix,
            self.name,
            format_speed(rate),
            percent(sent, self.archive_size),
            percent(done, self.bytes_total),
            eta
        )
    }

    pub fn update(&mut self, sent: u64, elapsed: Duration) {
        let line = self.render(sent, elapsed);
        if let Some(out) = self.out.as_mut() {
            let _ = out.write_all(line.as_bytes()).and_then(|_| out.flush());
        }
    }

    pub fn finish(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.write_all(b"\n").and_then(|_| out.flush());
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        100.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(out: Option<Vec<u8>>) -> ProgressReporter<Vec<u8>> {
        ProgressReporter::new(out, "(1 of 2) ".into(), "a.tar".into(), 1000, 0, 4000)
    }

    #[test]
    fn test_render_with_rate_and_eta() {
        let line = reporter(None).render(500, Duration::from_secs(5));
        assert_eq!(
            line,
            "(1 of 2) a.tar @ 100bytes/s, 50.00% done (12.50% total, 35s remaining)          \r"
        );
    }

    #[test]
    fn test_render_without_progress_omits_eta() {
        let line = reporter(None).render(0, Duration::ZERO);
        assert!(line.contains("0.00% done (0.00% total)"));
        assert!(!line.contains("remaining"));
    }

    #[test]
    fn test_elapsed_floored_to_one_second() {
        let line = reporter(None).render(100, Duration::from_millis(10));
        assert!(line.contains("@ 100bytes/s"));
    }

    #[test]
    fn test_inactive_reporter_writes_nothing() {
        let mut reporter = reporter(None);
        reporter.update(10, Duration::from_secs(1));
        reporter.finish();
        assert!(!reporter.is_active());
    }

    #[test]
    fn test_active_reporter_overwrites_and_ends_with_newline() {
        let mut reporter = reporter(Some(Vec::new()));
        reporter.update(100, Duration::from_secs(1));
        reporter.update(200, Duration::from_secs(2));
        reporter.finish();

        let written = String::from_utf8(reporter.out.take().unwrap()).unwrap();
        assert_eq!(written.matches('\r').count(), 2);
        assert!(written.ends_with('\n'));
    }

    #[test]
    fn test_empty_archive_percent() {
        let reporter = ProgressReporter::new(None::<Vec<u8>>, String::new(), "e".into(), 0, 0, 0);
        assert!(reporter.render(0, Duration::from_secs(1)).contains("100.00% done (100.00% total)"));
    }
}
