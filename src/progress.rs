// src/progress.rs

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

/// Counts bytes as they stream past and redraws a one-line progress indicator.
///
/// The counter only observes chunk lengths; the data itself goes straight to
/// the destination file.
pub struct WriteCounter {
    bytes_written: u64,
    /// `None` when the server did not declare a length.
    total_expected: Option<u64>,
    bar: ProgressBar,
}

impl WriteCounter {
    /// A counter drawing to stderr, overwriting the same line on every update.
    pub fn new(total_expected: Option<u64>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{msg}") {
            bar.set_style(style);
        }
        Self::with_bar(total_expected, bar)
    }

    /// A counter that keeps count but never draws.
    pub fn hidden(total_expected: Option<u64>) -> Self {
        Self::with_bar(total_expected, ProgressBar::hidden())
    }

    fn with_bar(total_expected: Option<u64>, bar: ProgressBar) -> Self {
        Self {
            bytes_written: 0,
            total_expected,
            bar,
        }
    }

    /// Records `n` more bytes and redraws.
    pub fn record(&mut self, n: usize) {
        self.bytes_written += n as u64;
        self.bar.set_message(self.render());
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn total_expected(&self) -> Option<u64> {
        self.total_expected
    }

    /// Rounded percentage, or `None` when there is no meaningful total.
    pub fn percent(&self) -> Option<u64> {
        match self.total_expected {
            Some(total) if total > 0 => {
                Some((100.0 * self.bytes_written as f64 / total as f64).round() as u64)
            }
            _ => None,
        }
    }

    /// The line shown to the user.
    pub fn render(&self) -> String {
        match self.percent() {
            Some(percent) => format!("Downloading... {}% complete", percent),
            None => format!("Downloading... {}", HumanBytes(self.bytes_written)),
        }
    }

    /// Leaves the last rendered line on screen.
    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Clears the line, used when the transfer failed.
    pub fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}
