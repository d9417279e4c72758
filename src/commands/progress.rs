//! Progress bars for byte-wise transfers

use indicatif::{ProgressBar, ProgressStyle};
use upsctl_core::progress::TransferProgress;

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
    upload_phase: &'static str,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            current_bar: None,
            upload_phase: "Uploading",
        }
    }

    /// Progress for a firmware image going to the bootloader
    pub fn flashing() -> Self {
        Self {
            current_bar: None,
            upload_phase: "Flashing",
        }
    }

    fn create_bar(&mut self, total: u64, phase: &str) {
        let pb = create_progress_bar_with_phase(total, phase)
            .unwrap_or_else(|_| ProgressBar::new(total));
        self.current_bar = Some(pb);
    }

    fn set_position(&self, position: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(position as u64);
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        // A bar left behind by a failed transfer stays at its last position
        if let Some(pb) = self.current_bar.take() {
            pb.abandon();
        }
    }
}

impl TransferProgress for IndicatifProgress {
    fn uploading(&mut self, total_bytes: usize) {
        self.create_bar(total_bytes as u64, self.upload_phase);
    }

    fn upload_progress(&mut self, bytes_sent: usize) {
        self.set_position(bytes_sent);
    }

    fn draining(&mut self, total_bytes: usize) {
        self.create_bar(total_bytes as u64, "Reading output");
    }

    fn drain_progress(&mut self, bytes_read: usize) {
        self.set_position(bytes_read);
    }

    fn complete(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }
}
