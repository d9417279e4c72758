//! Progress reporting for byte-at-a-time transfers
//!
//! Uploads and drains move one byte per several bus round trips, so a
//! multi-kilobyte script takes long enough that callers want feedback.

/// Progress callbacks for upload and drain operations
pub trait TransferProgress {
    /// Called once the upload is about to start
    fn uploading(&mut self, total_bytes: usize);

    /// Called after each byte has been pushed and its pointer acknowledged
    fn upload_progress(&mut self, bytes_sent: usize);

    /// Called once the drain knows how many bytes are pending
    fn draining(&mut self, total_bytes: usize);

    /// Called after each output byte has been popped
    fn drain_progress(&mut self, bytes_read: usize);

    /// Called when the operation finishes successfully
    fn complete(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn uploading(&mut self, _total_bytes: usize) {}
    fn upload_progress(&mut self, _bytes_sent: usize) {}
    fn draining(&mut self, _total_bytes: usize) {}
    fn drain_progress(&mut self, _bytes_read: usize) {}
    fn complete(&mut self) {}
}
