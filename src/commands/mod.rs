//! CLI command implementations
//!
//! Each command runs against a [`RegisterChannel`](upsctl_core::channel::RegisterChannel)
//! opened by `main` from the `--bus` string. Commands print their results to
//! stdout; diagnostics go through `log`.

mod flash;
mod list;
mod ota;
mod output;
mod progress;
mod status;
mod upload;

pub use flash::{load_image, run_flash_firmware};
pub use list::list_buses;
pub use ota::run_enable_ota;
pub use output::run_read_output;
pub use status::run_status;
pub use upload::{load_script, run_upload, UploadOptions};
