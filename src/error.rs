//! Fatal, non-recoverable errors: resource acquisition only. Per-second and
//! per-minute decode anomalies are never an `Err` — they are reported
//! through [`crate::frame_decoder::DecodeResult`] and the display sink
//! instead, exactly like the reference tool's `DT_result`/`GB_result`.

use thiserror::Error;

/// BSD `sysexits.h` codes the reference CLI returns verbatim; kept as
/// plain constants since this isn't a BSD target and `libc::EX_*` isn't
/// guaranteed available.
pub mod exit_code {
    pub const USAGE: i32 = 64;
    pub const DATA_ERR: i32 = 65;
}

#[derive(Debug, Error)]
pub enum NplError {
    #[error("configuration file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("configuration key '{0}' missing")]
    ConfigMissingKey(&'static str),
    #[error("configuration field '{field}': {reason}")]
    ConfigInvalid { field: &'static str, reason: String },
    #[error("GPIO: {0}")]
    Gpio(#[source] std::io::Error),
    #[error("capture log: {0}")]
    Log(#[source] std::io::Error),
}

impl NplError {
    /// The process exit code the reference CLI would have returned for
    /// this failure: `errno` for hardware/log I/O, `EX_DATAERR` for a bad
    /// config, matching `set_mode_live`'s own return conventions.
    pub fn exit_code(&self) -> i32 {
        match self {
            NplError::ConfigIo { .. }
            | NplError::ConfigParse { .. }
            | NplError::ConfigMissingKey(_)
            | NplError::ConfigInvalid { .. } => exit_code::DATA_ERR,
            NplError::Gpio(e) => e.raw_os_error().unwrap_or(1),
            NplError::Log(e) => e.raw_os_error().unwrap_or(1),
        }
    }
}
