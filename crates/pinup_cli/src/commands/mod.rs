//! CLI command implementations.

pub mod backup;
pub mod labels;
pub mod license;
pub mod maintenance;
pub mod serve;
pub mod snippets;

use clap::ValueEnum;
use pinup_core::{AdmissionConfig, OfflineValidator, SystemClock, Timestamp, VaultConfig};
use pinup_server::{HandlerContext, PinupServer, ServerConfig};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Result type of every command.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// An open vault plus the output format chosen on the command line.
pub struct Session {
    server: PinupServer,
    format: Format,
}

impl Session {
    /// Opens every component rooted at `data_dir`.
    pub fn open(
        data_dir: &Path,
        admission: AdmissionConfig,
        format: Format,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server = PinupServer::open(
            VaultConfig::new(data_dir),
            ServerConfig::new(admission),
            Arc::new(OfflineValidator),
            Arc::new(SystemClock),
        )?;
        Ok(Self { server, format })
    }

    /// Shared component handles.
    pub fn context(&self) -> &Arc<HandlerContext> {
        self.server.context()
    }

    /// Prints `value` as JSON, or runs `text` in text mode.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> CommandResult {
        match self.format {
            Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
            Format::Text => text(value),
        }
        Ok(())
    }

    /// Consumes the session, yielding the request server.
    pub fn into_server(self) -> PinupServer {
        self.server
    }
}

/// Formats epoch milliseconds as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(ms: Timestamp) -> String {
    let secs = ms.div_euclid(1000);
    let days = secs.div_euclid(86_400);
    let rem = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02} UTC",
        rem / 3600,
        (rem / 60) % 60,
        rem % 60
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month as u32, day as u32)
}

/// Formats a byte count with a binary unit.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
