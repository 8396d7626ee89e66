//! Logging for the drivers and the `click-catalog` tool.
//!
//! Drivers emit `tracing` events and never install a subscriber; a host
//! program picks one with [`init_journald_or_stdout`] or [`init_stdout`].
//! Levels used by the drivers:
//!
//! - `trace`: every register access, memory transfer and AT line
//! - `debug`: init sequences, device IDs, ROM codes, discarded modem output
//! - `info`: modem start-up and completed actions, such as a sent SMS
//! - `warn`: rejected AT commands, receive overflow, write protect left low
//! - `error`: a modem with no final result code, a bad 1-Wire reset reply
//!
//! Driver modules import the macros with `use crate::tracing::prelude::*`.

use std::env;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Initialize logging.
///
/// If running under systemd, use journald; otherwise fall back to stdout.
pub fn init_journald_or_stdout() {
    if env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(layer) = tracing_journald::layer() {
            tracing_subscriber::registry().with(layer).init();
        } else {
            init_stdout();
            error!("Failed to initialize journald logging, using stdout.");
        }
    } else {
        init_stdout();
    }
}

/// Log to stdout, filtering according to RUST_LOG with INFO as the default.
///
/// Per-register traffic is logged at TRACE, so `RUST_LOG=click_drivers=trace`
/// shows every bus transaction.
pub fn init_stdout() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTimer))
        .init();
}

// Timestamps in local time to the nearest second; the default UTC timer
// prints a long RFC 3339 string.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        let formatted = now
            .format(time::macros::format_description!(
                "[hour]:[minute]:[second]"
            ))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{}", formatted)
    }
}
