//! `log` backend writing whole lines to the boot console.
//!
//! Nothing here uses atomic read-modify-write: with the MMU off (and under
//! the boot identity map) RAM is Device memory, where exclusive accesses
//! are not guaranteed to ever succeed. The logger is installed with plain
//! stores and lines are written without a lock, so output from two cores
//! can interleave.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};

use crate::error::{LoaderError, LoaderResult};

/// Byte sink for diagnostic output, usually a UART.
pub trait Console: Sync {
    fn write_str(&self, s: &str);
}

struct ConsoleWriter<'a, C: Console>(&'a C);

impl<C: Console> Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Formats records as `[LEVEL] message` lines on `console`.
pub struct BootLogger<C> {
    console: C,
}

impl<C: Console> BootLogger<C> {
    pub const fn new(console: C) -> Self {
        Self { console }
    }
}

impl<C: Console + Send> Log for BootLogger<C> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            ConsoleWriter(&self.console),
            "[{:<5}] {}",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Install `logger` as the global logger. Only the first call wins.
///
/// # Safety
///
/// Must run on the boot core before any secondary is released, and must not
/// race with another call or with any logging on another core.
pub unsafe fn init<C: Console + Send>(
    logger: &'static BootLogger<C>,
    level: LevelFilter,
) -> LoaderResult<()> {
    // SAFETY: the caller guarantees no other core touches the logger state.
    unsafe {
        log::set_logger_racy(logger)
            .map_err(|_| LoaderError::AlreadyInitialized { resource: "logger" })?;
        log::set_max_level_racy(level);
    }
    Ok(())
}
