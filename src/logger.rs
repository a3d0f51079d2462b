//! Kernel log sink
//!
//! Routes `log` records to a [`Console`], one line per record:
//! `[LEVEL target] message`.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::drivers::UartConsole;
use crate::platform::Console;

/// `log` backend writing to a console.
pub struct KernelLogger<C> {
    console: C,
    level: LevelFilter,
}

impl<C: Console> KernelLogger<C> {
    /// Create a logger passing records at or above `level`.
    pub const fn new(console: C, level: LevelFilter) -> Self {
        Self { console, level }
    }
}

struct ConsoleWriter<'a, C>(&'a C);

impl<C: Console> Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write(s.as_bytes());
        Ok(())
    }
}

impl<C: Console> Log for KernelLogger<C> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut out = ConsoleWriter(&self.console);
        let _ = writeln!(out, "[{} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

static UART_LOGGER: KernelLogger<UartConsole> = KernelLogger::new(UartConsole, LevelFilter::Trace);

/// Install a logger and set the global maximum level.
pub fn init(logger: &'static dyn Log, level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install the PL011-backed logger.
pub fn init_uart(level: LevelFilter) -> Result<(), SetLoggerError> {
    init(&UART_LOGGER, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConsole;
    use log::Level;

    #[test]
    fn test_record_format() {
        let console = MockConsole::new(b"");
        let logger = KernelLogger::new(console.clone(), LevelFilter::Info);
        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("syscall")
                .args(format_args!("unknown selector {}", 99))
                .build(),
        );
        assert_eq!(console.output(), b"[WARN syscall] unknown selector 99\n");
    }

    #[test]
    fn test_level_filter() {
        let console = MockConsole::new(b"");
        let logger = KernelLogger::new(console.clone(), LevelFilter::Info);
        logger.log(
            &Record::builder()
                .level(Level::Trace)
                .target("syscall")
                .args(format_args!("noise"))
                .build(),
        );
        assert!(console.output().is_empty());
    }
}
