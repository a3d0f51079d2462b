//! PL011 UART Driver for QEMU virt machine
//!
//! Backs the user-visible console: fd 1 writes land here and fd 0 reads
//! are served from the receive FIFO. Kernel log output goes the same way.
//!
//! # Memory Map (QEMU virt)
//! - Base address: 0x0900_0000
//! - Register size: 0x1000 bytes
//!
//! # Security Considerations
//! - User bytes are written verbatim; no escape processing in the kernel
//! - Unsafe code is minimal and well-documented
//! - Uses spinlock for thread-safe access

use core::fmt::{self, Write};
use log::warn;
use spin::Mutex;

use crate::platform::Console;

/// QEMU virt machine PL011 UART base address
const UART_BASE: usize = 0x0900_0000;

/// PL011 Register offsets
mod regs {
    /// Data Register - read/write data
    pub const DR: usize = 0x00;
    /// Flag Register - status flags
    pub const FR: usize = 0x18;
}

/// Flag Register bits
mod flags {
    /// Receive FIFO empty
    pub const RXFE: u32 = 1 << 4;
    /// Transmit FIFO full
    pub const TXFF: u32 = 1 << 5;
}

/// PL011 UART driver
pub struct Uart {
    base: usize,
    initialized: bool,
    warned: bool,
}

impl Uart {
    /// Create a new UART instance (not yet initialized)
    pub const fn new(base: usize) -> Self {
        Self {
            base,
            initialized: false,
            warned: false,
        }
    }

    /// Initialize the UART
    ///
    /// # Safety
    /// - `base` must be the address of a mapped PL011 register block
    /// - Must only be called once
    pub unsafe fn init(&mut self) {
        // PL011 is already initialized by QEMU, just mark as ready
        self.initialized = true;
    }

    fn read_reg(&self, offset: usize) -> u32 {
        // SAFETY: `base` was vouched for in init(); offset is a known register
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        // SAFETY: `base` was vouched for in init(); offset is a known register
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Check that `init` has run, logging the first time it has not.
    pub fn check_ready(&mut self) -> bool {
        if !self.initialized && !self.warned {
            self.warned = true;
            warn!("[UART] read before init; console input will never arrive");
        }
        self.initialized
    }

    /// Write a single byte to the UART
    pub fn write_byte(&self, byte: u8) {
        if !self.initialized {
            return;
        }
        while self.read_reg(regs::FR) & flags::TXFF != 0 {
            core::hint::spin_loop();
        }
        self.write_reg(regs::DR, byte as u32);
    }

    /// Poll the receive FIFO for one byte.
    pub fn try_read_byte(&self) -> Option<u8> {
        if !self.initialized || self.read_reg(regs::FR) & flags::RXFE != 0 {
            return None;
        }
        Some((self.read_reg(regs::DR) & 0xFF) as u8)
    }

    /// Write raw bytes, translating `\n` into `\r\n`
    pub fn write_bytes(&self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

impl Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

/// Global UART instance protected by spinlock
pub static UART: Mutex<Uart> = Mutex::new(Uart::new(UART_BASE));

/// Console backed by the global PL011.
#[derive(Debug, Default, Clone, Copy)]
pub struct UartConsole;

impl Console for UartConsole {
    fn write(&self, bytes: &[u8]) {
        UART.lock().write_bytes(bytes);
    }

    /// Blocks until a byte arrives. Never returns before [`Uart::init`].
    fn read_byte(&self) -> u8 {
        loop {
            // Drop the lock between polls so writers are not starved
            let mut uart = UART.lock();
            if uart.check_ready() {
                if let Some(byte) = uart.try_read_byte() {
                    return byte;
                }
            }
            drop(uart);
            core::hint::spin_loop();
        }
    }
}

impl Write for UartConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Console::write(self, s.as_bytes());
        Ok(())
    }
}
