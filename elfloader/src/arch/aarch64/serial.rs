//! PL011 UART used as the boot console.
//!
//! Firmware leaves the UART configured, so only the data and flag registers
//! are touched.

use crate::{logger::Console, mmio::MmioRegion};

const UARTDR: usize = 0x000;
const UARTFR: usize = 0x018;
/// Transmit FIFO full.
const UARTFR_TXFF: u32 = 1 << 5;

pub struct Pl011Uart {
    regs: MmioRegion,
}

impl Pl011Uart {
    /// # Safety
    ///
    /// `base_addr` must be the register window of a PL011 that stays
    /// identity mapped while the loader runs.
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self {
            // SAFETY: forwarded from the caller.
            regs: unsafe { MmioRegion::new(base_addr) },
        }
    }

    fn put_byte(&self, byte: u8) {
        while self.regs.read32(UARTFR) & UARTFR_TXFF != 0 {
            core::hint::spin_loop();
        }
        self.regs.write32(UARTDR, byte as u32);
    }
}

impl Console for Pl011Uart {
    fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.put_byte(b'\r');
            }
            self.put_byte(byte);
        }
    }
}
