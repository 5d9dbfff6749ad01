//! Memory-mapped register windows.
//!
//! Every accessor here is exactly one volatile access of the stated width.
//! Accesses are issued in program order and are never merged, split, cached
//! or elided, which is what device register semantics require.

use core::ptr;

/// A window of device registers starting at `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioRegion {
    base: usize,
}

impl MmioRegion {
    /// Wrap the register window at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the mapped (or, with the MMU off, physical) address of
    /// a device register window that stays valid for the lifetime of the
    /// returned value, and every offset later passed to the accessors must
    /// name a register inside it.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub const fn base(&self) -> usize {
        self.base
    }

    /// Read the 32-bit register at `offset`.
    #[inline(always)]
    pub fn read32(&self, offset: usize) -> u32 {
        debug_assert_eq!(offset % 4, 0);
        // SAFETY: `new` requires that `base + offset` is a valid, aligned
        // register inside the window. Volatile so the read is never elided
        // or reordered with other register accesses.
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    /// Write the 32-bit register at `offset`.
    #[inline(always)]
    pub fn write32(&self, offset: usize, value: u32) {
        debug_assert_eq!(offset % 4, 0);
        // SAFETY: as for `read32`; volatile so the store reaches the device
        // exactly once.
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Write the 64-bit register at `offset`.
    #[inline(always)]
    pub fn write64(&self, offset: usize, value: u64) {
        debug_assert_eq!(offset % 8, 0);
        // SAFETY: as for `read32`, with 8-byte alignment.
        unsafe { ptr::write_volatile((self.base + offset) as *mut u64, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_hit_the_right_word() {
        let mut regs = [0u64; 4];
        // SAFETY: `regs` outlives `mmio` and every offset used is in bounds.
        let mmio = unsafe { MmioRegion::new(regs.as_mut_ptr() as usize) };

        mmio.write32(0x4, 0xdead_beef);
        mmio.write64(0x10, 0x4008_1000);

        assert_eq!(mmio.read32(0x4), 0xdead_beef);
        assert_eq!(mmio.read32(0x0), 0);
        assert_eq!(regs[2], 0x4008_1000);
    }
}
