//! Compiled-in platform inventory and core release primitives.
//!
//! The CPU and device tables are generated from the board's device tree
//! ahead of time; the loader only reads them.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    arch::{barriers::data_sync_barrier, Architecture},
    error::{LoaderError, LoaderResult},
    mmio::MmioRegion,
};

pub mod qemu_virt;

/// How a secondary core is released from firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableMethod {
    /// PSCI `CPU_ON` through the secure monitor.
    Psci,
    /// Firmware parks the core polling `release_addr` for an entry point.
    SpinTable { release_addr: usize },
}

/// One entry of the CPU table, ordered by ascending `cpu_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDescriptor {
    /// MPIDR value the core reports.
    pub cpu_id: u64,
    /// Device tree `compatible` of the cpu node.
    pub compat: &'static str,
    pub enable: EnableMethod,
}

/// A memory-mapped device discovered on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    /// Device tree `compatible` strings, most specific first.
    pub compatible: &'static [&'static str],
    /// Base of each register window, in `reg` order.
    pub region_bases: &'static [usize],
}

/// Board specific core release.
pub trait Platform: Sync {
    /// Start `cpu` at `entry` with `stack_top` as its stack, passing it
    /// `logical_id` as its first argument.
    fn cpu_on(
        &self,
        cpu: &CpuDescriptor,
        entry: usize,
        stack_top: usize,
        logical_id: usize,
    ) -> LoaderResult<()>;

    /// Per-core setup run first thing on every secondary core.
    fn non_boot_init(&self) {}
}

/// Parameters picked up by the secondary startup stub.
///
/// Bring-up is strictly sequential, so a single mailbox is reused for every
/// core: it is only rewritten after the previous core has reported in.
#[repr(C)]
pub struct Mailbox {
    pub entry: AtomicUsize,
    pub stack_top: AtomicUsize,
    pub logical_id: AtomicUsize,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            entry: AtomicUsize::new(0),
            stack_top: AtomicUsize::new(0),
            logical_id: AtomicUsize::new(0),
        }
    }

    fn post(&self, entry: usize, stack_top: usize, logical_id: usize) {
        self.entry.store(entry, Ordering::Relaxed);
        self.stack_top.store(stack_top, Ordering::Relaxed);
        self.logical_id.store(logical_id, Ordering::Relaxed);
        // The released core starts with its MMU and caches off; the mailbox
        // must be in memory, not just in our view of it.
        data_sync_barrier();
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// PSCI function id of `CPU_ON` (SMC64 calling convention).
pub const PSCI_CPU_ON_64: usize = 0xC400_0003;

/// PSCI `SUCCESS`.
const PSCI_SUCCESS: i64 = 0;

/// Releases cores through the firmware interfaces named in the CPU table.
pub struct FirmwarePlatform<'a, A: Architecture> {
    arch: &'a A,
    mailbox: &'a Mailbox,
    /// Physical address of the startup stub that consumes `mailbox`.
    startup: usize,
}

impl<'a, A: Architecture> FirmwarePlatform<'a, A> {
    pub const fn new(arch: &'a A, mailbox: &'a Mailbox, startup: usize) -> Self {
        Self {
            arch,
            mailbox,
            startup,
        }
    }
}

impl<A: Architecture> Platform for FirmwarePlatform<'_, A> {
    fn cpu_on(
        &self,
        cpu: &CpuDescriptor,
        entry: usize,
        stack_top: usize,
        logical_id: usize,
    ) -> LoaderResult<()> {
        self.mailbox.post(entry, stack_top, logical_id);
        // The released core reads the mailbox with its caches off.
        self.arch.flush_dcache();

        match cpu.enable {
            EnableMethod::Psci => {
                let mailbox = self.mailbox as *const Mailbox as usize;
                // SAFETY: CPU_ON takes (target MPIDR, entry point, context id);
                // the startup stub is position-fixed code in the loader image
                // and the context id is the mailbox it reads.
                let ret = unsafe {
                    self.arch
                        .smc(PSCI_CPU_ON_64, cpu.cpu_id as usize, self.startup, mailbox)
                };
                // PSCI returns a signed 32-bit status in a 64-bit register.
                let code = ret as u32 as i32 as i64;
                if code != PSCI_SUCCESS {
                    return Err(LoaderError::CpuOnFailed {
                        cpu_id: cpu.cpu_id,
                        code,
                    });
                }
            }
            EnableMethod::SpinTable { release_addr } => {
                // SAFETY: `release_addr` comes from the cpu node's
                // `cpu-release-addr` and is a naturally aligned 64-bit word
                // the firmware polls.
                let release = unsafe { MmioRegion::new(release_addr) };
                release.write64(0, self.startup as u64);
                self.arch.flush_dcache();
                data_sync_barrier();
                self.arch.send_event();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockArch;

    const PSCI_CPU: CpuDescriptor = CpuDescriptor {
        cpu_id: 0x101,
        compat: "arm,cortex-a53",
        enable: EnableMethod::Psci,
    };

    #[test]
    fn test_psci_cpu_on_posts_mailbox_then_calls_firmware() {
        let arch = MockArch::new(0x0);
        let mailbox = Mailbox::new();
        let platform = FirmwarePlatform::new(&arch, &mailbox, 0x4000_1000);

        platform.cpu_on(&PSCI_CPU, 0x4000_2000, 0x4008_0000, 2).unwrap();

        assert_eq!(mailbox.entry.load(Ordering::Relaxed), 0x4000_2000);
        assert_eq!(mailbox.stack_top.load(Ordering::Relaxed), 0x4008_0000);
        assert_eq!(mailbox.logical_id.load(Ordering::Relaxed), 2);

        let call = arch.last_smc().unwrap();
        assert_eq!(call[0], PSCI_CPU_ON_64);
        assert_eq!(call[1], 0x101);
        assert_eq!(call[2], 0x4000_1000);
        assert_eq!(call[3], &mailbox as *const Mailbox as usize);
    }

    #[test]
    fn test_psci_error_is_reported_with_cpu_id() {
        let arch = MockArch::new(0x0);
        // PSCI DENIED
        arch.set_smc_result(-3i64 as usize);
        let mailbox = Mailbox::new();
        let platform = FirmwarePlatform::new(&arch, &mailbox, 0x4000_1000);

        let err = platform.cpu_on(&PSCI_CPU, 0, 0, 1).unwrap_err();
        assert_eq!(
            err,
            LoaderError::CpuOnFailed {
                cpu_id: 0x101,
                code: -3
            }
        );
    }

    #[test]
    fn test_spin_table_writes_release_address() {
        let arch = MockArch::new(0x0);
        let mailbox = Mailbox::new();
        let platform = FirmwarePlatform::new(&arch, &mailbox, 0x4000_1000);
        let mut release = 0u64;
        let cpu = CpuDescriptor {
            cpu_id: 0x1,
            compat: "arm,cortex-a53",
            enable: EnableMethod::SpinTable {
                release_addr: &mut release as *mut u64 as usize,
            },
        };

        platform.cpu_on(&cpu, 0x4000_2000, 0x4008_0000, 1).unwrap();

        assert_eq!(release, 0x4000_1000);
        assert!(arch.events_sent() >= 1);
        assert!(arch.last_smc().is_none());
    }
}
