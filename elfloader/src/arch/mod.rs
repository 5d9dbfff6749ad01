//! Architecture primitives consumed by the bring-up code.
//!
//! The orchestrator, table builder and handoff only talk to the CPU
//! through [`Architecture`]; the AArch64 implementation lives in
//! `aarch64` and test doubles implement the same trait on the host.

pub mod barriers;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod aarch64;

/// Exception level the core is executing at, as read from the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
    /// EL2: firmware granted hypervisor privilege.
    Hypervisor,
    /// EL1 (or anything that is not EL2).
    Supervisor,
}

pub trait Architecture: Sync {
    /// Live MPIDR of the calling core.
    fn cpu_id(&self) -> u64;

    /// Live privilege level of the calling core.
    fn privilege_mode(&self) -> PrivilegeMode;

    /// Drop from EL2 to EL1, continuing at the instruction after the call.
    fn leave_hyp(&self);

    /// Turn off data caching inherited from firmware on this core.
    fn disable_dcaches(&self);

    /// Turn off the EL2 caches before building EL2 tables.
    fn disable_caches_hyp(&self);

    /// Clean and invalidate the data cache to the point of coherency.
    fn flush_dcache(&self);

    /// Enable stage 1 EL1 translation with the given table roots.
    ///
    /// # Safety
    ///
    /// Both roots must point at fully populated, aligned tables that map
    /// the code currently executing.
    unsafe fn enable_mmu(&self, pgd_up: usize, pgd_down: usize);

    /// Enable EL2 translation with the given table root.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Architecture::enable_mmu`].
    unsafe fn enable_hyp_mmu(&self, pgd_down: usize);

    /// Secure monitor call with four word arguments.
    ///
    /// # Safety
    ///
    /// Traps into firmware; the caller must pass a function id the
    /// firmware implements with arguments it expects.
    unsafe fn smc(&self, a0: usize, a1: usize, a2: usize, a3: usize) -> usize;

    /// Record the logical thread id of the boot core (`tpidr_el1`).
    fn set_boot_thread_id(&self, id: usize);

    /// Wake cores parked in `wfe`.
    fn send_event(&self);

    /// Park this core forever.
    fn halt(&self) -> !;
}
