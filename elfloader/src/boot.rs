//! Primary core boot flow and the state shared by all cores.

use core::cell::UnsafeCell;

use log::{error, info};

use crate::{
    arch::Architecture,
    config::{BootConfig, CORE_STACK_SIZE, MAX_NUM_NODES},
    drivers::{DriverClass, DriverRegistry},
    error::{LoaderError, LoaderResult},
    handoff::Handoff,
    image::ImageLoader,
    mm::BootTables,
    platform::{CpuDescriptor, DeviceDescriptor, Platform},
    smp,
    sync::CoreReadiness,
};

/// Stack a secondary core runs on until it enters the kernel.
#[repr(C, align(16))]
pub struct CoreStack([u8; CORE_STACK_SIZE]);

impl CoreStack {
    pub const fn new() -> Self {
        Self([0; CORE_STACK_SIZE])
    }
}

impl Default for CoreStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the cores share during bring-up.
///
/// Slot `n` of `tables` and `stacks` belongs to logical core `n` and is
/// only ever touched by that core (stacks: by the core it is handed to).
pub struct BootContext {
    pub readiness: CoreReadiness,
    tables: [UnsafeCell<BootTables>; MAX_NUM_NODES],
    stacks: [UnsafeCell<CoreStack>; MAX_NUM_NODES],
}

// SAFETY: the per-core slots are only accessed through `tables_mut`, whose
// contract limits each slot to its owning core; `readiness` is atomic.
unsafe impl Sync for BootContext {}

impl BootContext {
    pub const fn new() -> Self {
        Self {
            readiness: CoreReadiness::new(),
            tables: [const { UnsafeCell::new(BootTables::new()) }; MAX_NUM_NODES],
            stacks: [const { UnsafeCell::new(CoreStack::new()) }; MAX_NUM_NODES],
        }
    }

    /// Translation tables of logical core `core`.
    ///
    /// # Safety
    ///
    /// Only logical core `core` may call this, and it must not hold two of
    /// the returned references at once.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn tables_mut(&self, core: usize) -> LoaderResult<&mut BootTables> {
        let cell = self.tables.get(core).ok_or(LoaderError::InvalidCoreIndex {
            index: core,
            max: MAX_NUM_NODES,
        })?;
        // SAFETY: exclusive per the caller's contract.
        Ok(unsafe { &mut *cell.get() })
    }

    /// Initial stack pointer for logical core `core` (stacks grow down).
    pub fn stack_top(&self, core: usize) -> LoaderResult<usize> {
        let cell = self.stacks.get(core).ok_or(LoaderError::InvalidCoreIndex {
            index: core,
            max: MAX_NUM_NODES,
        })?;
        Ok(cell.get() as usize + CORE_STACK_SIZE)
    }
}

impl Default for BootContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Report a fatal error and park this core for good.
///
/// Nothing is handed back to firmware and nothing resets: the board has to
/// be power-cycled.
pub fn abort<A: Architecture>(arch: &A, err: &LoaderError) -> ! {
    error!("[FATAL] {}", err);
    arch.halt()
}

/// Collaborators and tables a boot flow runs against.
pub struct BootEnv<'a, A, P, L> {
    pub ctx: &'a BootContext,
    pub arch: &'a A,
    pub platform: &'a P,
    pub loader: &'a L,
    pub registry: &'a DriverRegistry<'a>,
    pub cpus: &'a [CpuDescriptor],
    pub devices: &'a [DeviceDescriptor],
    pub config: &'a BootConfig,
    /// Address secondaries are released to.
    pub secondary_entry: usize,
}

impl<A: Architecture, P: Platform, L: ImageLoader> BootEnv<'_, A, P, L> {
    /// Everything the boot core does before the jump.
    ///
    /// Quiesces the interrupt controller, brings every other core up one at
    /// a time and finally prepares the boot core itself (logical index 0).
    pub fn boot_primary(&self) -> LoaderResult<Handoff> {
        let boot_index = smp::identify_boot_core(self.arch, self.cpus)?;
        info!(
            "Booting cpu id = 0x{:x}, index={}",
            self.arch.cpu_id(),
            boot_index
        );

        let irqs = self
            .registry
            .match_and_init(self.devices, DriverClass::Irq)
            .into_result()?;
        info!("{} interrupt controller(s) quiesced", irqs);

        let cores = smp::bring_up_secondaries(
            self.ctx,
            self.arch,
            self.platform,
            self.cpus,
            boot_index,
            self.config,
            self.secondary_entry,
        )?;
        info!("{} core(s) up", cores);

        smp::prepare_core(self.ctx, self.arch, self.loader, 0)
    }

    /// Primary entry: never comes back.
    pub fn boot_main(&self) -> ! {
        match self.boot_primary() {
            Ok(handoff) => {
                // SAFETY: the entry point came from the image loader and the
                // tables mapping it are live.
                unsafe { handoff.enter() };
                abort(self.arch, &LoaderError::KernelReturned { core: 0 })
            }
            Err(err) => abort(self.arch, &err),
        }
    }
}
