//! Multi-core bring-up.
//!
//! The boot core releases the other cores strictly one at a time: each core
//! must report in through the readiness vector before the next one is
//! powered on. Cores are visited in CPU table order starting just after the
//! boot core and wrapping around, so that the boot core's cluster comes up
//! before any other cluster.

use log::{info, warn};

use crate::{
    arch::{barriers::data_sync_barrier, Architecture, PrivilegeMode},
    boot::{abort, BootContext},
    config::BootConfig,
    error::{LoaderError, LoaderResult},
    handoff::{Handoff, TranslationRegime},
    image::ImageLoader,
    platform::{CpuDescriptor, Platform},
};

/// Table position of the core this code is running on.
pub fn identify_boot_core<A: Architecture>(arch: &A, cpus: &[CpuDescriptor]) -> LoaderResult<usize> {
    let mpidr = arch.cpu_id();
    cpus.iter()
        .position(|cpu| cpu.cpu_id == mpidr)
        .ok_or(LoaderError::UnknownBootCpu { mpidr })
}

/// One release decided by the activation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// Logical id the core will run as (1, 2, ... in release order).
    pub logical_id: usize,
    /// Position of the core in the CPU table.
    pub cpu_index: usize,
}

/// Circular walk over the CPU table starting after the boot core.
///
/// Ends when `max_nodes` cores (boot core included) are accounted for or
/// when the walk comes back round to the boot core.
#[derive(Debug, Clone)]
pub struct ActivationOrder {
    len: usize,
    boot_index: usize,
    cursor: usize,
    next_logical: usize,
    max_nodes: usize,
}

/// Cores to release for a table of `cpu_count` entries booted from
/// `boot_index`, capped at `max_nodes` cores in total.
pub fn activation_order(cpu_count: usize, boot_index: usize, max_nodes: usize) -> ActivationOrder {
    ActivationOrder {
        len: cpu_count,
        boot_index,
        cursor: boot_index + 1,
        next_logical: 1,
        max_nodes,
    }
}

impl Iterator for ActivationOrder {
    type Item = Activation;

    fn next(&mut self) -> Option<Activation> {
        if self.next_logical >= self.max_nodes || self.len == 0 {
            return None;
        }
        if self.cursor >= self.len {
            self.cursor = 0;
        }
        if self.cursor == self.boot_index {
            return None;
        }

        let step = Activation {
            logical_id: self.next_logical,
            cpu_index: self.cursor,
        };
        self.cursor += 1;
        self.next_logical += 1;
        Some(step)
    }
}

impl core::iter::FusedIterator for ActivationOrder {}

/// Release every other core, waiting for each before the next.
///
/// Returns the number of cores running, boot core included. Any core the
/// platform fails to release aborts the whole sequence: a partially booted
/// system is never handed to the kernel.
pub fn bring_up_secondaries<A: Architecture, P: Platform>(
    ctx: &BootContext,
    arch: &A,
    platform: &P,
    cpus: &[CpuDescriptor],
    boot_index: usize,
    config: &BootConfig,
    entry: usize,
) -> LoaderResult<usize> {
    let mut num_cpus = 1;

    for step in activation_order(cpus.len(), boot_index, config.max_num_nodes) {
        let cpu = &cpus[step.cpu_index];
        let stack_top = ctx.stack_top(step.logical_id)?;

        platform.cpu_on(cpu, entry, stack_top, step.logical_id)?;

        ctx.readiness
            .wait_for(step.logical_id, config.stall_report_spins, |index, spins| {
                warn!(
                    "Still waiting for cpu 0x{:x} (logic id {}) after {} polls",
                    cpu.cpu_id, index, spins
                );
            });
        info!("Core {:#x} is up with logic id {}", cpu.cpu_id, step.logical_id);
        num_cpus += 1;
    }

    // The boot core runs as thread 0.
    arch.set_boot_thread_id(0);

    Ok(num_cpus)
}

/// Load images, build tables and enable translation on logical core `core`.
///
/// Secondaries signal readiness as the very last step, once the MMU is on
/// and the kernel entry is resolved.
pub fn prepare_core<A: Architecture, L: ImageLoader>(
    ctx: &BootContext,
    arch: &A,
    loader: &L,
    core: usize,
) -> LoaderResult<Handoff> {
    let secondary = core != 0;
    let images = loader
        .load_images(core, secondary)
        .map_err(|code| LoaderError::ImageLoadFailed { core, code })?;

    // SAFETY: this is the only place that takes the tables of `core`, and
    // it runs on that core alone.
    let tables = unsafe { ctx.tables_mut(core)? };

    let regime = TranslationRegime::current(arch);
    match regime {
        TranslationRegime::Hypervisor => {
            arch.disable_caches_hyp();
            tables.init_hyp_boot_vspace(&images.kernel)?;
        }
        TranslationRegime::Supervisor => tables.init_boot_vspace(&images.kernel)?,
    }

    tables.check_alignment()?;
    data_sync_barrier();

    // SAFETY: both roots were just populated, checked, and published by the
    // barrier above; the identity map covers the code running now.
    unsafe {
        match regime {
            TranslationRegime::Hypervisor => arch.enable_hyp_mmu(tables.pgd_down_addr()),
            TranslationRegime::Supervisor => {
                arch.enable_mmu(tables.pgd_up_addr(), tables.pgd_down_addr())
            }
        }
    }

    let handoff = Handoff::new(&images);
    info!(
        "jump to kernel {:x} {:x}",
        handoff.entry, handoff.args.user_phys_start
    );

    if secondary {
        ctx.readiness.signal(core)?;
    }

    Ok(handoff)
}

/// Everything a secondary does between release and the kernel jump.
pub fn secondary_boot<A: Architecture, P: Platform, L: ImageLoader>(
    ctx: &BootContext,
    arch: &A,
    platform: &P,
    loader: &L,
    config: &BootConfig,
    core: usize,
) -> LoaderResult<Handoff> {
    arch.disable_dcaches();
    platform.non_boot_init();

    if !config.hypervisor_support && arch.privilege_mode() == PrivilegeMode::Hypervisor {
        arch.leave_hyp();
    }

    info!("Booting cpu id = 0x{:x}, index={}", arch.cpu_id(), core);

    prepare_core(ctx, arch, loader, core)
}

/// Rust entry of a released secondary core.
pub fn secondary_main<A: Architecture, P: Platform, L: ImageLoader>(
    ctx: &BootContext,
    arch: &A,
    platform: &P,
    loader: &L,
    config: &BootConfig,
    core: usize,
) -> ! {
    match secondary_boot(ctx, arch, platform, loader, config, core) {
        Ok(handoff) => {
            // SAFETY: the entry point came from the image loader and the
            // tables mapping it were enabled by `prepare_core`.
            unsafe { handoff.enter() };
            abort(arch, &LoaderError::KernelReturned { core })
        }
        Err(err) => abort(arch, &err),
    }
}
