//! Core readiness vector.
//!
//! One slot per potential core. A secondary writes its own logical index
//! into its slot once it has enabled translation and resolved its kernel
//! entry; the boot core spins on that slot before releasing the next core.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    arch::barriers::data_sync_barrier,
    config::MAX_NUM_NODES,
    error::{LoaderError, LoaderResult},
};

/// Per-core "up" flags, written by secondaries and polled by the boot core.
pub struct CoreReadiness {
    slots: [AtomicUsize; MAX_NUM_NODES],
}

impl CoreReadiness {
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicUsize::new(0) }; MAX_NUM_NODES],
        }
    }

    /// Announce that logical core `index` is about to enter the kernel.
    ///
    /// Everything this core wrote beforehand (page tables, MMU state) is
    /// made visible before the slot is, and the slot itself is made visible
    /// before anything that follows. Slots are write-once: signalling a slot
    /// that is already set changes nothing.
    pub fn signal(&self, index: usize) -> LoaderResult<()> {
        let slot = self.slot(index)?;

        data_sync_barrier();
        if slot.load(Ordering::Relaxed) == 0 {
            slot.store(index, Ordering::Release);
        }
        data_sync_barrier();

        Ok(())
    }

    /// Whether logical core `index` has signalled.
    ///
    /// The boot core (index 0) never signals and always reads as up.
    pub fn is_up(&self, index: usize) -> bool {
        match self.slots.get(index) {
            Some(slot) => slot.load(Ordering::Acquire) == index,
            None => false,
        }
    }

    /// Spin until logical core `index` has signalled.
    ///
    /// There is no timeout: a core that never reports in wedges the boot.
    /// With `report_every` set, `on_stall(index, spins)` is called every
    /// `report_every` polls so that the hang can at least be diagnosed.
    pub fn wait_for<F>(&self, index: usize, report_every: Option<u64>, mut on_stall: F)
    where
        F: FnMut(usize, u64),
    {
        let mut spins: u64 = 0;
        while !self.is_up(index) {
            core::hint::spin_loop();
            spins = spins.wrapping_add(1);
            if let Some(every) = report_every {
                if every != 0 && spins % every == 0 {
                    on_stall(index, spins);
                }
            }
        }
        data_sync_barrier();
    }

    fn slot(&self, index: usize) -> LoaderResult<&AtomicUsize> {
        if index == 0 {
            return Err(LoaderError::InvalidCoreIndex {
                index,
                max: MAX_NUM_NODES,
            });
        }
        self.slots.get(index).ok_or(LoaderError::InvalidCoreIndex {
            index,
            max: MAX_NUM_NODES,
        })
    }
}

impl Default for CoreReadiness {
    fn default() -> Self {
        Self::new()
    }
}
