//! GICv3 distributor.
//!
//! Unlike GICv2, the distributor is switched to affinity routing before the
//! shared lines are reset. Every write to `GICD_CTLR` is followed by a wait
//! on `RWP`, which the architecture requires before the next change.

use core::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;
use log::info;

use super::{
    configure_spis, disable_and_clear_spis, distributor, nr_lines, set_spi_groups,
    set_spi_priority, spi_registers, GICD_CTLR, GICD_TYPER,
};
use crate::{
    drivers::{Driver, DriverClass, MatchEntry},
    error::LoaderResult,
    mmio::MmioRegion,
    platform::DeviceDescriptor,
};

bitflags! {
    /// GICv3 `GICD_CTLR`, non-secure view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Ctlr: u32 {
        const ENABLE_G0 = 1 << 0;
        const ENABLE_G1NS = 1 << 1;
        const ARE_NS = 1 << 4;
        /// Register Write Pending.
        const RWP = 1 << 31;
    }
}

/// Interrupt Group Modifier Registers (one bit per interrupt).
const GICD_IGRPMODR: usize = 0xD00;

/// Default priority for shared lines.
const GIC_PRI_IRQ: u8 = 0xa0;

static MATCHES: [MatchEntry; 1] = [MatchEntry::new("arm,gic-v3")];

/// Shared lines always go to non-secure group 1, whatever the build's
/// hypervisor setting.
pub struct GicV3 {
    /// One-time guard, same single-writer contract as the GICv2 driver.
    initialized: AtomicBool,
}

impl GicV3 {
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
        }
    }

    /// Spin until the distributor has absorbed the last `GICD_CTLR` write.
    fn wait_for_rwp(dist: &MmioRegion) {
        while Ctlr::from_bits_retain(dist.read32(GICD_CTLR)).contains(Ctlr::RWP) {
            core::hint::spin_loop();
        }
    }

    /// Enable affinity routing and non-secure group 1.
    ///
    /// ARE_NS may only change while the group is disabled, so an already
    /// enabled G1NS is dropped first.
    fn enable_affinity_routing(dist: &MmioRegion) {
        let wanted = Ctlr::ARE_NS | Ctlr::ENABLE_G1NS;
        let mut ctlr = Ctlr::from_bits_retain(dist.read32(GICD_CTLR));
        if ctlr.contains(wanted) {
            return;
        }

        if ctlr.contains(Ctlr::ENABLE_G1NS) {
            let disabled = ctlr - Ctlr::ENABLE_G1NS;
            info!(
                "GICv3: GICD_CTLR 0x{:x} -> 0x{:x} (Disabling Grp1NS)",
                ctlr.bits(),
                disabled.bits()
            );
            ctlr = disabled;
            dist.write32(GICD_CTLR, ctlr.bits());
            Self::wait_for_rwp(dist);
        }

        let enabled = ctlr | wanted;
        info!(
            "GICv3: GICD_CTLR 0x{:x} -> 0x{:x} (Enabling Grp1NS and ARE_NS)",
            ctlr.bits(),
            enabled.bits()
        );
        dist.write32(GICD_CTLR, enabled.bits());
        Self::wait_for_rwp(dist);
    }

    fn init_distributor(&self, dist: &MmioRegion) {
        Self::enable_affinity_routing(dist);

        let nr_lines = nr_lines(dist.read32(GICD_TYPER));

        disable_and_clear_spis(dist, nr_lines);
        // All zero: level-sensitive.
        configure_spis(dist, nr_lines, 0);

        // Non-secure group 1 for every shared line. With two security
        // states these registers are RAZ/WI from non-secure code, so on such
        // systems the writes are dropped and firmware's grouping stands.
        set_spi_groups(dist, nr_lines, 0xffff_ffff);
        for reg in spi_registers(nr_lines, 32) {
            dist.write32(GICD_IGRPMODR + reg * 4, 0);
        }

        set_spi_priority(dist, nr_lines, GIC_PRI_IRQ);
    }
}

impl Default for GicV3 {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for GicV3 {
    fn name(&self) -> &'static str {
        "gic_v3"
    }

    fn match_table(&self) -> &'static [MatchEntry] {
        &MATCHES
    }

    fn class(&self) -> DriverClass {
        DriverClass::Irq
    }

    fn init(&self, device: &DeviceDescriptor, _data: usize) -> LoaderResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let dist = distributor(device, self.name())?;
        self.init_distributor(&dist);

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }
}
