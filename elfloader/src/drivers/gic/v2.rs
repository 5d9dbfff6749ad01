//! GICv2 distributor.

use core::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;
use log::info;

use super::{
    configure_spis, disable_and_clear_spis, distributor, nr_lines, set_spi_groups,
    set_spi_priority, GroupPolicy, GICD_CTLR, GICD_TYPER,
};
use crate::{
    drivers::{Driver, DriverClass, MatchEntry},
    error::LoaderResult,
    mmio::MmioRegion,
    platform::DeviceDescriptor,
};

bitflags! {
    /// GICv2 `GICD_CTLR`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Ctlr: u32 {
        const ENABLE = 1 << 0;
    }
}

/// ICFGR value for 16 lines: level-sensitive, 1-N model.
const ICFGR_LEVEL_1_N: u32 = 0x5555_5555;

static MATCHES: [MatchEntry; 1] = [MatchEntry::new("arm,cortex-a15-gic")];

pub struct GicV2 {
    policy: GroupPolicy,
    /// Set after the first successful initialisation.
    ///
    /// Plain load/store, not an atomic exchange: only the boot core runs
    /// the matcher for shared devices, so two cores never race on the first
    /// call. Concurrent first calls from several cores are not supported.
    initialized: AtomicBool,
}

impl GicV2 {
    pub const fn new(policy: GroupPolicy) -> Self {
        Self {
            policy,
            initialized: AtomicBool::new(false),
        }
    }

    /// Group for all shared lines: group 1 (non-secure) when the kernel
    /// owns EL2, except on QEMU where group 0 must be kept.
    fn group_word(&self) -> u32 {
        if self.policy.hypervisor_support && !self.policy.plat_qemu_virt {
            0xffff_ffff
        } else {
            0
        }
    }

    fn priority(&self) -> u8 {
        if self.policy.hypervisor_support {
            0x80
        } else {
            0x00
        }
    }

    fn init_distributor(&self, dist: &MmioRegion) {
        let ctlr = Ctlr::from_bits_retain(dist.read32(GICD_CTLR));
        if !ctlr.contains(Ctlr::ENABLE) {
            let enabled = ctlr | Ctlr::ENABLE;
            info!(
                "GICv2: GICD_CTLR 0x{:x} -> 0x{:x} (Enabling GIC distributor)",
                ctlr.bits(),
                enabled.bits()
            );
            dist.write32(GICD_CTLR, enabled.bits());
        }

        let nr_lines = nr_lines(dist.read32(GICD_TYPER));

        disable_and_clear_spis(dist, nr_lines);
        configure_spis(dist, nr_lines, ICFGR_LEVEL_1_N);
        set_spi_groups(dist, nr_lines, self.group_word());
        set_spi_priority(dist, nr_lines, self.priority());
    }
}

impl Driver for GicV2 {
    fn name(&self) -> &'static str {
        "gic_v2"
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
