//! ARM Generic Interrupt Controller distributor quiescing.
//!
//! Both drivers leave the distributor enabled with every Shared Peripheral
//! Interrupt (INTID 32 and up) disabled, not pending, level-triggered,
//! assigned to a group and at a uniform priority. SGIs and PPIs (INTID
//! 0-31) are banked per core and are never touched here.
//!
//! ## Register layout shared by GICv2 and GICv3 distributors
//!
//! | Offset  | Register      | Lines per register |
//! |---------|---------------|--------------------|
//! | `0x000` | `GICD_CTLR`   | -                  |
//! | `0x004` | `GICD_TYPER`  | -                  |
//! | `0x080` | `GICD_IGROUPR`| 32                 |
//! | `0x180` | `GICD_ICENABLER` | 32              |
//! | `0x280` | `GICD_ICPENDR`| 32                 |
//! | `0x400` | `GICD_IPRIORITYR` | 4              |
//! | `0xC00` | `GICD_ICFGR`  | 16                 |

use core::ops::Range;

use crate::{
    config::BootConfig,
    error::{LoaderError, LoaderResult},
    mmio::MmioRegion,
    platform::DeviceDescriptor,
};

mod v2;
mod v3;

pub use v2::GicV2;
pub use v3::GicV3;

/// Distributor Control Register.
const GICD_CTLR: usize = 0x000;
/// Interrupt Controller Type Register -- reports number of interrupt lines.
const GICD_TYPER: usize = 0x004;
/// Interrupt Group Registers (one bit per interrupt).
const GICD_IGROUPR: usize = 0x080;
/// Interrupt Clear-Enable Registers (one bit per interrupt).
const GICD_ICENABLER: usize = 0x180;
/// Interrupt Clear-Pending Registers (one bit per interrupt).
const GICD_ICPENDR: usize = 0x280;
/// Interrupt Priority Registers (one byte per interrupt).
const GICD_IPRIORITYR: usize = 0x400;
/// Interrupt Configuration Registers (2 bits per interrupt).
const GICD_ICFGR: usize = 0xC00;

/// First Shared Peripheral Interrupt; everything below is per-core.
pub const SPI_START: u32 = 32;

/// ITLinesNumber field of `GICD_TYPER`.
const GICD_TYPER_LINESNR: u32 = 0x1f;

/// Interrupt IDs 1020-1023 are special and have no configuration.
const GIC_MAX_IRQS: u32 = 1020;

const IRQ_SET_ALL: u32 = 0xffff_ffff;

/// Number of implemented interrupt lines reported by `GICD_TYPER`.
pub fn nr_lines(typer: u32) -> u32 {
    (32 * ((typer & GICD_TYPER_LINESNR) + 1)).min(GIC_MAX_IRQS)
}

/// Indices of the registers covering shared lines, for a register bank
/// packing `lines_per_reg` lines per 32-bit word.
fn spi_registers(nr_lines: u32, lines_per_reg: u32) -> Range<usize> {
    let first = SPI_START / lines_per_reg;
    let end = nr_lines.div_ceil(lines_per_reg);
    first as usize..end.max(first) as usize
}

/// Replicate one priority byte into all four lanes of a priority register.
const fn priority_word(priority: u8) -> u32 {
    u32::from_ne_bytes([priority; 4])
}

/// How shared interrupts are grouped, derived from the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPolicy {
    pub hypervisor_support: bool,
    pub plat_qemu_virt: bool,
}

impl GroupPolicy {
    pub const fn from_config(config: &BootConfig) -> Self {
        Self {
            hypervisor_support: config.hypervisor_support,
            plat_qemu_virt: config.plat_qemu_virt,
        }
    }
}

/// Distributor window of `device`: always its first region.
fn distributor(device: &DeviceDescriptor, driver: &'static str) -> LoaderResult<MmioRegion> {
    let base = *device
        .region_bases
        .first()
        .ok_or(LoaderError::NoDriverRegion { driver })?;
    // SAFETY: region bases come from the compiled-in device table, which
    // only lists distributor windows that are identity-mapped (or, with the
    // MMU off, physical) for the whole boot.
    Ok(unsafe { MmioRegion::new(base) })
}

/// Disable and clear pending state for every shared line.
fn disable_and_clear_spis(dist: &MmioRegion, nr_lines: u32) {
    for reg in spi_registers(nr_lines, 32) {
        dist.write32(GICD_ICENABLER + reg * 4, IRQ_SET_ALL);
        dist.write32(GICD_ICPENDR + reg * 4, IRQ_SET_ALL);
    }
}

fn configure_spis(dist: &MmioRegion, nr_lines: u32, value: u32) {
    for reg in spi_registers(nr_lines, 16) {
        dist.write32(GICD_ICFGR + reg * 4, value);
    }
}

fn set_spi_groups(dist: &MmioRegion, nr_lines: u32, value: u32) {
    for reg in spi_registers(nr_lines, 32) {
        dist.write32(GICD_IGROUPR + reg * 4, value);
    }
}

fn set_spi_priority(dist: &MmioRegion, nr_lines: u32, priority: u8) {
    let word = priority_word(priority);
    for reg in spi_registers(nr_lines, 4) {
        dist.write32(GICD_IPRIORITYR + reg * 4, word);
    }
}

pub static GIC_V2: GicV2 = GicV2::new(GroupPolicy::from_config(&BootConfig::BUILD));
pub static GIC_V3: GicV3 = GicV3::new();
