//! Inventory of the QEMU `virt` machine (`-cpu cortex-a53 -smp 4`,
//! `gic-version=2`).

use super::{CpuDescriptor, DeviceDescriptor, EnableMethod};

/// PL011 UART used for diagnostics.
pub const UART_BASE: usize = 0x0900_0000;

/// GIC distributor.
pub const GICD_BASE: usize = 0x0800_0000;

/// GIC CPU interface.
pub const GICC_BASE: usize = 0x0801_0000;

pub static CPUS: [CpuDescriptor; 4] = [
    CpuDescriptor {
        cpu_id: 0x0,
        compat: "arm,cortex-a53",
        enable: EnableMethod::Psci,
    },
    CpuDescriptor {
        cpu_id: 0x1,
        compat: "arm,cortex-a53",
        enable: EnableMethod::Psci,
    },
    CpuDescriptor {
        cpu_id: 0x2,
        compat: "arm,cortex-a53",
        enable: EnableMethod::Psci,
    },
    CpuDescriptor {
        cpu_id: 0x3,
        compat: "arm,cortex-a53",
        enable: EnableMethod::Psci,
    },
];

pub static DEVICES: [DeviceDescriptor; 1] = [DeviceDescriptor {
    name: "intc@8000000",
    compatible: &["arm,cortex-a15-gic"],
    region_bases: &[GICD_BASE, GICC_BASE],
}];
