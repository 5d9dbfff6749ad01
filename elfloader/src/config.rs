//! Build-time configuration of the loader.
//!
//! Per-core arrays are sized by [`MAX_NUM_NODES`], which `build.rs` exports
//! from the `MAX_NUM_NODES` environment variable. Boolean options come from
//! cargo features and are surfaced through [`BootConfig::BUILD`].

/// Maximum number of cores the loader will bring up.
pub const MAX_NUM_NODES: usize = parse_nodes(env!("ELFLOADER_MAX_NUM_NODES"));

/// Size of the stack handed to each secondary core on release.
pub const CORE_STACK_SIZE: usize = 4096;

const fn parse_nodes(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut value = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "ELFLOADER_MAX_NUM_NODES must be decimal");
        value = value * 10 + (digit - b'0') as usize;
        i += 1;
    }
    assert!(value >= 1, "ELFLOADER_MAX_NUM_NODES must be at least 1");
    value
}

/// Runtime view of the loader configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    /// Number of cores to bring up, including the boot core.
    pub max_num_nodes: usize,
    /// The kernel runs at EL2; do not drop out of hypervisor mode.
    pub hypervisor_support: bool,
    /// The board is QEMU `virt`, which needs the GICv2 grouping exception.
    pub plat_qemu_virt: bool,
    /// Report a stalled secondary every this many polls of its readiness slot.
    ///
    /// This is a diagnostic hook only: the wait itself stays unbounded.
    pub stall_report_spins: Option<u64>,
}

impl BootConfig {
    /// Configuration baked into this build.
    pub const BUILD: Self = Self {
        max_num_nodes: MAX_NUM_NODES,
        hypervisor_support: cfg!(feature = "hypervisor"),
        plat_qemu_virt: cfg!(feature = "qemu-virt"),
        stall_report_spins: Some(1 << 28),
    };

    /// Same configuration, limited to `nodes` cores (clamped to
    /// `1..=MAX_NUM_NODES`).
    pub const fn with_max_nodes(self, nodes: usize) -> Self {
        let nodes = if nodes == 0 {
            1
        } else if nodes > MAX_NUM_NODES {
            MAX_NUM_NODES
        } else {
            nodes
        };
        Self {
            max_num_nodes: nodes,
            ..self
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::BUILD
    }
}
