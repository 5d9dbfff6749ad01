//! Error types for the VeridianOS boot loader
//!
//! Every anomaly detected during bring-up is reported as a [`LoaderError`].
//! Nothing here is retried: the boot flow turns any error that reaches it
//! into a call to [`crate::boot::abort`].

use core::fmt;

/// Main loader error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    /// The live MPIDR of the booting core is not in the CPU table
    UnknownBootCpu {
        mpidr: u64,
    },
    /// The platform refused to release a secondary core
    CpuOnFailed {
        cpu_id: u64,
        code: i64,
    },
    /// The image loader collaborator reported a non-zero status
    ImageLoadFailed {
        core: usize,
        code: i32,
    },
    /// A logical core index outside `1..MAX_NUM_NODES`
    InvalidCoreIndex {
        index: usize,
        max: usize,
    },

    /// Translation table errors
    KernelSpansMultipleGiB {
        first_vaddr: usize,
        last_vaddr: usize,
    },
    MisalignedTable {
        level: &'static str,
        addr: usize,
    },

    /// Driver errors
    DriverInitFailed {
        driver: &'static str,
        code: u32,
    },
    NoDriverRegion {
        driver: &'static str,
    },

    /// The kernel entry point returned to the loader
    KernelReturned {
        core: usize,
    },

    /// Generic errors
    AlreadyInitialized {
        resource: &'static str,
    },
}

/// Result type alias for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBootCpu { mpidr } => {
                write!(f, "Could not find cpu entry for boot cpu (mpidr=0x{:x})", mpidr)
            }
            Self::CpuOnFailed { cpu_id, code } => {
                write!(f, "Failed to boot cpu 0x{:x}: {}", cpu_id, code)
            }
            Self::ImageLoadFailed { core, code } => {
                write!(f, "image loading failed on core {}: status {}", core, code)
            }
            Self::InvalidCoreIndex { index, max } => {
                write!(f, "Invalid core index {} (max {})", index, max)
            }
            Self::KernelSpansMultipleGiB {
                first_vaddr,
                last_vaddr,
            } => {
                write!(
                    f,
                    "We only map 1GiB, but kernel vaddr range 0x{:x}-0x{:x} covers multiple GiB",
                    first_vaddr, last_vaddr
                )
            }
            Self::MisalignedTable { level, addr } => {
                write!(f, "Translation table {} at 0x{:x} is misaligned", level, addr)
            }
            Self::DriverInitFailed { driver, code } => {
                write!(f, "Driver {} failed to initialise: code 0x{:x}", driver, code)
            }
            Self::NoDriverRegion { driver } => {
                write!(f, "Device bound to {} has no register window", driver)
            }
            Self::KernelReturned { core } => {
                write!(f, "Kernel returned back to the elf-loader on core {}", core)
            }
            Self::AlreadyInitialized { resource } => {
                write!(f, "{} is already initialized", resource)
            }
        }
    }
}
