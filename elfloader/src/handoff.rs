//! Translation regime selection and the jump into the kernel.

use crate::{
    arch::{Architecture, PrivilegeMode},
    image::BootImages,
};

/// Which tables and MMU enable path a core uses.
///
/// Resolved once per core from the live exception level: whether firmware
/// grants EL2 is only known at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationRegime {
    /// EL2: one root (`pgd_down`) holding both mappings.
    Hypervisor,
    /// EL1: kernel root in `TTBR1`, identity root in `TTBR0`.
    Supervisor,
}

impl TranslationRegime {
    pub fn current<A: Architecture>(arch: &A) -> Self {
        match arch.privilege_mode() {
            PrivilegeMode::Hypervisor => Self::Hypervisor,
            PrivilegeMode::Supervisor => Self::Supervisor,
        }
    }
}

/// The six words passed to the kernel entry point, in register order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelArgs {
    pub user_phys_start: usize,
    pub user_phys_end: usize,
    pub user_phys_virt_offset: usize,
    pub user_virt_entry: usize,
    pub dtb_paddr: usize,
    pub dtb_size: usize,
}

impl KernelArgs {
    pub fn from_images(images: &BootImages) -> Self {
        let dtb = images.dtb.unwrap_or_default();
        Self {
            user_phys_start: images.user.phys_region_start,
            user_phys_end: images.user.phys_region_end,
            user_phys_virt_offset: images.user.phys_virt_offset,
            user_virt_entry: images.user.virt_entry,
            dtb_paddr: dtb.paddr,
            dtb_size: dtb.size,
        }
    }
}

/// Kernel entry ABI: six untyped words, never returns in a correct boot.
pub type KernelEntry = unsafe extern "C" fn(usize, usize, usize, usize, usize, usize);

/// A resolved, not yet taken, jump into the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    pub entry: usize,
    pub args: KernelArgs,
}

impl Handoff {
    pub fn new(images: &BootImages) -> Self {
        Self {
            entry: images.kernel.virt_entry,
            args: KernelArgs::from_images(images),
        }
    }

    /// Call the kernel entry point.
    ///
    /// Returns only if the kernel does, which the caller must treat as
    /// fatal.
    ///
    /// # Safety
    ///
    /// `entry` must be the address of code that follows [`KernelEntry`]'s
    /// ABI and is executable under the translation regime currently
    /// enabled.
    pub unsafe fn enter(self) {
        // SAFETY: guaranteed by the caller; a non-zero code address has the
        // same representation as a function pointer.
        let entry: KernelEntry = unsafe { core::mem::transmute::<usize, KernelEntry>(self.entry) };
        let KernelArgs {
            user_phys_start,
            user_phys_end,
            user_phys_virt_offset,
            user_virt_entry,
            dtb_paddr,
            dtb_size,
        } = self.args;
        // SAFETY: see above.
        unsafe {
            entry(
                user_phys_start,
                user_phys_end,
                user_phys_virt_offset,
                user_virt_entry,
                dtb_paddr,
                dtb_size,
            )
        }
    }
}
