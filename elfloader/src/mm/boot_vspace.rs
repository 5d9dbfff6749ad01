//! Per-core boot translation tables.
//!
//! Two hierarchies are built for each core:
//!
//! - *down*: `pgd_down[0] -> pud_down`, identity-mapping the first 512 GiB
//!   of physical space with 1 GiB device blocks, so that the loader keeps
//!   running (and can reach devices) right after the MMU comes on.
//! - *up*: `pgd_up -> pud_up -> pmd_up`, mapping the kernel's 1 GiB window
//!   with 2 MiB normal-memory blocks starting at the kernel's physical base.
//!
//! At EL2 there is only one translation base register, so the kernel window
//! is hung off `pgd_down` instead and `pgd_up` stays empty.

use log::debug;

use super::page_table::{
    pgd_index, pmd_index, pud_index, Descriptor, PageTable, BLOCK_1G_BITS, BLOCK_2M_BITS,
    MT_DEVICE_NGNRNE, MT_NORMAL, PAGE_TABLE_ENTRIES, PAGE_TABLE_SIZE,
};
use crate::{
    config::MAX_NUM_NODES,
    error::{LoaderError, LoaderResult},
    image::ImageInfo,
};

/// Kernel mappings must match the kernel's own shareability once other
/// cores exist.
const KERNEL_INNER_SHAREABLE: bool = MAX_NUM_NODES > 1;

#[repr(C)]
pub struct BootTables {
    pgd_up: PageTable,
    pud_up: PageTable,
    pmd_up: PageTable,
    pgd_down: PageTable,
    pud_down: PageTable,
}

impl BootTables {
    pub const fn new() -> Self {
        Self {
            pgd_up: PageTable::new(),
            pud_up: PageTable::new(),
            pmd_up: PageTable::new(),
            pgd_down: PageTable::new(),
            pud_down: PageTable::new(),
        }
    }

    /// Build tables for EL1, with separate up (`TTBR1`) and down (`TTBR0`)
    /// roots.
    pub fn init_boot_vspace(&mut self, kernel: &ImageInfo) -> LoaderResult<()> {
        check_kernel_window(kernel)?;
        self.clear();

        self.map_identity();
        self.pgd_up[pgd_index(kernel.virt_region_start)] = Descriptor::table(self.pud_up.addr());
        self.map_kernel_window(kernel);

        debug!(
            "boot vspace: kernel 0x{:x} -> 0x{:x}",
            kernel.virt_region_start, kernel.phys_region_start
        );
        Ok(())
    }

    /// Build the single EL2 hierarchy rooted at `pgd_down`.
    pub fn init_hyp_boot_vspace(&mut self, kernel: &ImageInfo) -> LoaderResult<()> {
        check_kernel_window(kernel)?;
        self.clear();

        self.map_identity();
        self.pgd_down[pgd_index(kernel.virt_region_start)] =
            Descriptor::table(self.pud_up.addr());
        self.map_kernel_window(kernel);

        debug!(
            "hyp boot vspace: kernel 0x{:x} -> 0x{:x}",
            kernel.virt_region_start, kernel.phys_region_start
        );
        Ok(())
    }

    /// Every table must sit on its own 4 KiB boundary before its address
    /// goes into a descriptor or a TTBR.
    pub fn check_alignment(&self) -> LoaderResult<()> {
        let levels = [
            ("pgd_up", self.pgd_up.addr()),
            ("pud_up", self.pud_up.addr()),
            ("pmd_up", self.pmd_up.addr()),
            ("pgd_down", self.pgd_down.addr()),
            ("pud_down", self.pud_down.addr()),
        ];
        for (level, addr) in levels {
            if addr % PAGE_TABLE_SIZE != 0 {
                return Err(LoaderError::MisalignedTable { level, addr });
            }
        }
        Ok(())
    }

    pub fn pgd_up_addr(&self) -> usize {
        self.pgd_up.addr()
    }

    pub fn pgd_down_addr(&self) -> usize {
        self.pgd_down.addr()
    }

    pub fn pgd_up(&self) -> &PageTable {
        &self.pgd_up
    }

    pub fn pud_up(&self) -> &PageTable {
        &self.pud_up
    }

    pub fn pmd_up(&self) -> &PageTable {
        &self.pmd_up
    }

    pub fn pgd_down(&self) -> &PageTable {
        &self.pgd_down
    }

    pub fn pud_down(&self) -> &PageTable {
        &self.pud_down
    }

    fn clear(&mut self) {
        self.pgd_up.zero();
        self.pud_up.zero();
        self.pmd_up.zero();
        self.pgd_down.zero();
        self.pud_down.zero();
    }

    fn map_identity(&mut self) {
        self.pgd_down[0] = Descriptor::table(self.pud_down.addr());
        for i in 0..PAGE_TABLE_ENTRIES {
            self.pud_down[i] = Descriptor::block(i << BLOCK_1G_BITS, MT_DEVICE_NGNRNE, false);
        }
    }

    /// `pud_up -> pmd_up`, then 2 MiB blocks from the kernel's first
    /// virtual address to the end of its 1 GiB region.
    fn map_kernel_window(&mut self, kernel: &ImageInfo) {
        let vaddr = kernel.virt_region_start;
        self.pud_up[pud_index(vaddr)] = Descriptor::table(self.pmd_up.addr());

        let mut paddr = kernel.phys_region_start;
        for i in pmd_index(vaddr)..PAGE_TABLE_ENTRIES {
            self.pmd_up[i] = Descriptor::block(paddr, MT_NORMAL, KERNEL_INNER_SHAREABLE);
            paddr += 1 << BLOCK_2M_BITS;
        }
    }
}

impl Default for BootTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Only one 1 GiB region of kernel space is mapped.
fn check_kernel_window(kernel: &ImageInfo) -> LoaderResult<()> {
    let first_vaddr = kernel.virt_region_start;
    let last_vaddr = kernel.virt_region_end;
    if first_vaddr >> BLOCK_1G_BITS != last_vaddr >> BLOCK_1G_BITS {
        return Err(LoaderError::KernelSpansMultipleGiB {
            first_vaddr,
            last_vaddr,
        });
    }
    Ok(())
}
