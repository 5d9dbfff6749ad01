//! AArch64 stage 1 translation table layout (4 KiB granule, 48-bit VA).

use core::ops::{Index, IndexMut};

use bitflags::bitflags;

/// Number of descriptors in one table
pub const PAGE_TABLE_ENTRIES: usize = 512;

/// Size of a table in bytes, which is also its required alignment
pub const PAGE_TABLE_SIZE: usize = 4096;

pub const BLOCK_1G_BITS: u32 = 30;
pub const BLOCK_2M_BITS: u32 = 21;

/// `MAIR_EL1` slot holding Device-nGnRnE.
pub const MT_DEVICE_NGNRNE: u64 = 0;
/// `MAIR_EL1` slot holding normal write-back memory.
pub const MT_NORMAL: u64 = 4;

/// Bits [47:12] of a descriptor.
const OUTPUT_ADDRESS_MASK: u64 = 0x0000_ffff_ffff_f000;

bitflags! {
    /// Descriptor bits used by the boot tables.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u64 {
        const VALID = 1 << 0;
        /// Next-level table (levels 0-2); clear for a block.
        const TABLE = 1 << 1;
        /// Inner shareable.
        const SH_INNER = 3 << 8;
        /// Access flag; clear means the first access faults.
        const AF = 1 << 10;
    }
}

/// Index into the level 0 table.
pub const fn pgd_index(vaddr: usize) -> usize {
    (vaddr >> 39) & (PAGE_TABLE_ENTRIES - 1)
}

/// Index into a level 1 table.
pub const fn pud_index(vaddr: usize) -> usize {
    (vaddr >> BLOCK_1G_BITS) & (PAGE_TABLE_ENTRIES - 1)
}

/// Index into a level 2 table.
pub const fn pmd_index(vaddr: usize) -> usize {
    (vaddr >> BLOCK_2M_BITS) & (PAGE_TABLE_ENTRIES - 1)
}

/// One translation table descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Descriptor(u64);

impl Descriptor {
    pub const INVALID: Self = Self(0);

    /// Pointer to the next-level table at `addr`.
    pub fn table(addr: usize) -> Self {
        let flags = DescriptorFlags::VALID | DescriptorFlags::TABLE;
        Self((addr as u64 & OUTPUT_ADDRESS_MASK) | flags.bits())
    }

    /// Block mapping of `paddr` with memory attributes from MAIR slot
    /// `attr_index`.
    pub fn block(paddr: usize, attr_index: u64, inner_shareable: bool) -> Self {
        let mut flags = DescriptorFlags::VALID | DescriptorFlags::AF;
        if inner_shareable {
            flags |= DescriptorFlags::SH_INNER;
        }
        Self((paddr as u64 & OUTPUT_ADDRESS_MASK) | (attr_index << 2) | flags.bits())
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn flags(self) -> DescriptorFlags {
        DescriptorFlags::from_bits_truncate(self.0)
    }

    pub fn is_valid(self) -> bool {
        self.flags().contains(DescriptorFlags::VALID)
    }

    pub fn is_table(self) -> bool {
        self.flags()
            .contains(DescriptorFlags::VALID | DescriptorFlags::TABLE)
    }

    /// `AttrIndx` field.
    pub const fn attr_index(self) -> u64 {
        (self.0 >> 2) & 0x7
    }

    pub const fn output_address(self) -> usize {
        (self.0 & OUTPUT_ADDRESS_MASK) as usize
    }
}

/// A 4 KiB translation table
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [Descriptor; PAGE_TABLE_ENTRIES],
}

impl PageTable {
    pub const fn new() -> Self {
        Self {
            entries: [Descriptor::INVALID; PAGE_TABLE_ENTRIES],
        }
    }

    pub fn zero(&mut self) {
        self.entries.fill(Descriptor::INVALID);
    }

    /// Address of the table as seen by the MMU (identity at boot).
    pub fn addr(&self) -> usize {
        self as *const Self as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.entries.iter()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for PageTable {
    type Output = Descriptor;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl IndexMut<usize> for PageTable {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.entries[index]
    }
}
