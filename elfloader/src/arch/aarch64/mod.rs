//! AArch64 implementation of the architecture primitives.

use core::arch::asm;

use cortex_a::{
    asm::{
        barrier::{self, dsb, isb},
        wfe,
    },
    registers::{CurrentEL, MAIR_EL1, MPIDR_EL1, SCTLR_EL1, TCR_EL1, TTBR0_EL1, TTBR1_EL1},
};
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

use super::{Architecture, PrivilegeMode};

pub mod boot;
pub mod serial;

/// Affinity fields of MPIDR (Aff3, Aff2, Aff1, Aff0).
const MPIDR_AFFINITY_MASK: u64 = 0xff_00ff_ffff;

/// MAIR slots 0-4: Device-nGnRnE (0x00), Device-nGnRE, Device-GRE, Normal
/// non-cacheable, Normal write-back. Slot numbers match the descriptor
/// `AttrIndx` values used by the boot tables.
const MAIR_VALUE: u64 = (0x04 << 8) | (0x0c << 16) | (0x44 << 24) | (0xff << 32);

/// 48-bit input range (T0SZ/T1SZ = 16).
const TCR_T0SZ_48: u64 = 16;
const TCR_T1SZ_48: u64 = 16 << 16;
/// Write-back write-allocate, inner shareable walks for TTBR0 / TTBR1.
const TCR_WALK0: u64 = (1 << 8) | (1 << 10) | (3 << 12);
const TCR_WALK1: u64 = (1 << 24) | (1 << 26) | (3 << 28);
/// TG0 = 0 already selects 4 KiB; TG1 encodes it differently.
const TCR_TG1_4K: u64 = 2 << 30;
const TCR_IPS_40: u64 = 2 << 32;

const TCR_EL1_VALUE: u64 =
    TCR_T0SZ_48 | TCR_WALK0 | TCR_T1SZ_48 | TCR_WALK1 | TCR_TG1_4K | TCR_IPS_40;

/// EL2 has a single range; PS sits at bits 16-18 and bits 23 and 31 are RES1.
const TCR_EL2_VALUE: u64 = TCR_T0SZ_48 | TCR_WALK0 | (2 << 16) | (1 << 23) | (1 << 31);

/// SCTLR_ELx M, C and I.
const SCTLR_MMU_CACHES: u64 = (1 << 0) | (1 << 2) | (1 << 12);

/// The running AArch64 core.
pub struct AArch64;

impl AArch64 {
    fn clean_invalidate_by_set_way() {
        let clidr: u64;
        // SAFETY: reading CLIDR_EL1 has no side effects.
        unsafe { asm!("mrs {}, clidr_el1", out(reg) clidr, options(nomem, nostack)) };

        let level_of_coherence = (clidr >> 24) & 0x7;
        for level in 0..level_of_coherence {
            // Cache type 2 and up have a data or unified cache.
            if (clidr >> (level * 3)) & 0x7 < 2 {
                continue;
            }

            let ccsidr: u64;
            // SAFETY: selecting a cache level and reading its geometry only
            // affects CSSELR/CCSIDR.
            unsafe {
                asm!(
                    "msr csselr_el1, {sel}",
                    "isb",
                    "mrs {ccsidr}, ccsidr_el1",
                    sel = in(reg) level << 1,
                    ccsidr = out(reg) ccsidr,
                    options(nostack)
                );
            }

            let line_shift = (ccsidr & 0x7) + 4;
            let ways = ((ccsidr >> 3) & 0x3ff) + 1;
            let sets = ((ccsidr >> 13) & 0x7fff) + 1;
            let way_shift = (ways as u32 - 1).leading_zeros();

            for way in 0..ways {
                for set in 0..sets {
                    let operand = (way << way_shift) | (set << line_shift) | (level << 1);
                    // SAFETY: clean+invalidate by set/way never loses dirty
                    // data; it only writes lines back.
                    unsafe { asm!("dc cisw, {}", in(reg) operand, options(nostack)) };
                }
            }
        }

        // SAFETY: resets the cache selector.
        unsafe { asm!("msr csselr_el1, xzr", options(nostack)) };
        dsb(barrier::SY);
        isb(barrier::SY);
    }
}

impl Architecture for AArch64 {
    fn cpu_id(&self) -> u64 {
        MPIDR_EL1.get() & MPIDR_AFFINITY_MASK
    }

    fn privilege_mode(&self) -> PrivilegeMode {
        if CurrentEL.read(CurrentEL::EL) == 2 {
            PrivilegeMode::Hypervisor
        } else {
            PrivilegeMode::Supervisor
        }
    }

    fn leave_hyp(&self) {
        // SAFETY: `leave_hyp` returns to the caller at EL1 on the same stack
        // (or returns unchanged if not at EL2).
        unsafe { boot::leave_hyp() }
    }

    fn disable_dcaches(&self) {
        SCTLR_EL1.modify(SCTLR_EL1::C::NonCacheable);
        isb(barrier::SY);
        Self::clean_invalidate_by_set_way();
    }

    fn disable_caches_hyp(&self) {
        Self::clean_invalidate_by_set_way();
        // SAFETY: clearing C and I at EL2 only changes cacheability of the
        // loader's own accesses; translation stays as it was.
        unsafe {
            asm!(
                "mrs {tmp}, sctlr_el2",
                "bic {tmp}, {tmp}, #(1 << 2)",
                "bic {tmp}, {tmp}, #(1 << 12)",
                "msr sctlr_el2, {tmp}",
                "isb",
                tmp = out(reg) _,
                options(nostack)
            );
        }
    }

    fn flush_dcache(&self) {
        Self::clean_invalidate_by_set_way();
    }

    unsafe fn enable_mmu(&self, pgd_up: usize, pgd_down: usize) {
        Self::clean_invalidate_by_set_way();

        MAIR_EL1.set(MAIR_VALUE);
        TCR_EL1.set(TCR_EL1_VALUE);
        TTBR0_EL1.set_baddr(pgd_down as u64);
        TTBR1_EL1.set_baddr(pgd_up as u64);
        isb(barrier::SY);

        // SAFETY: drops stale EL1 translations before the new tables go live.
        unsafe { asm!("tlbi vmalle1", "ic iallu", options(nostack)) };
        dsb(barrier::SY);
        isb(barrier::SY);

        SCTLR_EL1.modify(SCTLR_EL1::M::Enable + SCTLR_EL1::C::Cacheable + SCTLR_EL1::I::Cacheable);
        isb(barrier::SY);
    }

    unsafe fn enable_hyp_mmu(&self, pgd_down: usize) {
        Self::clean_invalidate_by_set_way();

        // SAFETY: the caller guarantees `pgd_down` roots a complete table
        // covering the running code; the sequence mirrors `enable_mmu`.
        unsafe {
            asm!(
                "msr mair_el2, {mair}",
                "msr tcr_el2, {tcr}",
                "msr ttbr0_el2, {ttbr}",
                "isb",
                "tlbi alle2",
                "ic iallu",
                "dsb sy",
                "isb",
                "mrs {tmp}, sctlr_el2",
                "orr {tmp}, {tmp}, {bits}",
                "msr sctlr_el2, {tmp}",
                "isb",
                mair = in(reg) MAIR_VALUE,
                tcr = in(reg) TCR_EL2_VALUE,
                ttbr = in(reg) pgd_down as u64,
                bits = in(reg) SCTLR_MMU_CACHES,
                tmp = out(reg) _,
                options(nostack)
            );
        }
    }

    unsafe fn smc(&self, a0: usize, a1: usize, a2: usize, a3: usize) -> usize {
        let ret: usize;
        // SAFETY: the caller vouches for the function id; SMCCC v1.0 allows
        // the monitor to clobber x4-x17.
        unsafe {
            asm!(
                "smc #0",
                inout("x0") a0 => ret,
                inout("x1") a1 => _,
                inout("x2") a2 => _,
                inout("x3") a3 => _,
                out("x4") _, out("x5") _, out("x6") _, out("x7") _,
                out("x8") _, out("x9") _, out("x10") _, out("x11") _,
                out("x12") _, out("x13") _, out("x14") _, out("x15") _,
                out("x16") _, out("x17") _,
                options(nostack)
            );
        }
        ret
    }

    fn set_boot_thread_id(&self, id: usize) {
        // SAFETY: TPIDR_EL1 is a scratch register reserved for the kernel's
        // thread id; nothing in the loader reads it.
        unsafe { asm!("msr tpidr_el1, {}", in(reg) id, options(nomem, nostack)) };
    }

    fn send_event(&self) {
        // SAFETY: `sev` only wakes cores waiting in `wfe`.
        unsafe { asm!("sev", options(nomem, nostack)) };
    }

    fn halt(&self) -> ! {
        loop {
            wfe();
        }
    }
}
