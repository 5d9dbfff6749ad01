//! Reset entry, secondary startup stub and the EL2 to EL1 drop.
//!
//! `_start` runs on the boot core straight from firmware: MMU and caches
//! off, at EL2 or EL1. It installs the boot stack, clears `.bss` and calls
//! `elfloader_main`.
//!
//! `secondary_startup` is the address handed to PSCI `CPU_ON` and written to
//! spin-table release words. It loads its stack, logical id and Rust entry
//! from [`SECONDARY_MAILBOX`] and branches there.

use core::arch::global_asm;

use crate::platform::Mailbox;

global_asm!(
    r#"
.section .text.boot, "ax"
.global _start
_start:
    adrp    x1, __boot_stack_top
    add     x1, x1, :lo12:__boot_stack_top
    mov     sp, x1

    adrp    x1, __bss_start
    add     x1, x1, :lo12:__bss_start
    adrp    x2, __bss_end
    add     x2, x2, :lo12:__bss_end
1:  cmp     x1, x2
    b.hs    2f
    stp     xzr, xzr, [x1], #16
    b       1b

2:  bl      elfloader_main
3:  wfe
    b       3b

.global secondary_startup
secondary_startup:
    adrp    x1, SECONDARY_MAILBOX
    add     x1, x1, :lo12:SECONDARY_MAILBOX
    ldr     x2, [x1, #8]
    mov     sp, x2
    ldr     x0, [x1, #16]
    ldr     x3, [x1]
    br      x3

.section .text, "ax"
.global leave_hyp
leave_hyp:
    mrs     x9, CurrentEL
    cmp     x9, #(2 << 2)
    b.ne    1f

    mov     x9, sp
    msr     sp_el1, x9

    // EL1 physical timer and counter access.
    mrs     x9, cnthctl_el2
    orr     x9, x9, #3
    msr     cnthctl_el2, x9
    msr     cntvoff_el2, xzr

    // SCTLR_EL1 RES1 bits, MMU and caches off.
    mov     x9, #0x0800
    movk    x9, #0x30d0, lsl #16
    msr     sctlr_el1, x9

    // EL1 runs AArch64.
    mov     x9, #(1 << 31)
    msr     hcr_el2, x9

    // EL1h with DAIF masked.
    mov     x9, #0x3c5
    msr     spsr_el2, x9
    msr     elr_el2, x30
    isb
    eret
1:  ret

.section .bss
.balign 16
__boot_stack_bottom:
    .space 0x4000
__boot_stack_top:
"#
);

/// Parameters for the next secondary core, read by `secondary_startup`.
///
/// The stub relies on the field offsets of [`Mailbox`]: `entry` at 0,
/// `stack_top` at 8, `logical_id` at 16.
#[no_mangle]
pub static SECONDARY_MAILBOX: Mailbox = Mailbox::new();

const _: () = {
    assert!(core::mem::offset_of!(Mailbox, entry) == 0);
    assert!(core::mem::offset_of!(Mailbox, stack_top) == 8);
    assert!(core::mem::offset_of!(Mailbox, logical_id) == 16);
};

extern "C" {
    fn secondary_startup();

    /// Drop from EL2 to EL1h, keeping the current stack and returning to
    /// the caller. Returns immediately when not at EL2.
    pub fn leave_hyp();
}

/// Physical address of the secondary startup stub.
pub fn secondary_startup_addr() -> usize {
    secondary_startup as usize
}
