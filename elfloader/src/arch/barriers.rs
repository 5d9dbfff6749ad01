//! Memory barrier abstractions.
//!
//! Keeps the barrier instructions out of the bring-up logic so the same
//! code can be exercised on a development host.
//!
//! [`data_sync_barrier`] is `dsb sy` on AArch64: every memory access issued
//! before it completes before any access issued after it. On hosted targets
//! it falls back to a sequentially consistent fence.

/// Data synchronization barrier.
///
/// * **AArch64**: `dsb sy` -- full system, waits for completion of all
///   prior loads and stores, including those to device memory.
/// * **host**: `core::sync::atomic::fence(SeqCst)`.
#[inline(always)]
pub fn data_sync_barrier() {
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: `dsb sy` only orders memory accesses; it has no other
        // architectural side effects.
        unsafe {
            core::arch::asm!("dsb sy", options(nostack, preserves_flags));
        }
    }

    #[cfg(not(target_arch = "aarch64"))]
    {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }
}
