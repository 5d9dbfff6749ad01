//! Host doubles for the hardware collaborators.

use std::{
    cell::UnsafeCell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    arch::{Architecture, PrivilegeMode},
    error::{LoaderError, LoaderResult},
    image::{BootImages, DtbInfo, ImageInfo, ImageLoader},
    platform::{CpuDescriptor, DeviceDescriptor, Platform},
    sync::CoreReadiness,
};

/// Value every fake distributor register starts with, so that stray writes
/// show up.
pub const SENTINEL: u32 = 0xdead_beef;

/// Calls the boot path makes into [`MockArch`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchCall {
    LeaveHyp,
    DisableDcaches,
    DisableCachesHyp,
    FlushDcache,
    EnableMmu { pgd_up: usize, pgd_down: usize },
    EnableHypMmu { pgd_down: usize },
    SetBootThreadId(usize),
}

pub struct MockArch {
    mpidr: u64,
    mode: Mutex<PrivilegeMode>,
    smc_result: AtomicUsize,
    smc_calls: Mutex<Vec<[usize; 4]>>,
    events: AtomicUsize,
    calls: Mutex<Vec<ArchCall>>,
    watched: Option<(&'static CoreReadiness, usize)>,
    ready_at_mmu: Mutex<Vec<bool>>,
}

impl MockArch {
    pub fn new(mpidr: u64) -> Self {
        Self {
            mpidr,
            mode: Mutex::new(PrivilegeMode::Supervisor),
            smc_result: AtomicUsize::new(0),
            smc_calls: Mutex::new(Vec::new()),
            events: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            watched: None,
            ready_at_mmu: Mutex::new(Vec::new()),
        }
    }

    /// Sample `readiness.is_up(core)` at every MMU enable.
    pub fn watching(mut self, readiness: &'static CoreReadiness, core: usize) -> Self {
        self.watched = Some((readiness, core));
        self
    }

    /// Readiness of the watched core as seen by each MMU enable.
    pub fn ready_at_mmu(&self) -> Vec<bool> {
        self.ready_at_mmu.lock().unwrap().clone()
    }

    pub fn in_mode(mpidr: u64, mode: PrivilegeMode) -> Self {
        let arch = Self::new(mpidr);
        *arch.mode.lock().unwrap() = mode;
        arch
    }

    pub fn set_smc_result(&self, value: usize) {
        self.smc_result.store(value, Ordering::Relaxed);
    }

    pub fn last_smc(&self) -> Option<[usize; 4]> {
        self.smc_calls.lock().unwrap().last().copied()
    }

    pub fn events_sent(&self) -> usize {
        self.events.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> Vec<ArchCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ArchCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn sample_readiness(&self) {
        if let Some((readiness, core)) = self.watched {
            self.ready_at_mmu.lock().unwrap().push(readiness.is_up(core));
        }
    }
}

impl Architecture for MockArch {
    fn cpu_id(&self) -> u64 {
        self.mpidr
    }

    fn privilege_mode(&self) -> PrivilegeMode {
        *self.mode.lock().unwrap()
    }

    fn leave_hyp(&self) {
        self.record(ArchCall::LeaveHyp);
        *self.mode.lock().unwrap() = PrivilegeMode::Supervisor;
    }

    fn disable_dcaches(&self) {
        self.record(ArchCall::DisableDcaches);
    }

    fn disable_caches_hyp(&self) {
        self.record(ArchCall::DisableCachesHyp);
    }

    fn flush_dcache(&self) {
        self.record(ArchCall::FlushDcache);
    }

    unsafe fn enable_mmu(&self, pgd_up: usize, pgd_down: usize) {
        self.sample_readiness();
        self.record(ArchCall::EnableMmu { pgd_up, pgd_down });
    }

    unsafe fn enable_hyp_mmu(&self, pgd_down: usize) {
        self.sample_readiness();
        self.record(ArchCall::EnableHypMmu { pgd_down });
    }

    unsafe fn smc(&self, a0: usize, a1: usize, a2: usize, a3: usize) -> usize {
        self.smc_calls.lock().unwrap().push([a0, a1, a2, a3]);
        self.smc_result.load(Ordering::Relaxed)
    }

    fn set_boot_thread_id(&self, id: usize) {
        self.record(ArchCall::SetBootThreadId(id));
    }

    fn send_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    fn halt(&self) -> ! {
        panic!("core halted");
    }
}

/// Platform whose released cores report in immediately.
///
/// Each `cpu_on` is recorded and, unless the core is listed in `fail_on`,
/// the readiness slot is signalled on the caller's behalf.
pub struct MockPlatform<'a> {
    readiness: &'a CoreReadiness,
    fail_on: Option<u64>,
    released: Mutex<Vec<Released>>,
    non_boot_inits: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    pub cpu_id: u64,
    pub entry: usize,
    pub stack_top: usize,
    pub logical_id: usize,
}

impl<'a> MockPlatform<'a> {
    pub fn new(readiness: &'a CoreReadiness) -> Self {
        Self {
            readiness,
            fail_on: None,
            released: Mutex::new(Vec::new()),
            non_boot_inits: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(readiness: &'a CoreReadiness, cpu_id: u64) -> Self {
        Self {
            fail_on: Some(cpu_id),
            ..Self::new(readiness)
        }
    }

    pub fn released(&self) -> Vec<Released> {
        self.released.lock().unwrap().clone()
    }

    pub fn non_boot_inits(&self) -> usize {
        self.non_boot_inits.load(Ordering::Relaxed)
    }
}

impl Platform for MockPlatform<'_> {
    fn cpu_on(
        &self,
        cpu: &CpuDescriptor,
        entry: usize,
        stack_top: usize,
        logical_id: usize,
    ) -> LoaderResult<()> {
        if self.fail_on == Some(cpu.cpu_id) {
            return Err(LoaderError::CpuOnFailed {
                cpu_id: cpu.cpu_id,
                code: -1,
            });
        }
        self.released.lock().unwrap().push(Released {
            cpu_id: cpu.cpu_id,
            entry,
            stack_top,
            logical_id,
        });
        self.readiness.signal(logical_id)
    }

    fn non_boot_init(&self) {
        self.non_boot_inits.fetch_add(1, Ordering::Relaxed);
    }
}

/// Image loader returning a fixed kernel at `0xffffff80_4000_0000` backed
/// by physical `0x4000_0000`.
pub struct MockLoader {
    pub fail_with: Option<i32>,
    requests: Mutex<Vec<(usize, bool)>>,
}

impl MockLoader {
    pub const KERNEL_VBASE: usize = 0xffff_ff80_4000_0000;
    pub const KERNEL_PBASE: usize = 0x4000_0000;

    pub fn new() -> Self {
        Self {
            fail_with: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(code: i32) -> Self {
        Self {
            fail_with: Some(code),
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<(usize, bool)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn images() -> BootImages {
        BootImages {
            kernel: ImageInfo {
                phys_region_start: Self::KERNEL_PBASE,
                phys_region_end: Self::KERNEL_PBASE + 0x40_0000,
                virt_region_start: Self::KERNEL_VBASE,
                virt_region_end: Self::KERNEL_VBASE + 0x40_0000,
                virt_entry: Self::KERNEL_VBASE + 0x1000,
                phys_virt_offset: Self::KERNEL_PBASE.wrapping_sub(Self::KERNEL_VBASE),
            },
            user: ImageInfo {
                phys_region_start: 0x4100_0000,
                phys_region_end: 0x4120_0000,
                virt_region_start: 0x40_0000,
                virt_region_end: 0x60_0000,
                virt_entry: 0x40_0100,
                phys_virt_offset: 0x4100_0000 - 0x40_0000,
            },
            dtb: Some(DtbInfo {
                paddr: 0x4f00_0000,
                size: 0x2000,
            }),
        }
    }
}

impl ImageLoader for MockLoader {
    fn load_images(&self, core: usize, secondary: bool) -> Result<BootImages, i32> {
        self.requests.lock().unwrap().push((core, secondary));
        match self.fail_with {
            Some(code) => Err(code),
            None => Ok(Self::images()),
        }
    }
}

/// Number of 32-bit words in the fake distributor (`GICD_CTLR` up to the
/// end of `GICD_IGRPMODR`).
const DIST_WORDS: usize = 0x1000 / 4;

#[repr(C, align(4096))]
struct DistributorFrame([UnsafeCell<u32>; DIST_WORDS]);

/// A heap-allocated GIC distributor register block.
///
/// Drivers program it through raw volatile accesses, exactly as they would
/// real hardware.
pub struct FakeDistributor {
    frame: Box<DistributorFrame>,
}

impl FakeDistributor {
    pub fn new(ctlr: u32, typer: u32) -> Self {
        let frame = Box::new(DistributorFrame(core::array::from_fn(|_| {
            UnsafeCell::new(SENTINEL)
        })));
        let fake = Self { frame };
        fake.set_reg(0x000, ctlr);
        fake.set_reg(0x004, typer);
        fake
    }

    pub fn base(&self) -> usize {
        self.frame.0.as_ptr() as usize
    }

    /// Device descriptor pointing at this block.
    ///
    /// The slices are leaked: device tables are `'static` by contract.
    pub fn device(&self, compatible: &'static [&'static str]) -> DeviceDescriptor {
        let regions: &'static [usize] = Box::leak(Box::new([self.base()]));
        DeviceDescriptor {
            name: "intc@fake",
            compatible,
            region_bases: regions,
        }
    }

    pub fn reg(&self, offset: usize) -> u32 {
        // SAFETY: offset is within the frame; volatile to pair with the
        // driver's own volatile accesses.
        unsafe { self.frame.0[offset / 4].get().read_volatile() }
    }

    pub fn set_reg(&self, offset: usize, value: u32) {
        // SAFETY: as for `reg`.
        unsafe { self.frame.0[offset / 4].get().write_volatile(value) }
    }

    pub fn snapshot(&self) -> Vec<u32> {
        (0..DIST_WORDS).map(|word| self.reg(word * 4)).collect()
    }
}
