//! Shared doubles for the loader integration tests.
//!
//! These run on the host: the architecture, platform and image loader are
//! replaced by recording fakes, and the GIC distributor is a plain block of
//! memory.

#![allow(dead_code)]

use std::{
    cell::UnsafeCell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use veridian_elfloader::{
    arch::{Architecture, PrivilegeMode},
    image::{BootImages, DtbInfo, ImageInfo, ImageLoader},
    platform::{CpuDescriptor, DeviceDescriptor, EnableMethod, Platform},
    sync::CoreReadiness,
    LoaderError, LoaderResult,
};

pub const KERNEL_VBASE: usize = 0xffff_ff80_4000_0000;
pub const KERNEL_PBASE: usize = 0x4000_0000;

pub const fn psci_cpu(cpu_id: u64) -> CpuDescriptor {
    CpuDescriptor {
        cpu_id,
        compat: "arm,cortex-a57",
        enable: EnableMethod::Psci,
    }
}

/// Four cores in two clusters, sorted by MPIDR.
pub static TWO_CLUSTERS: [CpuDescriptor; 4] =
    [psci_cpu(0x0), psci_cpu(0x1), psci_cpu(0x100), psci_cpu(0x101)];

/// Kernel at `KERNEL_VBASE` occupying `size` bytes.
pub fn kernel_image(size: usize) -> ImageInfo {
    ImageInfo {
        phys_region_start: KERNEL_PBASE,
        phys_region_end: KERNEL_PBASE + size,
        virt_region_start: KERNEL_VBASE,
        virt_region_end: KERNEL_VBASE + size,
        virt_entry: KERNEL_VBASE,
        phys_virt_offset: KERNEL_PBASE.wrapping_sub(KERNEL_VBASE),
    }
}

pub fn boot_images() -> BootImages {
    BootImages {
        kernel: kernel_image(0x20_0000),
        user: ImageInfo {
            phys_region_start: 0x4200_0000,
            phys_region_end: 0x4210_0000,
            virt_region_start: 0x1_0000,
            virt_region_end: 0x11_0000,
            virt_entry: 0x1_0000,
            phys_virt_offset: 0x4200_0000 - 0x1_0000,
        },
        dtb: Some(DtbInfo {
            paddr: 0x4800_0000,
            size: 0x1_0000,
        }),
    }
}

/// Architecture double reporting a fixed MPIDR and mode.
pub struct HostArch {
    mpidr: u64,
    mode: Mutex<PrivilegeMode>,
    pub mmu_enables: AtomicUsize,
    pub boot_thread_id: Mutex<Option<usize>>,
}

impl HostArch {
    pub fn new(mpidr: u64, mode: PrivilegeMode) -> Self {
        Self {
            mpidr,
            mode: Mutex::new(mode),
            mmu_enables: AtomicUsize::new(0),
            boot_thread_id: Mutex::new(None),
        }
    }
}

impl Architecture for HostArch {
    fn cpu_id(&self) -> u64 {
        self.mpidr
    }

    fn privilege_mode(&self) -> PrivilegeMode {
        *self.mode.lock().unwrap()
    }

    fn leave_hyp(&self) {
        *self.mode.lock().unwrap() = PrivilegeMode::Supervisor;
    }

    fn disable_dcaches(&self) {}

    fn disable_caches_hyp(&self) {}

    fn flush_dcache(&self) {}

    unsafe fn enable_mmu(&self, _pgd_up: usize, _pgd_down: usize) {
        self.mmu_enables.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn enable_hyp_mmu(&self, _pgd_down: usize) {
        self.mmu_enables.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn smc(&self, _a0: usize, _a1: usize, _a2: usize, _a3: usize) -> usize {
        0
    }

    fn set_boot_thread_id(&self, id: usize) {
        *self.boot_thread_id.lock().unwrap() = Some(id);
    }

    fn send_event(&self) {}

    fn halt(&self) -> ! {
        panic!("halted");
    }
}

/// Platform whose cores report in as soon as they are released.
pub struct InstantPlatform<'a> {
    readiness: &'a CoreReadiness,
    pub released: Mutex<Vec<(u64, usize)>>,
}

impl<'a> InstantPlatform<'a> {
    pub fn new(readiness: &'a CoreReadiness) -> Self {
        Self {
            readiness,
            released: Mutex::new(Vec::new()),
        }
    }

    /// `(cpu_id, logical_id)` of every released core, in release order.
    pub fn released(&self) -> Vec<(u64, usize)> {
        self.released.lock().unwrap().clone()
    }
}

impl Platform for InstantPlatform<'_> {
    fn cpu_on(
        &self,
        cpu: &CpuDescriptor,
        _entry: usize,
        _stack_top: usize,
        logical_id: usize,
    ) -> LoaderResult<()> {
        self.released.lock().unwrap().push((cpu.cpu_id, logical_id));
        self.readiness.signal(logical_id)
    }
}

/// Platform whose cores report in from their own thread some time after
/// release, the way a real core needs to boot before it signals.
pub struct DelayedPlatform {
    readiness: &'static CoreReadiness,
    delay: Duration,
    events: Arc<Mutex<Vec<String>>>,
}

impl DelayedPlatform {
    pub fn new(readiness: &'static CoreReadiness, delay: Duration) -> Self {
        Self {
            readiness,
            delay,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `on <mpidr>` per release and `up <logical id>` per signal, in the
    /// order they happened.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Platform for DelayedPlatform {
    fn cpu_on(
        &self,
        cpu: &CpuDescriptor,
        _entry: usize,
        _stack_top: usize,
        logical_id: usize,
    ) -> LoaderResult<()> {
        self.events.lock().unwrap().push(format!("on {:#x}", cpu.cpu_id));

        let readiness = self.readiness;
        let events = Arc::clone(&self.events);
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            events.lock().unwrap().push(format!("up {}", logical_id));
            readiness.signal(logical_id).unwrap();
        });
        Ok(())
    }
}

/// Loader handing out the same images to every core.
pub struct FixedLoader(pub BootImages);

impl ImageLoader for FixedLoader {
    fn load_images(&self, _core: usize, _secondary: bool) -> Result<BootImages, i32> {
        Ok(self.0)
    }
}

/// Power-on content of every fake distributor register.
pub const FILL: u32 = 0x5a5a_5a5a;

const DIST_WORDS: usize = 0x1000 / 4;

#[repr(C, align(4096))]
struct Frame([UnsafeCell<u32>; DIST_WORDS]);

/// Distributor register block in host memory.
pub struct Distributor {
    frame: Box<Frame>,
}

impl Distributor {
    /// `it_lines` is the `GICD_TYPER.ITLinesNumber` field.
    pub fn new(ctlr: u32, it_lines: u32) -> Self {
        let dist = Self {
            frame: Box::new(Frame(std::array::from_fn(|_| UnsafeCell::new(FILL)))),
        };
        dist.write(0x000, ctlr);
        dist.write(0x004, it_lines & 0x1f);
        dist
    }

    pub fn device(&self, compatible: &'static [&'static str]) -> DeviceDescriptor {
        let base = self.frame.0.as_ptr() as usize;
        DeviceDescriptor {
            name: "interrupt-controller@8000000",
            compatible,
            region_bases: Box::leak(Box::new([base])),
        }
    }

    pub fn read(&self, offset: usize) -> u32 {
        // SAFETY: in bounds; volatile like the driver's accesses.
        unsafe { self.frame.0[offset / 4].get().read_volatile() }
    }

    pub fn write(&self, offset: usize, value: u32) {
        // SAFETY: in bounds.
        unsafe { self.frame.0[offset / 4].get().write_volatile(value) }
    }
}

pub fn expect_invalid_index(err: LoaderError) {
    assert!(
        matches!(err, LoaderError::InvalidCoreIndex { .. }),
        "unexpected error {:?}",
        err
    );
}
