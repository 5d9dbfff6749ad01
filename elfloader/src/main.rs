//! VeridianOS ELF loader image.
//!
//! Links the boot flow from the library against the AArch64 primitives, the
//! QEMU `virt` inventory and the platform's `elfloader_load_images`.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod bare_metal {
    use core::panic::PanicInfo;

    use log::{error, LevelFilter};
    use veridian_elfloader::{
        arch::{
            aarch64::{
                boot::{secondary_startup_addr, SECONDARY_MAILBOX},
                serial::Pl011Uart,
                AArch64,
            },
            Architecture, PrivilegeMode,
        },
        boot::abort,
        drivers::REGISTRY,
        image::ExternLoader,
        logger::{self, BootLogger},
        platform::{qemu_virt, FirmwarePlatform},
        smp, BootConfig, BootContext, BootEnv,
    };

    static ARCH: AArch64 = AArch64;
    static CONTEXT: BootContext = BootContext::new();
    static LOADER: ExternLoader = ExternLoader;
    static CONFIG: BootConfig = BootConfig::BUILD;
    // SAFETY: the PL011 of QEMU virt sits in the identity-mapped device GiB.
    static LOGGER: BootLogger<Pl011Uart> =
        BootLogger::new(unsafe { Pl011Uart::new(qemu_virt::UART_BASE) });

    fn platform() -> FirmwarePlatform<'static, AArch64> {
        FirmwarePlatform::new(&ARCH, &SECONDARY_MAILBOX, secondary_startup_addr())
    }

    /// Rust entry of the boot core, called by `_start`.
    #[no_mangle]
    extern "C" fn elfloader_main() -> ! {
        // SAFETY: first thing on the boot core; no secondary is running yet.
        if let Err(err) = unsafe { logger::init(&LOGGER, LevelFilter::Info) } {
            abort(&ARCH, &err);
        }

        if !CONFIG.hypervisor_support && ARCH.privilege_mode() == PrivilegeMode::Hypervisor {
            ARCH.leave_hyp();
        }

        let platform = platform();
        BootEnv {
            ctx: &CONTEXT,
            arch: &ARCH,
            platform: &platform,
            loader: &LOADER,
            registry: &REGISTRY,
            cpus: &qemu_virt::CPUS,
            devices: &qemu_virt::DEVICES,
            config: &CONFIG,
            secondary_entry: secondary_entry as usize,
        }
        .boot_main()
    }

    /// Rust entry of a released secondary, reached from `secondary_startup`
    /// with its logical id in `x0`.
    extern "C" fn secondary_entry(logical_id: usize) -> ! {
        smp::secondary_main(&CONTEXT, &ARCH, &platform(), &LOADER, &CONFIG, logical_id)
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        error!("[PANIC] {}", info);
        ARCH.halt()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("veridian-elfloader only runs on bare-metal AArch64 (aarch64-unknown-none)");
    std::process::exit(1);
}
