//! Image metadata handed over by the ELF loader.
//!
//! Decoding the kernel and user ELF images is not done here. A loader
//! implementing [`ImageLoader`] places the images in memory and reports
//! where they ended up; the bring-up code only consumes the result.

/// Placement of one loaded image.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageInfo {
    pub phys_region_start: usize,
    pub phys_region_end: usize,
    pub virt_region_start: usize,
    pub virt_region_end: usize,
    pub virt_entry: usize,
    /// `phys - virt` for any address inside the image (wrapping).
    pub phys_virt_offset: usize,
}

/// Location of the device tree blob passed to the kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DtbInfo {
    pub paddr: usize,
    pub size: usize,
}

/// Everything one core needs to build its tables and enter the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootImages {
    pub kernel: ImageInfo,
    pub user: ImageInfo,
    pub dtb: Option<DtbInfo>,
}

/// Places the kernel and user images for a core.
pub trait ImageLoader: Sync {
    /// Load (or, for `secondary` cores, look up) the images for logical
    /// core `core`. Any error code is fatal to the boot.
    fn load_images(&self, core: usize, secondary: bool) -> Result<BootImages, i32>;
}

#[cfg(target_os = "none")]
pub use self::external::ExternLoader;

#[cfg(target_os = "none")]
mod external {
    use super::{BootImages, DtbInfo, ImageInfo, ImageLoader};

    /// Output block filled in by the platform image loader.
    #[repr(C)]
    #[derive(Default)]
    struct RawImages {
        kernel: ImageInfo,
        user: ImageInfo,
        dtb: DtbInfo,
    }

    extern "C" {
        /// Provided by the platform image; returns 0 on success.
        fn elfloader_load_images(core: usize, secondary: bool, out: *mut RawImages) -> i32;
    }

    /// [`ImageLoader`] backed by the `elfloader_load_images` symbol linked
    /// into the loader binary.
    pub struct ExternLoader;

    impl ImageLoader for ExternLoader {
        fn load_images(&self, core: usize, secondary: bool) -> Result<BootImages, i32> {
            let mut raw = RawImages::default();
            // SAFETY: `raw` is a valid, writable `RawImages` for the duration
            // of the call and the loader only writes within it.
            let status = unsafe { elfloader_load_images(core, secondary, &mut raw) };
            if status != 0 {
                return Err(status);
            }

            Ok(BootImages {
                kernel: raw.kernel,
                user: raw.user,
                dtb: (raw.dtb.size != 0).then_some(raw.dtb),
            })
        }
    }
}
