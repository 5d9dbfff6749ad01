//! Driver registry and compatible-string matcher.
//!
//! Drivers are listed at compile time in [`REGISTRY`]; nothing is registered
//! at runtime. [`DriverRegistry::match_and_init`] binds each device to the
//! first driver (in registry order) whose match table contains one of the
//! device's compatible strings, and runs that driver's initializer.

use log::{debug, warn};

use crate::{error::LoaderError, platform::DeviceDescriptor};

pub mod gic;

/// Kind of device a driver handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverClass {
    /// Interrupt controllers that must be quiesced before handoff.
    Irq,
}

/// One line of a driver's match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEntry {
    pub compatible: &'static str,
    /// Driver-private data handed to `init` for this entry.
    pub data: usize,
}

impl MatchEntry {
    pub const fn new(compatible: &'static str) -> Self {
        Self {
            compatible,
            data: 0,
        }
    }
}

/// Uniform driver interface.
///
/// `init` may be called more than once (for example once per core). Only
/// the first call may touch hardware; each driver guards this itself.
pub trait Driver: Sync {
    fn name(&self) -> &'static str;

    /// Ordered list of compatible strings this driver accepts.
    fn match_table(&self) -> &'static [MatchEntry];

    fn class(&self) -> DriverClass;

    fn init(&self, device: &DeviceDescriptor, data: usize) -> Result<(), LoaderError>;

    /// First entry of the match table equal to one of `device`'s
    /// compatible strings.
    fn match_device(&self, device: &DeviceDescriptor) -> Option<&'static MatchEntry> {
        self.match_table()
            .iter()
            .find(|entry| device.compatible.contains(&entry.compatible))
    }
}

/// Outcome of one matching pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchSummary {
    /// Devices whose driver initialised successfully.
    pub matched: usize,
    /// Devices whose driver reported failure.
    pub failed: usize,
    pub first_error: Option<LoaderError>,
}

impl MatchSummary {
    /// Escalate any driver failure into an error for the caller.
    pub fn into_result(self) -> Result<usize, LoaderError> {
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(self.matched),
        }
    }
}

/// Drivers tried in order against each device; the first match wins.
pub struct DriverRegistry<'a> {
    drivers: &'a [&'a dyn Driver],
}

impl<'a> DriverRegistry<'a> {
    pub const fn new(drivers: &'a [&'a dyn Driver]) -> Self {
        Self { drivers }
    }

    pub fn drivers(&self) -> &'a [&'a dyn Driver] {
        self.drivers
    }

    /// Bind every device in `devices` to the first matching driver of
    /// `class` and initialise it.
    ///
    /// A failing driver does not stop the pass; failures are counted and the
    /// first one is kept in the summary.
    pub fn match_and_init(&self, devices: &[DeviceDescriptor], class: DriverClass) -> MatchSummary {
        let mut summary = MatchSummary::default();

        for device in devices {
            let Some((driver, entry)) = self.find_driver(device, class) else {
                continue;
            };

            debug!(
                "binding {} to driver {} ({})",
                device.name,
                driver.name(),
                entry.compatible
            );

            match driver.init(device, entry.data) {
                Ok(()) => summary.matched += 1,
                Err(err) => {
                    warn!("{}: {}", device.name, err);
                    summary.failed += 1;
                    if summary.first_error.is_none() {
                        summary.first_error = Some(err);
                    }
                }
            }
        }

        summary
    }

    fn find_driver(
        &self,
        device: &DeviceDescriptor,
        class: DriverClass,
    ) -> Option<(&'a dyn Driver, &'static MatchEntry)> {
        self.drivers
            .iter()
            .filter(|driver| driver.class() == class)
            .find_map(|driver| driver.match_device(device).map(|entry| (*driver, entry)))
    }
}

static DRIVERS: [&dyn Driver; 2] = [&gic::GIC_V2, &gic::GIC_V3];

/// Every driver built into the loader, in match priority order.
pub static REGISTRY: DriverRegistry<'static> = DriverRegistry::new(&DRIVERS);
