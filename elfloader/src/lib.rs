//! VeridianOS ELF Loader Library
//!
//! Multi-core bring-up and kernel handoff for AArch64 boards, run between
//! firmware and the microkernel.
//!
//! ## Key Components
//!
//! - [`smp`] - boot core identification and ordered secondary release
//! - [`sync`] - the core readiness vector
//! - [`drivers`] - compile-time driver registry and the GIC drivers
//! - [`mm`] - per-core boot translation tables
//! - [`handoff`] - translation regime selection and the kernel jump
//!
//! The library builds for the host as well so that all of the above can be
//! unit tested; only `arch::aarch64` needs the real target.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod boot;
pub mod config;
pub mod drivers;
pub mod error;
pub mod handoff;
pub mod image;
pub mod logger;
pub mod mm;
pub mod mmio;
pub mod platform;
pub mod smp;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use boot::{BootContext, BootEnv};
pub use config::{BootConfig, MAX_NUM_NODES};
pub use error::{LoaderError, LoaderResult};
