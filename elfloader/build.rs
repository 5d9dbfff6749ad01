use std::{env, path::PathBuf};

/// Upper bound on cores the loader is built for when `MAX_NUM_NODES` is unset.
const DEFAULT_MAX_NUM_NODES: usize = 4;

fn main() {
    let target = env::var("TARGET").expect("TARGET not set");

    // Every per-core array in the loader is sized by this value, so it has to
    // be a compile-time constant rather than something read from the DTB.
    let max_nodes = env::var("MAX_NUM_NODES")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(DEFAULT_MAX_NUM_NODES);
    println!("cargo:rustc-env=ELFLOADER_MAX_NUM_NODES={}", max_nodes);
    println!("cargo:rerun-if-env-changed=MAX_NUM_NODES");

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let loader_dir = PathBuf::from(manifest_dir);

    // Only the bare-metal image gets the custom layout; hosted builds (unit
    // tests, integration tests) link normally.
    if target.starts_with("aarch64") && target.contains("-none") {
        let linker_script = loader_dir.join("src/arch/aarch64/link.ld");
        println!("cargo:rustc-link-arg-bins=-T{}", linker_script.display());
    }

    println!("cargo:rerun-if-changed=src/arch/aarch64/link.ld");
}
