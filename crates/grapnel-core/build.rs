//! Build script for grapnel-core
//!
//! This script checks system requirements before compilation:
//! - Minimum Rust version (Edition 2021 = Rust 1.56.0+)
//! - Target platform support
//!
//! ## Requirements
//!
//! - **Rust**: Edition 2021 (Rust 1.56.0 or newer)
//! - **Linux on x86-64**: the core is written against the Linux `ptrace`
//!   interface and the x86-64 `user` register-dump layout; no other
//!   platform is supported.

fn main()
{
    // Check minimum Rust version
    // Edition 2021 requires Rust 1.56.0
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::parse("1.56.0").unwrap();

        if rustc_version < min_rust_version {
            panic!(
                "grapnel-core requires Rust {} or newer (Edition 2021), found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    // Platform check: the register catalog is generated from the x86-64
    // Linux `user` structure, so cross-building for anything else can only
    // produce a broken library.
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if target_os != "linux" || target_arch != "x86_64" {
        panic!(
            "grapnel-core supports only Linux on x86-64, found {}/{}",
            target_os, target_arch
        );
    }
}
