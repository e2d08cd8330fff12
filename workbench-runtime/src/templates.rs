//! Embedded project scaffold written into every fresh workspace.
//!
//! Dependency pins follow the Stylus SDK 0.6.0 series with exact alloy
//! versions; the toolchain channel is pinned so `cargo stylus` output is
//! reproducible across sessions.

pub const CARGO_TOML: &str = r#"[package]
name = "stylus-project"
version = "0.1.0"
edition = "2021"

[dependencies]
stylus-sdk = "0.6.0"
alloy-primitives = "=0.7.6"
alloy-sol-types = "=0.7.6"
mini-alloc = "0.4.2"

[features]
export-abi = ["stylus-sdk/export-abi"]
debug = ["stylus-sdk/debug"]

[[bin]]
name = "stylus-project"
path = "src/main.rs"

[lib]
crate-type = ["lib", "cdylib"]

[profile.release]
codegen-units = 1
strip = true
lto = true
panic = "abort"
opt-level = "s"
"#;

pub const RUST_TOOLCHAIN_TOML: &str = r#"[toolchain]
channel = "1.81"
targets = ["wasm32-unknown-unknown"]
"#;

pub const MAIN_RS: &str = r#"#![cfg_attr(not(feature = "export-abi"), no_main)]

#[cfg(feature = "export-abi")]
fn main() {
    stylus_project::print_from_args();
}

#[cfg(not(feature = "export-abi"))]
#[no_mangle]
pub extern "C" fn main() {}
"#;

pub const GITIGNORE: &str = r#"target/
Cargo.lock
"#;
