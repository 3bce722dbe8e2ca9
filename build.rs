use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BUILD_VERSION");

    // CI passes the commit hash in; local builds leave it empty.
    let version = env::var("BUILD_VERSION").unwrap_or_default();
    println!("cargo:rustc-env=BUILD_VERSION={}", version.trim());
}
