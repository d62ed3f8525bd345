use std::env;

fn main() {
    let version = env::var("THIEF_FINDER_VERSION")
        .unwrap_or_else(|_| env::var("CARGO_PKG_VERSION").unwrap());
    println!("cargo:rustc-env=THIEF_FINDER_VERSION={version}");
}
