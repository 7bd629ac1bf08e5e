//! Bakes the advertised device name into the firmware.
//!
//! `BEACON_NAME` is read from the environment or from a `.env` file next to
//! this crate. Without either, the core's default name is used.

const DEFAULT_NAME: &str = "Motion Beacon";

fn main() {
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed=BEACON_NAME");

    // A missing .env is fine
    dotenvy::dotenv().ok();

    let name = std::env::var("BEACON_NAME").unwrap_or_else(|_| DEFAULT_NAME.to_string());
    println!("cargo:rustc-env=BEACON_NAME={name}");

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
