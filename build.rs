fn main() {
    // The ESP-IDF sysenv is only needed when cross-compiling for the Xtensa target.
    // Host builds (tests, host-provision) skip it entirely.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
