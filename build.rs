fn main() {
    // Only the firmware build links against ESP-IDF; host test builds skip it.
    if std::env::var("CARGO_FEATURE_ESP").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
