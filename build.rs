fn main() {
    if !std::path::Path::new("cfg.toml").exists() {
        println!("cargo:warning=cfg.toml not found, building with default settings (see cfg.toml.example)");
    }
    println!("cargo:rerun-if-changed=cfg.toml");

    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
