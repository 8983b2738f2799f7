use std::io::Write;

/// Initialises `env_logger` with an `info` default, overridable by `RUST_LOG`.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "{:>5}: {}", record.level(), record.args()))
        .try_init();
}
