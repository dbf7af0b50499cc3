use log::LevelFilter;

use super::config::CONFIG;

/// verbosity of `log_level`, 0 being the most verbose
fn level(log_level: usize) -> LevelFilter {
    match log_level {
        #[cfg(debug_assertions)]
        0 => LevelFilter::Trace,
        #[cfg(not(debug_assertions))]
        0 => LevelFilter::Debug,
        1 => LevelFilter::Debug,
        2 => LevelFilter::Info,
        3 => LevelFilter::Warn,
        4 => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

// setup logger and panic handler
pub fn init() {
    let log_level = CONFIG.get().map(|x| x.log_level).unwrap_or_default();

    // RUST_LOG still wins for other modules
    env_logger::Builder::new()
        .filter_module("judger", level(log_level))
        .parse_default_env()
        .try_init()
        .ok();

    // make panic propagate across tasks
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        log::error!(
            "Panic at {}",
            info.location().map(|x| x.to_string()).unwrap_or_default()
        );
        std::process::exit(1);
    }));
}
