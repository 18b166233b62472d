use log::LevelFilter;
use env_logger::Builder;
use std::io::Write;
use chrono::Local;

/// Info by default; `RUST_LOG` takes precedence when set.
pub fn init() {
    let _ = Builder::new()
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .try_init();

    log::debug!("Logger initialized.");
}
