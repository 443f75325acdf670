use anyhow::Result;
use log::{LevelFilter, Log};
use multi_log::MultiLogger;
use syslog::{BasicLogger, Facility, Formatter3164};

/// Console logging, plus the local syslog daemon when `use_syslog` is set.
/// `RUST_LOG` still overrides the console level.
pub fn init_logging(use_syslog: bool) -> Result<()> {
    let console_logger = env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .build();

    let mut loggers: Vec<Box<dyn Log>> = vec![Box::new(console_logger)];

    if use_syslog {
        let formatter = Formatter3164 {
            facility: Facility::LOG_DAEMON,
            hostname: None,
            process: "eportem-server".into(),
            pid: std::process::id(),
        };

        match syslog::unix(formatter) {
            Ok(logger) => loggers.push(Box::new(BasicLogger::new(logger))),
            Err(e) => eprintln!("Syslog unavailable, logging to console only: {e}"),
        }
    }

    MultiLogger::init(loggers, log::Level::Debug)?;
    Ok(())
}
