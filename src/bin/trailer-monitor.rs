use clap::Parser;
use log::{error, info};
use trailer_monitor::{init_logging, run, Args};
use trailer_monitor::error::{AppRunError, ConfigError};

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();
    init_logging(args.log_level())?;
    info!(concat!("Trailer Monitor ", env!("CARGO_PKG_VERSION")));

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            error!("The monitor has already been started");
            Ok(())
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
