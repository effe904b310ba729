//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the device store from `DEVICE_STORE_*` environment settings.
//! - Print the store version and device count for quick sanity checks.
//!
//! File logging is enabled when `DEVICE_STORE_LOG_DIR` is set.

use device_store::db::ThreadSleeper;
use device_store::{
    default_log_level, init_logging, open_store_with, store_version, DeviceService, LogFacade,
    SqliteDeviceRepository, StoreConfig,
};
use log::info;
use std::process::ExitCode;

const ENV_LOG_DIR: &str = "DEVICE_STORE_LOG_DIR";

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var(ENV_LOG_DIR) {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("device_store logging disabled: {err}");
        }
    }

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("device_store config error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let pool = match open_store_with(&config, &LogFacade, &ThreadSleeper) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("device_store open error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let service = DeviceService::new(SqliteDeviceRepository::new(pool));
    match service.list_devices(&[]) {
        Ok(devices) => {
            info!(
                "event=cli_probe module=cli status=ok devices={}",
                devices.len()
            );
            println!("device_store version={}", store_version());
            println!("device_store devices={}", devices.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("device_store list error: {err}");
            ExitCode::FAILURE
        }
    }
}
