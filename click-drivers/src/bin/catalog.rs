//! List the supported Click boards.
//!
//! With no arguments every board is printed. Interface names (`i2c`, `spi`,
//! `uart`, `gpio`, `pwm`, `adc`) restrict the list to boards using all of
//! them. `--config <board>` prints the board's default configuration as
//! JSON, ready to be edited and loaded with `config::from_json`.

use std::env;
use std::process::ExitCode;

use click_drivers::catalog::{self, Interface};
use click_drivers::tracing::{self, prelude::*};

fn main() -> ExitCode {
    tracing::init_stdout();
    let args: Vec<String> = env::args().skip(1).collect();

    if let [flag, name] = args.as_slice() {
        if flag == "--config" {
            let Some(desc) = catalog::find(name) else {
                error!("Unknown board: {}", name);
                return ExitCode::FAILURE;
            };
            return match desc.default_config.map(|render| render()) {
                Some(Ok(json)) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Some(Err(e)) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
                None => {
                    info!("{} has no configuration", desc.name);
                    ExitCode::SUCCESS
                }
            };
        }
    }

    let mut filter = Interface::empty();
    for arg in &args {
        match Interface::from_name(&arg.to_ascii_uppercase()) {
            Some(interface) => filter |= interface,
            None => {
                error!("Unknown interface: {}", arg);
                return ExitCode::FAILURE;
            }
        }
    }

    for desc in catalog::using(filter) {
        println!("{:<12} {:<12} {:<20} {:?}", desc.name, desc.chip, desc.module, desc.interfaces);
    }
    ExitCode::SUCCESS
}
