//! `isapi config`: inspect configuration without touching a device.

use isapi_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&isapi_config::config_path().display().to_string());
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = redact(isapi_config::load_config()?);
            let rendered =
                toml::to_string_pretty(&cfg).map_err(|e| CliError::Serialize(e.to_string()))?;
            output::print_output(rendered.trim_end());
            Ok(())
        }
    }
}

fn redact(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}
