mod settings;

use config::{Config, Environment, File};

use crate::utils::Result;
use settings::PartialSettings;

pub use settings::{BrokerSettings, HeartbeatSettings, LogSettings, ServerSettings, Settings};

/// Prefix of the environment variables read by `load_config`, e.g.
/// `TOPICHUB_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "TOPICHUB";

/// Loads the configuration from `config/default` (any format the `config`
/// crate understands, optional) and the environment.
pub fn load_config() -> Result<Settings> {
    load_config_from("config/default")
}

/// Loads the configuration from the given file stem and the environment,
/// merges it over the defaults and validates the result.
pub fn load_config_from(file: &str) -> Result<Settings> {
    let config = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    let settings = Settings::merge(partial);
    settings.validate()?;
    Ok(settings)
}
