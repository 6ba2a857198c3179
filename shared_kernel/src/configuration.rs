use anyhow::Context;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Loads the calling service's settings from its `configuration/` directory,
/// overlaid with `APP_`-prefixed environment variables so deployments can
/// tune thresholds and poll intervals without editing files
/// (e.g. `APP_RECOGNIZER_LANGUAGES=ukr`). Tests read `test.yaml` instead of
/// `base.yaml` so they never point at real operator endpoints.
pub fn config<Settings: DeserializeOwned>() -> anyhow::Result<Settings> {
    let file = if cfg!(test) { "test.yaml" } else { "base.yaml" };
    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory()?.join(file)))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Failed to build configuration")?;

    settings
        .try_deserialize::<Settings>()
        .context("Failed to deserialize settings")
}

fn configuration_directory() -> anyhow::Result<PathBuf> {
    let base_path = std::env::current_dir().context("Failed to determine the current directory")?;
    Ok(base_path.join("configuration"))
}
