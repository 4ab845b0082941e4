//! Layered settings loading
//!
//! Priority (lowest to highest): struct defaults, YAML file, environment.
//! Nested keys in the environment are separated with a double underscore,
//! e.g. `SLAVESIM_LOGGING__LEVEL=debug`.

use std::path::Path;

use errors::SimResult;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Build the figment for `T` without extracting it
fn figment_for<T>(path: Option<&Path>, env_prefix: &str) -> Figment
where
    T: Serialize + Default,
{
    let mut figment = Figment::new().merge(Serialized::defaults(T::default()));

    if let Some(path) = path {
        if path.exists() {
            debug!("Settings file: {}", path.display());
            figment = figment.merge(Yaml::file(path));
        } else {
            warn!("Settings file {} not found, using defaults", path.display());
        }
    }

    figment.merge(Env::prefixed(env_prefix).split("__"))
}

/// Load settings of type `T`
///
/// A missing file is not an error; defaults and environment still apply.
pub fn load_settings<T>(path: Option<&Path>, env_prefix: &str) -> SimResult<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    Ok(figment_for::<T>(path, env_prefix).extract()?)
}
