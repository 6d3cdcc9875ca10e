mod converse;
mod error;
mod handoff;
mod loader;

use std::path::Path;

use serde::Deserialize;

pub use converse::{ConverseConfig, ServiceTier};
pub use error::Error;
pub use handoff::{GuidanceRole, HandoffConfig};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub converse: ConverseConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Config> {
        loader::load(path)
    }
}
