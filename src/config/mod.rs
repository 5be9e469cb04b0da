mod bridge_config;

use std::sync::OnceLock;

use figment::Figment;
use figment::providers::{Env, Format, Toml};

pub use bridge_config::*;
#[cfg(test)]
pub(crate) use bridge_config::test_config;

pub static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

pub fn init() {
    let raw_config = Figment::new()
        .merge(Toml::file(
            Env::var("BRIDGE_CONFIG").as_deref().unwrap_or("bridge.toml"),
        ))
        .merge(Env::prefixed("BRIDGE_").global());

    let conf = match raw_config.extract::<BridgeConfig>() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("It looks like your config is invalid. The following error occurred: {e}");
            std::process::exit(1);
        }
    };

    CONFIG.set(conf).expect("config should be set");
}

pub fn get() -> &'static BridgeConfig {
    CONFIG.get().unwrap()
}
