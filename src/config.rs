use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Probe statement run against every acquired session.
pub const VERSION_PROBE: &str = "SELECT CURRENT_VERSION()";

/// Versioned path of the Cortex OpenAI-compatible gateway.
pub const CORTEX_API_PATH: &str = "/api/v2/cortex/v1";

/// Domain appended to a bare account identifier.
pub const SNOWFLAKE_DOMAIN: &str = "snowflakecomputing.com";

pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| {
        eprintln!("failed to load configuration, using defaults: {e}");
        Config::default()
    })
});

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub ambient: AmbientConfig,
    pub cortex: CortexConfig,
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    /// TOML file holding `[connections.snowflake]`.
    pub secrets_path: PathBuf,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8501".to_string(),
            loglevel: "info".to_string(),
            secrets_path: PathBuf::from(".streamlit/secrets.toml"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// OAuth token mounted by Snowpark Container Services.
    pub token_path: PathBuf,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("/snowflake/session/token"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CortexConfig {
    pub model_list: Vec<String>,
    pub example_prompt: String,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            model_list: vec![
                "claude-3-5-sonnet".to_string(),
                "mistral-large".to_string(),
                "llama3.1-8b".to_string(),
            ],
            example_prompt: "What is Python?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Server-side statement timeout sent with every SQL API call.
    pub statement_timeout_secs: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            statement_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Defaults, then `config.toml`, then `CORTEX_DEMOS_*` variables
    /// (`CORTEX_DEMOS_BASIC__LOGLEVEL=debug`).
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment().extract().map_err(Box::new)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("CORTEX_DEMOS_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_three_demo_models() {
        let cfg = Config::default();
        assert_eq!(
            cfg.cortex.model_list,
            ["claude-3-5-sonnet", "mistral-large", "llama3.1-8b"]
        );
        assert_eq!(cfg.cortex.example_prompt, "What is Python?");
        assert_eq!(cfg.ambient.token_path, PathBuf::from("/snowflake/session/token"));
    }

    #[test]
    fn toml_overrides_nested_sections() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [basic]
                loglevel = "debug"

                [cortex]
                model_list = ["mistral-large"]
                "#,
            )?;
            jail.set_env("CORTEX_DEMOS_BASIC__LISTEN_ADDR", "127.0.0.1:9000");

            let cfg: Config = Config::figment().extract()?;
            assert_eq!(cfg.basic.loglevel, "debug");
            assert_eq!(cfg.basic.listen_addr, "127.0.0.1:9000");
            assert_eq!(cfg.cortex.model_list, ["mistral-large"]);
            assert_eq!(cfg.cortex.example_prompt, "What is Python?");
            Ok(())
        });
    }
}
