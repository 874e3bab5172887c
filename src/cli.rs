use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
    Nodelay,
}

impl TextSpeed {
    /// Delay applied after each alphanumeric character.
    pub fn char_delay_ms(self) -> u64 {
        match self {
            TextSpeed::Slow => 30,
            TextSpeed::Normal => 20,
            TextSpeed::Fast => 10,
            TextSpeed::Nodelay => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextSpeed::Slow => "slow",
            TextSpeed::Normal => "normal",
            TextSpeed::Fast => "fast",
            TextSpeed::Nodelay => "nodelay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathDisplay {
    Full,
    #[default]
    Leaf,
}

const CLI_EXAMPLES: &str = "Examples:\n\
  devsh\n\
  DEVSH_HOME=/tmp/devsh devsh --service-timeout-secs 5\n\
  RUST_LOG=debug devsh --telemetry\n\
\n\
Inside the shell:\n\
  - Lines starting with '.' go through the command tree (.help, .ai apikey set <key>).\n\
  - Other lines go to chat when chat is the default entry, otherwise to the host shell.\n\
  - exit, clear and help are always recognized.";

#[derive(Debug, Parser)]
#[command(name = "devsh")]
#[command(about = "Interactive developer shell with terminal passthrough and chat")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "DEVSH_HOME")]
    pub data_dir: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_filter: String,

    #[arg(long, env = "DEVSH_SERVICE_TIMEOUT_SECS", default_value_t = 10)]
    pub service_timeout_secs: u64,

    #[arg(long, env = "DEVSH_CHAT_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub chat_base_url: String,

    #[arg(long, env = "DEVSH_CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    pub chat_model: String,

    #[arg(long, env = "DEVSH_WEATHER_BASE_URL", default_value = "https://api.tomorrow.io/v4")]
    pub weather_base_url: String,

    #[arg(long, env = "DEVSH_TELEMETRY", default_value_t = false)]
    pub telemetry: bool,
}
