use std::path::{Path, PathBuf};

use clap::ValueEnum;
use jv80_emulator::RunMode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Could not parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Continuous,
    /// Stop after every instruction.
    Instruction,
    /// Stop after every clock cycle.
    Clock,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Continuous => RunMode::Continuous,
            Mode::Instruction => RunMode::BreakAtInstruction,
            Mode::Clock => RunMode::BreakAtClock,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BankConfig {
    pub start: u16,
    pub size: usize,
    #[serde(default)]
    pub writable: bool,
    /// Raw image copied to the start of the bank.
    pub image: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub speed_khz: f64,
    pub run_mode: Mode,
    pub start_address: Option<u16>,
    pub max_cycles: Option<u64>,
    /// Typed into the keyboard channel, one byte per read.
    pub keyboard: Option<String>,
    /// The memory map. Empty means ROM at 0x0000 and RAM at 0xC000.
    #[serde(rename = "bank")]
    pub banks: Vec<BankConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed_khz: 1000.0,
            run_mode: Mode::Continuous,
            start_address: None,
            max_cycles: None,
            keyboard: None,
            banks: vec![],
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jv80").join("config.toml"))
    }

    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        Self::parse(&source).map_err(|err| ConfigError::Parse(path.to_path_buf(), err))
    }

    /// Loads `path` if given, otherwise the default config file if there is one.
    pub fn find(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::info!("Using config file {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
