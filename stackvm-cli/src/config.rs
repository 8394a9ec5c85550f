//! Optional YAML configuration file.
//!
//! ```yaml
//! stack_size: 4096
//! data_size: 64
//! trace: false
//! ```
use serde::Deserialize;
use stackvm::{constants::DATA_SIZE, prelude::*};
use std::{error::Error, fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConf {
    #[serde(flatten)]
    pub vm: VmConf,
    /// Number of data segment words given to demo programs.
    pub data_size: usize,
}

impl Default for CliConf {
    fn default() -> Self {
        Self {
            vm: VmConf::default(),
            data_size: DATA_SIZE,
        }
    }
}

impl CliConf {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let file = fs::File::open(path.as_ref())?;
        let conf: CliConf = serde_yaml::from_reader(file)?;
        Ok(conf)
    }
}
