// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defs;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("invalid YAML config: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("invalid JSON config: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Log {
    pub level: LogLevel,
    pub enable_timestamp: Option<bool>,
    /// Level for records emitted by the PKCS#11 bindings rather than by tokcrypt itself.
    pub driver_level: Option<LogLevel>,
}

/// Signer configuration, as stored on disk.
///
/// `slot` pins an explicit slot id and takes precedence over `token`, which is a set of
/// attribute/value pairs that must identify exactly one token. Token values are strings.
/// In YAML an unquoted scalar is taken verbatim (`serialnr: 0x1F` is the string `0x1F`);
/// in JSON they must be quoted.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignerConfig {
    #[serde(default = "SignerConfig::default_module")]
    pub module: String,
    pub slot: Option<u64>,
    #[serde(default)]
    pub token: Option<BTreeMap<String, String>>,
    #[serde(default = "SignerConfig::default_key")]
    pub key: usize,
    pub pin: Option<String>,
    #[serde(default = "SignerConfig::default_mechanism")]
    pub mechanism: String,
    pub log: Option<Log>,
}

impl SignerConfig {
    /// Load a config file. Files ending in `.yaml` or `.yml` are parsed as YAML, anything
    /// else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let is_yaml = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        let file = std::fs::OpenOptions::new().read(true).open(path)?;
        if is_yaml {
            Ok(serde_yaml::from_reader(file)?)
        } else {
            Ok(serde_json::from_reader(file)?)
        }
    }

    pub fn from_yaml_str(src: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(src)?)
    }

    pub fn from_json_str(src: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(src)?)
    }

    fn default_module() -> String {
        defs::DEFAULT_MODULE_PATH.to_string()
    }
    fn default_key() -> usize {
        defs::DEFAULT_KEY_INDEX
    }
    fn default_mechanism() -> String {
        defs::DEFAULT_MECHANISM.to_string()
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            module: Self::default_module(),
            slot: None,
            token: None,
            key: Self::default_key(),
            pin: None,
            mechanism: Self::default_mechanism(),
            log: None,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(src: LogLevel) -> Self {
        match src {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}
