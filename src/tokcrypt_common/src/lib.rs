// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod config;

pub mod defs {
    /// Default location of the signer configuration file, used by the `tokcrypt` tool when no
    /// `--config` argument is given.
    pub const DEFAULT_CONFIG_PATH: &str = "/etc/tokcrypt/tokcrypt.yaml";
    /// PKCS#11 module loaded when the configuration does not name one.
    pub const DEFAULT_MODULE_PATH: &str = "/usr/lib/softhsm/libsofthsm2.so";
    /// Ordinal of the private key used when the configuration does not name one.
    pub const DEFAULT_KEY_INDEX: usize = 0;
    /// Signature mechanism used when the configuration does not name one.
    pub const DEFAULT_MECHANISM: &str = "sha256-rsa-pkcs";

    pub const DEFAULT_LOG_LEVEL: log::Level = log::Level::Info;
    pub const DEFAULT_LOG_TIMESTAMP: bool = false;
    /// Most verbose level let through from crates outside this workspace (the PKCS#11
    /// bindings) unless the config says otherwise.
    pub const DEFAULT_DRIVER_LOG_LEVEL: log::Level = log::Level::Warn;
    /// Log target prefix shared by the workspace crates.
    pub const LOG_TARGET_PREFIX: &str = "tokcrypt";

    /// Token attribute names, as reported for every slot by the PKCS#11 driver adapter and
    /// matched against the `token` section of the configuration.
    pub const ATTR_LABEL: &str = "label";
    pub const ATTR_MANUFACTURER: &str = "manufacturer";
    pub const ATTR_MODEL: &str = "model";
    pub const ATTR_SERIAL: &str = "serialnr";
    pub const ATTR_HARDWARE_VERSION: &str = "hardware_version";
    pub const ATTR_FIRMWARE_VERSION: &str = "firmware_version";
}
