// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
extern crate serde;
extern crate serde_json;
extern crate tokcrypt_p11;

mod logger;

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use serde::Serialize;
use tokcrypt_common::config::{self, SignerConfig};
use tokcrypt_common::defs;
use tokcrypt_p11::{Pkcs11Device, SlotDirectory, TokenSession};

const USAGE: &str = r#"tokcrypt: sign with a key held on a PKCS#11 token
    Usage:
        tokcrypt <command> [<options>]

    Options:
        --config <path>
            Signer configuration file (YAML if it ends in .yaml/.yml, JSON otherwise).
            Default: /etc/tokcrypt/tokcrypt.yaml

        --module <path>
            PKCS#11 module to load. Overrides the `module` config entry.

    Commands:

        slots [--module <path>] [--config <path>]
            List the slots holding a token, with their token attributes, as JSON.

        resolve [--config <path>]
            Print the id of the slot selected by the configuration.

        sign --in <path> --out <path> [--pin <pin>] [--config <path>]
            Sign the contents of --in with the configured private key and write the raw
            signature to --out. --pin overrides the configured PIN.

        help
            Show this usage message.
"#;

enum Error {
    ConfigError(config::Error),
    IoError(std::io::Error),
    SerdeError(serde_json::Error),
    TokenError(tokcrypt_p11::Error),
    UsageError(String),
}

impl From<Error> for i32 {
    fn from(_other: Error) -> i32 {
        1
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConfigError(e) => write!(f, "Error: {}", e),
            Self::IoError(e) => write!(f, "Error: {}", e),
            Self::SerdeError(e) => write!(f, "Error: output encoding failed: {}", e),
            Self::TokenError(e) => write!(f, "Error: {}", e),
            Self::UsageError(s) => write!(f, "Error: {}.\nUse --help for help.", s),
        }
    }
}

#[derive(Default)]
struct CliOptions {
    config: Option<String>,
    module: Option<String>,
    input: Option<String>,
    output: Option<String>,
    pin: Option<String>,
}

#[derive(Serialize)]
struct SlotReport {
    slot: u64,
    token: BTreeMap<String, String>,
}

fn parse_options<I: Iterator<Item = String>>(mut arg_iter: I) -> Result<CliOptions, Error> {
    let mut opts = CliOptions::default();

    while let Some(word) = arg_iter.next() {
        let target = match word.as_str() {
            "--config" => &mut opts.config,
            "--module" => &mut opts.module,
            "--in" => &mut opts.input,
            "--out" => &mut opts.output,
            "--pin" => &mut opts.pin,
            _ => return Err(Error::UsageError(format!("unexpected argument: {}", word))),
        };
        let value = arg_iter
            .next()
            .ok_or_else(|| Error::UsageError(format!("missing value for {}", word)))?;
        *target = Some(value);
    }

    Ok(opts)
}

/// Load the config named on the command line, or the default one. When `required` is
/// false, a missing default config yields the built-in defaults.
fn load_config(opts: &CliOptions, required: bool) -> Result<SignerConfig, Error> {
    let mut config = match opts.config.as_ref() {
        Some(path) => SignerConfig::from_file(path).map_err(Error::ConfigError)?,
        None if required || std::path::Path::new(defs::DEFAULT_CONFIG_PATH).exists() => {
            SignerConfig::from_file(defs::DEFAULT_CONFIG_PATH).map_err(Error::ConfigError)?
        }
        None => SignerConfig::default(),
    };
    if let Some(module) = opts.module.as_ref() {
        config.module = module.clone();
    }

    logger::Logger::new(config.log.take()).install();
    debug!("using PKCS#11 module {}", config.module);
    Ok(config)
}

fn cmd_slots(opts: CliOptions) -> Result<(), Error> {
    let config = load_config(&opts, false)?;
    let device = Pkcs11Device::load(&config.module).map_err(Error::TokenError)?;

    let mut report = Vec::new();
    for slot in device.slots().map_err(Error::TokenError)? {
        let info = device.token_info(slot).map_err(Error::TokenError)?;
        report.push(SlotReport {
            slot: slot.id(),
            token: info
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    serde_json::to_writer_pretty(std::io::stdout(), &report).map_err(Error::SerdeError)?;
    println!();
    Ok(())
}

fn cmd_resolve(opts: CliOptions) -> Result<(), Error> {
    let config = load_config(&opts, true)?;
    let device = Pkcs11Device::load(&config.module).map_err(Error::TokenError)?;
    let session = TokenSession::from_config(device, &config).map_err(Error::TokenError)?;
    println!("{}", session.slot());
    Ok(())
}

fn cmd_sign(opts: CliOptions) -> Result<(), Error> {
    let input = opts
        .input
        .clone()
        .ok_or_else(|| Error::UsageError("missing --in".to_string()))?;
    let output = opts
        .output
        .clone()
        .ok_or_else(|| Error::UsageError("missing --out".to_string()))?;

    let mut config = load_config(&opts, true)?;
    if let Some(pin) = opts.pin {
        config.pin = Some(pin);
    }
    let data = std::fs::read(&input).map_err(Error::IoError)?;

    let device = Pkcs11Device::load(&config.module).map_err(Error::TokenError)?;
    let mut session = TokenSession::from_config(device, &config).map_err(Error::TokenError)?;
    let signature = session
        .with_session(|s| s.sign(data.as_slice()))
        .map_err(Error::TokenError)?;

    std::fs::write(&output, signature.as_slice()).map_err(Error::IoError)?;
    info!(
        "signed {} ({} bytes) on slot {} with {}",
        input,
        data.len(),
        session.slot(),
        session.mechanism()
    );
    Ok(())
}

fn rusty_main() -> Result<(), Error> {
    let mut args = std::env::args();

    // Skip executable name.
    args.next();

    match args.next().as_ref().map(|s| s.as_str()) {
        Some("slots") => parse_options(args).and_then(cmd_slots),
        Some("resolve") => parse_options(args).and_then(cmd_resolve),
        Some("sign") => parse_options(args).and_then(cmd_sign),
        Some("help") | Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(cmd) => Err(Error::UsageError(format!("invalid command: {}", cmd))),
        None => Err(Error::UsageError("missing command".to_string())),
    }
}

fn main() {
    match rusty_main() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(i32::from(e))
        }
    }
}
