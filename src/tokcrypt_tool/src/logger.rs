// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::io::Write;
use std::time::{Duration, Instant};

use tokcrypt_common::config;
use tokcrypt_common::defs;

/// stderr logger for the `tokcrypt` binary.
///
/// Records from the tokcrypt crates are filtered at `level`. Everything else reaching the
/// logger comes from the PKCS#11 bindings and is filtered at `driver_level`, so that a
/// debug run of the signer is not flooded by the bindings' own diagnostics.
pub struct Logger {
    timebase: Option<Instant>,
    level: log::Level,
    driver_level: log::Level,
}

impl Logger {
    pub fn new(log_config: Option<config::Log>) -> Self {
        let mut logger = Self {
            timebase: None,
            level: defs::DEFAULT_LOG_LEVEL,
            driver_level: defs::DEFAULT_DRIVER_LOG_LEVEL,
        };
        if let Some(log) = log_config {
            logger.level = log.level.into();
            if let Some(driver_level) = log.driver_level {
                logger.driver_level = driver_level.into();
            }
            if log.enable_timestamp.unwrap_or(defs::DEFAULT_LOG_TIMESTAMP) {
                logger.timebase = Some(Instant::now());
            }
        }
        logger
    }

    /// Install as the global logger. Only the first call has any effect.
    pub fn install(self) {
        let max = std::cmp::max(self.level, self.driver_level);
        log::set_boxed_logger(Box::new(self))
            .map(|()| log::set_max_level(max.to_level_filter()))
            .unwrap_or_else(|e| eprintln!("Warning: failed to initialize logger: {:?}", e));
    }

    fn level_for(&self, target: &str) -> log::Level {
        if target.starts_with(defs::LOG_TARGET_PREFIX) {
            self.level
        } else {
            self.driver_level
        }
    }
}

/// Elapsed time as `+<seconds>.<millis>s`.
fn fmt_elapsed(elapsed: Duration) -> String {
    format!("+{}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis())
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level_for(metadata.target())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        if let Some(timebase) = self.timebase {
            write!(out, "[{}] ", fmt_elapsed(timebase.elapsed())).unwrap_or_default();
        }
        writeln!(
            out,
            "tokcrypt {:5} {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
        .unwrap_or_default();
    }

    fn flush(&self) {
        std::io::stderr().flush().unwrap_or_default();
    }
}
