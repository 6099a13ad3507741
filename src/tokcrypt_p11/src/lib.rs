// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Signing keys that live on a hardware token.
//!
//! A [`TokenSession`] binds to exactly one token slot, either given explicitly or resolved
//! from a set of token attributes, and drives the PKCS#11 session protocol against it:
//! open and log in, locate the private key, sign, log out and close. The driver underneath
//! is injected through the [`Driver`] trait; [`Pkcs11Device`] is the implementation backed
//! by a PKCS#11 module loaded at runtime.

#[macro_use]
extern crate log;

pub mod backend;

use thiserror::Error;

pub use backend::device::{Pkcs11Device, Pkcs11Session};
pub use backend::driver::{Access, Driver, DriverSession, ObjectClass, Pin, SlotDirectory};
pub use backend::mech::{MechDigest, Mechanism, Padding};
pub use backend::session::{KeyHandle, SessionGuard, SessionOptions, TokenSession};
pub use backend::slot::{resolve, SlotId, TokenInfo, TokenSpec};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no slot matches token spec {0}")]
    NoMatchingSlot(TokenSpec),
    #[error("token spec matches more than one slot: {0:?}")]
    AmbiguousMatch(Vec<SlotId>),
    #[error("session already open")]
    SessionAlreadyOpen,
    #[error("session not open")]
    SessionNotOpen,
    #[error("private key #{index} not found ({available} private keys on token)")]
    KeyNotFound { index: usize, available: usize },
    #[error("no PIN given and none configured")]
    PinRequired,
    #[error("unsupported signature mechanism: {digest:?} with {padding:?} padding")]
    MechanismUnsupported { digest: MechDigest, padding: Padding },
    #[error("unknown signature mechanism: {0}")]
    MechanismUnknown(String),
    #[error("slot {0} not present")]
    SlotNotFound(SlotId),
    #[error("PKCS#11 error: {0}")]
    Pkcs11(#[from] cryptoki::error::Error),
    #[error("device error: {0}")]
    Device(String),
    #[error("config error: {0}")]
    Config(#[from] tokcrypt_common::config::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The one capability a token-backed key offers: producing a signature with its configured
/// mechanism. Public key export, decryption and signature contexts are not provided.
pub trait HardwareSigner {
    fn mechanism(&self) -> Mechanism;
    fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>>;
}

impl<D: Driver> HardwareSigner for TokenSession<D> {
    fn mechanism(&self) -> Mechanism {
        TokenSession::mechanism(self)
    }

    fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        TokenSession::sign(self, data)
    }
}
