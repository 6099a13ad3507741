// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MechDigest {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    Pkcs1v15,
    Pss,
}

/// Token-side signature mechanism. Hashing and padding both happen on the token, so the
/// caller passes the raw message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mechanism {
    RsaPkcs(MechDigest),
}

/// (digest, padding) pairs the signer accepts, and the mechanism each one runs as.
/// PSS is not listed until its parameter handling has been checked against real tokens.
const SUPPORTED: [(MechDigest, Padding, Mechanism, &str); 5] = [
    (
        MechDigest::Sha1,
        Padding::Pkcs1v15,
        Mechanism::RsaPkcs(MechDigest::Sha1),
        "sha1-rsa-pkcs",
    ),
    (
        MechDigest::Sha224,
        Padding::Pkcs1v15,
        Mechanism::RsaPkcs(MechDigest::Sha224),
        "sha224-rsa-pkcs",
    ),
    (
        MechDigest::Sha256,
        Padding::Pkcs1v15,
        Mechanism::RsaPkcs(MechDigest::Sha256),
        "sha256-rsa-pkcs",
    ),
    (
        MechDigest::Sha384,
        Padding::Pkcs1v15,
        Mechanism::RsaPkcs(MechDigest::Sha384),
        "sha384-rsa-pkcs",
    ),
    (
        MechDigest::Sha512,
        Padding::Pkcs1v15,
        Mechanism::RsaPkcs(MechDigest::Sha512),
        "sha512-rsa-pkcs",
    ),
];

impl Mechanism {
    /// Map a caller's digest and padding choice onto a token mechanism.
    pub fn negotiate(digest: MechDigest, padding: Padding) -> Result<Self> {
        SUPPORTED
            .iter()
            .find(|(d, p, _, _)| *d == digest && *p == padding)
            .map(|(_, _, mech, _)| *mech)
            .ok_or(Error::MechanismUnsupported { digest, padding })
    }

    pub fn digest(&self) -> MechDigest {
        match self {
            Self::RsaPkcs(digest) => *digest,
        }
    }

    pub fn padding(&self) -> Padding {
        match self {
            Self::RsaPkcs(_) => Padding::Pkcs1v15,
        }
    }

    pub fn name(&self) -> &'static str {
        SUPPORTED
            .iter()
            .find(|(_, _, mech, _)| mech == self)
            .map(|(_, _, _, name)| *name)
            // Every Mechanism value is listed in SUPPORTED.
            .unwrap_or("unknown")
    }
}

impl Default for Mechanism {
    fn default() -> Self {
        Self::RsaPkcs(MechDigest::Sha256)
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(src: &str) -> Result<Self> {
        let wanted = src.trim().to_ascii_lowercase();
        SUPPORTED
            .iter()
            .find(|(_, _, _, name)| *name == wanted)
            .map(|(_, _, mech, _)| *mech)
            .ok_or_else(|| Error::MechanismUnknown(src.to_string()))
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
