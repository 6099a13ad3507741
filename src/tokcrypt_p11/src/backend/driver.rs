// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use super::slot::{SlotId, TokenInfo};
use super::Mechanism;
use crate::Result;

/// Session access requested from the driver when a token session is opened. PKCS#11
/// sessions are always serial, so only the read-write flag is negotiable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    pub read_write: bool,
}

impl Access {
    pub const READ_WRITE: Self = Self { read_write: true };
}

/// Object classes a session is asked to search for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectClass {
    PrivateKey,
}

/// User PIN. The backing buffer is wiped on drop and never shown by `Debug`.
#[derive(Clone)]
pub struct Pin(Zeroizing<String>);

impl Pin {
    pub fn new<S: Into<String>>(pin: S) -> Self {
        Self(Zeroizing::new(pin.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

impl From<&str> for Pin {
    fn from(src: &str) -> Self {
        Self::new(src)
    }
}

impl From<String> for Pin {
    fn from(src: String) -> Self {
        Self::new(src)
    }
}

/// Slot enumeration. One call to `slots` lists every slot; `token_info` reports the
/// attributes of the token present in one of them.
pub trait SlotDirectory {
    fn slots(&self) -> Result<Vec<SlotId>>;
    fn token_info(&self, slot: SlotId) -> Result<TokenInfo>;
}

/// A loaded and initialized token driver.
pub trait Driver: SlotDirectory {
    type Session: DriverSession;

    fn open_session(&self, slot: SlotId, access: Access) -> Result<Self::Session>;
}

/// One open driver session. Closing consumes the session.
pub trait DriverSession {
    type Key: Copy + Eq + fmt::Debug;

    fn login(&mut self, pin: &Pin) -> Result<()>;
    fn logout(&mut self) -> Result<()>;
    fn close(self) -> Result<()>;

    /// Objects of `class`, in the order the token reports them.
    fn find_objects(&self, class: ObjectClass) -> Result<Vec<Self::Key>>;
    fn sign(&self, key: Self::Key, data: &[u8], mech: Mechanism) -> Result<Vec<u8>>;
}

impl<T: SlotDirectory + ?Sized> SlotDirectory for Arc<T> {
    fn slots(&self) -> Result<Vec<SlotId>> {
        (**self).slots()
    }

    fn token_info(&self, slot: SlotId) -> Result<TokenInfo> {
        (**self).token_info(slot)
    }
}

impl<T: Driver + ?Sized> Driver for Arc<T> {
    type Session = T::Session;

    fn open_session(&self, slot: SlotId, access: Access) -> Result<Self::Session> {
        (**self).open_session(slot, access)
    }
}
