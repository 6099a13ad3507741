// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::ops::{Deref, DerefMut};

use tokcrypt_common::config::SignerConfig;

use super::driver::{Access, Driver, DriverSession, ObjectClass, Pin};
use super::mech::{MechDigest, Mechanism, Padding};
use super::slot::{self, SlotId, TokenSpec};
use crate::{Error, Result};

/// Handle of a private key object, as issued by the driver `D`.
pub type KeyHandle<D> = <<D as Driver>::Session as DriverSession>::Key;

/// Token session construction options.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    /// Explicit slot. When set, `token` is ignored and no resolution takes place.
    pub slot: Option<SlotId>,
    /// Attributes identifying the token when no explicit slot is given.
    pub token: TokenSpec,
    /// Ordinal of the private key to use, counted in the order the token lists its private
    /// key objects. That order is the driver's, not ours.
    pub key: usize,
    /// PIN used by `open` when none is passed in.
    pub pin: Option<Pin>,
    pub mechanism: Mechanism,
}

impl SessionOptions {
    pub fn from_config(config: &SignerConfig) -> Result<Self> {
        Ok(Self {
            slot: config.slot.map(SlotId::new),
            token: config.token.clone().map(TokenSpec::from).unwrap_or_default(),
            key: config.key,
            pin: config.pin.as_deref().map(Pin::from),
            mechanism: config.mechanism.parse()?,
        })
    }
}

struct OpenState<S: DriverSession> {
    handle: S,
    private_key: Option<S::Key>,
}

/// A token slot and, while open, the authenticated driver session on it.
///
/// The session is either closed or open and logged in; there is no logged-out open state.
/// `open` and `close` must alternate, and every key or sign operation needs an open
/// session. The private key handle is looked up once per open session and forgotten on
/// close.
pub struct TokenSession<D: Driver> {
    driver: D,
    slot: SlotId,
    key_index: usize,
    pin: Option<Pin>,
    mechanism: Mechanism,
    open: Option<OpenState<D::Session>>,
}

impl<D: Driver> TokenSession<D> {
    pub fn new(driver: D, options: SessionOptions) -> Result<Self> {
        let slot = match options.slot {
            Some(slot) => slot,
            None => slot::resolve(&driver, &options.token)?,
        };
        debug!(
            "token session bound to slot {} (key #{}, {})",
            slot, options.key, options.mechanism
        );
        Ok(Self {
            driver,
            slot,
            key_index: options.key,
            pin: options.pin,
            mechanism: options.mechanism,
            open: None,
        })
    }

    pub fn from_config(driver: D, config: &SignerConfig) -> Result<Self> {
        Self::new(driver, SessionOptions::from_config(config)?)
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open a read-write session on the slot and log in, with `pin` if given or the
    /// configured PIN otherwise. A session whose login fails is released again.
    pub fn open(&mut self, pin: Option<&str>) -> Result<()> {
        if self.open.is_some() {
            return Err(Error::SessionAlreadyOpen);
        }
        let pin = match pin {
            Some(pin) => Pin::new(pin),
            None => self.pin.clone().ok_or(Error::PinRequired)?,
        };

        trace!("opening session on slot {}", self.slot);
        let mut handle = self.driver.open_session(self.slot, Access::READ_WRITE)?;
        if let Err(e) = handle.login(&pin) {
            if let Err(close_err) = handle.close() {
                warn!(
                    "failed to release session on slot {} after login error: {}",
                    self.slot, close_err
                );
            }
            return Err(e);
        }

        self.open = Some(OpenState {
            handle,
            private_key: None,
        });
        debug!("session on slot {} open", self.slot);
        Ok(())
    }

    /// Log out and release the session. The session counts as closed afterwards even if
    /// the driver reports an error, which is then returned (logout errors first).
    pub fn close(&mut self) -> Result<()> {
        let OpenState { mut handle, .. } = self.open.take().ok_or(Error::SessionNotOpen)?;
        trace!("closing session on slot {}", self.slot);

        let logout = handle.logout();
        let close = handle.close();
        debug!("session on slot {} closed", self.slot);

        match (logout, close) {
            (Ok(()), close) => close,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!("session close on slot {} failed: {}", self.slot, close_err);
                Err(e)
            }
        }
    }

    /// The configured private key. Looked up on first use after `open`, then cached until
    /// `close`.
    pub fn private_key(&mut self) -> Result<KeyHandle<D>> {
        let index = self.key_index;
        let state = self.open.as_mut().ok_or(Error::SessionNotOpen)?;
        if let Some(key) = state.private_key {
            return Ok(key);
        }

        trace!("looking up private key #{} on slot {}", index, self.slot);
        let keys = state.handle.find_objects(ObjectClass::PrivateKey)?;
        let key = *keys.get(index).ok_or(Error::KeyNotFound {
            index,
            available: keys.len(),
        })?;
        state.private_key = Some(key);
        Ok(key)
    }

    /// Sign `data` with the configured mechanism. The signature is returned exactly as the
    /// token produced it.
    pub fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mech = self.mechanism;
        self.sign_mech(data, mech)
    }

    /// Sign `data` with the mechanism matching `digest` and `padding`. Unsupported pairs
    /// fail before the token is touched.
    pub fn sign_with(
        &mut self,
        data: &[u8],
        digest: MechDigest,
        padding: Padding,
    ) -> Result<Vec<u8>> {
        if self.open.is_none() {
            return Err(Error::SessionNotOpen);
        }
        let mech = Mechanism::negotiate(digest, padding)?;
        self.sign_mech(data, mech)
    }

    fn sign_mech(&mut self, data: &[u8], mech: Mechanism) -> Result<Vec<u8>> {
        let key = self.private_key()?;
        let state = self.open.as_ref().ok_or(Error::SessionNotOpen)?;
        trace!(
            "signing {} bytes on slot {} with {}",
            data.len(),
            self.slot,
            mech
        );
        state.handle.sign(key, data, mech)
    }

    /// Run `body` inside an open session, using the configured PIN. The session is closed
    /// whatever the outcome; an error from `body` takes precedence over a close error.
    pub fn with_session<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.open(None)?;
        let result = body(self);
        let closed = self.close();
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(
                    "session close on slot {} failed after error: {}",
                    self.slot, close_err
                );
                Err(e)
            }
        }
    }

    /// Open the session with the configured PIN and return a guard that closes it when
    /// dropped. Use `SessionGuard::exit` to observe close errors.
    pub fn enter(&mut self) -> Result<SessionGuard<'_, D>> {
        self.open(None)?;
        Ok(SessionGuard { session: self })
    }
}

impl<D: Driver> Drop for TokenSession<D> {
    fn drop(&mut self) {
        if self.open.is_some() {
            warn!("token session on slot {} dropped while open", self.slot);
            if let Err(e) = self.close() {
                error!("failed to close session on slot {}: {}", self.slot, e);
            }
        }
    }
}

/// An open token session, closed when the guard goes out of scope.
pub struct SessionGuard<'a, D: Driver> {
    session: &'a mut TokenSession<D>,
}

impl<'a, D: Driver> SessionGuard<'a, D> {
    pub fn exit(self) -> Result<()> {
        self.session.close()
    }
}

impl<'a, D: Driver> Deref for SessionGuard<'a, D> {
    type Target = TokenSession<D>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<'a, D: Driver> DerefMut for SessionGuard<'a, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<'a, D: Driver> Drop for SessionGuard<'a, D> {
    fn drop(&mut self) {
        if self.session.is_open() {
            if let Err(e) = self.session.close() {
                error!("failed to close session on slot {}: {}", self.session.slot, e);
            }
        }
    }
}
