// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use tokcrypt_p11::{
    Access, Driver, DriverSession, Error, Mechanism, ObjectClass, Pin, Result, SlotDirectory,
    SlotId, TokenInfo, TokenSpec,
};

/// Every driver round-trip, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Slots,
    TokenInfo(SlotId),
    OpenSession(SlotId, Access),
    Login(String),
    Logout,
    Close,
    FindObjects(ObjectClass),
    Sign(u32, Vec<u8>, Mechanism),
}

#[derive(Default)]
struct State {
    tokens: Vec<TokenInfo>,
    keys: Vec<u32>,
    pin: Option<String>,
    fail_logout: bool,
    fail_close: bool,
    live_sessions: usize,
    calls: Vec<Call>,
}

/// In-memory driver. Slot ids are the positions of the configured tokens.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Rc<RefCell<State>>,
}

impl MockDriver {
    pub fn with_tokens(tokens: Vec<TokenInfo>) -> Self {
        let driver = Self::default();
        driver.state.borrow_mut().tokens = tokens;
        driver
    }

    /// A single token holding private keys `keys` and accepting only `pin`.
    pub fn single(keys: Vec<u32>, pin: &str) -> Self {
        Self::with_tokens(vec![token(&[("serialnr", "1"), ("manufacturer", "acme")])])
            .keys(keys)
            .pin(pin)
    }

    pub fn keys(self, keys: Vec<u32>) -> Self {
        self.state.borrow_mut().keys = keys;
        self
    }

    pub fn pin(self, pin: &str) -> Self {
        self.state.borrow_mut().pin = Some(pin.to_string());
        self
    }

    pub fn failing_logout(self) -> Self {
        self.state.borrow_mut().fail_logout = true;
        self
    }

    pub fn failing_close(self) -> Self {
        self.state.borrow_mut().fail_close = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn count<F: Fn(&Call) -> bool>(&self, pred: F) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn live_sessions(&self) -> usize {
        self.state.borrow().live_sessions
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl SlotDirectory for MockDriver {
    fn slots(&self) -> Result<Vec<SlotId>> {
        self.record(Call::Slots);
        let count = self.state.borrow().tokens.len() as u64;
        Ok((0..count).map(SlotId::new).collect())
    }

    fn token_info(&self, slot: SlotId) -> Result<TokenInfo> {
        self.record(Call::TokenInfo(slot));
        self.state
            .borrow()
            .tokens
            .get(slot.id() as usize)
            .cloned()
            .ok_or(Error::SlotNotFound(slot))
    }
}

impl Driver for MockDriver {
    type Session = MockSession;

    fn open_session(&self, slot: SlotId, access: Access) -> Result<MockSession> {
        self.record(Call::OpenSession(slot, access));
        self.state.borrow_mut().live_sessions += 1;
        Ok(MockSession {
            driver: self.clone(),
            logged_in: false,
        })
    }
}

pub struct MockSession {
    driver: MockDriver,
    logged_in: bool,
}

impl DriverSession for MockSession {
    type Key = u32;

    fn login(&mut self, pin: &Pin) -> Result<()> {
        self.driver.record(Call::Login(pin.expose().to_string()));
        let expected = self.driver.state.borrow().pin.clone();
        match expected {
            Some(ref expected) if expected != pin.expose() => {
                Err(Error::Device("CKR_PIN_INCORRECT".to_string()))
            }
            _ => {
                self.logged_in = true;
                Ok(())
            }
        }
    }

    fn logout(&mut self) -> Result<()> {
        self.driver.record(Call::Logout);
        self.logged_in = false;
        if self.driver.state.borrow().fail_logout {
            return Err(Error::Device("CKR_DEVICE_ERROR".to_string()));
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.driver.record(Call::Close);
        let mut state = self.driver.state.borrow_mut();
        state.live_sessions -= 1;
        if state.fail_close {
            return Err(Error::Device("CKR_SESSION_CLOSED".to_string()));
        }
        Ok(())
    }

    fn find_objects(&self, class: ObjectClass) -> Result<Vec<u32>> {
        self.driver.record(Call::FindObjects(class));
        if !self.logged_in {
            return Err(Error::Device("CKR_USER_NOT_LOGGED_IN".to_string()));
        }
        Ok(match class {
            ObjectClass::PrivateKey => self.driver.state.borrow().keys.clone(),
        })
    }

    fn sign(&self, key: u32, data: &[u8], mech: Mechanism) -> Result<Vec<u8>> {
        self.driver.record(Call::Sign(key, data.to_vec(), mech));
        let mut sig = key.to_be_bytes().to_vec();
        sig.extend(data.iter().rev());
        Ok(sig)
    }
}

pub fn token(pairs: &[(&str, &str)]) -> TokenInfo {
    pairs.iter().map(|&(k, v)| (k, v)).collect()
}

pub fn spec(pairs: &[(&str, &str)]) -> TokenSpec {
    pairs.iter().map(|&(k, v)| (k, v)).collect()
}
