// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;
use std::fmt;
use std::iter::FromIterator;

use super::driver::SlotDirectory;
use crate::{Error, Result};

/// Driver-assigned slot identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u64);

impl SlotId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SlotId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token attributes as observed by the driver for one slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenInfo(BTreeMap<String, String>);

impl TokenInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TokenInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Expected token attributes. Keys absent from the spec match anything; an empty spec
/// matches every slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSpec(BTreeMap<String, String>);

impl TokenSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Every spec key must be present in `info` with exactly the same value.
    pub fn matches(&self, info: &TokenInfo) -> bool {
        self.iter().all(|(key, value)| info.get(key) == Some(value))
    }
}

impl From<BTreeMap<String, String>> for TokenSpec {
    fn from(src: BTreeMap<String, String>) -> Self {
        Self(src)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TokenSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for TokenSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (key, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        f.write_str("}")
    }
}

/// Pick the single slot whose token matches `spec`.
///
/// Token info is fetched for every enumerated slot, even once a match has been found, since
/// a second match can only be ruled out by looking at all of them. Several matches are an
/// error: signing with the wrong physical key is never acceptable.
pub fn resolve<D: SlotDirectory + ?Sized>(directory: &D, spec: &TokenSpec) -> Result<SlotId> {
    let mut found = Vec::new();
    for slot in directory.slots()? {
        let info = directory.token_info(slot)?;
        if spec.matches(&info) {
            found.push(slot);
        }
    }

    match found.as_slice() {
        [] => Err(Error::NoMatchingSlot(spec.clone())),
        [slot] => {
            debug!("token spec {} resolved to slot {}", spec, slot);
            Ok(*slot)
        }
        _ => Err(Error::AmbiguousMatch(found)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Population {
        tokens: Vec<TokenInfo>,
        fetched: RefCell<Vec<SlotId>>,
    }

    impl Population {
        fn new(tokens: Vec<TokenInfo>) -> Self {
            Self {
                tokens,
                fetched: RefCell::new(Vec::new()),
            }
        }
    }

    impl SlotDirectory for Population {
        fn slots(&self) -> Result<Vec<SlotId>> {
            Ok((0..self.tokens.len() as u64).map(SlotId::new).collect())
        }

        fn token_info(&self, slot: SlotId) -> Result<TokenInfo> {
            self.fetched.borrow_mut().push(slot);
            self.tokens
                .get(slot.id() as usize)
                .cloned()
                .ok_or(Error::SlotNotFound(slot))
        }
    }

    fn acme(serial: &str) -> TokenInfo {
        vec![("serialnr", serial), ("manufacturer", "acme")]
            .into_iter()
            .collect()
    }

    fn acme_spec(serial: &str) -> TokenSpec {
        TokenSpec::new()
            .with("serialnr", serial)
            .with("manufacturer", "acme")
    }

    #[test]
    fn test_resolves_second_slot_past_unrelated_token() {
        let population = Population::new(vec![
            vec![("xyzzy", "1")].into_iter().collect(),
            acme("123"),
        ]);
        let slot = resolve(&population, &acme_spec("123")).unwrap();
        assert_eq!(slot, SlotId::new(1));
    }

    #[test]
    fn test_resolves_first_slot_and_still_checks_the_rest() {
        let population = Population::new(vec![acme("456"), acme("123")]);
        let slot = resolve(&population, &acme_spec("456")).unwrap();
        assert_eq!(slot, SlotId::new(0));
        assert_eq!(
            *population.fetched.borrow(),
            vec![SlotId::new(0), SlotId::new(1)]
        );
    }

    #[test]
    fn test_identical_tokens_are_ambiguous() {
        let population = Population::new(vec![acme("456"), acme("456")]);
        match resolve(&population, &acme_spec("456")) {
            Err(Error::AmbiguousMatch(slots)) => {
                assert_eq!(slots, vec![SlotId::new(0), SlotId::new(1)])
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_ambiguity_reports_every_match() {
        let population = Population::new(vec![acme("1"), acme("2"), acme("3")]);
        let spec = TokenSpec::new().with("manufacturer", "acme");
        match resolve(&population, &spec) {
            Err(Error::AmbiguousMatch(slots)) => assert_eq!(slots.len(), 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(population.fetched.borrow().len(), 3);
    }

    #[test]
    fn test_no_match_carries_spec() {
        let population = Population::new(vec![acme("456")]);
        match resolve(&population, &acme_spec("12")) {
            Err(Error::NoMatchingSlot(spec)) => assert_eq!(spec, acme_spec("12")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_value_prefix_does_not_match() {
        let info = acme("123");
        assert!(!acme_spec("12").matches(&info));
        assert!(acme_spec("123").matches(&info));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let info: TokenInfo = vec![("manufacturer", "acme")].into_iter().collect();
        assert!(!acme_spec("123").matches(&info));
    }

    #[test]
    fn test_empty_spec_matches_single_slot() {
        let population = Population::new(vec![acme("9")]);
        assert_eq!(
            resolve(&population, &TokenSpec::new()).unwrap(),
            SlotId::new(0)
        );
    }

    #[test]
    fn test_empty_population_has_no_match() {
        let population = Population::new(Vec::new());
        assert!(matches!(
            resolve(&population, &TokenSpec::new()),
            Err(Error::NoMatchingSlot(_))
        ));
    }

    #[test]
    fn test_spec_display() {
        assert_eq!(
            acme_spec("123").to_string(),
            "{manufacturer=acme, serialnr=123}"
        );
    }
}
