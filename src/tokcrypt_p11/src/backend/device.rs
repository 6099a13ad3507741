// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::convert::TryFrom;
use std::path::Path;

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::mechanism::Mechanism as CkMechanism;
use cryptoki::object::{Attribute, ObjectClass as CkObjectClass, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::slot::Slot;
use cryptoki::types::AuthPin;
use tokcrypt_common::defs;

use super::driver::{Access, Driver, DriverSession, ObjectClass, Pin, SlotDirectory};
use super::mech::{MechDigest, Mechanism};
use super::slot::{SlotId, TokenInfo};
use crate::Result;

/// A PKCS#11 module, loaded and initialized for the lifetime of this object. The module is
/// finalized when the last clone of the underlying context is dropped.
pub struct Pkcs11Device {
    pkcs11: Pkcs11,
}

impl Pkcs11Device {
    pub fn load<P: AsRef<Path>>(module: P) -> Result<Self> {
        trace!("loading PKCS#11 module {}", module.as_ref().display());
        let pkcs11 = Pkcs11::new(module.as_ref())?;
        pkcs11.initialize(CInitializeArgs::OsThreads)?;
        Ok(Self { pkcs11 })
    }
}

impl SlotDirectory for Pkcs11Device {
    /// Only slots with a token present are listed; an empty slot has no token info to
    /// match against.
    fn slots(&self) -> Result<Vec<SlotId>> {
        trace!("enumerating slots");
        Ok(self
            .pkcs11
            .get_slots_with_token()?
            .iter()
            .map(|listed| SlotId::new(listed.id()))
            .collect())
    }

    fn token_info(&self, slot: SlotId) -> Result<TokenInfo> {
        trace!("reading token info for slot {}", slot);
        let ck_info = self.pkcs11.get_token_info(ck_slot(slot)?)?;
        let hw = ck_info.hardware_version();
        let fw = ck_info.firmware_version();

        let mut info = TokenInfo::new();
        info.insert(defs::ATTR_LABEL, ck_info.label().trim_end());
        info.insert(defs::ATTR_MANUFACTURER, ck_info.manufacturer_id().trim_end());
        info.insert(defs::ATTR_MODEL, ck_info.model().trim_end());
        info.insert(defs::ATTR_SERIAL, ck_info.serial_number().trim_end());
        info.insert(
            defs::ATTR_HARDWARE_VERSION,
            format!("{}.{}", hw.major(), hw.minor()),
        );
        info.insert(
            defs::ATTR_FIRMWARE_VERSION,
            format!("{}.{}", fw.major(), fw.minor()),
        );
        Ok(info)
    }
}

impl Driver for Pkcs11Device {
    type Session = Pkcs11Session;

    fn open_session(&self, slot: SlotId, access: Access) -> Result<Pkcs11Session> {
        let target = ck_slot(slot)?;
        let session = if access.read_write {
            self.pkcs11.open_rw_session(target)?
        } else {
            self.pkcs11.open_ro_session(target)?
        };
        Ok(Pkcs11Session { session })
    }
}

pub struct Pkcs11Session {
    session: Session,
}

impl DriverSession for Pkcs11Session {
    type Key = ObjectHandle;

    fn login(&mut self, pin: &Pin) -> Result<()> {
        let auth_pin = AuthPin::new(pin.expose().into());
        self.session.login(UserType::User, Some(&auth_pin))?;
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.session.logout()?;
        Ok(())
    }

    fn close(self) -> Result<()> {
        // C_CloseSession runs when the cryptoki session is dropped.
        drop(self.session);
        Ok(())
    }

    fn find_objects(&self, class: ObjectClass) -> Result<Vec<ObjectHandle>> {
        let template = vec![Attribute::Class(ck_object_class(class))];
        Ok(self.session.find_objects(&template)?)
    }

    fn sign(&self, key: ObjectHandle, data: &[u8], mech: Mechanism) -> Result<Vec<u8>> {
        Ok(self.session.sign(&ck_mechanism(mech), key, data)?)
    }
}

/// Slot ids are passed through as-is; an id the module does not know is reported by the
/// module itself on first use.
fn ck_slot(slot: SlotId) -> Result<Slot> {
    Ok(Slot::try_from(slot.id())?)
}

fn ck_object_class(class: ObjectClass) -> CkObjectClass {
    match class {
        ObjectClass::PrivateKey => CkObjectClass::PRIVATE_KEY,
    }
}

fn ck_mechanism(mech: Mechanism) -> CkMechanism<'static> {
    match mech {
        Mechanism::RsaPkcs(MechDigest::Sha1) => CkMechanism::Sha1RsaPkcs,
        Mechanism::RsaPkcs(MechDigest::Sha224) => CkMechanism::Sha224RsaPkcs,
        Mechanism::RsaPkcs(MechDigest::Sha256) => CkMechanism::Sha256RsaPkcs,
        Mechanism::RsaPkcs(MechDigest::Sha384) => CkMechanism::Sha384RsaPkcs,
        Mechanism::RsaPkcs(MechDigest::Sha512) => CkMechanism::Sha512RsaPkcs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_id_maps_without_enumeration() {
        // No module is loaded here, so a re-listing of slots could not succeed.
        for id in [0u64, 1, 5, 0x7fff_ffff].iter() {
            assert_eq!(ck_slot(SlotId::new(*id)).unwrap().id(), *id);
        }
    }

    #[test]
    fn test_mechanism_mapping() {
        assert_eq!(
            ck_mechanism(Mechanism::default()).mechanism_type(),
            CkMechanism::Sha256RsaPkcs.mechanism_type()
        );
        assert_eq!(
            ck_mechanism(Mechanism::RsaPkcs(MechDigest::Sha1)).mechanism_type(),
            CkMechanism::Sha1RsaPkcs.mechanism_type()
        );
    }
}
