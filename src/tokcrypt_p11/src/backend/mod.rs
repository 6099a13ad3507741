// Copyright 2020-2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod device;
pub mod driver;
pub mod mech;
pub mod session;
pub mod slot;

pub use device::Pkcs11Device;
pub use driver::Driver;
pub use mech::Mechanism;
pub use session::TokenSession;
pub use slot::SlotId;
