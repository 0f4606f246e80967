// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the server side of the SASL "PLAIN" mechanism.

use crate::common::Identity;
use crate::secret;
use crate::server::{Mechanism, MechanismError, Response, Validator};

/// A struct for the server side of the SASL PLAIN mechanism.
pub struct Plain<V: Validator<secret::Plain>> {
    validator: V,
}

impl<V: Validator<secret::Plain>> Plain<V> {
    /// Constructs a new server-side PLAIN mechanism around a validator.
    pub fn new(validator: V) -> Plain<V> {
        Plain { validator }
    }
}

impl<V: Validator<secret::Plain>> Mechanism for Plain<V> {
    fn name(&self) -> &str {
        "PLAIN"
    }

    fn respond(&mut self, payload: &[u8]) -> Result<Response, MechanismError> {
        let mut sp = payload.split(|&b| b == 0);
        let _authzid = sp.next().ok_or(MechanismError::FailedToDecodeMessage)?;
        let authcid = sp.next().ok_or(MechanismError::FailedToDecodeMessage)?;
        let password = sp.next().ok_or(MechanismError::FailedToDecodeMessage)?;
        if sp.next().is_some() {
            return Err(MechanismError::FailedToDecodeMessage);
        }
        let authcid = String::from_utf8(authcid.to_vec())
            .map_err(|_| MechanismError::FailedToDecodeMessage)?;
        let password = String::from_utf8(password.to_vec())
            .map_err(|_| MechanismError::FailedToDecodeMessage)?;
        let identity = Identity::Username(authcid);
        self.validator
            .validate(&identity, &secret::Plain(password))?;
        Ok(Response::Success(identity, Vec::new()))
    }
}
