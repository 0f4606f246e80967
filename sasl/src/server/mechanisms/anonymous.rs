// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the server side of the SASL "ANONYMOUS" mechanism.

use crate::common::Identity;
use crate::server::{Mechanism, MechanismError, Response};

/// A struct for the server side of the SASL ANONYMOUS mechanism.
///
/// The optional trace string the client sends is ignored.
pub struct Anonymous;

impl Anonymous {
    /// Constructs a new server-side ANONYMOUS mechanism.
    pub fn new() -> Anonymous {
        Anonymous
    }
}

impl Default for Anonymous {
    fn default() -> Anonymous {
        Anonymous::new()
    }
}

impl Mechanism for Anonymous {
    fn name(&self) -> &str {
        "ANONYMOUS"
    }

    fn respond(&mut self, _payload: &[u8]) -> Result<Response, MechanismError> {
        Ok(Response::Success(Identity::None, Vec::new()))
    }
}
