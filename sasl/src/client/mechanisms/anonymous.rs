// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the SASL "ANONYMOUS" mechanism (RFC 4505).

use crate::client::{Mechanism, MechanismError};
use crate::common::{Credentials, Secret};

/// A struct for the SASL ANONYMOUS mechanism.
pub struct Anonymous {
    trace: Option<String>,
}

impl Anonymous {
    /// Constructs a new struct for authenticating using the SASL ANONYMOUS
    /// mechanism.
    ///
    /// It is recommended that instead you use a `Credentials` struct and turn
    /// it into the requested mechanism using `from_credentials`.
    pub fn new() -> Anonymous {
        Anonymous { trace: None }
    }

    /// Attaches an optional trace string sent along the initial response.
    pub fn with_trace<T: Into<String>>(mut self, trace: T) -> Anonymous {
        self.trace = Some(trace.into());
        self
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

    fn from_credentials(credentials: Credentials) -> Result<Anonymous, MechanismError> {
        if let Secret::None = credentials.secret {
            Ok(Anonymous::new())
        } else {
            Err(MechanismError::RequiresNoCredentials)
        }
    }

    fn initial(&mut self) -> Vec<u8> {
        match &self.trace {
            Some(trace) => trace.as_bytes().to_vec(),
            None => Vec::new(),
        }
    }
}
