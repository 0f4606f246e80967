// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the SASL "EXTERNAL" mechanism.
//!
//! Authentication is derived from context outside the exchange, typically a
//! TLS client certificate; the initial response carries the requested
//! authorization identity, or nothing.

use crate::client::{Mechanism, MechanismError};
use crate::common::{Credentials, Identity};

/// A struct for the SASL EXTERNAL mechanism.
pub struct External {
    authzid: Option<String>,
}

impl External {
    /// Constructs a new struct for authenticating using the SASL EXTERNAL
    /// mechanism, without an authorization identity.
    pub fn new() -> External {
        External { authzid: None }
    }

    /// Constructs a new struct requesting the given authorization identity.
    pub fn with_authzid<A: Into<String>>(authzid: A) -> External {
        External {
            authzid: Some(authzid.into()),
        }
    }
}

impl Default for External {
    fn default() -> External {
        External::new()
    }
}

impl Mechanism for External {
    fn name(&self) -> &str {
        "EXTERNAL"
    }

    fn from_credentials(credentials: Credentials) -> Result<External, MechanismError> {
        Ok(match credentials.identity {
            Identity::Username(username) => External::with_authzid(username),
            Identity::None => External::new(),
        })
    }

    fn initial(&mut self) -> Vec<u8> {
        match &self.authzid {
            Some(authzid) => authzid.as_bytes().to_vec(),
            None => Vec::new(),
        }
    }
}
