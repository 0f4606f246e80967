// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Secret types the server side validates against.

#[cfg(feature = "scram")]
use crate::common::scram::DeriveError;

/// A marker trait for server-side secrets.
pub trait Secret {}

/// A PBKDF2-derived secret: salt, iteration count and digest.
pub trait Pbkdf2Secret {
    /// The salt used for derivation.
    fn salt(&self) -> &[u8];
    /// The iteration count used for derivation.
    fn iterations(&self) -> u32;
    /// The derived digest.
    fn digest(&self) -> &[u8];
}

/// A plaintext password secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plain(pub String);

impl Secret for Plain {}

macro_rules! impl_pbkdf2_secret {
    ($(#[$meta:meta])* $name:ident, $provider:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            /// The salt used for derivation.
            pub salt: Vec<u8>,
            /// The iteration count used for derivation.
            pub iterations: u32,
            /// The derived digest.
            pub digest: Vec<u8>,
        }

        impl $name {
            #[cfg(feature = "scram")]
            /// Derives this secret from a plaintext password.
            pub fn derive(
                password: &str,
                salt: &[u8],
                iterations: u32,
            ) -> Result<$name, DeriveError> {
                use crate::common::scram::{ScramProvider, $provider};
                use crate::common::Password;
                let digest =
                    $provider::derive(&Password::Plain(password.to_owned()), salt, iterations)?;
                Ok($name {
                    salt: salt.to_vec(),
                    iterations,
                    digest,
                })
            }
        }

        impl Secret for $name {}

        impl Pbkdf2Secret for $name {
            fn salt(&self) -> &[u8] {
                &self.salt
            }
            fn iterations(&self) -> u32 {
                self.iterations
            }
            fn digest(&self) -> &[u8] {
                &self.digest
            }
        }
    };
}

impl_pbkdf2_secret!(
    /// A secret derived with PBKDF2 over HMAC-SHA-1.
    Pbkdf2Sha1,
    Sha1
);
impl_pbkdf2_secret!(
    /// A secret derived with PBKDF2 over HMAC-SHA-256.
    Pbkdf2Sha256,
    Sha256
);
impl_pbkdf2_secret!(
    /// A secret derived with PBKDF2 over HMAC-SHA-512.
    Pbkdf2Sha512,
    Sha512
);
