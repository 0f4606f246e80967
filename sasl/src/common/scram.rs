// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Hash providers for the SCRAM mechanism family (RFC 5802, RFC 7677).

use getrandom::{getrandom, Error as RngError};
use hmac::{digest::InvalidLength, Hmac, Mac};
use pbkdf2::pbkdf2;
use sha1::{Digest, Sha1 as Sha1_hash};
use sha2::{Sha256 as Sha256_hash, Sha512 as Sha512_hash};

use crate::common::Password;

use crate::secret;

use base64::{engine::general_purpose::STANDARD as Base64, Engine};

/// Generate a random 24-byte nonce for SCRAM authentication, base64-encoded.
pub fn generate_nonce() -> Result<String, RngError> {
    let mut data = [0u8; 24];
    getrandom(&mut data)?;
    Ok(Base64.encode(data))
}

/// Escape `=` and `,` in a SCRAM username (the `saslname` production).
pub fn escape_username(username: &str) -> String {
    username.replace('=', "=3D").replace(',', "=2C")
}

/// An error derived secrets can signal when they do not fit the exchange.
#[derive(Debug, PartialEq)]
pub enum DeriveError {
    /// The secret was derived with a different hash function.
    IncompatibleHashingMethod(String, String),
    /// The secret was derived with a different salt.
    IncorrectSalt,
    /// The secret was derived with a different iteration count.
    IncompatibleIterationCount(u32, u32),
}

impl std::fmt::Display for DeriveError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DeriveError::IncompatibleHashingMethod(one, two) => {
                write!(fmt, "incompatible hashing method, {} is not {}", one, two)
            }
            DeriveError::IncorrectSalt => write!(fmt, "incorrect salt"),
            DeriveError::IncompatibleIterationCount(one, two) => {
                write!(fmt, "incompatible iteration count, {} is not {}", one, two)
            }
        }
    }
}

impl std::error::Error for DeriveError {}

/// A trait which defines the needed methods for SCRAM.
pub trait ScramProvider {
    /// The kind of secret this `ScramProvider` requires.
    type Secret: secret::Secret;

    /// The name of the hash function.
    fn name() -> &'static str;

    /// A function which hashes the data using the hash function.
    fn hash(data: &[u8]) -> Vec<u8>;

    /// A function which performs an HMAC using the hash function.
    fn hmac(data: &[u8], key: &[u8]) -> Result<Vec<u8>, InvalidLength>;

    /// A function which does PBKDF2 key derivation using the hash function.
    fn derive(data: &Password, salt: &[u8], iterations: u32) -> Result<Vec<u8>, DeriveError>;
}

macro_rules! impl_pbkdf2_derive {
    ($hash:ty, $len:expr) => {
        fn derive(
            password: &Password,
            salt: &[u8],
            iterations: u32,
        ) -> Result<Vec<u8>, DeriveError> {
            match *password {
                Password::Plain(ref plain) => {
                    let mut result = vec![0; $len];
                    pbkdf2::<Hmac<$hash>>(plain.as_bytes(), salt, iterations, &mut result);
                    Ok(result)
                }
                Password::Pbkdf2 {
                    ref method,
                    salt: ref my_salt,
                    iterations: my_iterations,
                    ref data,
                } => {
                    if method != Self::name() {
                        Err(DeriveError::IncompatibleHashingMethod(
                            method.to_string(),
                            Self::name().to_string(),
                        ))
                    } else if my_salt != &salt {
                        Err(DeriveError::IncorrectSalt)
                    } else if my_iterations != iterations {
                        Err(DeriveError::IncompatibleIterationCount(
                            my_iterations,
                            iterations,
                        ))
                    } else {
                        Ok(data.to_vec())
                    }
                }
            }
        }
    };
}

/// A `ScramProvider` which provides SCRAM-SHA-1 and SCRAM-SHA-1-PLUS
pub struct Sha1;

impl ScramProvider for Sha1 {
    type Secret = secret::Pbkdf2Sha1;

    fn name() -> &'static str {
        "SHA-1"
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha1_hash::digest(data).to_vec()
    }

    fn hmac(data: &[u8], key: &[u8]) -> Result<Vec<u8>, InvalidLength> {
        let mut mac = Hmac::<Sha1_hash>::new_from_slice(key)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    impl_pbkdf2_derive!(Sha1_hash, 20);
}

/// A `ScramProvider` which provides SCRAM-SHA-256 and SCRAM-SHA-256-PLUS
pub struct Sha256;

impl ScramProvider for Sha256 {
    type Secret = secret::Pbkdf2Sha256;

    fn name() -> &'static str {
        "SHA-256"
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha256_hash::digest(data).to_vec()
    }

    fn hmac(data: &[u8], key: &[u8]) -> Result<Vec<u8>, InvalidLength> {
        let mut mac = Hmac::<Sha256_hash>::new_from_slice(key)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    impl_pbkdf2_derive!(Sha256_hash, 32);
}

/// A `ScramProvider` which provides SCRAM-SHA-512 and SCRAM-SHA-512-PLUS
pub struct Sha512;

impl ScramProvider for Sha512 {
    type Secret = secret::Pbkdf2Sha512;

    fn name() -> &'static str {
        "SHA-512"
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha512_hash::digest(data).to_vec()
    }

    fn hmac(data: &[u8], key: &[u8]) -> Result<Vec<u8>, InvalidLength> {
        let mut mac = Hmac::<Sha512_hash>::new_from_slice(key)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    impl_pbkdf2_derive!(Sha512_hash, 64);
}
