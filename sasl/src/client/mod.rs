// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The client side of an authentication exchange.

use crate::common::Credentials;

use std::fmt;

#[cfg(feature = "scram")]
use crate::common::scram::DeriveError;
#[cfg(feature = "scram")]
use hmac::digest::InvalidLength;

/// Errors a client-side mechanism can signal.
#[derive(Debug, PartialEq)]
pub enum MechanismError {
    /// The nonce could not be generated from the system rng.
    CannotGenerateNonce,
    /// This mechanism needs a username, but none was supplied.
    RequiresUsername,
    /// This mechanism needs a plaintext password, but none was supplied.
    RequiresPassword,
    /// This mechanism must not be given credentials.
    RequiresNoCredentials,
    /// A `-PLUS` mechanism was requested without channel-binding data.
    ChannelBindingRequired,
    /// The server challenge is not a valid SCRAM frame.
    CannotDecodeChallenge,
    /// The server challenge carries no nonce.
    NoServerNonce,
    /// The server nonce does not start with the client nonce.
    InvalidServerNonce,
    /// The server challenge carries no salt.
    NoServerSalt,
    /// The server challenge carries no iteration count, or one that is not a
    /// positive integer.
    NoServerIterations,
    /// The key derivation failed.
    #[cfg(feature = "scram")]
    CannotDeriveKeys(DeriveError),
    /// An HMAC key had an invalid length.
    InvalidKeyLength,
    /// The exchange is not at the step this message belongs to.
    InvalidState,
    /// The server's final message could not be decoded.
    CannotDecodeSuccessResponse,
    /// The server reported an error in its final message.
    ServerFailure(String),
    /// The server's final message carried no signature.
    NoSignatureInSuccessResponse,
    /// The server signature did not verify; the server does not know the
    /// shared secret.
    InvalidSignatureInSuccessResponse,
}

impl fmt::Display for MechanismError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MechanismError::CannotGenerateNonce => write!(fmt, "can't generate nonce"),
            MechanismError::RequiresUsername => write!(fmt, "mechanism requires a username"),
            MechanismError::RequiresPassword => write!(fmt, "mechanism requires a password"),
            MechanismError::RequiresNoCredentials => {
                write!(fmt, "mechanism requires no credentials")
            }
            MechanismError::ChannelBindingRequired => {
                write!(fmt, "-PLUS mechanism requires channel-binding data")
            }
            MechanismError::CannotDecodeChallenge => write!(fmt, "can't decode challenge"),
            MechanismError::NoServerNonce => write!(fmt, "no server nonce"),
            MechanismError::InvalidServerNonce => {
                write!(fmt, "server nonce doesn't start with client nonce")
            }
            MechanismError::NoServerSalt => write!(fmt, "no server salt"),
            MechanismError::NoServerIterations => write!(fmt, "no server iterations"),
            #[cfg(feature = "scram")]
            MechanismError::CannotDeriveKeys(err) => write!(fmt, "can't derive keys: {}", err),
            MechanismError::InvalidKeyLength => write!(fmt, "invalid key length"),
            MechanismError::InvalidState => write!(fmt, "not in the right state for this message"),
            MechanismError::CannotDecodeSuccessResponse => {
                write!(fmt, "can't decode success response")
            }
            MechanismError::ServerFailure(err) => write!(fmt, "server failure: {}", err),
            MechanismError::NoSignatureInSuccessResponse => {
                write!(fmt, "no signature in success response")
            }
            MechanismError::InvalidSignatureInSuccessResponse => {
                write!(fmt, "invalid signature in success response")
            }
        }
    }
}

impl std::error::Error for MechanismError {}

#[cfg(feature = "scram")]
impl From<DeriveError> for MechanismError {
    fn from(err: DeriveError) -> MechanismError {
        MechanismError::CannotDeriveKeys(err)
    }
}

#[cfg(feature = "scram")]
impl From<InvalidLength> for MechanismError {
    fn from(_err: InvalidLength) -> MechanismError {
        MechanismError::InvalidKeyLength
    }
}

/// A trait which defines SASL mechanisms.
pub trait Mechanism {
    /// The name of the mechanism.
    fn name(&self) -> &str;

    /// Creates this mechanism from `Credentials`.
    fn from_credentials(credentials: Credentials) -> Result<Self, MechanismError>
    where
        Self: Sized;

    /// Provides initial payload of the SASL mechanism.
    fn initial(&mut self) -> Vec<u8> {
        Vec::new()
    }

    /// Creates a response to the SASL challenge.
    fn response(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Ok(Vec::new())
    }

    /// Verifies the server success response, if there is one.
    fn success(&mut self, _data: &[u8]) -> Result<(), MechanismError> {
        Ok(())
    }
}

pub mod mechanisms;
