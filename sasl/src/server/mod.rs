// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The server side of an authentication exchange.

use crate::common::Identity;
use crate::secret::Secret;

use std::fmt;

#[cfg(feature = "scram")]
use hmac::digest::InvalidLength;

/// Errors a server-side mechanism can signal.
#[derive(Debug, PartialEq)]
pub enum MechanismError {
    /// The client payload is not a valid mechanism message.
    FailedToDecodeMessage,
    /// The client assumed the server does not support channel binding, but it
    /// does.
    ChannelBindingIsSupported,
    /// The client requested a channel binding type the server cannot provide.
    ChannelBindingMechanismIncorrect,
    /// The client's initial message could not be decoded.
    CannotDecodeInitialMessage,
    /// The initial message carries no username.
    NoUsername,
    /// The initial message carries no nonce.
    NoNonce,
    /// The nonce could not be generated from the system rng.
    FailedToGenerateNonce,
    /// The final message could not be decoded.
    CannotDecodeResponse,
    /// The final message carries no proof.
    NoProof,
    /// The proof is not valid base64.
    CannotDecodeProof,
    /// The proof does not match; the client does not know the shared secret.
    AuthenticationFailed,
    /// A message arrived after the exchange completed.
    SaslSessionAlreadyOver,
    /// An HMAC key had an invalid length.
    InvalidKeyLength,
}

impl fmt::Display for MechanismError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MechanismError::FailedToDecodeMessage => write!(fmt, "can't decode message"),
            MechanismError::ChannelBindingIsSupported => {
                write!(fmt, "channel binding is supported despite the client's guess")
            }
            MechanismError::ChannelBindingMechanismIncorrect => {
                write!(fmt, "channel binding mechanism is incorrect")
            }
            MechanismError::CannotDecodeInitialMessage => {
                write!(fmt, "can't decode initial message")
            }
            MechanismError::NoUsername => write!(fmt, "no username"),
            MechanismError::NoNonce => write!(fmt, "no nonce"),
            MechanismError::FailedToGenerateNonce => write!(fmt, "can't generate nonce"),
            MechanismError::CannotDecodeResponse => write!(fmt, "can't decode response"),
            MechanismError::NoProof => write!(fmt, "no proof"),
            MechanismError::CannotDecodeProof => write!(fmt, "can't decode proof"),
            MechanismError::AuthenticationFailed => write!(fmt, "authentication failed"),
            MechanismError::SaslSessionAlreadyOver => {
                write!(fmt, "the SASL session is already over")
            }
            MechanismError::InvalidKeyLength => write!(fmt, "invalid key length"),
        }
    }
}

impl std::error::Error for MechanismError {}

#[cfg(feature = "scram")]
impl From<InvalidLength> for MechanismError {
    fn from(_err: InvalidLength) -> MechanismError {
        MechanismError::InvalidKeyLength
    }
}

impl From<ProviderError> for MechanismError {
    fn from(_err: ProviderError) -> MechanismError {
        // The reason a secret could not be provided is never leaked to the
        // authentication result.
        MechanismError::AuthenticationFailed
    }
}

/// An error a secret provider can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderError {
    /// No secret exists for this identity.
    UnknownIdentity,
    /// The backing store failed.
    StorageFailure,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProviderError::UnknownIdentity => write!(fmt, "unknown identity"),
            ProviderError::StorageFailure => write!(fmt, "storage failure"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Provides secrets for identities, for mechanisms which carry out the
/// comparison themselves.
pub trait Provider<S: Secret>: Validator<S> {
    /// Fetches the secret stored for this identity.
    fn provide(&self, identity: &Identity) -> Result<S, ProviderError>;
}

/// Validates a secret offered by a client.
pub trait Validator<S: Secret> {
    /// Checks the offered secret against the stored one.
    fn validate(&self, identity: &Identity, value: &S) -> Result<(), MechanismError>;
}

/// Implements `Validator` for any `Provider` by comparing the provided secret
/// with the offered one.
#[macro_export]
macro_rules! impl_validator_using_provider {
    ( $validator:ty, $secret:ty ) => {
        impl $crate::server::Validator<$secret> for $validator {
            fn validate(
                &self,
                identity: &$crate::common::Identity,
                value: &$secret,
            ) -> Result<(), $crate::server::MechanismError> {
                if &($crate::server::Provider::<$secret>::provide(self, identity)?) == value {
                    Ok(())
                } else {
                    Err($crate::server::MechanismError::AuthenticationFailed)
                }
            }
        }
    };
}

/// A trait which defines the server side of SASL mechanisms.
pub trait Mechanism {
    /// The name of the mechanism.
    fn name(&self) -> &str;

    /// Processes a client message and advances the exchange.
    fn respond(&mut self, payload: &[u8]) -> Result<Response, MechanismError>;
}

/// The result of one server-side exchange step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The exchange completed; the client authenticated as this identity and
    /// the payload carries the final server message.
    Success(Identity, Vec<u8>),
    /// The exchange continues with this challenge.
    Proceed(Vec<u8>),
}

pub mod mechanisms;
