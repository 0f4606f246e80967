// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the SASL "SCRAM-*" mechanisms and a way to implement more.

use base64::{engine::general_purpose::STANDARD as Base64, Engine};

use crate::client::{Mechanism, MechanismError};
use crate::common::scram::{escape_username, generate_nonce, ScramProvider};
use crate::common::{parse_frame, xor, ChannelBinding, Credentials, Identity, Password, Secret};

use std::marker::PhantomData;

enum ScramState {
    Init,
    SentInitialMessage {
        initial_message: Vec<u8>,
        gs2_header: Vec<u8>,
    },
    GotServerData {
        server_signature: Vec<u8>,
    },
}

/// A struct for the SASL SCRAM-* and SCRAM-*-PLUS mechanisms.
pub struct Scram<S: ScramProvider> {
    name: String,
    name_plus: String,
    username: String,
    password: Password,
    client_nonce: String,
    state: ScramState,
    channel_binding: ChannelBinding,
    plus: bool,
    _marker: PhantomData<S>,
}

impl<S: ScramProvider> Scram<S> {
    /// Constructs a new struct for authenticating using the SASL SCRAM-*
    /// mechanism.
    ///
    /// The `-PLUS` variant is selected automatically when the supplied
    /// channel binding carries data; use [`Scram::new_plus`] to require it.
    ///
    /// It is recommended that instead you use a `Credentials` struct and turn
    /// it into the requested mechanism using `from_credentials`.
    pub fn new<N: Into<String>, P: Into<Password>>(
        username: N,
        password: P,
        channel_binding: ChannelBinding,
    ) -> Result<Scram<S>, MechanismError> {
        let plus = channel_binding.is_available();
        Ok(Scram {
            name: format!("SCRAM-{}", S::name()),
            name_plus: format!("SCRAM-{}-PLUS", S::name()),
            username: username.into(),
            password: password.into(),
            client_nonce: generate_nonce().map_err(|_| MechanismError::CannotGenerateNonce)?,
            state: ScramState::Init,
            channel_binding,
            plus,
            _marker: PhantomData,
        })
    }

    /// Forces the non-PLUS variant even when binding data is available, for
    /// servers that only offer the plain mechanism names. The gs2 header
    /// then advertises that we could have bound the channel.
    pub fn without_channel_binding(mut self) -> Scram<S> {
        self.plus = false;
        self
    }

    /// Constructs the `-PLUS` variant, failing when no channel-binding data
    /// is available.
    pub fn new_plus<N: Into<String>, P: Into<Password>>(
        username: N,
        password: P,
        channel_binding: ChannelBinding,
    ) -> Result<Scram<S>, MechanismError> {
        if !channel_binding.is_available() {
            return Err(MechanismError::ChannelBindingRequired);
        }
        Scram::new(username, password, channel_binding)
    }

    // Used for testing.
    #[doc(hidden)]
    #[cfg(test)]
    pub fn new_with_nonce<N: Into<String>, P: Into<Password>>(
        username: N,
        password: P,
        nonce: String,
    ) -> Scram<S> {
        Scram {
            name: format!("SCRAM-{}", S::name()),
            name_plus: format!("SCRAM-{}-PLUS", S::name()),
            username: username.into(),
            password: password.into(),
            client_nonce: nonce,
            state: ScramState::Init,
            channel_binding: ChannelBinding::None,
            plus: false,
            _marker: PhantomData,
        }
    }

    fn gs2_header(&self) -> Vec<u8> {
        if self.plus {
            self.channel_binding.header().to_vec()
        } else if self.channel_binding.is_available() {
            // We could bind the channel but chose the non-PLUS variant.
            b"y,,".to_vec()
        } else {
            self.channel_binding.header().to_vec()
        }
    }

    fn binding_data(&self) -> &[u8] {
        if self.plus {
            self.channel_binding.data()
        } else {
            &[]
        }
    }
}

impl<S: ScramProvider> Mechanism for Scram<S> {
    fn name(&self) -> &str {
        if self.plus {
            &self.name_plus
        } else {
            &self.name
        }
    }

    fn from_credentials(credentials: Credentials) -> Result<Scram<S>, MechanismError> {
        if let Secret::Password(password) = credentials.secret {
            if let Identity::Username(username) = credentials.identity {
                Scram::new(username, password, credentials.channel_binding)
            } else {
                Err(MechanismError::RequiresUsername)
            }
        } else {
            Err(MechanismError::RequiresPassword)
        }
    }

    fn initial(&mut self) -> Vec<u8> {
        let gs2_header = self.gs2_header();
        let mut bare = Vec::new();
        bare.extend(b"n=");
        bare.extend(escape_username(&self.username).bytes());
        bare.extend(b",r=");
        bare.extend(self.client_nonce.bytes());
        let mut data = Vec::new();
        data.extend(&gs2_header);
        data.extend(&bare);
        self.state = ScramState::SentInitialMessage {
            initial_message: bare,
            gs2_header,
        };
        data
    }

    fn response(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        let next_state;
        let ret;
        match self.state {
            ScramState::SentInitialMessage {
                ref initial_message,
                ref gs2_header,
            } => {
                let frame =
                    parse_frame(challenge).map_err(|_| MechanismError::CannotDecodeChallenge)?;
                let server_nonce = frame.get("r").ok_or(MechanismError::NoServerNonce)?;
                if !server_nonce.starts_with(&self.client_nonce) {
                    return Err(MechanismError::InvalidServerNonce);
                }
                let salt = frame
                    .get("s")
                    .and_then(|v| Base64.decode(v).ok())
                    .ok_or(MechanismError::NoServerSalt)?;
                let iterations: u32 = frame
                    .get("i")
                    .and_then(|v| v.parse().ok())
                    .filter(|i| *i > 0)
                    .ok_or(MechanismError::NoServerIterations)?;
                let mut client_final_message_bare = Vec::new();
                client_final_message_bare.extend(b"c=");
                let mut cb_data: Vec<u8> = Vec::new();
                cb_data.extend(gs2_header);
                cb_data.extend(self.binding_data());
                client_final_message_bare.extend(Base64.encode(&cb_data).bytes());
                client_final_message_bare.extend(b",r=");
                client_final_message_bare.extend(server_nonce.bytes());
                let salted_password = S::derive(&self.password, &salt, iterations)?;
                let client_key = S::hmac(b"Client Key", &salted_password)?;
                let server_key = S::hmac(b"Server Key", &salted_password)?;
                let mut auth_message = Vec::new();
                auth_message.extend(initial_message);
                auth_message.push(b',');
                auth_message.extend(challenge);
                auth_message.push(b',');
                auth_message.extend(&client_final_message_bare);
                let stored_key = S::hash(&client_key);
                let client_signature = S::hmac(&auth_message, &stored_key)?;
                let client_proof = xor(&client_key, &client_signature);
                let server_signature = S::hmac(&auth_message, &server_key)?;
                let mut client_final_message = Vec::new();
                client_final_message.extend(&client_final_message_bare);
                client_final_message.extend(b",p=");
                client_final_message.extend(Base64.encode(&client_proof).bytes());
                next_state = ScramState::GotServerData { server_signature };
                ret = client_final_message;
            }
            _ => {
                return Err(MechanismError::InvalidState);
            }
        }
        self.state = next_state;
        Ok(ret)
    }

    fn success(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        let frame = parse_frame(data).map_err(|_| MechanismError::CannotDecodeSuccessResponse)?;
        if let Some(err) = frame.get("e") {
            return Err(MechanismError::ServerFailure(err.clone()));
        }
        match self.state {
            ScramState::GotServerData {
                ref server_signature,
            } => {
                if let Some(sig) = frame.get("v").and_then(|v| Base64.decode(v).ok()) {
                    if sig == *server_signature {
                        Ok(())
                    } else {
                        Err(MechanismError::InvalidSignatureInSuccessResponse)
                    }
                } else {
                    Err(MechanismError::NoSignatureInSuccessResponse)
                }
            }
            _ => Err(MechanismError::InvalidState),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scram::{Sha1, Sha256};

    #[test]
    fn scram_sha1_works() {
        // Source: https://wiki.xmpp.org/web/SASLandSCRAM-SHA-1
        let username = "user";
        let password = "pencil";
        let client_nonce = "fyko+d2lbbFgONRv9qkxdawL";
        let client_init = b"n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL";
        let server_init = b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096";
        let client_final =
            b"c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,p=v0X8v3Bz2T0CJGbJQyF0X+HI4Ts=";
        let server_final = b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=";
        let mut mechanism =
            Scram::<Sha1>::new_with_nonce(username, password, client_nonce.to_owned());
        let init = mechanism.initial();
        assert_eq!(
            String::from_utf8(init).unwrap(),
            String::from_utf8(client_init[..].to_owned()).unwrap()
        );
        let resp = mechanism.response(&server_init[..]).unwrap();
        assert_eq!(
            String::from_utf8(resp).unwrap(),
            String::from_utf8(client_final[..].to_owned()).unwrap()
        );
        mechanism.success(&server_final[..]).unwrap();
    }

    #[test]
    fn scram_sha256_works() {
        // Source: RFC 7677
        let username = "user";
        let password = "pencil";
        let client_nonce = "rOprNGfwEbeRWgbNEkqO";
        let client_init = b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO";
        let server_init = b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";
        let client_final = b"c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=";
        let server_final = b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=";
        let mut mechanism =
            Scram::<Sha256>::new_with_nonce(username, password, client_nonce.to_owned());
        let init = mechanism.initial();
        assert_eq!(
            String::from_utf8(init).unwrap(),
            String::from_utf8(client_init[..].to_owned()).unwrap()
        );
        let resp = mechanism.response(&server_init[..]).unwrap();
        assert_eq!(
            String::from_utf8(resp).unwrap(),
            String::from_utf8(client_final[..].to_owned()).unwrap()
        );
        mechanism.success(&server_final[..]).unwrap();
    }

    #[test]
    fn tampered_server_signature_is_rejected() {
        let mut mechanism = Scram::<Sha256>::new_with_nonce(
            "user",
            "pencil",
            "rOprNGfwEbeRWgbNEkqO".to_owned(),
        );
        let _ = mechanism.initial();
        let _ = mechanism
            .response(&b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096"[..])
            .unwrap();
        assert_eq!(
            mechanism.success(&b"v=7rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4="[..]),
            Err(MechanismError::InvalidSignatureInSuccessResponse)
        );
    }

    #[test]
    fn server_error_attribute_fails_the_exchange() {
        let mut mechanism = Scram::<Sha256>::new_with_nonce(
            "user",
            "pencil",
            "rOprNGfwEbeRWgbNEkqO".to_owned(),
        );
        let _ = mechanism.initial();
        let _ = mechanism
            .response(&b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096"[..])
            .unwrap();
        assert_eq!(
            mechanism.success(&b"e=invalid-proof"[..]),
            Err(MechanismError::ServerFailure("invalid-proof".to_owned()))
        );
    }

    #[test]
    fn server_nonce_must_extend_client_nonce() {
        let mut mechanism =
            Scram::<Sha256>::new_with_nonce("user", "pencil", "abcdef".to_owned());
        let _ = mechanism.initial();
        assert_eq!(
            mechanism.response(&b"r=somethingelse,s=c2FsdA==,i=4096"[..]),
            Err(MechanismError::InvalidServerNonce)
        );
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let mut mechanism =
            Scram::<Sha256>::new_with_nonce("user", "pencil", "abcdef".to_owned());
        let _ = mechanism.initial();
        assert_eq!(
            mechanism.response(&b"r=abcdefgh,s=c2FsdA==,i=0"[..]),
            Err(MechanismError::NoServerIterations)
        );
    }

    #[test]
    fn username_is_escaped() {
        let mut mechanism =
            Scram::<Sha256>::new_with_nonce("u=s,er", "pencil", "nonce".to_owned());
        let init = mechanism.initial();
        assert_eq!(&init[..], &b"n,,n=u=3Ds=2Cer,r=nonce"[..]);
    }

    #[test]
    fn plus_requires_channel_binding_data() {
        let result =
            Scram::<Sha256>::new_plus("user", "pencil", ChannelBinding::Unsupported);
        assert!(matches!(
            result,
            Err(MechanismError::ChannelBindingRequired)
        ));
        assert!(
            Scram::<Sha256>::new_plus("user", "pencil", ChannelBinding::TlsExporter(vec![1; 32]))
                .is_ok()
        );
    }

    #[test]
    fn plus_variant_carries_binding_in_name_and_header() {
        let mut mechanism = Scram::<Sha256>::new_plus(
            "user",
            "pencil",
            ChannelBinding::TlsExporter(vec![0xAA; 32]),
        )
        .unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-256-PLUS");
        let init = mechanism.initial();
        assert!(init.starts_with(b"p=tls-exporter,,"));
    }
}
