// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::util::error::Error;
use base64::{engine::general_purpose::STANDARD, Engine};

/// Codec for plain text content which may be absent.
pub struct PlainText;

impl PlainText {
    pub fn decode(s: &str) -> Result<Option<String>, Error> {
        Ok(match s {
            "" => None,
            text => Some(text.to_owned()),
        })
    }

    pub fn encode(string: &Option<String>) -> Option<String> {
        string.as_ref().map(ToOwned::to_owned)
    }
}

/// Codec wrapping base64 encode/decode.
///
/// An empty payload is represented on the wire by a single `=`, as SASL
/// elements require.
pub struct Base64;

impl Base64 {
    pub fn decode(s: &str) -> Result<Vec<u8>, Error> {
        if s == "=" {
            return Ok(Vec::new());
        }
        Ok(STANDARD.decode(s)?)
    }

    pub fn encode(b: &[u8]) -> Option<String> {
        if b.is_empty() {
            return Some(String::from("="));
        }
        Some(STANDARD.encode(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_empty_payload_convention() {
        assert_eq!(Base64::encode(&[]).unwrap(), "=");
        assert_eq!(Base64::decode("=").unwrap(), Vec::<u8>::new());
    }
}
