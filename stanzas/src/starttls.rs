// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! STARTTLS stream feature and negotiation elements (RFC 6120 §5).

use crate::util::error::Error;
use crate::Element;
use std::convert::TryFrom;

/// The STARTTLS advertisement in `<stream:features/>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTls {
    /// Whether the server requires TLS before anything else.
    pub required: bool,
}

impl TryFrom<Element> for StartTls {
    type Error = Error;

    fn try_from(elem: Element) -> Result<StartTls, Error> {
        check_self!(elem, "starttls", TLS);
        check_no_attributes!(elem, "starttls");
        let mut required = false;
        for child in elem.children() {
            if child.is("required", crate::ns::TLS) {
                if required {
                    return Err(Error::ParseError(
                        "More than one required element in starttls.",
                    ));
                }
                required = true;
            } else {
                return Err(Error::ParseError("Unknown child in starttls element."));
            }
        }
        Ok(StartTls { required })
    }
}

impl From<StartTls> for Element {
    fn from(starttls: StartTls) -> Element {
        Element::builder("starttls", crate::ns::TLS)
            .append_all(
                starttls
                    .required
                    .then(|| Element::builder("required", crate::ns::TLS)),
            )
            .build()
    }
}

generate_empty_element!(
    /// The server agrees to upgrade the stream to TLS; the TLS handshake
    /// follows immediately on the raw connection.
    Proceed,
    "proceed",
    TLS
);

generate_empty_element!(
    /// The server refuses the TLS upgrade; the stream is closed.
    Failure,
    "failure",
    TLS
);
