// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::error::Error as StdError;
use std::fmt;

/// An error that signifies that a `Jid` cannot be parsed from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Happens when the parsed string is empty.
    Empty,

    /// Happens when the domain part is empty, contains a `@`, or is an
    /// unterminated bracketed IP literal.
    InvalidDomain,

    /// Happens when a `@` is present but the local part before it is empty.
    InvalidLocal,

    /// Happens when a `/` is present but the resource part after it is empty.
    InvalidResource,

    /// Happens when any single part exceeds 1023 bytes.
    TooLong,

    /// Happens when a full JID was required but the string contains no
    /// resource.
    NoResource,

    /// Happens when a bare JID was required but the string contains a
    /// resource.
    ResourceInBareJid,
}

impl StdError for Error {}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{}",
            match self {
                Error::Empty => "empty JID",
                Error::InvalidDomain => "invalid domain in this JID",
                Error::InvalidLocal => "invalid local part in this JID",
                Error::InvalidResource => "invalid resource in this JID",
                Error::TooLong => "a JID part exceeds 1023 bytes",
                Error::NoResource => "no resource found in this full JID",
                Error::ResourceInBareJid => "resource found in this bare JID",
            }
        )
    }
}
