// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::Error;
use core::num::NonZeroU16;
use memchr::memchr;
use std::str::FromStr;

fn length_check(len: usize, error_empty: Error) -> Result<(), Error> {
    if len == 0 {
        Err(error_empty)
    } else if len > 1023 {
        Err(Error::TooLong)
    } else {
        Ok(())
    }
}

fn domain_check(domain: &str) -> Result<(), Error> {
    length_check(domain.len(), Error::InvalidDomain)?;
    if memchr(b'@', domain.as_bytes()).is_some() {
        return Err(Error::InvalidDomain);
    }
    // A bracketed IP literal must be terminated.
    if domain.starts_with('[') && !domain.ends_with(']') {
        return Err(Error::InvalidDomain);
    }
    Ok(())
}

/// Storage for a parsed JID: the original string plus the byte offsets of the
/// `@` and `/` separators.  Parts are compared byte for byte, so equality of
/// two JIDs is equality of their `normalized` strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct InnerJid {
    pub(crate) normalized: String,
    pub(crate) at: Option<NonZeroU16>,
    pub(crate) slash: Option<NonZeroU16>,
}

impl InnerJid {
    pub(crate) fn new(unnormalized: &str) -> Result<InnerJid, Error> {
        if unnormalized.is_empty() {
            return Err(Error::Empty);
        }

        let bytes = unnormalized.as_bytes();
        // The first slash starts the resource, which may itself contain both
        // `/` and `@`.  Only a `@` before that slash separates the local
        // part.
        let slash = memchr(b'/', bytes);
        let scan_end = slash.unwrap_or(bytes.len());
        let at = memchr(b'@', &bytes[..scan_end]);

        match (at, slash) {
            (Some(at), Some(slash)) => {
                length_check(at, Error::InvalidLocal)?;
                domain_check(&unnormalized[at + 1..slash])?;
                length_check(unnormalized.len() - slash - 1, Error::InvalidResource)?;
            }
            (Some(at), None) => {
                length_check(at, Error::InvalidLocal)?;
                domain_check(&unnormalized[at + 1..])?;
            }
            (None, Some(slash)) => {
                domain_check(&unnormalized[..slash])?;
                length_check(unnormalized.len() - slash - 1, Error::InvalidResource)?;
            }
            (None, None) => {
                domain_check(unnormalized)?;
            }
        }

        Ok(InnerJid {
            normalized: unnormalized.to_owned(),
            at: at.and_then(|x| NonZeroU16::new(x as u16)),
            slash: slash.and_then(|x| NonZeroU16::new(x as u16)),
        })
    }

    pub(crate) fn local(&self) -> Option<&str> {
        self.at.map(|at| {
            let at = u16::from(at) as usize;
            &self.normalized[..at]
        })
    }

    pub(crate) fn domain(&self) -> &str {
        match (self.at, self.slash) {
            (Some(at), Some(slash)) => {
                let at = u16::from(at) as usize;
                let slash = u16::from(slash) as usize;
                &self.normalized[at + 1..slash]
            }
            (Some(at), None) => {
                let at = u16::from(at) as usize;
                &self.normalized[at + 1..]
            }
            (None, Some(slash)) => {
                let slash = u16::from(slash) as usize;
                &self.normalized[..slash]
            }
            (None, None) => &self.normalized,
        }
    }

    pub(crate) fn resource(&self) -> Option<&str> {
        self.slash.map(|slash| {
            let slash = u16::from(slash) as usize;
            &self.normalized[slash + 1..]
        })
    }
}

impl FromStr for InnerJid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InnerJid::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_size (
        ($t:ty, $sz:expr) => (
            assert_eq!(::std::mem::size_of::<$t>(), $sz);
        );
    );

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn test_size() {
        assert_size!(InnerJid, 16);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_size() {
        assert_size!(InnerJid, 32);
    }

    #[test]
    fn resource_may_contain_separators() {
        let inner = InnerJid::new("user@example.com/res/extra@host").unwrap();
        assert_eq!(inner.local(), Some("user"));
        assert_eq!(inner.domain(), "example.com");
        assert_eq!(inner.resource(), Some("res/extra@host"));
    }

    #[test]
    fn part_length_is_bounded() {
        let local = "a".repeat(1023);
        let ok = format!("{local}@example.com");
        assert!(InnerJid::new(&ok).is_ok());
        let local = "a".repeat(1024);
        let too_long = format!("{local}@example.com");
        assert_eq!(InnerJid::new(&too_long), Err(Error::TooLong));
    }

    #[test]
    fn bracketed_ip_literal() {
        let inner = InnerJid::new("user@[2001:db8::1]").unwrap();
        assert_eq!(inner.domain(), "[2001:db8::1]");
        assert_eq!(InnerJid::new("user@[2001:db8::1"), Err(Error::InvalidDomain));
    }
}
