// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use quill_jid::BareJid;
use std::fmt;

/// One OMEMO device: a bare JID plus a device id.
///
/// Addresses are the keys of the session and bundle caches; two addresses are
/// the same device iff both parts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// The account the device belongs to.
    pub jid: BareJid,
    /// The device id, unique per account.
    pub device_id: u32,
}

impl Address {
    /// Creates an address from its parts.
    pub fn new(jid: BareJid, device_id: u32) -> Address {
        Address { jid, device_id }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}", self.jid, self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    #[test]
    fn device_id_distinguishes_addresses() {
        let jid = BareJid::from_str("alice@example.org").unwrap();
        let a1 = Address::new(jid.clone(), 1);
        let a2 = Address::new(jid, 2);
        assert_ne!(a1, a2);

        let mut map = HashMap::new();
        map.insert(a1.clone(), "first");
        assert_eq!(map.get(&a1), Some(&"first"));
        assert_eq!(map.get(&a2), None);
    }

    #[test]
    fn display_form() {
        let address = Address::new(BareJid::from_str("a@b").unwrap(), 42);
        assert_eq!(address.to_string(), "a@b:42");
    }
}
