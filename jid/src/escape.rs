// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! JID escaping (XEP-0106).
//!
//! Ten ASCII characters are disallowed or problematic in the local part of a
//! JID; escaping maps each to a `\XX` sequence so that addresses such as
//! `d'artagnan@musketeers.lit` can be represented on the wire.

/// The characters escaped by [`escape_local`], in escape-code order.
const ESCAPED: [(char, &str); 10] = [
    (' ', "\\20"),
    ('"', "\\22"),
    ('&', "\\26"),
    ('\'', "\\27"),
    ('/', "\\2f"),
    (':', "\\3a"),
    ('<', "\\3c"),
    ('>', "\\3e"),
    ('@', "\\40"),
    ('\\', "\\5c"),
];

/// Escapes the reserved characters of a local part.
///
/// The result is a valid local part whatever the input; `unescape_local`
/// restores the original string.
pub fn escape_local(local: &str) -> String {
    let mut result = String::with_capacity(local.len());
    for c in local.chars() {
        match ESCAPED.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => result.push_str(to),
            None => result.push(c),
        }
    }
    result
}

/// Reverses [`escape_local`].
///
/// A `\XX` sequence that does not name one of the ten reserved characters is
/// kept as-is.
pub fn unescape_local(local: &str) -> String {
    let mut result = String::with_capacity(local.len());
    let bytes = local.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 <= bytes.len() {
            let seq = &local[i..i + 3];
            if let Some((from, _)) = ESCAPED.iter().find(|(_, to)| *to == seq) {
                result.push(*from);
                i += 3;
                continue;
            }
        }
        // The input is valid UTF-8 and `\` is ASCII, so byte-wise advancing
        // only happens on ASCII positions.
        let c = local[i..].chars().next().unwrap();
        result.push(c);
        i += c.len_utf8();
    }
    result
}
