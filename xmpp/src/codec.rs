// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XML stream parser for XMPP.
//!
//! The decoder tokenizes bytes with rxml's push parser and assembles
//! depth-1 children of the (never-closed) stream root into whole elements;
//! the encoder writes the unclosable stream header raw and serializes
//! everything else through minidom.

use crate::Error;
use bytes::{BufMut, BytesMut};
use log::debug;
use minidom::tree_builder::TreeBuilder;
use rxml::{Lexer, PushDriver, RawParser};
use std::collections::HashMap;
use std::fmt::Write;
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use quill_stanzas::Element;

/// Anything that can be sent or received on an XMPP/XML stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// `<stream:stream>` start tag
    StreamStart(HashMap<String, String>),
    /// A complete stanza or nonza
    Stanza(Element),
    /// Plain text (think whitespace keep-alive)
    Text(String),
    /// Pre-encoded bytes, written through without re-encoding
    Raw(Vec<u8>),
    /// `</stream:stream>` closing tag
    StreamEnd,
}

/// Stateful encoder/decoder for a bytestream from/to XMPP `Packet`
pub struct XmppCodec {
    /// Outgoing
    ns: Option<String>,
    /// Incoming
    driver: PushDriver<RawParser>,
    stanza_builder: TreeBuilder,
}

impl XmppCodec {
    /// Constructor
    pub fn new() -> Self {
        let stanza_builder = TreeBuilder::new();
        let driver = PushDriver::wrap(Lexer::new(), RawParser::new());
        XmppCodec {
            ns: None,
            driver,
            stanza_builder,
        }
    }
}

impl Default for XmppCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for XmppCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let token = match self.driver.parse(buf, false) {
                Ok(Some(token)) => token,
                Ok(None) => break,
                Err(rxml::Error::IO(e)) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(minidom::Error::from(e).into()),
            };

            let had_stream_root = self.stanza_builder.depth() > 0;
            self.stanza_builder
                .process_event(token)
                .map_err(Error::from)?;
            let has_stream_root = self.stanza_builder.depth() > 0;

            if !had_stream_root && has_stream_root {
                let root = self.stanza_builder.top().unwrap();
                let attrs = root
                    .attrs()
                    .map(|(name, value)| (name.to_owned(), value.to_owned()))
                    .chain(root.prefixes.declared_prefixes().iter().map(
                        |(prefix, namespace)| {
                            (
                                prefix
                                    .as_ref()
                                    .map(|prefix| format!("xmlns:{}", prefix))
                                    .unwrap_or_else(|| "xmlns".to_owned()),
                                namespace.clone(),
                            )
                        },
                    ))
                    .collect();
                debug!("<< {}", String::from(root));
                return Ok(Some(Packet::StreamStart(attrs)));
            } else if self.stanza_builder.depth() == 1 {
                self.driver.release_temporaries();

                if let Some(stanza) = self.stanza_builder.unshift_child() {
                    debug!("<< {}", String::from(&stanza));
                    return Ok(Some(Packet::Stanza(stanza)));
                }
            } else if self.stanza_builder.root.take().is_some() {
                self.driver.release_temporaries();

                debug!("<< </stream:stream>");
                return Ok(Some(Packet::StreamEnd));
            }
        }

        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode(buf)
    }
}

impl Encoder<Packet> for XmppCodec {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let remaining = dst.capacity() - dst.len();
        let max_stanza_size: usize = 2usize.pow(16);
        if remaining < max_stanza_size {
            dst.reserve(max_stanza_size - remaining);
        }

        fn to_io_err<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> io::Error {
            io::Error::new(io::ErrorKind::InvalidInput, e)
        }

        match item {
            Packet::StreamStart(start_attrs) => {
                let mut buf = String::new();
                write!(buf, "<stream:stream").map_err(to_io_err)?;
                for (name, value) in start_attrs {
                    write!(buf, " {}=\"{}\"", escape(&name), escape(&value))
                        .map_err(to_io_err)?;
                    if name == "xmlns" {
                        self.ns = Some(value);
                    }
                }
                write!(buf, ">").map_err(to_io_err)?;

                write!(dst, "{}", buf)?;
                debug!(">> {}", std::str::from_utf8(dst)?);
            }
            Packet::Stanza(stanza) => {
                stanza
                    .write_to(&mut WriteBytes::new(dst))
                    .map_err(|e| to_io_err(format!("{}", e)))?;
                debug!(">> {}", std::str::from_utf8(dst)?);
            }
            Packet::Text(text) => {
                write_text(&text, dst).map_err(to_io_err)?;
                debug!(">> {}", std::str::from_utf8(dst)?);
            }
            Packet::Raw(bytes) => {
                dst.put_slice(&bytes);
                debug!(">> {} raw bytes", bytes.len());
            }
            Packet::StreamEnd => {
                let _ = write!(dst, "</stream:stream>\n").map_err(to_io_err);
                debug!(">> </stream:stream>");
            }
        }

        Ok(())
    }
}

/// Write XML-escaped text string
pub fn write_text<W: Write>(text: &str, writer: &mut W) -> Result<(), std::fmt::Error> {
    write!(writer, "{}", escape(text))
}

/// Minimal XML text/attribute escaping.
pub fn escape(input: &str) -> String {
    let mut result = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&apos;"),
            '"' => result.push_str("&quot;"),
            o => result.push(o),
        }
    }
    result
}

/// BytesMut impl only std::fmt::Write but not std::io::Write. The
/// latter trait is required for minidom's
/// `Element::write_to_inner()`.
struct WriteBytes<'a> {
    dst: &'a mut BytesMut,
}

impl<'a> WriteBytes<'a> {
    fn new(dst: &'a mut BytesMut) -> Self {
        WriteBytes { dst }
    }
}

impl<'a> std::io::Write for WriteBytes<'a> {
    fn write(&mut self, buf: &[u8]) -> std::result::Result<usize, std::io::Error> {
        self.dst.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::result::Result<(), std::io::Error> {
        Ok(())
    }
}
