// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! This crate provides a framework for SASL authentication and a few
//! authentication mechanisms.
//!
//! The client side implements PLAIN, EXTERNAL, ANONYMOUS and the
//! SCRAM-SHA-{1,256,512} family including the `-PLUS` channel-binding
//! variants; the server side implements PLAIN, ANONYMOUS and SCRAM
//! validation against PBKDF2-derived secrets.
//!
//! # Examples
//!
//! ```rust
//! use quill_sasl::client::mechanisms::Plain;
//! use quill_sasl::client::Mechanism;
//! use quill_sasl::common::Credentials;
//!
//! let creds = Credentials::default()
//!     .with_username("user")
//!     .with_password("pencil");
//!
//! let mut mechanism = Plain::from_credentials(creds).unwrap();
//!
//! let initial_data = mechanism.initial();
//!
//! assert_eq!(initial_data, b"\0user\0pencil");
//! ```
//!
//! You may look at the tests of `client/mechanisms/scram.rs` for examples of
//! more advanced usage.

mod error;

pub use crate::error::Error;

pub mod client;
pub mod common;
pub mod secret;
pub mod server;
