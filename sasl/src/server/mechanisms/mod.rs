// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the server side of a few SASL mechanisms.

#[cfg(feature = "anonymous")]
mod anonymous;
mod plain;

#[cfg(feature = "scram")]
mod scram;

#[cfg(feature = "anonymous")]
pub use self::anonymous::Anonymous;
pub use self::plain::Plain;

#[cfg(feature = "scram")]
pub use self::scram::Scram;
