/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The x11-selstream contributors

Licensed under either of the Apache 2.0 or the MIT license at the
licensee's choice. The terms and conditions of the chosen license apply to
this file.
*/

//! A client-side X11 selection receiver.
//!
//! Given a selection name (`CLIPBOARD`, `PRIMARY`, ...) and a target type,
//! [`SelectionStream::open`] issues `ConvertSelection` and drives the
//! ICCCM selection-transfer state machine -- including the `INCR`
//! incremental sub-protocol for large transfers -- to completion, exposing
//! the result as a byte stream. Reads can be blocking ([`std::io::Read`]),
//! explicit-completion ([`SelectionStream::read_begin`]), or
//! [`futures_io::AsyncRead`].
//!
//! This crate only speaks the *receiving* half of the protocol: it never
//! answers a `SelectionRequest`, never negotiates a target on the caller's
//! behalf, and never imposes a timeout on an owner that stops answering.
//! It also never touches an X11 connection directly -- every protocol
//! operation goes through the [`X11Adapter`] trait, so the state machine
//! can run against a live connection ([`X11RbAdapter`]) or, with the
//! `test-util` feature, an in-memory one
//! ([`adapter::testing::MockAdapter`]).
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::io::Read;
//! use x11_selstream::{SelectionStream, X11RbAdapter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = Rc::new(X11RbAdapter::new(None)?);
//! let mut stream = SelectionStream::open(&adapter, "CLIPBOARD", "UTF8_STRING", 0)?;
//!
//! // Drive the adapter's event pump (on whatever thread owns the
//! // connection) until the read below observes EOF.
//! let mut contents = Vec::new();
//! stream.read_to_end(&mut contents)?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod chunk;
mod error;
mod reader;
mod stream;

pub use adapter::{Atom, Event, FilterId, FilterResult, PropertyValue, Window, X11Adapter, X11RbAdapter};
pub use error::OpenError;
pub use stream::{ReadSlot, SelectionStream};

#[cfg(any(test, feature = "test-util"))]
pub use adapter::testing;
