/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2022 The Arboard contributors
Copyright 2026 The x11-selstream contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

//! The thin X11 collaborator the transfer state machine is built against.
//!
//! Everything in this module is a seam: the core never touches a connection,
//! an event pump, or a window directly. It only calls through [`X11Adapter`].
//! See `x11rb_adapter` for the real binding and `testing` for the in-memory
//! one used by the test suite.

mod x11rb_adapter;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use x11rb_adapter::X11RbAdapter;

pub use x11rb::protocol::xproto::{Atom, Window};
pub use x11rb::protocol::Event;

/// What a registered event filter tells the dispatcher to do with the event
/// it was just handed. Named after (and semantically equivalent to) GDK's
/// `GdkFilterReturn`, which is the real-world precedent for this exact
/// "duck-typed" three-way split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
	/// Leave the event in front of the next filter / the application's own
	/// event loop.
	Continue,
	/// This filter consumed the event; no one else should see it.
	Remove,
	/// The event was translated into some higher-level form and the raw
	/// event should not propagate further. Unused by this core (no input
	/// method composition happens here) but kept for fidelity with the
	/// interface this core binds to.
	Translate,
}

/// Identifies a registered event filter so it can later be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(pub(crate) u64);

/// The result of a successful `GetProperty`.
///
/// `format` is always one of 8, 16, or 32; `data` already has its length
/// derived from `format` and `nitems` the way `XGetWindowProperty` reports
/// them -- callers never need to scale it themselves.
#[derive(Debug, Clone)]
pub struct PropertyValue {
	pub type_atom: Atom,
	pub format: u8,
	pub data: Vec<u8>,
}

/// A boxed callback invoked by the adapter for every X11 event delivered to
/// the requestor window. Stored keyed by [`FilterId`] so it can be removed
/// again once a stream completes.
pub type EventFilter = Box<dyn FnMut(&Event) -> FilterResult>;

/// The seam between the transfer state machine and an X11 connection.
///
/// A real implementation ([`X11RbAdapter`]) owns the connection, the
/// requestor ("leader") window, and the event-filter dispatch table. The
/// core never assumes anything about *how* events are pumped into
/// `add_event_filter`'s callbacks -- only that they eventually are, on
/// whatever thread the adapter's owner chooses to pump from.
pub trait X11Adapter {
	/// Intern an atom by name. Round-trips to the server unless the adapter
	/// caches it.
	fn intern_atom(&self, name: &str) -> std::io::Result<Atom>;

	/// The atom for the literal string `"INCR"`, used to recognize an
	/// incremental transfer announcement per ICCCM's `INCR` sub-protocol.
	fn incr_atom(&self) -> std::io::Result<Atom> {
		self.intern_atom("INCR")
	}

	/// The window on which replies are received -- the "requestor" in ICCCM
	/// terms, typically a hidden leader window owned by the adapter.
	fn requestor_window(&self) -> Window;

	/// Issue `XConvertSelection(selection, target, property, requestor_window, timestamp)`.
	fn convert_selection(
		&self,
		selection: Atom,
		target: Atom,
		property: Atom,
		timestamp: u32,
	) -> std::io::Result<()>;

	/// `XGetWindowProperty` with `AnyPropertyType` and a length bound large
	/// enough to read the whole property in one call. Returns `Ok(None)`
	/// when the property does not exist (`type == None`).
	fn get_window_property(
		&self,
		window: Window,
		property: Atom,
	) -> std::io::Result<Option<PropertyValue>>;

	/// `XDeleteProperty`. In the `INCR` protocol this is the signal to the
	/// owner that the receiver is ready for (or has consumed) the next
	/// chunk.
	fn delete_property(&self, window: Window, property: Atom) -> std::io::Result<()>;

	/// Register a filter invoked for every event the adapter observes on
	/// `requestor_window()`. Returns an id usable with
	/// [`remove_event_filter`](Self::remove_event_filter).
	fn add_event_filter(&self, filter: EventFilter) -> FilterId;

	/// Deregister a previously-registered filter. A no-op if it is already
	/// gone (tolerates a stream completing and tearing down the filter itself
	/// just before the caller also asks to remove it).
	fn remove_event_filter(&self, id: FilterId);
}
