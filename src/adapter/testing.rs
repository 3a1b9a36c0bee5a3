/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The x11-selstream contributors

Licensed under either of the Apache 2.0 or the MIT license at the
licensee's choice. The terms and conditions of the chosen license apply to
this file.
*/

//! An in-memory [`X11Adapter`] used by the test suite.
//!
//! There is no real X server involved: a test drives a [`MockAdapter`] by
//! calling [`MockAdapter::set_property`] (simulating the owner writing a
//! reply) and [`MockAdapter::inject_event`] (simulating the X server
//! delivering `SelectionNotify`/`PropertyNotify`), then inspects
//! [`MockAdapter::deleted_properties`] / [`MockAdapter::convert_selection_calls`]
//! to assert the state machine did the right thing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{Atom, EventFilter, FilterId, FilterResult, PropertyValue, Window, X11Adapter};

/// A single recorded `ConvertSelection` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSelectionCall {
	pub selection: Atom,
	pub target: Atom,
	pub property: Atom,
	pub timestamp: u32,
}

/// The requestor/leader window every [`MockAdapter`] uses.
pub const MOCK_REQUESTOR_WINDOW: Window = 1;

#[derive(Default)]
struct State {
	atoms_by_name: HashMap<String, Atom>,
	next_atom: u64,
	properties: HashMap<(Window, Atom), PropertyValue>,
	convert_selection_calls: Vec<ConvertSelectionCall>,
	deleted_properties: Vec<(Window, Atom)>,
}

pub struct MockAdapter {
	state: Mutex<State>,
	filters: Mutex<Vec<(FilterId, EventFilter)>>,
	next_filter_id: AtomicU64,
}

impl MockAdapter {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(State { next_atom: 1, ..State::default() }),
			filters: Mutex::new(Vec::new()),
			next_filter_id: AtomicU64::new(0),
		}
	}

	/// Simulate the owner writing `value` to `property` on `window` --
	/// whatever a stream reads back from `get_window_property` after this
	/// call (and before a matching [`Self::delete_property`]) will see it.
	pub fn set_property(&self, window: Window, property: Atom, value: PropertyValue) {
		self.state.lock().properties.insert((window, property), value);
	}

	/// Remove a property without going through the adapter trait (e.g. to
	/// simulate the owner clearing stale state between chunks).
	pub fn clear_property(&self, window: Window, property: Atom) {
		self.state.lock().properties.remove(&(window, property));
	}

	/// Deliver `event` to every registered filter, exactly as
	/// [`X11RbAdapter`](super::X11RbAdapter)'s `pump_events` would.
	pub fn inject_event(&self, event: x11rb::protocol::Event) {
		let mut filters = self.filters.lock();
		for (_, filter) in filters.iter_mut() {
			match filter(&event) {
				FilterResult::Continue => continue,
				FilterResult::Remove | FilterResult::Translate => break,
			}
		}
	}

	/// How many filters are currently registered. A stream that has
	/// completed and torn down correctly leaves this at the count it had
	/// before the stream was opened.
	pub fn filter_count(&self) -> usize {
		self.filters.lock().len()
	}

	/// The `ConvertSelection` calls issued so far, in order.
	pub fn convert_selection_calls(&self) -> Vec<ConvertSelectionCall> {
		self.state.lock().convert_selection_calls.clone()
	}

	/// The `(window, property)` pairs deleted so far, in order. Each
	/// successful property read in the state machine is immediately
	/// followed by an `XDeleteProperty`, so this also tells a test how many
	/// reads happened.
	pub fn deleted_properties(&self) -> Vec<(Window, Atom)> {
		self.state.lock().deleted_properties.clone()
	}
}

impl Default for MockAdapter {
	fn default() -> Self {
		Self::new()
	}
}

impl X11Adapter for MockAdapter {
	fn intern_atom(&self, name: &str) -> std::io::Result<Atom> {
		let mut state = self.state.lock();
		if let Some(atom) = state.atoms_by_name.get(name) {
			return Ok(*atom);
		}
		let atom = state.next_atom;
		state.next_atom += 1;
		state.atoms_by_name.insert(name.to_owned(), atom);
		Ok(atom)
	}

	fn requestor_window(&self) -> Window {
		MOCK_REQUESTOR_WINDOW
	}

	fn convert_selection(
		&self,
		selection: Atom,
		target: Atom,
		property: Atom,
		timestamp: u32,
	) -> std::io::Result<()> {
		self.state.lock().convert_selection_calls.push(ConvertSelectionCall {
			selection,
			target,
			property,
			timestamp,
		});
		Ok(())
	}

	fn get_window_property(
		&self,
		window: Window,
		property: Atom,
	) -> std::io::Result<Option<PropertyValue>> {
		Ok(self.state.lock().properties.get(&(window, property)).cloned())
	}

	fn delete_property(&self, window: Window, property: Atom) -> std::io::Result<()> {
		let mut state = self.state.lock();
		state.properties.remove(&(window, property));
		state.deleted_properties.push((window, property));
		Ok(())
	}

	fn add_event_filter(&self, filter: EventFilter) -> FilterId {
		let id = FilterId(self.next_filter_id.fetch_add(1, Ordering::Relaxed));
		self.filters.lock().push((id, filter));
		id
	}

	fn remove_event_filter(&self, id: FilterId) {
		self.filters.lock().retain(|(filter_id, _)| *filter_id != id);
	}
}
