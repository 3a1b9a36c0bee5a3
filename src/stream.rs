/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The x11-selstream contributors

Licensed under either of the Apache 2.0 or the MIT license at the
licensee's choice. The terms and conditions of the chosen license apply to
this file.
*/

//! The ICCCM selection-transfer state machine, including the `INCR`
//! incremental sub-protocol, and the stream handle it drives.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Waker;

use bytes::Bytes;
use log::{debug, trace, warn};
use x11rb::protocol::xproto::{Property, PropertyNotifyEvent, SelectionNotifyEvent};
use x11rb::NONE;

use crate::adapter::{Atom, Event, FilterId, FilterResult, PropertyValue, Window, X11Adapter};
use crate::chunk::ChunkBuffer;
use crate::error::OpenError;

/// A destination buffer shared between a caller of
/// [`SelectionStream::read_begin`] and the stream itself: the stream writes
/// into it when the read completes (synchronously or from the event
/// filter), the caller reads the same bytes back out through its own clone
/// of the `Rc`.
pub type ReadSlot = Rc<RefCell<Box<[u8]>>>;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

struct PendingRead {
	slot: ReadSlot,
	count: usize,
	completion: Box<dyn FnOnce(usize)>,
}

/// One in-flight selection transfer.
///
/// Generic over the adapter so tests can run the exact same state machine
/// against [`crate::adapter::testing::MockAdapter`] that production code
/// runs against [`crate::adapter::X11RbAdapter`].
pub(crate) struct StreamInner<A: X11Adapter> {
	adapter: Rc<A>,
	requestor_window: Window,
	selection_name: String,
	target_name: String,
	selection_atom: Atom,
	target_atom: Atom,
	property_atom: Atom,
	incr_atom: Atom,
	chunks: ChunkBuffer,
	pending_read: RefCell<Option<PendingRead>>,
	waker: RefCell<Option<Waker>>,
	complete: std::cell::Cell<bool>,
	incr_mode: std::cell::Cell<bool>,
	filter_id: std::cell::Cell<Option<FilterId>>,
}

impl<A: X11Adapter> StreamInner<A> {
	/// `true` once a reader can be served without blocking: either bytes (or
	/// the EOF sentinel) are already queued, or the stream has completed
	/// (which always implies the sentinel was queued -- the `complete` half
	/// of this check exists only to stay correct during the brief window
	/// inside [`Self::complete_now`] before the sentinel push lands).
	pub(crate) fn has_data(&self) -> bool {
		self.chunks.has_data() || self.complete.get()
	}

	pub(crate) fn fill(&self, buf: &mut [u8]) -> usize {
		self.chunks.fill_buffer(Some(buf), buf.len())
	}

	pub(crate) fn register_waker(&self, waker: Waker) {
		*self.waker.borrow_mut() = Some(waker);
	}

	/// Called whenever the state machine makes progress. Resolves a parked
	/// [`SelectionStream::read_begin`] completion and/or wakes a parked
	/// [`futures_io::AsyncRead`] poll.
	fn flush(&self) {
		if self.has_data() {
			if let Some(pending) = self.pending_read.borrow_mut().take() {
				let n = {
					let mut slot = pending.slot.borrow_mut();
					self.chunks.fill_buffer(Some(&mut slot[..pending.count]), pending.count)
				};
				(pending.completion)(n);
			}
		}
		if let Some(waker) = self.waker.borrow_mut().take() {
			waker.wake();
		}
	}

	/// Idempotent terminal transition of a transfer: enqueue the EOF
	/// sentinel, resolve whatever is parked, and deregister the event
	/// filter.
	fn complete_now(&self) {
		if self.complete.get() {
			return;
		}
		self.complete.set(true);
		self.chunks.push_back(Bytes::new());
		self.flush();
		if let Some(id) = self.filter_id.take() {
			self.adapter.remove_event_filter(id);
		}
		debug!("selection {:?} target {:?} transfer complete", self.selection_name, self.target_name);
	}

	fn handle_event(&self, event: &Event) -> FilterResult {
		match event {
			Event::SelectionNotify(ev) => self.handle_selection_notify(ev),
			Event::PropertyNotify(ev) => self.handle_property_notify(ev),
			_ => FilterResult::Continue,
		}
	}

	/// Handles `SelectionNotify`, the owner's reply to `ConvertSelection`.
	fn handle_selection_notify(&self, ev: &SelectionNotifyEvent) -> FilterResult {
		if ev.requestor != self.requestor_window
			|| ev.selection != self.selection_atom
			|| ev.target != self.target_atom
			|| self.complete.get()
		{
			return FilterResult::Continue;
		}

		if ev.property == NONE {
			trace!("selection {:?} refused for target {:?}", self.selection_name, self.target_name);
			self.complete_now();
			return FilterResult::Remove;
		}

		let outcome = self.adapter.get_window_property(self.requestor_window, self.property_atom);
		if let Err(e) = self.adapter.delete_property(self.requestor_window, self.property_atom) {
			warn!("failed to delete selection property: {e}");
		}

		match outcome {
			Ok(Some(value)) if value.type_atom == self.incr_atom => {
				let size_hint = parse_incr_size_hint(&value.data);
				debug!(
					"selection {:?} target {:?} is an INCR transfer",
					self.selection_name, self.target_name
				);
				trace!(
					"INCR size hint for selection {:?}: {size_hint:?} bytes (advisory only, not used to size a buffer)",
					self.selection_name
				);
				self.incr_mode.set(true);
			}
			Ok(Some(value)) => {
				debug!(
					"selection {:?} target {:?} delivered {} bytes in a single property",
					self.selection_name,
					self.target_name,
					value.data.len()
				);
				self.chunks.push_back(property_bytes(&value));
				self.flush();
				self.complete_now();
			}
			Ok(None) => {
				warn!("selection property vanished before it could be read; treating as refusal");
				self.complete_now();
			}
			Err(e) => {
				warn!("failed to read selection property: {e}");
				self.complete_now();
			}
		}

		FilterResult::Remove
	}

	/// Handles `PropertyNotify`, delivered once per `INCR` chunk the owner
	/// writes after the initial announcement.
	fn handle_property_notify(&self, ev: &PropertyNotifyEvent) -> FilterResult {
		if ev.window != self.requestor_window
			|| ev.atom != self.property_atom
			|| !self.incr_mode.get()
			|| ev.state != Property::NEW_VALUE
			|| self.complete.get()
		{
			return FilterResult::Continue;
		}

		let outcome = self.adapter.get_window_property(self.requestor_window, self.property_atom);
		if let Err(e) = self.adapter.delete_property(self.requestor_window, self.property_atom) {
			warn!("failed to delete INCR chunk property: {e}");
		}

		match outcome {
			Ok(Some(value)) if !value.data.is_empty() => {
				trace!("INCR chunk for selection {:?}: {} bytes", self.selection_name, value.data.len());
				self.chunks.push_back(property_bytes(&value));
				self.flush();
			}
			Ok(Some(_)) => {
				trace!("INCR terminator for selection {:?}", self.selection_name);
				self.complete_now();
			}
			Ok(None) => {
				warn!("INCR chunk property unexpectedly absent; ending transfer");
				self.complete_now();
			}
			Err(e) => {
				warn!("failed to read INCR chunk property: {e}");
				self.complete_now();
			}
		}

		FilterResult::Continue
	}
}

/// Compute the byte chunk for a property read, scaling by `format`: format 8
/// and 16 are already exactly the wire bytes, but format 32 requires
/// widening each 4-byte wire value into a platform `long` to match what
/// `XGetWindowProperty` (and therefore every client speaking ICCCM in terms
/// of Xlib, GDK included) actually hands callers.
fn property_bytes(value: &PropertyValue) -> Bytes {
	if value.format != 32 {
		return Bytes::copy_from_slice(&value.data);
	}
	widen_format32(&value.data)
}

fn widen_format32(data: &[u8]) -> Bytes {
	let long_size = std::mem::size_of::<std::os::raw::c_long>();
	if long_size == 4 {
		return Bytes::copy_from_slice(data);
	}
	let mut out = Vec::with_capacity((data.len() / 4) * long_size);
	for word in data.chunks_exact(4) {
		let value = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]) as u64;
		out.extend_from_slice(&value.to_ne_bytes()[..long_size]);
	}
	Bytes::from(out)
}

/// The `INCR` announcement property carries a lower-bound size estimate as
/// its sole format-32 value. It exists purely as a diagnostic hint for the
/// receiver -- ICCCM does not require (and this crate does not attempt) any
/// pre-sizing of a destination buffer from it, since the real transfer can
/// legitimately exceed the hint.
fn parse_incr_size_hint(data: &[u8]) -> Option<u64> {
	let word: [u8; 4] = data.get(..4)?.try_into().ok()?;
	Some(u32::from_ne_bytes(word) as u64)
}

/// A live selection transfer. Cloning is not supported -- there is exactly
/// one handle per transfer, and at most one read (of any style) may be
/// parked on it at a time.
pub struct SelectionStream<A: X11Adapter> {
	inner: Rc<StreamInner<A>>,
}

impl<A: X11Adapter + 'static> SelectionStream<A> {
	/// Issue `XConvertSelection(selection_name, target_name)` against
	/// `adapter` and return a stream that will receive the reply.
	///
	/// `timestamp` is the X server time to pass to `ConvertSelection`
	/// (typically the timestamp of the user event that triggered the
	/// request, or `CurrentTime`).
	pub fn open(
		adapter: &Rc<A>,
		selection_name: &str,
		target_name: &str,
		timestamp: u32,
	) -> Result<Self, OpenError> {
		let selection_atom = adapter.intern_atom(selection_name).map_err(|e| OpenError::InternAtom {
			name: selection_name.to_owned(),
			description: e.to_string(),
		})?;
		let target_atom = adapter
			.intern_atom(target_name)
			.map_err(|e| OpenError::InternAtom { name: target_name.to_owned(), description: e.to_string() })?;
		let incr_atom = adapter
			.incr_atom()
			.map_err(|e| OpenError::InternAtom { name: "INCR".to_owned(), description: e.to_string() })?;

		let stream_id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
		let property_name = format!("_X11_SELSTREAM_{stream_id:016x}");
		let property_atom = adapter
			.intern_atom(&property_name)
			.map_err(|e| OpenError::InternAtom { name: property_name.clone(), description: e.to_string() })?;

		let requestor_window = adapter.requestor_window();

		let inner = Rc::new(StreamInner {
			adapter: Rc::clone(adapter),
			requestor_window,
			selection_name: selection_name.to_owned(),
			target_name: target_name.to_owned(),
			selection_atom,
			target_atom,
			property_atom,
			incr_atom,
			chunks: ChunkBuffer::new(),
			pending_read: RefCell::new(None),
			waker: RefCell::new(None),
			complete: std::cell::Cell::new(false),
			incr_mode: std::cell::Cell::new(false),
			filter_id: std::cell::Cell::new(None),
		});

		// The closure holds a strong `Rc` clone of `inner` for as long as it
		// stays registered, so the state machine stays alive to answer events
		// even if the caller drops its own `SelectionStream` handle first.
		let filter_inner = Rc::clone(&inner);
		let filter_id = adapter.add_event_filter(Box::new(move |event| filter_inner.handle_event(event)));
		inner.filter_id.set(Some(filter_id));

		if let Err(e) = adapter.convert_selection(selection_atom, target_atom, property_atom, timestamp) {
			adapter.remove_event_filter(filter_id);
			inner.filter_id.set(None);
			return Err(OpenError::ConvertSelection { description: e.to_string() });
		}

		trace!(
			"opened selection stream: selection={selection_name:?} target={target_name:?} property={property_name:?}"
		);

		Ok(Self { inner })
	}
}

impl<A: X11Adapter> SelectionStream<A> {
	pub(crate) fn inner(&self) -> &Rc<StreamInner<A>> {
		&self.inner
	}

	/// Submit an asynchronous read with explicit completion.
	///
	/// `slot` is the caller-owned destination; `completion` is invoked with
	/// the number of bytes written into it, either synchronously (if data
	/// was already available) or later, from within the event filter, once
	/// the state machine produces enough to satisfy the request or reaches
	/// EOF.
	///
	/// # Panics
	///
	/// Panics if a read is already parked -- only one read may be in flight
	/// on a stream at a time.
	pub fn read_begin(&self, slot: ReadSlot, count: usize, completion: impl FnOnce(usize) + 'static) {
		let count = count.min(slot.borrow().len());

		if self.inner.has_data() {
			let n = {
				let mut buf = slot.borrow_mut();
				self.inner.chunks.fill_buffer(Some(&mut buf[..count]), count)
			};
			completion(n);
			return;
		}

		let mut pending = self.inner.pending_read.borrow_mut();
		assert!(pending.is_none(), "read_begin: a read is already parked on this stream");
		*pending = Some(PendingRead { slot, count, completion: Box::new(completion) });
	}

	/// Synchronous teardown: forces completion if the transfer hadn't
	/// finished, resolving any parked read with whatever is already queued
	/// (0 if nothing was) and deregistering the event filter. Always
	/// succeeds; idempotent.
	pub fn close(&self) {
		self.inner.complete_now();
	}
}

impl<A: X11Adapter> std::io::Read for SelectionStream<A> {
	/// Blocking read: blocks until at least one chunk (possibly the EOF
	/// sentinel) is available, then drains as much as fits in `buf`. Returns
	/// `Ok(0)` only at EOF.
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		Ok(self.inner.fill(buf))
	}
}

impl<A: X11Adapter> Drop for SelectionStream<A> {
	/// Forces completion: a stream dropped mid-transfer still resolves any
	/// parked read and deregisters the event filter, even though the `Rc`
	/// the filter closure holds may keep the inner state alive a little
	/// longer.
	fn drop(&mut self) {
		self.inner.complete_now();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn widen_format32_scales_to_the_platform_long_width() {
		let wire = [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
		let widened = widen_format32(&wire);
		let long_size = std::mem::size_of::<std::os::raw::c_long>();
		assert_eq!(widened.len(), 3 * long_size);
	}

	#[test]
	fn property_bytes_passes_format_8_through_unchanged() {
		let value = PropertyValue { type_atom: 42, format: 8, data: b"hello".to_vec() };
		assert_eq!(property_bytes(&value), Bytes::from_static(b"hello"));
	}
}
