/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The x11-selstream contributors

Licensed under either of the Apache 2.0 or the MIT license at the
licensee's choice. The terms and conditions of the chosen license apply to
this file.
*/

//! The ordered queue of byte chunks a transfer in progress appends to, and
//! the drain algorithm (`fill_buffer`) a reader pulls from -- the data path
//! underneath every read style this crate exposes (blocking `Read`,
//! `read_begin`, `AsyncRead`).

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

/// A zero-length [`Bytes`] marks end of stream. It is pushed exactly once,
/// by the transfer state machine on completion, and is never consumed by a
/// read -- `fill_buffer` always puts it back.
pub(crate) fn is_eof_sentinel(chunk: &Bytes) -> bool {
	chunk.is_empty()
}

pub(crate) struct ChunkBuffer {
	queue: Mutex<VecDeque<Bytes>>,
	available: Condvar,
}

impl ChunkBuffer {
	pub fn new() -> Self {
		Self { queue: Mutex::new(VecDeque::new()), available: Condvar::new() }
	}

	/// Append a chunk and wake whoever is blocked in
	/// [`pop_front_blocking`](Self::pop_front_blocking) or
	/// [`fill_buffer`](Self::fill_buffer).
	pub fn push_back(&self, chunk: Bytes) {
		let mut queue = self.queue.lock();
		queue.push_back(chunk);
		self.available.notify_all();
	}

	/// Put a chunk back at the head -- used to return an unconsumed residual
	/// slice, or to put the EOF sentinel back after peeking it.
	pub fn push_front(&self, chunk: Bytes) {
		let mut queue = self.queue.lock();
		queue.push_front(chunk);
		self.available.notify_all();
	}

	/// Block until at least one chunk is queued, then return it.
	pub fn pop_front_blocking(&self) -> Bytes {
		let mut queue = self.queue.lock();
		loop {
			if let Some(chunk) = queue.pop_front() {
				return chunk;
			}
			self.available.wait(&mut queue);
		}
	}

	/// Return `None` immediately rather than blocking if nothing is queued.
	pub fn try_pop_front(&self) -> Option<Bytes> {
		self.queue.lock().pop_front()
	}

	/// Number of chunks currently buffered, including the EOF sentinel if
	/// already pushed.
	pub fn len(&self) -> usize {
		self.queue.lock().len()
	}

	/// `true` once at least one chunk (possibly the sentinel) is buffered.
	/// Combined with a stream's `complete` flag, this is the "has data"
	/// check `read_begin` uses to decide whether it can complete
	/// synchronously -- in practice the two coincide, since completion
	/// always pushes the sentinel before anyone can observe
	/// `complete == true`.
	pub fn has_data(&self) -> bool {
		self.len() > 0
	}

	/// One blocking wait for the first chunk via [`Self::pop_front_blocking`],
	/// then opportunistic non-blocking draining of whatever else is already
	/// queued, stopping at `count` bytes or the EOF sentinel, whichever comes
	/// first. `dest == None` means "count but discard".
	pub fn fill_buffer(&self, mut dest: Option<&mut [u8]>, count: usize) -> usize {
		if count == 0 {
			return 0;
		}

		let mut remaining = count;
		let mut written = 0usize;
		let mut current = Some(self.pop_front_blocking());
		let mut queue = self.queue.lock();

		while let Some(chunk) = current {
			if remaining == 0 {
				queue.push_front(chunk);
				break;
			}

			if is_eof_sentinel(&chunk) {
				queue.push_front(chunk);
				break;
			}

			let len = chunk.len();
			if len > remaining {
				if let Some(buf) = dest.as_deref_mut() {
					buf[written..written + remaining].copy_from_slice(&chunk[..remaining]);
				}
				let residual = chunk.slice(remaining..);
				queue.push_front(residual);
				written += remaining;
				remaining = 0;
				break;
			}

			if let Some(buf) = dest.as_deref_mut() {
				buf[written..written + len].copy_from_slice(&chunk[..]);
			}
			written += len;
			remaining -= len;
			current = queue.pop_front();
		}

		written
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fill_buffer_splits_a_chunk_across_reads() {
		let buf = ChunkBuffer::new();
		buf.push_back(Bytes::from_static(b"hello"));

		let mut dest = [0u8; 2];
		assert_eq!(buf.fill_buffer(Some(&mut dest), 2), 2);
		assert_eq!(&dest, b"he");

		assert_eq!(buf.fill_buffer(Some(&mut dest), 2), 2);
		assert_eq!(&dest, b"ll");

		let mut dest1 = [0u8; 2];
		assert_eq!(buf.fill_buffer(Some(&mut dest1), 2), 1);
		assert_eq!(&dest1[..1], b"o");
	}

	#[test]
	fn fill_buffer_drains_multiple_queued_chunks_in_one_call() {
		let buf = ChunkBuffer::new();
		buf.push_back(Bytes::from_static(b"hello "));
		buf.push_back(Bytes::from_static(b"world"));

		let mut dest = [0u8; 32];
		let n = buf.fill_buffer(Some(&mut dest), 32);
		assert_eq!(&dest[..n], b"hello world");
	}

	#[test]
	fn fill_buffer_stops_at_and_preserves_the_sentinel() {
		let buf = ChunkBuffer::new();
		buf.push_back(Bytes::from_static(b"ok"));
		buf.push_back(Bytes::new());

		let mut dest = [0u8; 32];
		assert_eq!(buf.fill_buffer(Some(&mut dest), 32), 2);
		assert_eq!(buf.fill_buffer(Some(&mut dest), 32), 0);
		assert_eq!(buf.fill_buffer(Some(&mut dest), 32), 0);
		assert_eq!(buf.len(), 1);
	}

	#[test]
	fn pop_front_blocking_returns_a_chunk_already_queued() {
		let buf = ChunkBuffer::new();
		buf.push_back(Bytes::from_static(b"hi"));
		assert_eq!(buf.pop_front_blocking(), Bytes::from_static(b"hi"));
		assert_eq!(buf.len(), 0);
	}

	#[test]
	fn push_front_reinserts_a_residual_slice_ahead_of_later_chunks() {
		let buf = ChunkBuffer::new();
		buf.push_back(Bytes::from_static(b"world"));
		buf.push_front(Bytes::from_static(b"hello "));

		let mut dest = [0u8; 32];
		let n = buf.fill_buffer(Some(&mut dest), 32);
		assert_eq!(&dest[..n], b"hello world");
	}
}
