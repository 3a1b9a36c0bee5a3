/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The x11-selstream contributors

Licensed under either of the Apache 2.0 or the MIT license at the
licensee's choice. The terms and conditions of the chosen license apply to
this file.
*/

//! [`futures_io::AsyncRead`] built on the same chunk-buffer primitive that
//! backs [`SelectionStream::read_begin`] and `std::io::Read`.
//!
//! Unlike `read_begin`, which stashes an owned destination across an
//! arbitrary span of time, `poll_read` only ever sees a borrowed buffer
//! valid for the duration of one call. So instead of stashing the buffer,
//! a pending poll stashes just the `Waker`: when the state machine makes
//! progress it wakes the parked task, which re-enters `poll_read` with a
//! fresh (still valid) buffer and this time finds data ready.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_io::AsyncRead;

use crate::adapter::X11Adapter;
use crate::stream::SelectionStream;

impl<A: X11Adapter> AsyncRead for SelectionStream<A> {
	fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
		let this = self.get_mut();
		let inner = this.inner();
		if inner.has_data() {
			return Poll::Ready(Ok(inner.fill(buf)));
		}
		inner.register_waker(cx.waker().clone());
		Poll::Pending
	}
}

#[cfg(test)]
mod tests {
	use std::rc::Rc;

	use futures_executor::block_on;
	use futures_io::AsyncReadExt;

	use crate::adapter::testing::MockAdapter;
	use crate::adapter::{PropertyValue, X11Adapter};
	use crate::stream::SelectionStream;

	#[test]
	fn async_read_resolves_once_the_mock_owner_answers() {
		let adapter = Rc::new(MockAdapter::new());
		let mut stream = SelectionStream::open(&adapter, "CLIPBOARD", "UTF8_STRING", 0).unwrap();

		let selection = adapter.intern_atom("CLIPBOARD").unwrap();
		let target = adapter.intern_atom("UTF8_STRING").unwrap();
		let calls = adapter.convert_selection_calls();
		let property = calls[0].property;

		adapter.set_property(
			crate::adapter::testing::MOCK_REQUESTOR_WINDOW,
			property,
			PropertyValue { type_atom: target, format: 8, data: b"abc".to_vec() },
		);
		adapter.inject_event(x11rb::protocol::Event::SelectionNotify(
			x11rb::protocol::xproto::SelectionNotifyEvent {
				response_type: 0,
				sequence: 0,
				time: 0,
				requestor: crate::adapter::testing::MOCK_REQUESTOR_WINDOW,
				selection,
				target,
				property,
			},
		));

		let mut buf = [0u8; 16];
		let n = block_on(stream.read(&mut buf)).unwrap();
		assert_eq!(&buf[..n], b"abc");
	}
}
