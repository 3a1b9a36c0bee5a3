/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The x11-selstream contributors

Licensed under either of the Apache 2.0 or the MIT license at the
licensee's choice. The terms and conditions of the chosen license apply to
this file.
*/

//! End-to-end transfer scenarios and protocol invariants, run against
//! `MockAdapter` -- no X server involved.

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use x11_selstream::testing::{MockAdapter, MOCK_REQUESTOR_WINDOW};
use x11_selstream::{PropertyValue, ReadSlot, SelectionStream, X11Adapter};
use x11rb::protocol::xproto::{Property, PropertyNotifyEvent, SelectionNotifyEvent};
use x11rb::protocol::Event;
use x11rb::NONE;

fn selection_notify(selection: u32, target: u32, property: u32) -> Event {
	Event::SelectionNotify(SelectionNotifyEvent {
		response_type: 0,
		sequence: 0,
		time: 0,
		requestor: MOCK_REQUESTOR_WINDOW,
		selection,
		target,
		property,
	})
}

fn property_notify(atom: u32) -> Event {
	Event::PropertyNotify(PropertyNotifyEvent {
		response_type: 0,
		sequence: 0,
		window: MOCK_REQUESTOR_WINDOW,
		atom,
		time: 0,
		state: Property::NEW_VALUE,
	})
}

/// Opens a stream and returns `(adapter, stream, selection_atom, target_atom, property_atom)`.
fn open_stream(adapter: &Rc<MockAdapter>, selection: &str, target: &str) -> (SelectionStream<MockAdapter>, u32, u32, u32) {
	let stream = SelectionStream::open(adapter, selection, target, 0).unwrap();
	let selection_atom = adapter.intern_atom(selection).unwrap();
	let target_atom = adapter.intern_atom(target).unwrap();
	let property_atom = adapter.convert_selection_calls().last().unwrap().property;
	(stream, selection_atom, target_atom, property_atom)
}

#[test]
fn scenario_1_refusal() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (mut stream, selection, target, _property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");

	adapter.inject_event(selection_notify(selection, target, NONE));

	let mut buf = [0u8; 100];
	assert_eq!(stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn scenario_2_single_chunk() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (mut stream, selection, target, property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");

	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: target, format: 8, data: b"hello".to_vec() },
	);
	adapter.inject_event(selection_notify(selection, target, property));

	let mut buf = [0u8; 10];
	assert_eq!(stream.read(&mut buf).unwrap(), 5);
	assert_eq!(&buf[..5], b"hello");
	assert_eq!(stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn scenario_3_small_buffer_drain() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (mut stream, selection, target, property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");

	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: target, format: 8, data: b"hello".to_vec() },
	);
	adapter.inject_event(selection_notify(selection, target, property));

	let mut buf = [0u8; 2];
	assert_eq!(stream.read(&mut buf).unwrap(), 2);
	assert_eq!(&buf, b"he");
	assert_eq!(stream.read(&mut buf).unwrap(), 2);
	assert_eq!(&buf, b"ll");
	assert_eq!(stream.read(&mut buf).unwrap(), 1);
	assert_eq!(&buf[..1], b"o");
	assert_eq!(stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn scenario_4_incr() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (mut stream, selection, target, property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");
	let incr_atom = adapter.intern_atom("INCR").unwrap();

	// Announcement: type INCR, a size hint that is read and discarded.
	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: incr_atom, format: 32, data: 11u32.to_ne_bytes().to_vec() },
	);
	adapter.inject_event(selection_notify(selection, target, property));
	assert_eq!(adapter.deleted_properties().len(), 1);

	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: target, format: 8, data: b"hello ".to_vec() },
	);
	adapter.inject_event(property_notify(property));

	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: target, format: 8, data: b"world".to_vec() },
	);
	adapter.inject_event(property_notify(property));

	// Zero-length terminator.
	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: target, format: 8, data: Vec::new() },
	);
	adapter.inject_event(property_notify(property));

	let mut contents = Vec::new();
	stream.read_to_end(&mut contents).unwrap();
	assert_eq!(contents, b"hello world");
}

#[test]
fn scenario_5_async_parked_read() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (stream, selection, target, property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");

	let slot: ReadSlot = Rc::new(RefCell::new(vec![0u8; 16].into_boxed_slice()));
	let result = Rc::new(RefCell::new(None));

	{
		let result = Rc::clone(&result);
		stream.read_begin(Rc::clone(&slot), 16, move |n| {
			*result.borrow_mut() = Some(n);
		});
	}
	assert!(result.borrow().is_none(), "completion must not fire before data arrives");

	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: target, format: 8, data: b"abc".to_vec() },
	);
	adapter.inject_event(selection_notify(selection, target, property));

	assert_eq!(*result.borrow(), Some(3));
	assert_eq!(&slot.borrow()[..3], b"abc");

	// A stream that already observed EOF completes synchronously with 0.
	let second_slot: ReadSlot = Rc::new(RefCell::new(vec![0u8; 16].into_boxed_slice()));
	let second_result = Rc::new(RefCell::new(None));
	{
		let second_result = Rc::clone(&second_result);
		stream.read_begin(second_slot, 16, move |n| {
			*second_result.borrow_mut() = Some(n);
		});
	}
	assert_eq!(*second_result.borrow(), Some(0));
}

#[test]
fn scenario_6_format_32_widens_to_platform_long() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (mut stream, selection, target, property) = open_stream(&adapter, "CLIPBOARD", "ATOM");

	let mut data = Vec::new();
	for v in [10u32, 20, 30] {
		data.extend_from_slice(&v.to_ne_bytes());
	}
	adapter.set_property(MOCK_REQUESTOR_WINDOW, property, PropertyValue { type_atom: target, format: 32, data });
	adapter.inject_event(selection_notify(selection, target, property));

	let mut buf = [0u8; 64];
	let n = stream.read(&mut buf).unwrap();
	assert_eq!(n, 3 * std::mem::size_of::<std::os::raw::c_long>());
}

#[test]
fn invariant_eof_is_sticky() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (mut stream, selection, target, _property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");
	adapter.inject_event(selection_notify(selection, target, NONE));

	let mut buf = [0u8; 4];
	for _ in 0..5 {
		assert_eq!(stream.read(&mut buf).unwrap(), 0);
	}
}

#[test]
fn invariant_byte_conservation_across_incr_chunks() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let (mut stream, selection, target, property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");
	let incr_atom = adapter.intern_atom("INCR").unwrap();

	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: incr_atom, format: 32, data: 0u32.to_ne_bytes().to_vec() },
	);
	adapter.inject_event(selection_notify(selection, target, property));

	let chunks: &[&[u8]] = &[b"one-", b"two-", b"three"];
	for chunk in chunks {
		adapter.set_property(
			MOCK_REQUESTOR_WINDOW,
			property,
			PropertyValue { type_atom: target, format: 8, data: chunk.to_vec() },
		);
		adapter.inject_event(property_notify(property));
	}
	adapter.set_property(
		MOCK_REQUESTOR_WINDOW,
		property,
		PropertyValue { type_atom: target, format: 8, data: Vec::new() },
	);
	adapter.inject_event(property_notify(property));

	let mut contents = Vec::new();
	stream.read_to_end(&mut contents).unwrap();
	assert_eq!(contents, b"one-two-three".to_vec());
}

#[test]
fn invariant_property_atoms_are_unique_per_concurrent_stream() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());

	let (_s1, _, _, property1) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");
	let (_s2, _, _, property2) = open_stream(&adapter, "PRIMARY", "UTF8_STRING");
	let (_s3, _, _, property3) = open_stream(&adapter, "CLIPBOARD", "TEXT");

	assert_ne!(property1, property2);
	assert_ne!(property2, property3);
	assert_ne!(property1, property3);
}

#[test]
fn dropping_an_incomplete_stream_forces_completion_and_deregisters_the_filter() {
	let _ = env_logger::try_init();
	let adapter = Rc::new(MockAdapter::new());
	let before = adapter.filter_count();
	{
		let (_stream, _selection, _target, _property) = open_stream(&adapter, "CLIPBOARD", "UTF8_STRING");
		assert_eq!(adapter.filter_count(), before + 1);
	}
	assert_eq!(adapter.filter_count(), before);
}
