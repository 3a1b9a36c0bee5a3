/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2022 The Arboard contributors
Copyright 2026 The x11-selstream contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use std::fmt;

/// Everything that can go wrong while opening a selection stream.
///
/// Anomalies that occur *after* a stream exists (the owner refusing the
/// conversion, a malformed property, a mid-`INCR` failure) are not
/// represented here: per the propagation policy, they collapse into end of
/// stream and are only observable through `log`.
#[derive(Debug)]
#[non_exhaustive]
pub enum OpenError {
	/// Interning an atom (the selection name, the target name, or the
	/// per-stream property name) failed.
	InternAtom { name: String, description: String },

	/// Issuing `ConvertSelection` to the adapter failed outright (as opposed
	/// to the owner simply never answering, which is not an error).
	ConvertSelection { description: String },

	/// Any other adapter-level failure that doesn't fit the above.
	Unknown { description: String },
}

impl fmt::Display for OpenError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OpenError::InternAtom { name, description } => {
				write!(f, "failed to intern atom {name:?}: {description}")
			}
			OpenError::ConvertSelection { description } => {
				write!(f, "failed to issue ConvertSelection: {description}")
			}
			OpenError::Unknown { description } => write!(f, "{description}"),
		}
	}
}

impl std::error::Error for OpenError {}

pub(crate) fn into_unknown<E: fmt::Display>(error: E) -> OpenError {
	OpenError::Unknown { description: error.to_string() }
}
