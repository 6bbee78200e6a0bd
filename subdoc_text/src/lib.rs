//! Subdoc text substrate - shared buffers, edit events, tracked ranges.
//!
//! This crate contains the text storage layer without any knowledge of
//! projections or synchronization: a clonable [`TextBuffer`] handle
//! over a rope, synchronous edit notifications, and [`TrackedRange`]
//! markers that follow their anchored text across edits.

pub mod buffer;
pub mod event;
pub mod range;

pub use buffer::{EditError, TextBuffer};
pub use event::{BufferEdit, ListenerId};
pub use range::TrackedRange;
