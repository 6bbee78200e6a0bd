//! Subdoc synchronization - live projection of a buffer range.
//!
//! [`RangeSynchronizer`] keeps a copy buffer equal to a tracked range
//! of an original buffer for as long as it is active;
//! [`FragmentContent`] is the thin facade a host hands to whatever
//! displays the projection.

pub mod fragment;
pub mod synchronizer;

pub use fragment::FragmentContent;
pub use synchronizer::RangeSynchronizer;
