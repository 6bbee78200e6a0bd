//! Projection facade presenting a buffer range as its own document.

use crate::synchronizer::RangeSynchronizer;
use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;
use subdoc_text::TextBuffer;

/// Sub-text of another buffer, presented as a buffer of its own.
///
/// Wraps a [`RangeSynchronizer`]: consumers read and edit
/// [`document`](Self::document) like any buffer, and while the
/// fragment is assigned its content stays consistent with the tracked
/// range of the original.
pub struct FragmentContent {
    synchronizer: RangeSynchronizer,
    valid: Rc<Cell<bool>>,
}

impl FragmentContent {
    /// Creates a fragment over `range` of `original`.
    ///
    /// Panics if the range does not lie within the buffer.
    pub fn new(original: TextBuffer, range: Range<usize>) -> Self {
        let tracked = original.track(range.start, range.end);
        let synchronizer = RangeSynchronizer::new(original, tracked);
        let valid = Rc::new(Cell::new(true));
        let flag = Rc::clone(&valid);
        synchronizer.set_on_content_invalid(move || flag.set(false));
        Self {
            synchronizer,
            valid,
        }
    }

    /// The copy buffer holding the fragment's text.
    pub fn document(&self) -> TextBuffer {
        self.synchronizer.copy_buffer()
    }

    /// Turns live synchronization on or off, following the owner's
    /// assignment of this content to a viewer.
    pub fn set_assigned(&self, assigned: bool) {
        if assigned {
            self.synchronizer.activate();
        } else {
            self.synchronizer.deactivate();
        }
    }

    /// False once the fragment's anchored text has been deleted out of
    /// the original.
    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    /// Maps a fragment-local offset to the original buffer, e.g. for
    /// navigating from the projection back to the source.
    pub fn original_offset(&self, local: usize) -> usize {
        self.synchronizer.original_offset(local)
    }
}
