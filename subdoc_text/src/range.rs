//! Auto-adjusting ranges anchored in live buffer text.

use crate::buffer::BufferInner;
use crate::event::BufferEdit;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub(crate) struct RangeInner {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) valid: bool,
}

impl RangeInner {
    /// Shifts the bounds to follow the anchored text across an applied
    /// edit. Both bounds are non-greedy: an insertion exactly at
    /// `start` pushes the range right, an insertion exactly at `end`
    /// stays outside it.
    pub(crate) fn adjust(&mut self, edit: &BufferEdit) {
        if !self.valid {
            return;
        }
        let delta = edit.delta();
        if edit.old_end() <= self.start {
            self.start = shifted(self.start, delta);
            self.end = shifted(self.end, delta);
        } else if edit.offset >= self.end {
            // Entirely after the range.
        } else if edit.offset <= self.start && edit.old_end() >= self.end {
            if edit.new_len == 0 {
                // The anchored text is gone.
                self.valid = false;
                return;
            }
            // A replacement swallowing the whole range re-anchors it
            // to the replacement text.
            self.start = edit.offset;
            self.end = edit.new_end();
        } else if edit.offset >= self.start && edit.old_end() <= self.end {
            self.end = shifted(self.end, delta);
        } else if edit.offset < self.start {
            // Left edge clipped: surviving text begins right after the
            // replacement.
            self.start = edit.new_end();
            self.end = shifted(self.end, delta);
        } else {
            // Right edge clipped.
            self.end = edit.offset;
        }
        if self.start == self.end {
            self.valid = false;
        }
    }
}

fn shifted(offset: usize, delta: isize) -> usize {
    let moved = offset as isize + delta;
    debug_assert!(moved >= 0, "range offset shifted below zero");
    moved as usize
}

/// An auto-adjusting `[start, end)` character interval anchored in a
/// [`TextBuffer`](crate::TextBuffer).
///
/// The range follows its anchored text as the buffer changes: edits
/// before it shift it, edits inside it grow or shrink it, and deleting
/// the anchored text invalidates it for good. The range holds no
/// strong reference to its buffer and also becomes invalid once the
/// buffer is dropped.
#[derive(Clone)]
pub struct TrackedRange {
    inner: Rc<RefCell<RangeInner>>,
    buffer: Weak<RefCell<BufferInner>>,
}

impl TrackedRange {
    pub(crate) fn new(buffer: Weak<RefCell<BufferInner>>, start: usize, end: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RangeInner {
                start,
                end,
                valid: true,
            })),
            buffer,
        }
    }

    pub(crate) fn weak_inner(&self) -> Weak<RefCell<RangeInner>> {
        Rc::downgrade(&self.inner)
    }

    /// Current start offset. Read on demand; never cache across edits.
    pub fn start(&self) -> usize {
        self.inner.borrow().start
    }

    /// Current end offset (exclusive).
    pub fn end(&self) -> usize {
        self.inner.borrow().end
    }

    /// Current length in characters.
    pub fn len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.end - inner.start
    }

    /// Returns true if the range currently spans no characters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// False once the anchored text has been deleted or the buffer
    /// dropped. Invalidity is terminal.
    pub fn is_valid(&self) -> bool {
        self.inner.borrow().valid && self.buffer.strong_count() > 0
    }
}
