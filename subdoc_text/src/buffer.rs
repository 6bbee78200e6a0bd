//! Shared text buffer with edit notifications, backed by ropey.

use crate::event::{BufferEdit, ListenerId};
use crate::range::{RangeInner, TrackedRange};
use ropey::Rope;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// Error returned by buffer mutation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    /// The buffer's writable flag is off.
    #[error("buffer is not writable")]
    ReadOnly,
}

type Listener = Rc<dyn Fn(&BufferEdit)>;

pub(crate) struct BufferInner {
    rope: Rope,
    writable: bool,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
    ranges: Vec<Weak<RefCell<RangeInner>>>,
}

impl BufferInner {
    fn adjust_ranges(&mut self, edit: &BufferEdit) {
        // Dropped ranges fall out of the list here.
        self.ranges.retain(|weak| match weak.upgrade() {
            Some(range) => {
                range.borrow_mut().adjust(edit);
                true
            }
            None => false,
        });
    }
}

/// A mutable text buffer shared by handle.
///
/// Cloning the handle shares the underlying storage. All offsets are
/// character indices. The buffer is single-threaded by design:
/// listeners run synchronously inside [`replace`](Self::replace), and
/// may themselves edit this or another buffer before the outer call
/// returns.
#[derive(Clone)]
pub struct TextBuffer {
    inner: Rc<RefCell<BufferInner>>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// Creates a new empty, writable buffer.
    pub fn new() -> Self {
        Self::from_str("")
    }

    /// Creates a writable buffer holding `text`.
    pub fn from_str(text: &str) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BufferInner {
                rope: Rope::from_str(text),
                writable: true,
                listeners: Vec::new(),
                next_listener_id: 0,
                ranges: Vec::new(),
            })),
        }
    }

    /// Returns the total number of characters in the buffer.
    pub fn len_chars(&self) -> usize {
        self.inner.borrow().rope.len_chars()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Returns the entire buffer as a string.
    pub fn text(&self) -> String {
        self.inner.borrow().rope.to_string()
    }

    /// Returns the contents of `[start, end)`.
    ///
    /// Panics if the range is reversed or out of bounds; callers hand
    /// in offsets they derived from this buffer, so a bad range is a
    /// bookkeeping bug, not an input error.
    pub fn text_in(&self, start: usize, end: usize) -> String {
        let inner = self.inner.borrow();
        let len = inner.rope.len_chars();
        assert!(
            start <= end && end <= len,
            "text range {start}..{end} out of bounds (len {len})"
        );
        inner.rope.slice(start..end).to_string()
    }

    /// Returns whether the buffer currently accepts edits.
    pub fn is_writable(&self) -> bool {
        self.inner.borrow().writable
    }

    /// Sets the writable flag. Does not notify listeners.
    pub fn set_writable(&self, writable: bool) {
        self.inner.borrow_mut().writable = writable;
    }

    /// Registers an edit listener, returning a handle for
    /// [`unsubscribe`](Self::unsubscribe).
    ///
    /// Listeners are invoked synchronously during `replace`, after the
    /// text and all tracked ranges have been updated.
    pub fn subscribe(&self, listener: impl Fn(&BufferEdit) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, Rc::new(listener)));
        id
    }

    /// Removes a previously registered listener. Unknown ids are
    /// ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner
            .borrow_mut()
            .listeners
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Creates an auto-adjusting range anchored at `[start, end)`.
    pub fn track(&self, start: usize, end: usize) -> TrackedRange {
        let mut inner = self.inner.borrow_mut();
        let len = inner.rope.len_chars();
        assert!(
            start <= end && end <= len,
            "tracked range {start}..{end} out of bounds (len {len})"
        );
        let range = TrackedRange::new(Rc::downgrade(&self.inner), start, end);
        inner.ranges.push(range.weak_inner());
        range
    }

    /// Replaces `[start, end)` with `new_text`.
    ///
    /// The edit is normalized first: characters shared at the edges of
    /// the removed and inserted text stay untouched, and a replacement
    /// that changes nothing is a no-op that notifies no one. Tracked
    /// ranges adjust before listeners run, so a listener always
    /// observes post-edit bounds.
    ///
    /// Returns [`EditError::ReadOnly`] when the buffer is not
    /// writable. Panics if the range is reversed or out of bounds.
    pub fn replace(&self, start: usize, end: usize, new_text: &str) -> Result<(), EditError> {
        let edit = {
            let mut inner = self.inner.borrow_mut();
            let len = inner.rope.len_chars();
            assert!(
                start <= end && end <= len,
                "replace range {start}..{end} out of bounds (len {len})"
            );
            if !inner.writable {
                return Err(EditError::ReadOnly);
            }
            let Some((at, remove_len, insert)) = normalize(&inner.rope, start, end, new_text)
            else {
                return Ok(());
            };
            if remove_len > 0 {
                inner.rope.remove(at..at + remove_len);
            }
            if !insert.is_empty() {
                inner.rope.insert(at, &insert);
            }
            let edit = BufferEdit {
                offset: at,
                old_len: remove_len,
                new_len: insert.chars().count(),
            };
            inner.adjust_ranges(&edit);
            edit
        };
        // The borrow is released before dispatch so listeners can edit
        // this buffer re-entrantly.
        self.notify(&edit);
        Ok(())
    }

    /// Inserts `text` at the given character index.
    pub fn insert(&self, at: usize, text: &str) -> Result<(), EditError> {
        self.replace(at, at, text)
    }

    /// Removes the text in `[start, end)`.
    pub fn remove(&self, start: usize, end: usize) -> Result<(), EditError> {
        self.replace(start, end, "")
    }

    fn notify(&self, edit: &BufferEdit) {
        // Snapshot so listeners may subscribe or unsubscribe while the
        // dispatch is in flight.
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(edit);
        }
    }
}

/// Trims the common prefix and suffix off a replacement, returning the
/// offset, removed length, and inserted text that actually change the
/// buffer, or `None` when the replacement is textually a no-op.
fn normalize(rope: &Rope, start: usize, end: usize, new_text: &str) -> Option<(usize, usize, String)> {
    let old: Vec<char> = rope.slice(start..end).chars().collect();
    let new: Vec<char> = new_text.chars().collect();

    let max_common = old.len().min(new.len());
    let mut prefix = 0;
    while prefix < max_common && old[prefix] == new[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < max_common - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let remove_len = old.len() - prefix - suffix;
    let insert: String = new[prefix..new.len() - suffix].iter().collect();
    if remove_len == 0 && insert.is_empty() {
        return None;
    }
    Some((start + prefix, remove_len, insert))
}
