//! Bidirectional synchronization between a tracked range and its copy.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use subdoc_text::{BufferEdit, ListenerId, TextBuffer, TrackedRange};

/// Callback fired when the tracked range's anchored text stops
/// existing. Invoked at most once per synchronizer.
pub type InvalidCallback = Box<dyn FnMut()>;

struct SyncInner {
    original: TextBuffer,
    range: TrackedRange,
    copy: RefCell<Option<TextBuffer>>,
    active: Cell<bool>,
    invalidated: Cell<bool>,
    /// True only while the synchronizer itself writes into the copy.
    resyncing: Cell<bool>,
    original_listener: Cell<Option<ListenerId>>,
    copy_listener: Cell<Option<ListenerId>>,
    on_invalid: RefCell<Option<InvalidCallback>>,
}

/// Keeps a copy buffer equal to a tracked range of an original buffer.
///
/// While active, the synchronizer maintains the invariant
/// `copy.text() == original.text_in(range.start(), range.end())`.
/// Original-side edits trigger a full resync of the copy from the
/// current substring; copy-side edits are translated into a single
/// range-replace on the original. The write-back synchronously
/// re-fires the original-side listener, but the resync it triggers
/// reproduces text the copy already holds, so it applies no edit and
/// the loop terminates on idempotence rather than a recursion guard.
///
/// The copy mirrors the original's writability for its consumers.
/// Internal resync writes bypass the flag and restore it on the way
/// out; edits made to the copy while the original is read-only stay
/// local and are never written back.
pub struct RangeSynchronizer {
    inner: Rc<SyncInner>,
}

impl RangeSynchronizer {
    /// Creates an inactive synchronizer over `range`, which must be
    /// anchored in `original`.
    pub fn new(original: TextBuffer, range: TrackedRange) -> Self {
        Self {
            inner: Rc::new(SyncInner {
                original,
                range,
                copy: RefCell::new(None),
                active: Cell::new(false),
                invalidated: Cell::new(false),
                resyncing: Cell::new(false),
                original_listener: Cell::new(None),
                copy_listener: Cell::new(None),
                on_invalid: RefCell::new(None),
            }),
        }
    }

    /// Registers the callback fired when the tracked range's text no
    /// longer exists. Replaces any previously registered callback.
    pub fn set_on_content_invalid(&self, callback: impl FnMut() + 'static) {
        *self.inner.on_invalid.borrow_mut() = Some(Box::new(callback));
    }

    /// Returns the copy buffer, creating it from the current tracked
    /// substring on first use. The content is readable before
    /// activation, but no live sync happens until
    /// [`activate`](Self::activate).
    pub fn copy_buffer(&self) -> TextBuffer {
        self.inner.ensure_copy()
    }

    /// Translates a copy-local offset into original-buffer
    /// coordinates.
    pub fn original_offset(&self, local: usize) -> usize {
        self.inner.range.start() + local
    }

    /// Whether live synchronization is currently running.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Whether the synchronizer went permanently inert after its
    /// tracked range was invalidated.
    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.get()
    }

    /// Starts live synchronization: resyncs the copy from the current
    /// tracked substring, then listens on both buffers.
    ///
    /// The resync is eager on every activation, including
    /// reactivation after [`deactivate`](Self::deactivate) - content
    /// frozen at deactivation time is never trusted. A no-op while
    /// already active or after invalidation.
    pub fn activate(&self) {
        let inner = &self.inner;
        if inner.active.get() || inner.invalidated.get() {
            return;
        }
        let copy = inner.ensure_copy();
        // Re-assert the writability mirror; the original's flag may
        // have changed since the copy was created.
        copy.set_writable(inner.original.is_writable());
        inner.resync_copy();
        if inner.invalidated.get() {
            return;
        }

        let weak = Rc::downgrade(inner);
        let original_listener = inner.original.subscribe(move |_edit| {
            if let Some(inner) = weak.upgrade() {
                inner.on_original_edit();
            }
        });
        inner.original_listener.set(Some(original_listener));

        let weak = Rc::downgrade(inner);
        let copy_listener = copy.subscribe(move |edit| {
            if let Some(inner) = weak.upgrade() {
                inner.on_copy_edit(edit);
            }
        });
        inner.copy_listener.set(Some(copy_listener));

        inner.active.set(true);
    }

    /// Stops live synchronization. The copy keeps its last content;
    /// nothing propagates until the next [`activate`](Self::activate).
    pub fn deactivate(&self) {
        let inner = &self.inner;
        if !inner.active.get() {
            return;
        }
        inner.active.set(false);
        inner.detach_listeners();
    }
}

impl Drop for RangeSynchronizer {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl SyncInner {
    fn ensure_copy(&self) -> TextBuffer {
        if let Some(copy) = self.copy.borrow().as_ref() {
            return copy.clone();
        }
        let text = if self.range.is_valid() {
            self.original.text_in(self.range.start(), self.range.end())
        } else {
            String::new()
        };
        let copy = TextBuffer::from_str(&text);
        copy.set_writable(self.original.is_writable());
        *self.copy.borrow_mut() = Some(copy.clone());
        copy
    }

    fn detach_listeners(&self) {
        if let Some(id) = self.original_listener.take() {
            self.original.unsubscribe(id);
        }
        if let Some(id) = self.copy_listener.take() {
            if let Some(copy) = self.copy.borrow().as_ref() {
                copy.unsubscribe(id);
            }
        }
    }

    /// Original-to-copy propagation: any original edit triggers a
    /// whole-buffer resync of the copy.
    fn on_original_edit(&self) {
        if self.invalidated.get() {
            return;
        }
        self.resync_copy();
    }

    /// Replaces the copy's entire content with the current tracked
    /// substring of the original.
    fn resync_copy(&self) {
        if !self.range.is_valid() {
            self.invalidate();
            return;
        }
        let copy = self.ensure_copy();
        let new_text = self.original.text_in(self.range.start(), self.range.end());
        let guard = ResyncWrite::begin(self, &copy);
        let result = copy.replace(0, copy.len_chars(), &new_text);
        drop(guard);
        if let Err(err) = result {
            // Unreachable while the guard holds the copy writable.
            log::error!("resync into copy buffer failed: {err}");
        }
    }

    /// Copy-to-original propagation: translate the copy-local edit
    /// into original coordinates and apply it as one range-replace.
    fn on_copy_edit(&self, edit: &BufferEdit) {
        if self.invalidated.get() || self.resyncing.get() {
            // Our own resync write; nothing to forward.
            return;
        }
        if !self.range.is_valid() {
            self.invalidate();
            return;
        }
        if !self.original.is_writable() {
            // Read-only backing buffer: the copy keeps the edit
            // locally, nothing is written back.
            log::debug!(
                "dropping copy edit at {}: original buffer is read-only",
                edit.offset
            );
            return;
        }
        let copy = self.ensure_copy();
        let original_start = self.range.start() + edit.offset;
        let original_end = original_start + edit.old_len;
        let new_text = copy.text_in(edit.offset, edit.new_end());
        // Re-fires the original-side listener synchronously; the
        // resync that runs there reproduces the copy's current text
        // and applies no further edit.
        if let Err(err) = self.original.replace(original_start, original_end, &new_text) {
            log::error!("write-back into original buffer failed: {err}");
        }
    }

    /// Terminal: report once, detach, and never propagate again.
    fn invalidate(&self) {
        if self.invalidated.replace(true) {
            return;
        }
        self.active.set(false);
        self.detach_listeners();
        log::warn!("tracked range no longer exists; projection content is invalid");
        let callback = self.on_invalid.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback();
        }
    }
}

/// Scoped writability override for synchronizer-internal writes into
/// the copy. The copy mirrors the original's writability for its
/// consumers, but a resync must land even when the projection is
/// presented read-only; the mirror is restored on drop, on every exit
/// path.
struct ResyncWrite<'a> {
    inner: &'a SyncInner,
    copy: &'a TextBuffer,
}

impl<'a> ResyncWrite<'a> {
    fn begin(inner: &'a SyncInner, copy: &'a TextBuffer) -> Self {
        inner.resyncing.set(true);
        copy.set_writable(true);
        Self { inner, copy }
    }
}

impl Drop for ResyncWrite<'_> {
    fn drop(&mut self) {
        self.copy.set_writable(self.inner.original.is_writable());
        self.inner.resyncing.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn synced(text: &str, start: usize, end: usize) -> (TextBuffer, RangeSynchronizer) {
        let original = TextBuffer::from_str(text);
        let range = original.track(start, end);
        let sync = RangeSynchronizer::new(original.clone(), range);
        (original, sync)
    }

    #[test]
    fn test_original_edit_outside_range_resyncs_copy() {
        let (original, sync) = synced("hello world", 6, 11);
        sync.activate();
        let copy = sync.copy_buffer();
        assert_eq!(copy.text(), "world");

        original.insert(0, "oh ").unwrap();
        assert_eq!(original.text(), "oh hello world");
        assert_eq!(copy.text(), "world");

        original.replace(3, 8, "howdy").unwrap();
        assert_eq!(copy.text(), "world");
        assert_eq!(sync.original_offset(0), 9);
    }

    #[test]
    fn test_original_edit_inside_range_resyncs_copy() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        let copy = sync.copy_buffer();

        original.replace(1, 4, "ipp").unwrap();
        assert_eq!(original.text(), "hippo world");
        assert_eq!(copy.text(), "hippo");
    }

    #[test]
    fn test_copy_edit_round_trip() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        let copy = sync.copy_buffer();

        copy.replace(0, 5, "howdy").unwrap();
        assert_eq!(original.text(), "howdy world");
        assert_eq!(copy.text(), "howdy");
    }

    #[test]
    fn test_copy_insert_and_delete_propagate() {
        let (original, sync) = synced("abcdefgh", 2, 5);
        sync.activate();
        let copy = sync.copy_buffer();
        assert_eq!(copy.text(), "cde");

        copy.insert(1, "XY").unwrap();
        assert_eq!(original.text(), "abcXYdefgh");
        assert_eq!(copy.text(), "cXYde");

        copy.remove(0, 3).unwrap();
        assert_eq!(original.text(), "abdefgh");
        assert_eq!(copy.text(), "de");
    }

    #[test]
    fn test_read_only_original_keeps_copy_edit_local() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        let copy = sync.copy_buffer();

        original.set_writable(false);
        copy.set_writable(true);
        copy.replace(0, 5, "howdy").unwrap();

        assert_eq!(original.text(), "hello world");
        assert_eq!(copy.text(), "howdy");
    }

    #[test]
    fn test_invalidation_fires_once_and_goes_inert() {
        let (original, sync) = synced("abcdefgh", 2, 5);
        let fired = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&fired);
        sync.set_on_content_invalid(move || counter.set(counter.get() + 1));
        sync.activate();
        let copy = sync.copy_buffer();

        original.remove(2, 5).unwrap();
        assert_eq!(fired.get(), 1);
        assert!(sync.is_invalidated());
        assert!(!sync.is_active());

        // Further original edits no longer touch the copy.
        original.replace(0, 5, "something else").unwrap();
        assert_eq!(copy.text(), "cde");
        assert_eq!(fired.get(), 1);

        // Reactivation is refused once invalidated.
        sync.activate();
        assert!(!sync.is_active());
    }

    #[test]
    fn test_lazy_copy_before_activation() {
        let (_original, sync) = synced("abcdefgh", 2, 5);
        let copy = sync.copy_buffer();
        assert_eq!(copy.text(), "cde");

        sync.activate();
        assert_eq!(sync.copy_buffer().text(), "cde");
        assert_eq!(copy.text(), "cde");
    }

    #[test]
    fn test_no_sync_before_activation() {
        let (original, sync) = synced("hello world", 0, 5);
        let copy = sync.copy_buffer();

        original.replace(0, 5, "jumbo").unwrap();
        assert_eq!(copy.text(), "hello");

        copy.replace(0, 5, "salut").unwrap();
        assert_eq!(original.text(), "jumbo world");
    }

    #[test]
    fn test_activation_is_idempotent() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        sync.activate();
        let copy = sync.copy_buffer();

        copy.replace(0, 5, "howdy").unwrap();
        // A duplicate listener pair would garble this round trip.
        assert_eq!(original.text(), "howdy world");
        assert_eq!(copy.text(), "howdy");
    }

    #[test]
    fn test_deactivate_freezes_copy() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        let copy = sync.copy_buffer();

        sync.deactivate();
        original.replace(0, 5, "jumbo").unwrap();
        assert_eq!(copy.text(), "hello");

        copy.replace(0, 5, "salut").unwrap();
        assert_eq!(original.text(), "jumbo world");
    }

    #[test]
    fn test_reactivation_resyncs_eagerly() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        let copy = sync.copy_buffer();
        sync.deactivate();

        original.replace(0, 5, "jumbo").unwrap();
        assert_eq!(copy.text(), "hello");

        sync.activate();
        assert_eq!(copy.text(), "jumbo");
    }

    #[test]
    fn test_copy_mirrors_writability_at_activation() {
        let (original, sync) = synced("hello world", 0, 5);
        original.set_writable(false);
        sync.activate();
        assert!(!sync.copy_buffer().is_writable());
    }

    #[test]
    fn test_resync_into_read_only_copy_restores_flag() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        let copy = sync.copy_buffer();
        copy.set_writable(false);

        // The resync write bypasses the read-only copy, then leaves
        // the flag mirroring the original again.
        original.replace(0, 1, "H").unwrap();
        assert_eq!(copy.text(), "Hello");
        assert!(copy.is_writable());
    }

    #[test]
    fn test_activate_with_invalid_range_reports_immediately() {
        let original = TextBuffer::from_str("abcdefgh");
        let range = original.track(2, 5);
        original.remove(2, 5).unwrap();
        assert!(!range.is_valid());

        let sync = RangeSynchronizer::new(original.clone(), range);
        let fired = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&fired);
        sync.set_on_content_invalid(move || counter.set(counter.get() + 1));
        sync.activate();

        assert_eq!(fired.get(), 1);
        assert!(!sync.is_active());
        assert!(sync.is_invalidated());
    }

    #[test]
    fn test_dropping_synchronizer_detaches_quietly() {
        let (original, sync) = synced("hello world", 0, 5);
        sync.activate();
        // Dropping detaches both listeners; the edit must not panic.
        drop(sync);
        original.replace(0, 5, "howdy").unwrap();
        assert_eq!(original.text(), "howdy world");
    }

    #[test]
    fn test_whole_copy_replacement_round_trip() {
        // No shared prefix or suffix at all: the forwarded edit spans
        // the entire range, which re-anchors rather than invalidates.
        let (original, sync) = synced("abc world", 0, 3);
        sync.activate();
        let copy = sync.copy_buffer();

        copy.replace(0, 3, "xyz").unwrap();
        assert_eq!(original.text(), "xyz world");
        assert_eq!(copy.text(), "xyz");
        assert!(!sync.is_invalidated());
    }
}
