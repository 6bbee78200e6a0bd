//! Edit notifications for shared text buffers.

/// A single applied edit, in character indices.
///
/// Edits are normalized before delivery: characters shared at the
/// start and end of the removed and inserted text are trimmed away, so
/// the event describes the smallest region that actually changed. An
/// edit that changes nothing is never delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferEdit {
    /// Character offset where the change begins.
    pub offset: usize,
    /// Number of characters removed.
    pub old_len: usize,
    /// Number of characters inserted.
    pub new_len: usize,
}

impl BufferEdit {
    /// Signed change in buffer length.
    pub fn delta(&self) -> isize {
        self.new_len as isize - self.old_len as isize
    }

    /// End of the removed span, in pre-edit coordinates.
    pub fn old_end(&self) -> usize {
        self.offset + self.old_len
    }

    /// End of the inserted span, in post-edit coordinates.
    pub fn new_end(&self) -> usize {
        self.offset + self.new_len
    }
}

/// Handle for a registered edit listener.
pub type ListenerId = usize;
