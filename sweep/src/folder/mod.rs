//! # Folder module
//!
//! Module dedicated to folder (as known as mailbox) management. The
//! standard folder queries live here, together with the
//! [`FolderCounts`] snapshot used by the daily report. The paged
//! counting engine resides in its own module: [`count`].

pub mod count;

/// The search expression matching the inbox folder.
pub const INBOX: &str = "in:inbox";

/// The search expression matching the sent folder.
pub const SENT: &str = "in:sent";

/// The search expression matching the trash folder.
pub const TRASH: &str = "in:trash";

/// The search expression matching the spam folder.
pub const SPAM: &str = "in:spam";

/// Per-folder message counts, as gathered by
/// [`count::FolderCounter::count_all`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FolderCounts {
    pub inbox: usize,
    pub sent: usize,
    pub trash: usize,
    pub spam: usize,
}

impl FolderCounts {
    /// The total message count across the standard folders.
    pub fn total(&self) -> usize {
        self.inbox + self.sent + self.trash + self.spam
    }
}
