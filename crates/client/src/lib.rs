//! The embedded page client: DOM scanning, stable selectors, and the
//! bidirectional transport to the hub.
//!
//! The client never surfaces internal errors to the host page; transport
//! failures are logged and recovered via reconnect or polling fallback.

pub mod dom;
pub mod scanner;
pub mod selector;
pub mod transport;

/// Attribute carrying an element's stable identity across scans.
pub const ID_ATTR: &str = "data-livetext-id";

/// Attribute opting an arbitrary element into scanning.
pub const OPT_IN_ATTR: &str = "data-livetext-edit";

/// Attribute excluding an element (and its subtree) from scanning.
pub const IGNORE_ATTR: &str = "data-livetext-ignore";

/// Reserved class prefix; classes carrying it are the library's own
/// (e.g. the update highlight) and are excluded from generated selectors.
pub const RESERVED_CLASS_PREFIX: &str = "lt-";

/// Transient class applied to an element that just received a remote
/// update, as a visual acknowledgment.
pub const HIGHLIGHT_CLASS: &str = "lt-updated";
