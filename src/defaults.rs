//! Default values shared by the XML codec and the glob/magic arbitration code,
//! so the numbers from the freedesktop shared-mime-info spec live in one place.

/// Default glob weight when `<glob weight="…">` is omitted.
pub const DEFAULT_GLOB_WEIGHT: u8 = 50;

/// Default `case-sensitive` flag when `<glob case-sensitive="…">` is omitted.
pub const DEFAULT_GLOB_CASE_SENSITIVE: bool = false;

/// Default magic priority when `<magic priority="…">` is omitted.
pub const DEFAULT_MAGIC_PRIORITY: u8 = 50;

/// Fallback MIME type for content that cannot be identified as text.
pub const DEFAULT_BINARY_MIME: &str = "application/octet-stream";

/// Fallback MIME type for content that cannot be identified but looks textual.
pub const DEFAULT_TEXT_MIME: &str = "text/plain";
