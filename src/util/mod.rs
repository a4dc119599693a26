//! Text and link helpers shared by storage and the terminal front-end.

mod links;
mod text;

pub use links::{validate_url_for_open, LinkError};
pub use text::{display_width, single_line, strip_control_chars, truncate_to_width};

/// Maximum allowed search query length, enforced by the search input and the FTS validator
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
