//! Block-to-markup rendering.
//!
//! The renderer is kept pure: it accepts a parsed block forest, produces
//! deterministic MDX output, and never touches the filesystem. Parsing the
//! stored JSON (the only fallible step) lives in [`crate::domain::blocks`].

mod inline;
mod markup;

pub use inline::{escape_text, render_inline};
pub use markup::render_blocks;

use crate::domain::blocks::{BlockParseError, parse_content};

/// Parse and render a serialized content forest in one step.
pub fn render_content(content: &str) -> Result<String, BlockParseError> {
    let blocks = parse_content(content)?;
    Ok(render_blocks(&blocks))
}
