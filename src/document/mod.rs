//! Markdown parsing: turns a Markdown string into a typed document tree.
//!
//! Front-matter is harvested first by straightforward string scanning (no
//! YAML parser — the format is deliberately a restricted `key: value` list),
//! then the body is parsed with `pulldown-cmark` and grouped into nested
//! sections by heading level.

mod model;
mod parser;

pub use model::{BulletList, Document, Image, Paragraph, Section, SectionChild, Table};
pub use parser::parse_document;
