//! Document tree types.
//!
//! A `Document` is a flat metadata map plus an ordered list of top-level
//! `Section`s. Section children are a closed, tagged set (`SectionChild`)
//! rather than a trait object: the chunker switches on the tag to pick a
//! split rule, and there is no dynamic dispatch anywhere in the tree.

use std::collections::BTreeMap;
use std::fmt;

/// A parsed Markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Name of the source file.
    pub file_name: String,
    /// Front-matter metadata, key and value both trimmed.
    pub metadata: BTreeMap<String, String>,
    /// Raw front-matter block, kept for round-trip/debug display.
    pub raw_front_matter: Option<String>,
    /// Top-level sections in source order.
    pub sections: Vec<Section>,
    /// Filesystem modification time, if known, as Unix seconds.
    pub updated_at: Option<i64>,
}

impl Document {
    /// Builds a new document with no metadata or modification time.
    #[must_use]
    pub fn new(file_name: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            file_name: file_name.into(),
            metadata: BTreeMap::new(),
            raw_front_matter: None,
            sections,
            updated_at: None,
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.metadata.is_empty() {
            writeln!(f, "---")?;
            for (key, value) in &self.metadata {
                writeln!(f, "{key}: {value}")?;
            }
            writeln!(f, "---\n")?;
        }
        for section in &self.sections {
            write!(f, "{section}\n\n")?;
        }
        Ok(())
    }
}

/// A heading-delimited section of a document, possibly nested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text.
    pub title: String,
    /// Heading level, 1 through 6.
    pub level: u8,
    /// Ordered children: nested sections, paragraphs, tables, lists, images.
    pub content: Vec<SectionChild>,
}

impl Section {
    /// Builds a new, empty section at the given level.
    #[must_use]
    pub fn new(title: impl Into<String>, level: u8) -> Self {
        Self {
            title: title.into(),
            level,
            content: Vec::new(),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}\n", "#".repeat(self.level as usize), self.title)?;
        for child in &self.content {
            write!(f, "{child}")?;
        }
        Ok(())
    }
}

/// One child of a `Section`: the closed set of node kinds a document tree
/// can contain. New leaf kinds (e.g. code blocks) are a deliberate
/// extension point, not something the chunker discovers dynamically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionChild {
    /// A nested sub-section.
    Section(Section),
    /// A paragraph of text.
    Paragraph(Paragraph),
    /// A GitHub-flavored table.
    Table(Table),
    /// A flattened bullet or ordered list.
    BulletList(BulletList),
    /// An image reference.
    Image(Image),
}

impl fmt::Display for SectionChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section(s) => write!(f, "{s}"),
            Self::Paragraph(p) => write!(f, "{p}"),
            Self::Table(t) => write!(f, "{t}"),
            Self::BulletList(b) => write!(f, "{b}"),
            Self::Image(i) => write!(f, "{i}"),
        }
    }
}

/// A block of inline text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Paragraph text, whitespace-collapsed.
    pub content: String,
}

impl fmt::Display for Paragraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n", self.content)
    }
}

/// A GitHub-flavored Markdown table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Caption adopted from the preceding sibling's text, or empty.
    pub caption: String,
    /// Header row cells.
    pub headers: Vec<String>,
    /// Body rows, each with `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Number of body rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns, from the header row.
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.headers.len()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:\n", self.caption)?;
        writeln!(f, "|{}|", self.headers.join("|"))?;
        let separator = self.headers.iter().map(|_| "---").collect::<Vec<_>>().join("|");
        writeln!(f, "|{separator}|")?;
        for row in &self.rows {
            writeln!(f, "|{}| ", row.join("|"))?;
        }
        Ok(())
    }
}

/// A flattened bullet or ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletList {
    /// Item text, in source order, nesting already flattened.
    pub items: Vec<String>,
}

impl fmt::Display for BulletList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "- {item}")?;
        }
        Ok(())
    }
}

/// An image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Image URL.
    pub url: String,
    /// Alt text.
    pub alt: String,
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "![{}]({})", self.alt, self.url)
    }
}
