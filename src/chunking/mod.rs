//! Recursive, structure-preserving chunker.
//!
//! A single `Chunker` type parameterized by a [`ChunkStrategy`] enum; all
//! three strategies share one worklist engine and differ only in how they
//! seed the list and how they split an oversized `Document`/`Section`.

mod chunk;
mod tokenizer;

pub use chunk::Chunk;
pub use tokenizer::{ApproxTokenizer, Tokenizer};

use std::collections::VecDeque;
use std::sync::Arc;

use crate::document::{BulletList, Document, Paragraph, Section, SectionChild, Table};

/// Fallback shrink applied to `chunk_size` when no tokenizer is supplied,
/// to cover under-counting by the approximate tokenizer.
const NO_TOKENIZER_BUDGET_FACTOR: f64 = 0.9;

/// Chunking strategy, trading chunk size for structural fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Prioritises packing: splits in half only when oversized.
    MaxTokens,
    /// Keeps every top-level section whole where possible.
    Balanced,
    /// Pre-flattens to leaf nodes for the smallest structurally coherent unit.
    MinTokens,
}

/// A unit of work on the chunker's worklist: either a whole document, a
/// section, or one of a section's leaf child kinds.
#[derive(Debug, Clone)]
enum WorkItem {
    Document(Document),
    Section(Section),
    Table(Table),
    BulletList(BulletList),
    Paragraph(Paragraph),
}

impl WorkItem {
    /// Stringifies the item the way it would appear in the final document,
    /// with any embedded front-matter stripped.
    fn stringify(&self) -> String {
        match self {
            Self::Document(doc) => doc
                .sections
                .iter()
                .map(Section::to_string)
                .collect::<Vec<_>>()
                .join("\n\n"),
            Self::Section(s) => s.to_string(),
            Self::Table(t) => t.to_string(),
            Self::BulletList(b) => b.to_string(),
            Self::Paragraph(p) => p.to_string(),
        }
    }
}

/// Splits a document tree into token-budgeted chunks.
pub struct Chunker {
    chunk_size: usize,
    strategy: ChunkStrategy,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Chunker {
    /// Builds a chunker with the approximate default tokenizer. Because the
    /// caller supplied no tokenizer, the effective budget is shrunk to guard
    /// against the estimator's under-counting.
    #[must_use]
    pub fn new(chunk_size: usize, strategy: ChunkStrategy) -> Self {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let effective = (chunk_size as f64 * NO_TOKENIZER_BUDGET_FACTOR).round() as usize;
        Self {
            chunk_size: effective,
            strategy,
            tokenizer: Arc::new(ApproxTokenizer),
        }
    }

    /// Builds a chunker with a caller-supplied tokenizer, used verbatim (no
    /// budget shrink).
    #[must_use]
    pub fn with_tokenizer(chunk_size: usize, strategy: ChunkStrategy, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            chunk_size,
            strategy,
            tokenizer,
        }
    }

    /// Splits `document` into chunks, in document order.
    #[must_use]
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut queue = self.seed(document);
        let mut chunks = Vec::new();
        let mut position: u64 = 0;

        while let Some(item) = queue.pop_front() {
            let content = item.stringify();
            let tokens = self.tokenizer.count_tokens(&content);

            if tokens <= self.chunk_size {
                chunks.push(Chunk {
                    content,
                    file_name: document.file_name.clone(),
                    file_position: position,
                    metadata: document.metadata.clone(),
                });
                position += 1;
                continue;
            }

            self.split(item, &mut queue);
        }

        chunks
    }

    fn seed(&self, document: &Document) -> VecDeque<WorkItem> {
        match self.strategy {
            ChunkStrategy::MaxTokens | ChunkStrategy::Balanced => {
                VecDeque::from([WorkItem::Document(document.clone())])
            }
            ChunkStrategy::MinTokens => flatten_to_leaves(document),
        }
    }

    fn split(&self, item: WorkItem, queue: &mut VecDeque<WorkItem>) {
        match item {
            WorkItem::Document(doc) => self.split_document(doc, queue),
            WorkItem::Section(s) => self.split_section(s, queue),
            WorkItem::Table(t) => split_table(t, queue),
            WorkItem::BulletList(b) => split_bullet_list(b, queue),
            WorkItem::Paragraph(p) => split_paragraph(p, queue),
        }
    }

    fn split_document(&self, doc: Document, queue: &mut VecDeque<WorkItem>) {
        match self.strategy {
            ChunkStrategy::MaxTokens => {
                if doc.sections.len() == 1 {
                    push_front_items(queue, doc.sections.into_iter().map(WorkItem::Section));
                    return;
                }
                let half = doc.sections.len().div_ceil(2);
                let Document {
                    file_name,
                    metadata,
                    raw_front_matter,
                    mut sections,
                    updated_at,
                } = doc;
                let second_sections = sections.split_off(half);
                let first = Document {
                    file_name: file_name.clone(),
                    metadata: metadata.clone(),
                    raw_front_matter: raw_front_matter.clone(),
                    sections,
                    updated_at,
                };
                let second = Document {
                    file_name,
                    metadata,
                    raw_front_matter,
                    sections: second_sections,
                    updated_at,
                };
                push_front_items(queue, [WorkItem::Document(first), WorkItem::Document(second)]);
            }
            ChunkStrategy::Balanced | ChunkStrategy::MinTokens => {
                push_front_items(queue, doc.sections.into_iter().map(WorkItem::Section));
            }
        }
    }

    fn split_section(&self, section: Section, queue: &mut VecDeque<WorkItem>) {
        match self.strategy {
            ChunkStrategy::MaxTokens => {
                if section.content.len() == 1 {
                    push_front_items(queue, section.content.into_iter().map(child_to_work_item));
                    return;
                }
                let half = section.content.len().div_ceil(2);
                let mut content = section.content;
                let second = content.split_off(half);
                let first = Section {
                    title: section.title.clone(),
                    level: section.level,
                    content,
                };
                let second = Section {
                    title: section.title,
                    level: section.level,
                    content: second,
                };
                push_front_items(queue, [WorkItem::Section(first), WorkItem::Section(second)]);
            }
            ChunkStrategy::Balanced | ChunkStrategy::MinTokens => {
                push_front_items(queue, section.content.into_iter().map(child_to_work_item));
            }
        }
    }
}

fn child_to_work_item(child: SectionChild) -> WorkItem {
    match child {
        SectionChild::Section(s) => WorkItem::Section(s),
        SectionChild::Paragraph(p) => WorkItem::Paragraph(p),
        SectionChild::Table(t) => WorkItem::Table(t),
        SectionChild::BulletList(b) => WorkItem::BulletList(b),
        // An image has no meaningful token-budget split and is small enough
        // to always fit; represent it as a paragraph of its Markdown form.
        SectionChild::Image(img) => WorkItem::Paragraph(Paragraph {
            content: img.to_string(),
        }),
    }
}

fn split_table(table: Table, queue: &mut VecDeque<WorkItem>) {
    if table.rows.len() <= 1 {
        return;
    }
    let half = table.rows.len().div_ceil(2);
    let mut rows = table.rows;
    let second_rows = rows.split_off(half);
    let first = Table {
        caption: table.caption.clone(),
        headers: table.headers.clone(),
        rows,
    };
    let second = Table {
        caption: table.caption,
        headers: table.headers,
        rows: second_rows,
    };
    push_front_items(queue, [WorkItem::Table(first), WorkItem::Table(second)]);
}

fn split_bullet_list(list: BulletList, queue: &mut VecDeque<WorkItem>) {
    if list.items.len() <= 1 {
        return;
    }
    let half = list.items.len().div_ceil(2);
    let mut items = list.items;
    let second_items = items.split_off(half);
    push_front_items(
        queue,
        [
            WorkItem::BulletList(BulletList { items }),
            WorkItem::BulletList(BulletList { items: second_items }),
        ],
    );
}

fn split_paragraph(paragraph: Paragraph, queue: &mut VecDeque<WorkItem>) {
    let content = paragraph.content;
    if content.is_empty() {
        return;
    }
    let mid = content.len() / 2;
    let boundary = crate::io::find_char_boundary(&content, mid);
    let (first, second) = content.split_at(boundary);
    if first.is_empty() || second.is_empty() {
        return;
    }
    push_front_items(
        queue,
        [
            WorkItem::Paragraph(Paragraph {
                content: first.to_string(),
            }),
            WorkItem::Paragraph(Paragraph {
                content: second.to_string(),
            }),
        ],
    );
}

/// Pushes items to the front of the queue, preserving their relative order
/// (the first item yielded becomes the new head).
fn push_front_items<I: IntoIterator<Item = WorkItem>>(queue: &mut VecDeque<WorkItem>, items: I)
where
    I::IntoIter: DoubleEndedIterator,
{
    for item in items.into_iter().rev() {
        queue.push_front(item);
    }
}

/// Breadth-first expansion of `Document` → `Section` → leaf children, used
/// to seed the `MinTokens` strategy. The source's `MinTokens` path never
/// reaches the `Document`/`Section` split branches because of this
/// pre-flattening.
fn flatten_to_leaves(document: &Document) -> VecDeque<WorkItem> {
    let mut bfs: VecDeque<BfsItem> = VecDeque::new();
    bfs.push_back(BfsItem::Document(document.clone()));
    let mut leaves = VecDeque::new();

    while let Some(item) = bfs.pop_front() {
        match item {
            BfsItem::Document(doc) => {
                for section in doc.sections {
                    bfs.push_back(BfsItem::Section(section));
                }
            }
            BfsItem::Section(section) => {
                for child in section.content {
                    bfs.push_back(BfsItem::Child(child));
                }
            }
            BfsItem::Child(child) => match child {
                SectionChild::Section(s) => bfs.push_back(BfsItem::Section(s)),
                other => leaves.push_back(child_to_work_item(other)),
            },
        }
    }

    leaves
}

enum BfsItem {
    Document(Document),
    Section(Section),
    Child(SectionChild),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    #[test]
    fn front_matter_one_section_balanced() {
        let src = "---\nsource: A\n---\n\n# Title\n\ntext.\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        let chunker = Chunker::new(50, ChunkStrategy::Balanced);
        let chunks = chunker.chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.starts_with("# Title"));
        assert_eq!(chunks[0].metadata.get("source").map(String::as_str), Some("A"));
        assert_eq!(chunks[0].file_position, 0);
    }

    #[test]
    fn oversized_paragraph_splits_and_covers_original() {
        let body = "a".repeat(10_000);
        let src = format!("{body}\n");
        let doc = parse_document("big.md", &src, None).unwrap();
        let chunker = Chunker::with_tokenizer(1_000, ChunkStrategy::MaxTokens, Arc::new(|s: &str| s.len()));
        let chunks = chunker.chunk(&doc);
        assert!(chunks.len() >= 10);
        // Coverage holds modulo the trailing blank line each leaf paragraph's
        // stringification appends.
        let joined: String = chunks
            .iter()
            .map(|c| c.content.trim_end())
            .collect::<Vec<_>>()
            .concat();
        assert_eq!(joined, body);
        for c in &chunks {
            assert!(c.content.len() <= 1_000);
        }
    }

    #[test]
    fn positions_are_monotonically_increasing() {
        let src = "# A\n\none\n\n# B\n\ntwo\n\n# C\n\nthree\n";
        let doc = parse_document("doc.md", src, None).unwrap();
        let chunker = Chunker::new(1_000, ChunkStrategy::Balanced);
        let chunks = chunker.chunk(&doc);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.file_position, i as u64);
        }
    }

    #[test]
    fn single_row_table_is_dropped_when_oversized() {
        let table = Table {
            caption: "c".to_string(),
            headers: vec!["A".to_string()],
            rows: vec![vec!["x".repeat(100)]],
        };
        let mut queue = VecDeque::new();
        split_table(table, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn min_tokens_preflattens_before_chunking() {
        let src = "# A\n\n## B\n\ntext under nested section\n";
        let doc = parse_document("doc.md", src, None).unwrap();
        let chunker = Chunker::new(1_000, ChunkStrategy::MinTokens);
        let chunks = chunker.chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "text under nested section\n\n");
    }
}
