//! Turns content blocks into retrieval-sized chunks.
//!
//! Text is cut on semantic boundaries: a heading line opens a new section,
//! blank lines separate paragraphs, and paragraphs are packed together up to
//! `max_chunk_chars`. Only a paragraph that is too long on its own is broken
//! further, first on sentence ends and then on whitespace. Tables are
//! flattened row by row and packed the same way, never splitting a row unless
//! it alone exceeds the limit.

use crate::cache::content_hash;
use crate::config::ChunkingConfig;
use crate::types::{BlockContent, ContentBlock, IndexUnit, UnitMetadata};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+\s+").unwrap());

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Flatten a table: cells joined by `separator`, rows by newlines.
pub fn serialize_table(rows: &[Vec<String>], separator: &str) -> String {
    rows.iter()
        .map(|row| row.join(separator))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Chunker {
    config: ChunkingConfig,
    headings: Vec<Regex>,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        let headings = config
            .heading_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "ignoring invalid heading pattern");
                    None
                }
            })
            .collect();

        Self {
            config: config.clone(),
            headings,
        }
    }

    /// Chunk every block in order. Chunk ids follow document order.
    pub fn chunk_blocks(&self, blocks: &[ContentBlock]) -> Vec<IndexUnit> {
        let mut units = Vec::new();
        let mut heading: Option<String> = None;

        for (block_index, block) in blocks.iter().enumerate() {
            let pieces: Vec<(Option<String>, String)> = match &block.content {
                BlockContent::Text(text) => self.chunk_text(text, &mut heading),
                BlockContent::Table(rows) => self
                    .chunk_table(rows)
                    .into_iter()
                    .map(|chunk| (heading.clone(), chunk))
                    .collect(),
            };

            for (chunk_heading, text) in pieces {
                units.push(IndexUnit {
                    id: units.len(),
                    metadata: UnitMetadata {
                        kind: block.kind(),
                        block_index,
                        page: block.page,
                        heading: chunk_heading,
                        content_hash: content_hash(&text),
                    },
                    text,
                });
            }
        }

        debug!(blocks = blocks.len(), chunks = units.len(), "chunked document");
        units
    }

    fn is_heading(&self, line: &str) -> bool {
        self.headings.iter().any(|regex| regex.is_match(line))
    }

    /// Chunks of one text block. `heading` carries the most recent heading
    /// across blocks so a page that continues a section keeps its title.
    fn chunk_text(&self, text: &str, heading: &mut Option<String>) -> Vec<(Option<String>, String)> {
        let mut chunks = Vec::new();
        let mut section: Vec<&str> = Vec::new();
        let mut section_heading = heading.clone();

        for line in text.lines() {
            let trimmed = line.trim();
            if !trimmed.is_empty() && self.is_heading(trimmed) {
                // Sections too small to stand alone run on into the next one
                let section_len: usize = section.iter().map(|l| char_len(l.trim())).sum();
                if section_len >= self.config.min_chunk_chars {
                    self.flush_section(&section, &section_heading, &mut chunks);
                    section.clear();
                }
                *heading = Some(trimmed.trim_start_matches('#').trim().to_string());
                section_heading = heading.clone();
            }
            section.push(line);
        }
        self.flush_section(&section, &section_heading, &mut chunks);

        chunks
    }

    fn flush_section(
        &self,
        lines: &[&str],
        heading: &Option<String>,
        chunks: &mut Vec<(Option<String>, String)>,
    ) {
        let mut pieces = Vec::new();
        for paragraph in paragraphs(lines) {
            if char_len(&paragraph) > self.config.max_chunk_chars {
                pieces.extend(self.split_oversized(&paragraph));
            } else {
                pieces.push(paragraph);
            }
        }

        for chunk in self.pack(pieces, "\n\n") {
            chunks.push((heading.clone(), chunk));
        }
    }

    fn chunk_table(&self, rows: &[Vec<String>]) -> Vec<String> {
        let mut pieces = Vec::new();
        for row in rows {
            let line = serialize_table(std::slice::from_ref(row), &self.config.column_separator);
            if char_len(&line) > self.config.max_chunk_chars {
                pieces.extend(self.split_by_position(&line));
            } else if !line.is_empty() {
                pieces.push(line);
            }
        }
        self.pack(pieces, "\n")
    }

    /// Greedily join pieces while the result stays within the size limit.
    fn pack(&self, pieces: Vec<String>, separator: &str) -> Vec<String> {
        let max = self.config.max_chunk_chars;
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for piece in pieces {
            let piece_len = char_len(&piece);
            if !current.is_empty() && current_len + separator_len + piece_len > max {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push_str(separator);
                current_len += separator_len;
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    fn split_oversized(&self, paragraph: &str) -> Vec<String> {
        if !self.config.preserve_sentences {
            return self.split_by_position(paragraph);
        }

        let mut sentences = Vec::new();
        let mut start = 0;
        for boundary in SENTENCE_END.find_iter(paragraph) {
            sentences.push(paragraph[start..boundary.end()].trim());
            start = boundary.end();
        }
        if start < paragraph.len() {
            sentences.push(paragraph[start..].trim());
        }

        if sentences.len() <= 1 {
            return self.split_by_position(paragraph);
        }

        let mut pieces = Vec::new();
        for sentence in sentences.into_iter().filter(|s| !s.is_empty()) {
            if char_len(sentence) > self.config.max_chunk_chars {
                pieces.extend(self.split_by_position(sentence));
            } else {
                pieces.push(sentence.to_string());
            }
        }
        self.pack(pieces, " ")
    }

    /// Cut at the last whitespace or punctuation in the back half of each window.
    fn split_by_position(&self, text: &str) -> Vec<String> {
        let target = self.config.max_chunk_chars.max(1);
        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = start + target;
            if end >= chars.len() {
                end = chars.len();
            } else {
                for i in (start + target / 2..end).rev() {
                    if chars[i].is_whitespace() || chars[i].is_ascii_punctuation() {
                        end = i + 1;
                        break;
                    }
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            start = end;
        }

        pieces
    }
}

/// Consecutive non-blank lines, trimmed and joined.
fn paragraphs(lines: &[&str]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockKind;

    fn chunker(max: usize, min: usize) -> Chunker {
        Chunker::new(&ChunkingConfig {
            max_chunk_chars: max,
            min_chunk_chars: min,
            ..ChunkingConfig::default()
        })
    }

    #[test]
    fn test_serialize_table() {
        let rows = vec![
            vec!["Total Assets".to_string(), "1,200".to_string()],
            vec!["Total Liabilities".to_string(), "800".to_string()],
        ];
        assert_eq!(
            serialize_table(&rows, " | "),
            "Total Assets | 1,200\nTotal Liabilities | 800"
        );
    }

    #[test]
    fn test_small_table_is_one_serialized_chunk() {
        let rows = vec![
            vec!["Revenue".to_string(), "300".to_string(), "250".to_string()],
            vec!["Net income".to_string(), "40".to_string(), "(5)".to_string()],
        ];
        let units = chunker(1200, 200).chunk_blocks(&[ContentBlock::table(4, rows.clone())]);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, serialize_table(&rows, " | "));
        assert_eq!(units[0].metadata.kind, BlockKind::Table);
    }

    #[test]
    fn test_headings_open_sections() {
        let text = "# Overview\nWe design chips for data centers and sell them worldwide to many customers.\n\n\
                    # Risk Factors\nSupply concentration in a single foundry could disrupt our production.";
        let units = chunker(1200, 20).chunk_blocks(&[ContentBlock::text(1, text)]);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].metadata.heading.as_deref(), Some("Overview"));
        assert_eq!(units[1].metadata.heading.as_deref(), Some("Risk Factors"));
        assert!(units[1].text.starts_with("# Risk Factors"));
    }

    #[test]
    fn test_tiny_section_runs_into_next() {
        let text = "PART II\nItem 7. Management's Discussion\nRevenue grew on strong demand across all segments this year.";
        let units = chunker(1200, 40).chunk_blocks(&[ContentBlock::text(1, text)]);
        assert_eq!(units.len(), 1);
        assert!(units[0].text.starts_with("PART II"));
    }

    #[test]
    fn test_chunks_never_exceed_max() {
        let sentence = "Operating income increased due to higher volumes and pricing. ";
        let text = sentence.repeat(40);
        let units = chunker(200, 10).chunk_blocks(&[ContentBlock::text(1, text.clone())]);

        assert!(units.len() > 1);
        assert!(units.iter().all(|u| u.text.chars().count() <= 200));
        let rebuilt: String = units.iter().map(|u| u.text.as_str()).collect::<Vec<_>>().join(" ");
        assert_eq!(rebuilt.split_whitespace().count(), text.split_whitespace().count());
    }

    #[test]
    fn test_unbroken_text_splits_by_position() {
        let text = "x".repeat(450);
        let units = chunker(200, 10).chunk_blocks(&[ContentBlock::text(1, text)]);
        assert_eq!(
            units.iter().map(|u| u.text.len()).collect::<Vec<_>>(),
            vec![200, 200, 50]
        );
    }

    #[test]
    fn test_table_rows_stay_whole() {
        let rows: Vec<Vec<String>> = (0..30)
            .map(|i| vec![format!("Line item {i}"), format!("{},000", i * 7)])
            .collect();
        let units = chunker(120, 10).chunk_blocks(&[ContentBlock::table(4, rows)]);

        assert!(units.len() > 1);
        for unit in &units {
            assert_eq!(unit.metadata.kind, BlockKind::Table);
            assert_eq!(unit.metadata.page, 4);
            assert!(unit.text.lines().all(|l| l.starts_with("Line item ") && l.contains(" | ")));
        }
    }

    #[test]
    fn test_metadata_tracks_blocks_and_heading() {
        let blocks = vec![
            ContentBlock::text(1, "CONSOLIDATED BALANCE SHEETS"),
            ContentBlock::table(1, vec![vec!["Cash".into(), "10".into()]]),
            ContentBlock::text(2, ""),
            ContentBlock::text(2, "Notes continue here."),
        ];
        let units = chunker(1200, 0).chunk_blocks(&blocks);

        assert_eq!(units.len(), 3);
        assert_eq!(units.iter().map(|u| u.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(units[1].metadata.block_index, 1);
        assert_eq!(units[2].metadata.block_index, 3);
        assert_eq!(units[2].metadata.heading.as_deref(), Some("CONSOLIDATED BALANCE SHEETS"));
        assert_eq!(units[1].metadata.content_hash, content_hash("Cash | 10"));
    }

    #[test]
    fn test_invalid_heading_pattern_is_skipped() {
        let config = ChunkingConfig {
            heading_patterns: vec!["(unclosed".to_string(), r"^## ".to_string()],
            ..ChunkingConfig::default()
        };
        let chunker = Chunker::new(&config);
        assert_eq!(chunker.headings.len(), 1);
    }
}
