//! Line-based table grid detection over positional page text.
//!
//! A line with a digit in it becomes a row when it splits into at least two
//! cells, either on column gaps (tabs or runs of two or more spaces) with a
//! figure in the last cell, or as a label followed by trailing figures. Consecutive rows form a table once there are enough of
//! them; short rows are padded with absent cells so the grid is rectangular.

use crate::types::RawTable;
use regex::Regex;
use std::sync::LazyLock;

static COLUMN_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+|\s{2,}").unwrap());

static FIGURE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\$|\(?\$?-?[\d,]*\d(\.\d+)?\)?%?|[-–—])$").unwrap()
});

/// Finds table grids in page text.
#[derive(Debug, Clone)]
pub struct GridDetector {
    min_rows: usize,
}

impl GridDetector {
    pub fn new(min_rows: usize) -> Self {
        Self {
            min_rows: min_rows.max(1),
        }
    }

    /// Every table on the page, top to bottom.
    pub fn detect(&self, page_text: &str) -> Vec<RawTable> {
        let mut tables = Vec::new();
        let mut run: Vec<Vec<String>> = Vec::new();

        for line in page_text.lines() {
            match split_cells(line) {
                Some(cells) => run.push(cells),
                None => self.flush(&mut run, &mut tables),
            }
        }
        self.flush(&mut run, &mut tables);

        tables
    }

    fn flush(&self, run: &mut Vec<Vec<String>>, tables: &mut Vec<RawTable>) {
        if run.len() >= self.min_rows {
            tables.push(pad_rows(std::mem::take(run)));
        } else {
            run.clear();
        }
    }
}

/// Split a line into cells, or `None` when it reads as prose.
pub fn split_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let gap_cells: Vec<String> = COLUMN_GAP
        .split(trimmed)
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect();
    let ends_in_figure = gap_cells
        .last()
        .and_then(|cell| cell.split_whitespace().last())
        .is_some_and(|token| FIGURE_TOKEN.is_match(token));
    if gap_cells.len() >= 2 && ends_in_figure {
        return Some(gap_cells);
    }

    // Single-spaced line: peel figures off the end, the remainder is the label
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let label_len = tokens
        .iter()
        .rposition(|token| !FIGURE_TOKEN.is_match(token))
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let figures = &tokens[label_len..];
    if label_len == 0 || figures.is_empty() {
        return None;
    }
    if !figures.iter().any(|f| f.chars().any(|c| c.is_ascii_digit())) {
        return None;
    }

    let mut cells = vec![tokens[..label_len].join(" ")];
    cells.extend(figures.iter().map(|f| f.to_string()));
    Some(cells)
}

fn pad_rows(rows: Vec<Vec<String>>) -> RawTable {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    rows.into_iter()
        .map(|row| {
            let mut padded: Vec<Option<String>> = row.into_iter().map(Some).collect();
            padded.resize(width, None);
            padded
        })
        .collect()
}
