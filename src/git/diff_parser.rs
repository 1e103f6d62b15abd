//! Unified diff parsing
//!
//! Splits a file's diff text into hunks and exposes, per hunk, the lines of
//! the old and new file with their line numbers.

use crate::error::{MineError, MineResult};
use regex::Regex;
use std::sync::OnceLock;

static HUNK_HEADER: OnceLock<Regex> = OnceLock::new();

fn hunk_header() -> &'static Regex {
    HUNK_HEADER.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineType {
    Kept,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub line_number: u32,
    pub line: String,
    pub line_type: DiffLineType,
}

/// One `@@` hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlock {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    lines_in_old: Vec<DiffLine>,
    lines_in_new: Vec<DiffLine>,
}

impl DiffBlock {
    fn parse(header: &str, body: &[&str]) -> MineResult<Self> {
        let caps = hunk_header().captures(header).ok_or_else(|| {
            MineError::Provider(format!("cannot read line positions from hunk: {}", header))
        })?;
        let num = |i: usize| -> u32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1)
        };
        let (old_start, old_count, new_start, new_count) = (num(1), num(2), num(3), num(4));

        let lines_in_old = side_lines(body, old_start, old_count, '-')?;
        let lines_in_new = side_lines(body, new_start, new_count, '+')?;
        Ok(Self {
            old_start,
            old_count,
            new_start,
            new_count,
            lines_in_old,
            lines_in_new,
        })
    }

    pub fn lines_in_old_file(&self) -> &[DiffLine] {
        &self.lines_in_old
    }

    pub fn lines_in_new_file(&self) -> &[DiffLine] {
        &self.lines_in_new
    }

    pub fn line_in_old_file(&self, line: u32) -> Option<&DiffLine> {
        self.lines_in_old.iter().find(|l| l.line_number == line)
    }

    pub fn line_in_new_file(&self, line: u32) -> Option<&DiffLine> {
        self.lines_in_new.iter().find(|l| l.line_number == line)
    }
}

fn line_type(line: &str) -> Option<DiffLineType> {
    match line.chars().next() {
        Some(' ') => Some(DiffLineType::Kept),
        Some('+') => Some(DiffLineType::Added),
        Some('-') => Some(DiffLineType::Removed),
        _ => None,
    }
}

/// Lines of one side: context lines plus lines starting with `marker`.
fn side_lines(body: &[&str], start: u32, count: u32, marker: char) -> MineResult<Vec<DiffLine>> {
    let mut out = Vec::new();
    let mut number = start;
    for raw in body {
        if raw.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        }
        let Some(kind) = line_type(raw) else {
            return Err(MineError::Provider(format!(
                "unrecognized diff line: {}",
                raw
            )));
        };
        if raw.starts_with(marker) || kind == DiffLineType::Kept {
            out.push(DiffLine {
                line_number: number,
                line: raw[1..].to_string(),
                line_type: kind,
            });
            number += 1;
        }
    }
    if number != start + count {
        return Err(MineError::Provider(format!(
            "malformed diff: expected {} lines from {}, found {}",
            count,
            start,
            number - start
        )));
    }
    Ok(out)
}

pub struct DiffParser;

impl DiffParser {
    /// Parse a file's diff text. Anything before the first hunk (file headers) is ignored.
    pub fn parse(diff: &str) -> MineResult<Vec<DiffBlock>> {
        let lines: Vec<&str> = diff
            .split('\n')
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .collect();

        let starts: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.starts_with("@@ -"))
            .map(|(i, _)| i)
            .collect();

        starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                let end = starts.get(n + 1).copied().unwrap_or(lines.len());
                DiffBlock::parse(lines[start], &lines[start + 1..end])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "diff --git a/f.txt b/f.txt
index 1111111..2222222 100644
--- a/f.txt
+++ b/f.txt
@@ -1,3 +1,3 @@
 one
-two
+TWO
 three
@@ -10,2 +10,3 @@ fn tail()
 ten
+ten and a half
 eleven
";

    #[test]
    fn test_parse_blocks() {
        let blocks = DiffParser::parse(DIFF).unwrap();
        assert_eq!(blocks.len(), 2);

        let first = &blocks[0];
        assert_eq!(first.lines_in_old_file().len(), 3);
        assert_eq!(
            first.line_in_old_file(2).map(|l| l.line_type),
            Some(DiffLineType::Removed)
        );
        assert_eq!(first.line_in_new_file(2).map(|l| l.line.as_str()), Some("TWO"));

        let second = &blocks[1];
        assert_eq!(second.new_count, 3);
        assert_eq!(
            second.line_in_new_file(11).map(|l| l.line_type),
            Some(DiffLineType::Added)
        );
        assert!(second.line_in_old_file(12).is_none());
    }

    #[test]
    fn test_single_line_header_without_counts() {
        let blocks = DiffParser::parse("@@ -1 +1 @@\n-a\n+b\n").unwrap();
        assert_eq!(blocks[0].old_count, 1);
        assert_eq!(blocks[0].lines_in_new_file()[0].line, "b");
    }

    #[test]
    fn test_malformed_counts_fail() {
        let err = DiffParser::parse("@@ -1,5 +1,1 @@\n-a\n+b\n").unwrap_err();
        assert!(matches!(err, MineError::Provider(_)));
    }

    #[test]
    fn test_no_hunks() {
        assert!(DiffParser::parse("").unwrap().is_empty());
    }
}
