//! Splitting a ledger section into per-transaction blocks
//!
//! A line matching the leader pattern (a date token at the start of the line)
//! opens a block. Other lines are continuation lines of the open block. A line
//! containing a terminator phrase closes the block, and everything after it is
//! ignored until the next leader.

use regex::Regex;

/// One transaction's worth of lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Date token: the leader's first capture group, or its whole match
    pub date: String,
    /// Leader line first, then continuation lines, all trimmed
    pub lines: Vec<String>,
}

impl Block {
    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    /// Leader line after the date token
    pub fn first_line_rest(&self) -> &str {
        self.first_line()
            .strip_prefix(self.date.as_str())
            .unwrap_or_else(|| self.first_line())
            .trim()
    }

    /// Block text with the leading date token removed
    pub fn body(&self) -> String {
        let mut parts = vec![self.first_line_rest()];
        parts.extend(self.lines.iter().skip(1).map(String::as_str));
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    pub fn continuation(&self) -> &[String] {
        self.lines.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    leader: &'a Regex,
    terminators: &'a [&'a str],
    end_on_blank: bool,
}

impl<'a> Segmenter<'a> {
    /// `leader` must be anchored at the line start; terminators compare upper-cased.
    /// A first capture group in `leader` selects the date token.
    pub fn new(leader: &'a Regex, terminators: &'a [&'a str]) -> Self {
        Self {
            leader,
            terminators,
            end_on_blank: false,
        }
    }

    /// Treat a blank line as a terminator
    pub fn end_on_blank_line(mut self) -> Self {
        self.end_on_blank = true;
        self
    }

    fn is_terminator(&self, line: &str) -> bool {
        let upper = line.to_uppercase();
        self.terminators.iter().any(|t| upper.contains(t))
    }

    pub fn segment<'t, I>(&self, lines: I) -> Vec<Block>
    where
        I: IntoIterator<Item = &'t str>,
    {
        let mut blocks = Vec::new();
        let mut current: Option<Block> = None;

        for raw in lines {
            let line = raw.trim();

            if line.is_empty() {
                if self.end_on_blank {
                    blocks.extend(current.take());
                }
                continue;
            }

            if let Some(caps) = self.leader.captures(line) {
                let date = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str().trim());
                blocks.extend(current.take());
                current = Some(Block {
                    date: date.unwrap_or_default().to_string(),
                    lines: vec![line.to_string()],
                });
                continue;
            }

            if self.is_terminator(line) {
                blocks.extend(current.take());
                continue;
            }

            if let Some(block) = current.as_mut() {
                block.lines.push(line.to_string());
            }
        }

        blocks.extend(current);
        blocks
    }
}

/// Segment `text` line by line
pub fn segment_blocks(text: &str, leader: &Regex, terminators: &[&str]) -> Vec<Block> {
    Segmenter::new(leader, terminators).segment(text.lines())
}
