use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of an input document: a file, a named in-memory source, or unknown
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceFile {
    path: Option<PathBuf>,
    description: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            description: None,
        }
    }

    /// In-memory source identified by a description only
    pub fn named(description: impl Into<String>) -> Self {
        Self {
            path: None,
            description: Some(description.into()),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_unknown(&self) -> bool {
        self.path.is_none() && self.description.is_none()
    }

    /// Render for messages, `short` keeps only the file name
    pub fn print(&self, short: bool) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        match &self.path {
            Some(path) if short => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            Some(path) => path.display().to_string(),
            None => "[unknown]".to_string(),
        }
    }
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.print(false))
    }
}

/// 1-based line/column span; the end column points one past the last character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourcePosition {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourcePosition {
    pub const UNKNOWN: SourcePosition = SourcePosition {
        start_line: 0,
        start_column: 0,
        end_line: 0,
        end_column: 0,
    };

    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.start_line == 0
    }

    /// Parse the display form back (`L:C`, `L:C-EC` or `L:C-EL:EC`)
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(Self::UNKNOWN);
        }
        let (start, end) = match text.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (text, None),
        };
        let (line, column) = start.split_once(':')?;
        let start_line = line.parse().ok()?;
        let start_column = column.parse().ok()?;
        let (end_line, end_column) = match end {
            None => (0, 0),
            Some(end) => match end.split_once(':') {
                Some((line, column)) => (line.parse().ok()?, column.parse().ok()?),
                None => (start_line, end.parse().ok()?),
            },
        };
        Some(Self::new(start_line, start_column, end_line, end_column))
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            return Ok(());
        }
        write!(f, "{}:{}", self.start_line, self.start_column)?;
        if self.end_line == 0 {
            Ok(())
        } else if self.end_line == self.start_line {
            write!(f, "-{}", self.end_column)
        } else {
            write!(f, "-{}:{}", self.end_line, self.end_column)
        }
    }
}

/// A position inside a specific source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceFilePosition {
    pub file: SourceFile,
    pub position: SourcePosition,
}

impl SourceFilePosition {
    pub fn new(file: SourceFile, position: SourcePosition) -> Self {
        Self { file, position }
    }

    pub fn print(&self, short: bool) -> String {
        if self.position.is_unknown() {
            self.file.print(short)
        } else {
            format!("{}:{}", self.file.print(short), self.position)
        }
    }
}

impl std::fmt::Display for SourceFilePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.print(true))
    }
}

/// Byte offset to line/column conversion for one input text
pub(crate) struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// 1-based (line, column) of a byte offset
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    pub fn span(&self, start: usize, end: usize) -> SourcePosition {
        let (start_line, start_column) = self.locate(start);
        let (end_line, end_column) = self.locate(end);
        SourcePosition::new(start_line, start_column, end_line, end_column)
    }
}
