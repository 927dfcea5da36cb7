//! Visual Studio solution (`.sln`) reader and line-preserving writer.
//!
//! A solution file is treated as an ordered list of lines.  Only three kinds
//! of line carry meaning here:
//!
//! - project declarations:
//!   `Project("{8BC9CEB8-…}") = "zlib", "zlib.vcxproj", "{86DB31C6-…}"`
//! - the section markers
//!   `GlobalSection(SolutionConfigurationPlatforms) = preSolution`,
//!   `GlobalSection(ProjectConfigurationPlatforms) = postSolution` and
//!   `EndGlobalSection`
//! - `key = value` pairs inside one of those two sections.
//!
//! Everything else is carried through untouched.  Files are read and written
//! as Latin-1 so every byte survives a round trip, and are always written
//! back with CRLF line endings.
//!
//! Uses [`chumsky`] for the line grammar.

use std::path::{Path, PathBuf};

use chumsky::prelude::*;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
//  Latin-1 codec
// ═══════════════════════════════════════════════════════════════════════════════

/// Decode bytes one-to-one into `U+0000..=U+00FF`.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode text back into single bytes.  Fails on any character above
/// `U+00FF`, which can only come from user-supplied platform names.
pub fn encode_latin1(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(c).map_err(|_| {
                Error::Encoding(format!(
                    "character {c:?} (U+{:04X}) cannot be written as Latin-1",
                    c as u32
                ))
            })
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
//  LineBuffer
// ═══════════════════════════════════════════════════════════════════════════════

/// Stable handle to a line that existed when the buffer was loaded.
///
/// Indices shift as lines are inserted; a `LineId` does not, and is
/// re-resolved to its current index on every insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineId(usize);

#[derive(Debug, Clone)]
struct BufferedLine {
    text: String,
    origin: Option<LineId>,
}

/// The lines of a solution file, with CRLF already normalised away.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    lines: Vec<BufferedLine>,
}

impl LineBuffer {
    /// Split `text` on `\n` after folding `\r\n` into `\n`.  A trailing line
    /// terminator yields a trailing empty line so that [`to_text`](Self::to_text)
    /// reproduces it.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .replace("\r\n", "\n")
            .split('\n')
            .enumerate()
            .map(|(i, line)| BufferedLine { text: line.to_string(), origin: Some(LineId(i)) })
            .collect();
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate over the current lines in order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.text.as_str())
    }

    /// Current index of an originally loaded line.
    pub fn position(&self, id: LineId) -> Option<usize> {
        self.lines.iter().position(|l| l.origin == Some(id))
    }

    /// Text of an originally loaded line.
    pub fn text(&self, id: LineId) -> Option<&str> {
        self.position(id).map(|i| self.lines[i].text.as_str())
    }

    /// Insert `text` directly below the line `id` currently sits on.
    /// Returns the index of the new line.
    pub fn insert_after(&mut self, id: LineId, text: impl Into<String>) -> Option<usize> {
        let at = self.position(id)? + 1;
        self.lines.insert(at, BufferedLine { text: text.into(), origin: None });
        Some(at)
    }

    /// Join the lines back together with CRLF.
    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Records
// ═══════════════════════════════════════════════════════════════════════════════

/// A `Project(...) = ...` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionProject {
    /// Project type GUID (first quoted value).
    pub id: String,
    pub name: String,
    /// Path to the project file, relative to the solution directory.
    pub file: String,
    /// Project GUID; prefixes every project-level configuration mapping.
    pub key: String,
    pub line: LineId,
}

/// A `key = value` pair from one of the configuration sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapping {
    pub key: String,
    pub value: String,
    pub line: LineId,
}

/// Structured view of a solution file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub projects: Vec<SolutionProject>,
    /// `{GUID}.Debug|ARM64.ActiveCfg = Debug|ARM64` style entries.
    pub project_mappings: Vec<ConfigMapping>,
    /// `Debug|ARM64 = Debug|ARM64` style entries.
    pub solution_mappings: Vec<ConfigMapping>,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Line grammar
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    SolutionConfigurationPlatforms,
    ProjectConfigurationPlatforms,
}

/// Classification of a single solution line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Project { id: &'a str, name: &'a str, file: &'a str, key: &'a str },
    SectionStart(Section),
    SectionEnd,
}

fn line_parser<'a>() -> impl Parser<'a, &'a str, Line<'a>, extra::Err<Simple<'a, char>>> {
    // ── "…" with at least one character ─────────────────────────────────
    let quoted = just('"')
        .ignore_then(none_of('"').repeated().at_least(1).to_slice())
        .then_ignore(just('"'))
        .padded();

    // ── Project("id") = "name", "file", "key" … ─────────────────────────
    let project = just("Project")
        .padded()
        .ignore_then(just('(').padded())
        .ignore_then(quoted.clone())
        .then_ignore(just(')').padded())
        .then_ignore(just('=').padded())
        .then(quoted.clone())
        .then_ignore(just(',').padded())
        .then(quoted.clone())
        .then_ignore(just(',').padded())
        .then(quoted)
        .then_ignore(any().repeated())
        .map(|(((id, name), file), key)| Line::Project { id, name, file, key });

    // ── GlobalSection(Name) = phase ─────────────────────────────────────
    let solution_section = just("GlobalSection")
        .padded()
        .ignore_then(just('(').padded())
        .ignore_then(just("SolutionConfigurationPlatforms").padded())
        .then_ignore(just(')').padded())
        .then_ignore(just('=').padded())
        .then_ignore(just("preSolution").padded())
        .to(Line::SectionStart(Section::SolutionConfigurationPlatforms));

    let project_section = just("GlobalSection")
        .padded()
        .ignore_then(just('(').padded())
        .ignore_then(just("ProjectConfigurationPlatforms").padded())
        .then_ignore(just(')').padded())
        .then_ignore(just('=').padded())
        .then_ignore(just("postSolution").padded())
        .to(Line::SectionStart(Section::ProjectConfigurationPlatforms));

    let section_end = just("EndGlobalSection").padded().to(Line::SectionEnd);

    choice((project, solution_section, project_section, section_end))
}

/// Classify one line; `None` for anything the grammar does not recognise.
fn classify(line: &str) -> Option<Line<'_>> {
    line_parser().parse(line).into_result().ok()
}

/// Split `key = value` on the first `=`.  Both sides must be non-empty
/// after trimming.
fn split_mapping(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}

/// Extract projects and configuration mappings from solution lines.
///
/// Malformed lines are skipped; this never fails.
pub fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Manifest {
    let mut manifest = Manifest::default();
    let mut section: Option<Section> = None;

    for (index, text) in lines.into_iter().enumerate() {
        let line = LineId(index);
        let kind = classify(text);

        if let Some(Line::Project { id, name, file, key }) = &kind {
            manifest.projects.push(SolutionProject {
                id: id.to_string(),
                name: name.to_string(),
                file: file.to_string(),
                key: key.to_string(),
                line,
            });
        }

        match kind {
            Some(Line::SectionStart(s)) => section = Some(s),
            Some(Line::SectionEnd) => section = None,
            _ => {
                let Some(current) = section else { continue };
                let Some((key, value)) = split_mapping(text) else { continue };
                let mapping = ConfigMapping { key: key.to_string(), value: value.to_string(), line };
                match current {
                    Section::SolutionConfigurationPlatforms => {
                        manifest.solution_mappings.push(mapping)
                    }
                    Section::ProjectConfigurationPlatforms => {
                        manifest.project_mappings.push(mapping)
                    }
                }
            }
        }
    }

    manifest
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Solution – top-level handle
// ═══════════════════════════════════════════════════════════════════════════════

/// A loaded solution: the editable line buffer plus the records parsed from
/// it at load time.
///
/// Records keep referring to their original lines after insertions, so the
/// parsed view describes the file *as loaded*, not as patched.
#[derive(Debug, Clone)]
pub struct Solution {
    buffer: LineBuffer,
    manifest: Manifest,
    path: Option<PathBuf>,
}

impl Solution {
    /// Parse a solution from its raw bytes.
    pub fn parse(bytes: &[u8]) -> Self {
        let buffer = LineBuffer::from_text(&decode_latin1(bytes));
        let manifest = parse_lines(buffer.lines());
        Self { buffer, manifest, path: None }
    }

    /// Load a solution file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let mut solution = Self::parse(&bytes);
        solution.path = Some(path.to_path_buf());
        Ok(solution)
    }

    /// Path the solution was loaded from (set by [`from_file`](Self::from_file)).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory project paths are relative to.
    pub fn directory(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn projects(&self) -> &[SolutionProject] {
        &self.manifest.projects
    }

    pub fn project_mappings(&self) -> &[ConfigMapping] {
        &self.manifest.project_mappings
    }

    pub fn solution_mappings(&self) -> &[ConfigMapping] {
        &self.manifest.solution_mappings
    }

    /// Current lines, including any inserted ones.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.lines()
    }

    pub(crate) fn insert_after(&mut self, line: LineId, text: impl Into<String>) -> Option<usize> {
        self.buffer.insert_after(line, text)
    }

    /// Serialise back to Latin-1 with CRLF line endings.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_latin1(&self.buffer.to_text())
    }

    /// Write the (potentially patched) solution to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| Error::io(path, e))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
