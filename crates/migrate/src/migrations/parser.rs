//! Migration file parser
//!
//! A migration file is split into sections by marker lines of the form
//! `-- migrate:<direction>`. Each section runs from the line after its
//! marker up to the next marker line or the end of the file.

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use super::definitions::MigrationDirection;
use crate::error::{MigrateError, MigrateResult};

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The marker's own line break belongs to the marker, not the section body
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^-- migrate:([^\r\n]*)\r?(?:\n|$)").expect("valid marker pattern")
    })
}

/// Sections of one migration file keyed by direction name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMigration {
    sections: HashMap<String, String>,
}

impl ParsedMigration {
    /// Body for a direction, empty when the file has no such section
    pub fn body(&self, direction: MigrationDirection) -> &str {
        self.section(direction.as_str()).unwrap_or("")
    }

    pub fn up(&self) -> &str {
        self.body(MigrationDirection::Up)
    }

    pub fn down(&self) -> &str {
        self.body(MigrationDirection::Down)
    }

    /// Raw section lookup, including the unnamed `""` section
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }
}

/// Split migration text into direction sections
///
/// Text before the first marker is discarded. A file without markers yields
/// one section under the empty name. When a direction repeats, the later
/// section wins.
pub fn parse(text: &str) -> ParsedMigration {
    let mut sections = HashMap::new();
    let mut direction = String::new();
    let mut start = 0;

    for caps in marker_pattern().captures_iter(text) {
        let Some(marker) = caps.get(0) else { continue };
        if !direction.is_empty() {
            sections.insert(direction, text[start..marker.start()].to_string());
        }
        direction = caps.get(1).map_or("", |m| m.as_str()).to_string();
        start = marker.end();
    }
    sections.insert(direction, text[start..].to_string());

    ParsedMigration { sections }
}

/// Read and parse a migration file
pub fn parse_file(path: &Path) -> MigrateResult<ParsedMigration> {
    let text = fs::read_to_string(path).map_err(|e| MigrateError::file_system(path, e))?;
    Ok(parse(&text))
}
