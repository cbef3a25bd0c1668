use std::cmp::Ordering;
use std::fs;

use serde_json::Value;

use crate::json_diff::pointer::{document_paths, matches_any, Pattern, Pointer};
use crate::json_diff::{self, DiffMode};

/// Noise cancellation over one comparison.
///
/// `detect` learns which paths diverge between two invocations of the
/// baseline; `remove` strips those paths (plus any manually declared
/// patterns) from both sides of the primary/candidate comparison.
#[derive(Debug, Default)]
pub struct NoiseOperation {
    noise: Vec<Pattern>,
}

impl NoiseOperation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every path where the two baseline bodies diverge as noise.
    /// Detection always runs under Strict semantics, whatever mode the
    /// comparison itself is configured with.
    pub fn detect(&mut self, primary: &[u8], secondary: &[u8]) -> Result<(), String> {
        let primary = parse_document(primary, "primary")?;
        let secondary = parse_document(secondary, "secondary")?;

        self.noise.extend(
            json_diff::diff(&primary, &secondary, DiffMode::Strict)
                .into_iter()
                .map(|difference| Pattern::exact(difference.into_path())),
        );

        Ok(())
    }

    /// Appends manually declared patterns to the noise list.
    pub fn overlay(&mut self, patterns: &[String]) -> Result<(), String> {
        for raw in patterns {
            self.noise.push(Pattern::parse(raw.trim())?);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.noise.is_empty()
    }

    /// Deletes every noise path from both bodies and re-serializes them.
    /// Paths absent from a document are skipped silently.
    pub fn remove(&self, primary: &[u8], candidate: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String> {
        let mut primary = parse_document(primary, "primary")?;
        let mut candidate = parse_document(candidate, "candidate")?;

        strip(&self.noise, &mut primary);
        strip(&self.noise, &mut candidate);

        let primary = serde_json::to_vec(&primary).map_err(|e| e.to_string())?;
        let candidate = serde_json::to_vec(&candidate).map_err(|e| e.to_string())?;
        Ok((primary, candidate))
    }
}

/// Reads manual noise patterns from a file: one pattern per line, blank
/// lines and `#` comments skipped, surrounding whitespace trimmed.
pub fn load_manual_noise(path: &str) -> Result<Vec<String>, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("cannot read noise file {}: {}", path, e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn strip(patterns: &[Pattern], document: &mut Value) {
    let mut targets: Vec<Pointer> = document_paths(document)
        .into_iter()
        .filter(|path| matches_any(path, patterns))
        .collect();

    // Deeper, higher-indexed targets go first so that removing one array
    // element does not shift the positions a later target refers to.
    targets.sort_by(|a, b| pointer_order(b, a));

    for target in &targets {
        target.remove_from(document);
    }
}

fn pointer_order(a: &Pointer, b: &Pointer) -> Ordering {
    let mut left = a.segments().iter();
    let mut right = b.segments().iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<usize>(), r.parse::<usize>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn parse_document(body: &[u8], side: &str) -> Result<Value, String> {
    serde_json::from_slice(body).map_err(|e| format!("{} body is not valid JSON: {}", side, e))
}
