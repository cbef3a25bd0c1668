use std::fmt;

use regex::Regex;
use serde_json::Value;

/// Shape of an acceptable noise pattern: an RFC 6901 pointer, optionally
/// closed by a single trailing `/*` wildcard. Also used by the configuration
/// layer to reject malformed patterns before they go live.
pub const POINTER_PATTERN_REGEX: &str = r"^(/([^/~*]|~[01])*)*(/\*)?$";

/// An RFC 6901 JSON pointer, held as decoded segments.
///
/// The empty pointer addresses the whole document. `~0`/`~1` escaping only
/// exists in the textual form; segments are stored unescaped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pointer {
    segments: Vec<String>,
}

impl Pointer {
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        if !raw.starts_with('/') {
            return Err(format!("JSON pointer {:?} must start with /", raw));
        }
        let mut segments = Vec::new();
        for token in raw[1..].split('/') {
            segments.push(unescape(token)?);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn append(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Self { segments }
    }

    pub fn append_index(&self, index: usize) -> Self {
        self.append(&index.to_string())
    }

    /// Deletes the addressed location from `value`. Returns whether anything
    /// was removed; a missing target is not an error. The root pointer has no
    /// parent to delete from and removes nothing.
    pub fn remove_from(&self, value: &mut Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            return false;
        };
        let mut current = value;
        for segment in parents {
            current = match current {
                Value::Object(map) => match map.get_mut(segment) {
                    Some(child) => child,
                    None => return false,
                },
                Value::Array(items) => {
                    match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                        Some(child) => child,
                        None => return false,
                    }
                }
                _ => return false,
            };
        }
        match current {
            Value::Object(map) => map.remove(last).is_some(),
            Value::Array(items) => match last.parse::<usize>() {
                Ok(index) if index < items.len() => {
                    items.remove(index);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", escape(segment))?;
        }
        Ok(())
    }
}

/// A pointer pattern: either an exact pointer or a prefix closed by `/*`.
///
/// A wildcard pattern matches every pointer that starts with the prefix and
/// carries at least one further segment; intermediate wildcards do not exist.
/// Segment comparison is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    prefix: Pointer,
    wildcard: bool,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let re = Regex::new(POINTER_PATTERN_REGEX).map_err(|e| e.to_string())?;
        if !re.is_match(raw) {
            return Err(format!("invalid JSON pointer pattern {:?}", raw));
        }
        match raw.strip_suffix("/*") {
            Some(prefix) => Ok(Self {
                prefix: Pointer::parse(prefix)?,
                wildcard: true,
            }),
            None => Ok(Self {
                prefix: Pointer::parse(raw)?,
                wildcard: false,
            }),
        }
    }

    pub fn exact(pointer: Pointer) -> Self {
        Self {
            prefix: pointer,
            wildcard: false,
        }
    }

    pub fn matches(&self, pointer: &Pointer) -> bool {
        if self.wildcard {
            pointer.segments().len() > self.prefix.segments().len()
                && &pointer.segments()[..self.prefix.segments().len()] == self.prefix.segments()
        } else {
            self.prefix == *pointer
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if self.wildcard {
            write!(f, "/*")?;
        }
        Ok(())
    }
}

/// True when any pattern matches the pointer.
pub fn matches_any(pointer: &Pointer, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(pointer))
}

/// Every pointer addressing a location inside `document`, depth-first and
/// left-to-right. The root pointer is not listed: it has no parent to act
/// on.
pub fn document_paths(document: &Value) -> Vec<Pointer> {
    let mut all = Vec::new();
    collect_paths(document, Pointer::root(), &mut all);
    all
}

fn collect_paths(value: &Value, path: Pointer, acc: &mut Vec<Pointer>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = path.append(key);
                acc.push(path.clone());
                collect_paths(child, path, acc);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = path.append_index(index);
                acc.push(path.clone());
                collect_paths(child, path, acc);
            }
        }
        _ => {}
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape(token: &str) -> Result<String, String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(format!("invalid escape sequence in token {:?}", token)),
        }
    }
    Ok(out)
}
