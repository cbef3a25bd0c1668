// Copyright 2025 The Contrast Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod misc;
pub mod pointer;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use misc::{Indent, Indexes};
use pointer::Pointer;

/// How two JSON documents are held against each other.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum DiffMode {
    /// Values and structure must be identical.
    Strict,
    /// Every field of the primary document must appear with an equal value
    /// in the candidate document; the candidate may carry additional fields.
    Subset,
    /// Keys, array shapes and primitive type tags must match; primitive
    /// values are free to differ.
    Schema,
}

impl fmt::Display for DiffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffMode::Strict => write!(f, "Strict"),
            DiffMode::Subset => write!(f, "Subset"),
            DiffMode::Schema => write!(f, "Schema"),
        }
    }
}

impl FromStr for DiffMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Strict" => Ok(DiffMode::Strict),
            "Subset" => Ok(DiffMode::Subset),
            "Schema" => Ok(DiffMode::Schema),
            _ => Err(format!("cannot find {} difference mode", s)),
        }
    }
}

/// Boolean verdict over two raw bodies. Bodies that do not decode as JSON
/// fall back to byte equality.
pub fn compare_documents(primary: &[u8], candidate: &[u8], mode: DiffMode) -> bool {
    match (
        serde_json::from_slice::<Value>(primary),
        serde_json::from_slice::<Value>(candidate),
    ) {
        (Ok(primary), Ok(candidate)) => matches(&primary, &candidate, mode),
        _ => primary == candidate,
    }
}

/// Human-readable summary of every divergence between two raw bodies, empty
/// when the documents agree under the given mode. A body that does not
/// decode as JSON reports a single divergence at the document root, with
/// byte equality as the fallback comparison.
pub fn describe_differences(primary: &[u8], candidate: &[u8], mode: DiffMode) -> String {
    match (
        serde_json::from_slice::<Value>(primary),
        serde_json::from_slice::<Value>(candidate),
    ) {
        (Ok(primary), Ok(candidate)) => diff(&primary, &candidate, mode)
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => {
            if primary == candidate {
                String::new()
            } else {
                "documents at path \"\" are not valid JSON and differ as raw bytes".to_string()
            }
        }
    }
}

/// Every divergence between two decoded documents, depth-first and
/// left-to-right.
pub(crate) fn diff<'a>(primary: &'a Value, candidate: &'a Value, mode: DiffMode) -> Vec<Difference<'a>> {
    let mut acc = Accumulator::collector();
    DiffWalker { mode, acc: &mut acc }.walk(primary, candidate, Pointer::root());
    acc.into_vec()
}

/// Short-circuiting verdict over two decoded documents.
pub(crate) fn matches(primary: &Value, candidate: &Value, mode: DiffMode) -> bool {
    let mut acc = Accumulator::flag();
    DiffWalker { mode, acc: &mut acc }.walk(primary, candidate, Pointer::root());
    !acc.has_diff()
}

struct DiffWalker<'a, 'b> {
    mode: DiffMode,
    acc: &'b mut Accumulator<'a>,
}

macro_rules! accumulate {
    ($self:expr, $path:expr, $primary:expr, $candidate:expr) => {
        $self.acc.accumulate(Difference {
            path: $path,
            primary: $primary,
            candidate: $candidate,
        });

        if let Accumulator::Flag(true) = $self.acc {
            return;
        }
    };
}

impl<'a, 'b> DiffWalker<'a, 'b> {
    fn walk(&mut self, primary: &'a Value, candidate: &'a Value, path: Pointer) {
        match (primary, candidate) {
            (Value::Object(primary), Value::Object(candidate)) => {
                self.on_object(primary, candidate, path)
            }
            (Value::Array(primary), Value::Array(candidate)) => {
                self.on_array(primary, candidate, path)
            }
            _ => self.on_leaf(primary, candidate, path),
        }
    }

    /// Primitive nodes, and any pair whose container shapes disagree.
    fn on_leaf(&mut self, primary: &'a Value, candidate: &'a Value, path: Pointer) {
        let equal = match self.mode {
            DiffMode::Strict | DiffMode::Subset => primary == candidate,
            DiffMode::Schema => type_tag(primary) == type_tag(candidate),
        };

        if !equal {
            accumulate!(self, path, Some(primary), Some(candidate));
        }
    }

    fn on_object(
        &mut self,
        primary: &'a Map<String, Value>,
        candidate: &'a Map<String, Value>,
        path: Pointer,
    ) {
        match self.mode {
            DiffMode::Subset => {
                for (key, primary_value) in primary {
                    if let Accumulator::Flag(true) = self.acc {
                        return;
                    }

                    let path = path.append(key);

                    match candidate.get(key) {
                        Some(candidate_value) => self.walk(primary_value, candidate_value, path),
                        None => {
                            accumulate!(self, path, Some(primary_value), None);
                        }
                    }
                }
            }
            DiffMode::Strict | DiffMode::Schema => {
                let all_keys = primary
                    .keys()
                    .chain(candidate.keys())
                    .collect::<BTreeSet<_>>();
                for key in all_keys {
                    if let Accumulator::Flag(true) = self.acc {
                        return;
                    }

                    let path = path.append(key);

                    match (primary.get(key), candidate.get(key)) {
                        (Some(primary_value), Some(candidate_value)) => {
                            self.walk(primary_value, candidate_value, path);
                        }
                        (Some(primary_value), None) => {
                            accumulate!(self, path, Some(primary_value), None);
                        }
                        (None, Some(candidate_value)) => {
                            accumulate!(self, path, None, Some(candidate_value));
                        }
                        (None, None) => {
                            unreachable!("at least one of the maps has the key")
                        }
                    }
                }
            }
        }
    }

    fn on_array(&mut self, primary: &'a Vec<Value>, candidate: &'a Vec<Value>, path: Pointer) {
        match self.mode {
            DiffMode::Subset => {
                for (index, primary_value) in primary.iter().enumerate() {
                    if let Accumulator::Flag(true) = self.acc {
                        return;
                    }

                    let path = path.append_index(index);

                    match candidate.get(index) {
                        Some(candidate_value) => self.walk(primary_value, candidate_value, path),
                        None => {
                            accumulate!(self, path, Some(primary_value), None);
                        }
                    }
                }
            }
            DiffMode::Strict | DiffMode::Schema => {
                let all_indexes = primary
                    .indexes()
                    .into_iter()
                    .chain(candidate.indexes())
                    .collect::<BTreeSet<_>>();
                for index in all_indexes {
                    if let Accumulator::Flag(true) = self.acc {
                        return;
                    }

                    let path = path.append_index(index);

                    match (primary.get(index), candidate.get(index)) {
                        (Some(primary_value), Some(candidate_value)) => {
                            self.walk(primary_value, candidate_value, path);
                        }
                        (Some(primary_value), None) => {
                            accumulate!(self, path, Some(primary_value), None);
                        }
                        (None, Some(candidate_value)) => {
                            accumulate!(self, path, None, Some(candidate_value));
                        }
                        (None, None) => {
                            unreachable!("at least one of the arrays has the index")
                        }
                    }
                }
            }
        }
    }
}

fn type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug)]
enum Accumulator<'a> {
    Vec(Vec<Difference<'a>>),
    Flag(bool),
}

impl<'a> Accumulator<'a> {
    fn collector() -> Self {
        Accumulator::Vec(vec![])
    }

    fn flag() -> Self {
        Accumulator::Flag(false)
    }

    fn accumulate(&mut self, difference: Difference<'a>) {
        match self {
            Accumulator::Vec(list) => list.push(difference),
            Accumulator::Flag(value) => *value = true,
        }
    }

    fn has_diff(&self) -> bool {
        match self {
            Accumulator::Vec(list) => !list.is_empty(),
            Accumulator::Flag(value) => *value,
        }
    }

    fn into_vec(self) -> Vec<Difference<'a>> {
        match self {
            Accumulator::Vec(list) => list,
            Accumulator::Flag(_) => vec![],
        }
    }
}

/// One divergence between the two documents. A `None` side means the path is
/// absent from that document.
#[derive(Debug, PartialEq)]
pub(crate) struct Difference<'a> {
    path: Pointer,
    primary: Option<&'a Value>,
    candidate: Option<&'a Value>,
}

impl Difference<'_> {
    pub(crate) fn into_path(self) -> Pointer {
        self.path
    }
}

impl fmt::Display for Difference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json_to_string = |json: &Value| serde_json::to_string_pretty(json).unwrap_or_default();

        match (&self.primary, &self.candidate) {
            (Some(primary), Some(candidate)) => {
                writeln!(f, "json atoms at path \"{}\" are not equal:", self.path)?;
                writeln!(f, "    primary:")?;
                writeln!(f, "{}", json_to_string(primary).indent(8))?;
                writeln!(f, "    candidate:")?;
                write!(f, "{}", json_to_string(candidate).indent(8))?;
            }
            (Some(_), None) => {
                write!(
                    f,
                    "json atom at path \"{}\" is missing from candidate",
                    self.path
                )?;
            }
            (None, Some(_)) => {
                write!(
                    f,
                    "json atom at path \"{}\" is missing from primary",
                    self.path
                )?;
            }
            (None, None) => unreachable!("can't both be missing"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn paths(primary: &Value, candidate: &Value, mode: DiffMode) -> Vec<String> {
        diff(primary, candidate, mode)
            .into_iter()
            .map(|d| d.into_path().to_string())
            .collect()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Strict".parse::<DiffMode>().unwrap(), DiffMode::Strict);
        assert_eq!("Subset".parse::<DiffMode>().unwrap(), DiffMode::Subset);
        assert_eq!("Schema".parse::<DiffMode>().unwrap(), DiffMode::Schema);
        assert!("incorrect".parse::<DiffMode>().is_err());
        assert!("strict".parse::<DiffMode>().is_err());

        assert_eq!(DiffMode::Subset.to_string(), "Subset");
    }

    #[test]
    fn test_diffing_leaf_json() {
        let (primary, candidate) = (json!(null), json!(null));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 0);

        let (primary, candidate) = (json!(true), json!(true));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 0);

        let (primary, candidate) = (json!(false), json!(true));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 1);

        let (primary, candidate) = (json!(1), json!(1));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 0);

        let (primary, candidate) = (json!(1), json!(2));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 1);

        let (primary, candidate) = (json!("a"), json!("b"));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 1);

        let (primary, candidate) = (json!(null), json!("a"));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn test_strict_objects() {
        let (primary, candidate) = (json!({}), json!({}));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 0);

        // key order does not matter
        let primary = json!({ "a": 1, "b": 2 });
        let candidate = json!({ "b": 2, "a": 1 });
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 0);

        let primary = json!({ "a": 1 });
        let candidate = json!({ "a": 1, "b": 2 });
        assert_eq!(paths(&primary, &candidate, DiffMode::Strict), vec!["/b"]);

        let primary = json!({ "a": 1, "b": 2 });
        let candidate = json!({ "a": 1 });
        assert_eq!(paths(&primary, &candidate, DiffMode::Strict), vec!["/b"]);

        let primary = json!({ "a": { "b": true } });
        let candidate = json!({ "a": { "b": false } });
        assert_eq!(paths(&primary, &candidate, DiffMode::Strict), vec!["/a/b"]);
    }

    #[test]
    fn test_strict_arrays() {
        let (primary, candidate) = (json!([1, 2]), json!([1, 2]));
        let diffs = diff(&primary, &candidate, DiffMode::Strict);
        assert_eq!(diffs.len(), 0);

        let primary = json!([1, 2]);
        let candidate = json!([1]);
        assert_eq!(paths(&primary, &candidate, DiffMode::Strict), vec!["/1"]);

        let primary = json!([1]);
        let candidate = json!([1, 2]);
        assert_eq!(paths(&primary, &candidate, DiffMode::Strict), vec!["/1"]);

        let primary = json!([1, 3]);
        let candidate = json!([1, 2]);
        assert_eq!(paths(&primary, &candidate, DiffMode::Strict), vec!["/1"]);

        // shape mismatch is a single divergence at the node
        let primary = json!([1]);
        let candidate = json!(1);
        assert_eq!(paths(&primary, &candidate, DiffMode::Strict), vec![""]);
    }

    #[test]
    fn test_subset_objects() {
        // candidate may carry additional fields
        let primary = json!({ "a": 1 });
        let candidate = json!({ "a": 1, "b": 2 });
        let diffs = diff(&primary, &candidate, DiffMode::Subset);
        assert_eq!(diffs.len(), 0);

        // but everything in primary must be present and equal
        let primary = json!({ "a": 1, "b": 2 });
        let candidate = json!({ "a": 1 });
        assert_eq!(paths(&primary, &candidate, DiffMode::Subset), vec!["/b"]);

        let primary = json!({ "a": 1 });
        let candidate = json!({ "a": 2 });
        assert_eq!(paths(&primary, &candidate, DiffMode::Subset), vec!["/a"]);

        let primary = json!({ "a": { "b": 1 } });
        let candidate = json!({ "a": { "b": 1, "c": 2 }, "d": 3 });
        let diffs = diff(&primary, &candidate, DiffMode::Subset);
        assert_eq!(diffs.len(), 0);
    }

    #[test]
    fn test_subset_arrays() {
        let primary = json!([1, 2]);
        let candidate = json!([1, 2, 3]);
        let diffs = diff(&primary, &candidate, DiffMode::Subset);
        assert_eq!(diffs.len(), 0);

        let primary = json!([1, 2, 3]);
        let candidate = json!([1, 2]);
        assert_eq!(paths(&primary, &candidate, DiffMode::Subset), vec!["/2"]);

        // elements are compared by position
        let primary = json!([2, 1]);
        let candidate = json!([1, 2]);
        assert_eq!(
            paths(&primary, &candidate, DiffMode::Subset),
            vec!["/0", "/1"]
        );
    }

    #[test]
    fn test_schema() {
        // same shapes, different primitive values
        let primary = json!({ "id": 1, "name": "John", "tags": ["a"] });
        let candidate = json!({ "id": 2, "name": "Jane", "tags": ["b"] });
        let diffs = diff(&primary, &candidate, DiffMode::Schema);
        assert_eq!(diffs.len(), 0);

        // a type change is a divergence
        let primary = json!({ "id": 1 });
        let candidate = json!({ "id": "1" });
        assert_eq!(paths(&primary, &candidate, DiffMode::Schema), vec!["/id"]);

        let primary = json!({ "id": 1 });
        let candidate = json!({ "id": null });
        assert_eq!(paths(&primary, &candidate, DiffMode::Schema), vec!["/id"]);

        // key sets must match exactly
        let primary = json!({ "a": 1 });
        let candidate = json!({ "a": 2, "b": 3 });
        assert_eq!(paths(&primary, &candidate, DiffMode::Schema), vec!["/b"]);

        // array lengths must match exactly
        let primary = json!([1, 2]);
        let candidate = json!([3]);
        assert_eq!(paths(&primary, &candidate, DiffMode::Schema), vec!["/1"]);
    }

    #[test]
    fn test_divergence_paths_are_depth_first() {
        let primary = json!({
            "now": { "date": "2020-01-01", "slang_time": "morning" },
            "tz": "UTC"
        });
        let candidate = json!({
            "now": { "date": "2020-01-03", "slang_time": "evening" },
            "tz": "CET"
        });
        assert_eq!(
            paths(&primary, &candidate, DiffMode::Strict),
            vec!["/now/date", "/now/slang_time", "/tz"]
        );
    }

    #[test]
    fn test_escaped_keys_in_paths() {
        let primary = json!({ "a/b": 1, "m~n": 2 });
        let candidate = json!({ "a/b": 2, "m~n": 3 });
        assert_eq!(
            paths(&primary, &candidate, DiffMode::Strict),
            vec!["/a~1b", "/m~0n"]
        );
    }

    #[test]
    fn test_compare_documents() {
        assert!(compare_documents(
            br#"{"a": 1, "b": 2}"#,
            br#"{"b": 2, "a": 1}"#,
            DiffMode::Strict
        ));
        assert!(!compare_documents(
            br#"{"a": 1}"#,
            br#"{"a": 2}"#,
            DiffMode::Strict
        ));
        assert!(compare_documents(
            br#"{"a": 1}"#,
            br#"{"a": 2}"#,
            DiffMode::Schema
        ));

        // non-JSON bodies fall back to byte equality
        assert!(compare_documents(b"plain text", b"plain text", DiffMode::Strict));
        assert!(!compare_documents(b"plain text", b"other text", DiffMode::Strict));
        assert!(!compare_documents(br#"{"a": 1}"#, b"plain text", DiffMode::Strict));
    }

    #[test]
    fn test_describe_differences() {
        let summary = describe_differences(
            br#"{"a": 1}"#,
            br#"{"a": 1}"#,
            DiffMode::Strict,
        );
        assert_eq!(summary, "");

        let summary = describe_differences(
            br#"{"a": 1}"#,
            br#"{"a": 2}"#,
            DiffMode::Strict,
        );
        assert!(summary.contains("json atoms at path \"/a\" are not equal"));
        assert!(summary.contains("primary:"));
        assert!(summary.contains("candidate:"));

        let summary = describe_differences(
            br#"{"a": 1, "b": 1}"#,
            br#"{"a": 1}"#,
            DiffMode::Strict,
        );
        assert_eq!(summary, "json atom at path \"/b\" is missing from candidate");

        let summary = describe_differences(b"not json", b"other", DiffMode::Strict);
        assert!(summary.contains("not valid JSON"));

        let summary = describe_differences(b"not json", b"not json", DiffMode::Strict);
        assert_eq!(summary, "");
    }
}
