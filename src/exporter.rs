use std::fs::OpenOptions;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Interaction;
use crate::json_diff::DiffMode;

/// One upstream call as it goes to disk.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionRecord {
    pub url: String,
    pub content: String,
    pub status: u16,
}

impl From<&Interaction> for InteractionRecord {
    fn from(interaction: &Interaction) -> Self {
        Self {
            url: interaction.url.to_string(),
            content: String::from_utf8_lossy(&interaction.body).to_string(),
            status: interaction.status.as_u16(),
        }
    }
}

/// One full comparison: both (or all three) interactions, the mode it ran
/// under and the verdict.
#[derive(Debug, Clone, Serialize)]
pub struct Interactions {
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub equal: bool,
    pub primary: InteractionRecord,
    pub candidate: InteractionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<InteractionRecord>,
}

pub fn create_interactions(
    primary: &Interaction,
    candidate: &Interaction,
    secondary: Option<&Interaction>,
    mode: DiffMode,
    equal: bool,
) -> Interactions {
    Interactions {
        timestamp: Utc::now(),
        mode: mode.to_string(),
        equal,
        primary: primary.into(),
        candidate: candidate.into(),
        secondary: secondary.map(InteractionRecord::from),
    }
}

/// Appends the record as one JSON line. The caller treats failures as a
/// logging matter: the verdict never depends on the health of the sink.
pub fn export_to_file(path: &str, interactions: &Interactions) -> Result<(), String> {
    let line = serde_json::to_string(interactions).map_err(|e| e.to_string())?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("cannot open results file {}: {}", path, e))?;
    writeln!(file, "{}", line).map_err(|e| format!("cannot write results file {}: {}", path, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use http::{HeaderMap, StatusCode};
    use reqwest::Url;
    use std::time::Duration;

    fn interaction(url: &str, body: &[u8], status: u16) -> Interaction {
        Interaction {
            url: Url::parse(url).unwrap(),
            body: body.to_vec(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_create_interactions() {
        let primary = interaction("http://primary.test/now", br#"{"a":1}"#, 200);
        let candidate = interaction("http://candidate.test/now", br#"{"a":2}"#, 200);

        let record = create_interactions(&primary, &candidate, None, DiffMode::Subset, false);

        assert_eq!(record.mode, "Subset");
        assert!(!record.equal);
        assert!(record.secondary.is_none());
        assert_eq!(record.primary.url, "http://primary.test/now");
        assert_eq!(record.primary.content, r#"{"a":1}"#);
        assert_eq!(record.candidate.status, 200);
    }

    #[test]
    fn test_secondary_interaction_is_exported_when_present() {
        let primary = interaction("http://primary.test/now", br#"{"a":1}"#, 200);
        let candidate = interaction("http://candidate.test/now", br#"{"a":1}"#, 200);
        let secondary = interaction("http://secondary.test/now", br#"{"a":1}"#, 200);

        let record =
            create_interactions(&primary, &candidate, Some(&secondary), DiffMode::Strict, true);

        let secondary = record.secondary.expect("secondary must be exported");
        assert_eq!(secondary.url, "http://secondary.test/now");
        assert_eq!(secondary.status, 200);
    }

    #[test]
    fn test_export_appends_json_lines() {
        let path = std::env::temp_dir().join("contrast-exporter-test.jsonl");
        std::fs::remove_file(&path).ok();

        let primary = interaction("http://primary.test/", br#"{"a":1}"#, 200);
        let candidate = interaction("http://candidate.test/", br#"{"a":1}"#, 200);
        let record = create_interactions(&primary, &candidate, None, DiffMode::Strict, true);

        export_to_file(path.to_str().unwrap(), &record).unwrap();
        export_to_file(path.to_str().unwrap(), &record).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["mode"], "Strict");
            assert_eq!(parsed["equal"], true);
            assert!(parsed.get("secondary").is_none());
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_export_reports_unwritable_destination() {
        let dir = std::env::temp_dir();
        let primary = interaction("http://primary.test/", b"{}", 200);
        let candidate = interaction("http://candidate.test/", b"{}", 200);
        let record = create_interactions(&primary, &candidate, None, DiffMode::Strict, true);

        assert!(export_to_file(dir.to_str().unwrap(), &record).is_err());
    }
}
