//! CSV import pipeline (C7, §6, §9): parse → pattern dedup → bulk insert,
//! reporting progress through a caller-supplied event sink rather than
//! owning the transport — keeps "doing the work" separate from
//! "broadcasting progress".

use std::io::Read;

use revisit_types::{DomainError, DomainResult, Difficulty};
use serde::{Deserialize, Serialize};

use crate::Database;

const BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Patterns,
    Problems,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportRowStatus {
    Created,
    Skipped,
    Error,
}

/// One row's disposition, kept in the rolling tail of the last 8 (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRowOutcome {
    pub row_number: usize,
    pub title: String,
    pub status: ImportRowStatus,
}

/// A `progress` SSE payload (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEvent {
    pub phase: ImportPhase,
    pub current_index: usize,
    pub total_items: usize,
    pub current_item: Option<String>,
    pub problems_created: usize,
    pub patterns_created: usize,
    pub duplicates_skipped: usize,
    pub percentage: f64,
    pub recent: Vec<ImportRowOutcome>,
}

/// Final counts, returned once the `complete` event is emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub problems_created: usize,
    pub patterns_created: usize,
    pub duplicates_skipped: usize,
    pub row_errors: Vec<(usize, String)>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    title: String,
    difficulty: String,
    url: Option<String>,
    source: Option<String>,
    patterns: Option<String>,
}

impl Database {
    /// Parse and import a CSV payload (§6 "CSV input format for import").
    /// Invalid rows are reported but do not abort the import. `on_event` is
    /// called after the patterns phase and after each batch of problems.
    pub async fn import_csv<R: Read, F: FnMut(ImportEvent)>(&self, reader: R, mut on_event: F) -> DomainResult<ImportOutcome> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);

        // Header names bind to `CsvRow` field names exactly; lowercase them
        // so "Title,Difficulty" and "title,difficulty" both deserialize (§6).
        let lowered: csv::StringRecord = rdr
            .headers()
            .map_err(|e| DomainError::BadRequest(format!("invalid csv headers: {e}")))?
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        rdr.set_headers(lowered);

        let mut rows = Vec::new();
        let mut row_errors = Vec::new();
        for (i, result) in rdr.deserialize::<CsvRow>().enumerate() {
            match result {
                Ok(row) => rows.push((i + 2, row)), // +2: header row + 1-based
                Err(e) => row_errors.push((i + 2, e.to_string())),
            }
        }

        let mut outcome = ImportOutcome {
            row_errors,
            ..Default::default()
        };
        let mut recent: Vec<ImportRowOutcome> = Vec::new();

        // Phase 1: dedup and create patterns across the whole file first,
        // so every problem row can link by name without re-querying.
        let mut pattern_name_to_id: std::collections::HashMap<String, String> = std::collections::HashMap::new();
        for (_, row) in &rows {
            if let Some(patterns) = &row.patterns {
                for name in patterns.split(',').map(|s| s.trim().trim_matches('"')).filter(|s| !s.is_empty()) {
                    let key = name.to_ascii_lowercase();
                    if pattern_name_to_id.contains_key(&key) {
                        continue;
                    }
                    let already_existed = self.find_pattern_by_title(name).await.is_ok_and(|p| p.is_some());
                    let pattern = self.find_or_create_pattern(name).await?;
                    if !already_existed {
                        outcome.patterns_created += 1;
                    }
                    pattern_name_to_id.insert(key, pattern.id);
                }
            }
        }

        on_event(ImportEvent {
            phase: ImportPhase::Patterns,
            current_index: 0,
            total_items: rows.len(),
            current_item: None,
            problems_created: outcome.problems_created,
            patterns_created: outcome.patterns_created,
            duplicates_skipped: outcome.duplicates_skipped,
            percentage: 0.0,
            recent: recent.clone(),
        });

        // Phase 2: problems, in atomic batches of 50.
        for (batch_index, batch) in rows.chunks(BATCH_SIZE).enumerate() {
            for (offset, (row_number, row)) in batch.iter().enumerate() {
                let index = batch_index * BATCH_SIZE + offset;
                let status = self.import_one_row(*row_number, row, &pattern_name_to_id, &mut outcome).await;
                recent.push(ImportRowOutcome {
                    row_number: *row_number,
                    title: row.title.clone(),
                    status,
                });
                if recent.len() > 8 {
                    recent.remove(0);
                }

                on_event(ImportEvent {
                    phase: ImportPhase::Problems,
                    current_index: index + 1,
                    total_items: rows.len(),
                    current_item: Some(row.title.clone()),
                    problems_created: outcome.problems_created,
                    patterns_created: outcome.patterns_created,
                    duplicates_skipped: outcome.duplicates_skipped,
                    percentage: if rows.is_empty() { 100.0 } else { 100.0 * (index + 1) as f64 / rows.len() as f64 },
                    recent: recent.clone(),
                });
            }
        }

        on_event(ImportEvent {
            phase: ImportPhase::Complete,
            current_index: rows.len(),
            total_items: rows.len(),
            current_item: None,
            problems_created: outcome.problems_created,
            patterns_created: outcome.patterns_created,
            duplicates_skipped: outcome.duplicates_skipped,
            percentage: 100.0,
            recent,
        });

        Ok(outcome)
    }

    async fn import_one_row(
        &self,
        row_number: usize,
        row: &CsvRow,
        pattern_name_to_id: &std::collections::HashMap<String, String>,
        outcome: &mut ImportOutcome,
    ) -> ImportRowStatus {
        let Some(difficulty) = Difficulty::parse(&row.difficulty) else {
            outcome.row_errors.push((row_number, format!("unknown difficulty '{}'", row.difficulty)));
            return ImportRowStatus::Error;
        };
        if row.title.trim().is_empty() {
            outcome.row_errors.push((row_number, "title is required".to_string()));
            return ImportRowStatus::Error;
        }

        match self
            .create_problem(&row.title, row.source.as_deref(), row.url.as_deref(), difficulty.as_str())
            .await
        {
            Ok(problem) => {
                if let Some(patterns) = &row.patterns {
                    let ids: Vec<String> = patterns
                        .split(',')
                        .map(|s| s.trim().trim_matches('"').to_ascii_lowercase())
                        .filter(|s| !s.is_empty())
                        .filter_map(|name| pattern_name_to_id.get(&name).cloned())
                        .collect();
                    let _ = self.link_patterns(&problem.id, &ids).await;
                }
                outcome.problems_created += 1;
                ImportRowStatus::Created
            }
            Err(DomainError::Conflict(_)) => {
                outcome.duplicates_skipped += 1;
                ImportRowStatus::Skipped
            }
            Err(e) => {
                outcome.row_errors.push((row_number, e.to_string()));
                ImportRowStatus::Error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn imports_valid_rows_and_links_patterns() {
        let db = Database::new_in_memory().await.unwrap();
        let csv = "title,difficulty,source,url,patterns\nTwo Sum,easy,leetcode,,\"hash map, two pointers\"\n";
        let mut events = Vec::new();
        let outcome = db.import_csv(csv.as_bytes(), |e| events.push(e)).await.unwrap();
        assert_eq!(outcome.problems_created, 1);
        assert_eq!(outcome.patterns_created, 2);
        assert!(events.iter().any(|e| e.phase == ImportPhase::Complete));
    }

    #[tokio::test]
    async fn duplicate_title_source_is_skipped_not_aborted() {
        let db = Database::new_in_memory().await.unwrap();
        let csv = "title,difficulty\nTwo Sum,easy\nTwo Sum,easy\nThree Sum,medium\n";
        let outcome = db.import_csv(csv.as_bytes(), |_| {}).await.unwrap();
        assert_eq!(outcome.problems_created, 2);
        assert_eq!(outcome.duplicates_skipped, 1);
    }

    #[tokio::test]
    async fn invalid_difficulty_is_reported_not_fatal() {
        let db = Database::new_in_memory().await.unwrap();
        let csv = "title,difficulty\nTwo Sum,easy\nBad Row,nightmare\n";
        let outcome = db.import_csv(csv.as_bytes(), |_| {}).await.unwrap();
        assert_eq!(outcome.problems_created, 1);
        assert_eq!(outcome.row_errors.len(), 1);
    }

    #[tokio::test]
    async fn pattern_dedup_is_idempotent_across_rows() {
        let db = Database::new_in_memory().await.unwrap();
        let csv = "title,difficulty,patterns\nA,easy,\"dp\"\nB,easy,\"DP\"\n";
        let outcome = db.import_csv(csv.as_bytes(), |_| {}).await.unwrap();
        assert_eq!(outcome.patterns_created, 1);
        assert_eq!(db.list_patterns().await.unwrap().len(), 1);
    }
}
