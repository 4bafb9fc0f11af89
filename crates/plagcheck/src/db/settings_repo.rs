//! The process-wide detection settings row.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{timestamp, Database, DatabaseError};

pub const DEFAULT_SIMILARITY_THRESHOLD: u8 = 75;
pub const DEFAULT_AUTO_DELETE_DAYS: u32 = 30;

/// Threshold and report retention, loaded once per job and passed down
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSettings {
    /// Minimum sentence score (0-100) counted as plagiarized.
    pub similarity_threshold: u8,
    /// Age in days after which reports are removed. 0 disables cleanup.
    pub auto_delete_days: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            auto_delete_days: DEFAULT_AUTO_DELETE_DAYS,
        }
    }
}

impl DetectionSettings {
    pub fn threshold(&self) -> u8 {
        self.similarity_threshold
    }

    pub fn auto_delete_days(&self) -> u32 {
        self.auto_delete_days
    }
}

/// Reads the settings, falling back to defaults when the row is missing.
pub fn get(db: &Database) -> Result<DetectionSettings, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT similarity_threshold, auto_delete_days FROM detection_settings WHERE id = 1",
                [],
                |r| {
                    Ok(DetectionSettings {
                        similarity_threshold: r.get(0)?,
                        auto_delete_days: r.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row.unwrap_or_default())
    })
}

/// Replaces the settings. The threshold must be within 0-100.
pub fn update(db: &Database, settings: &DetectionSettings, at: DateTime<Utc>) -> Result<(), DatabaseError> {
    if settings.similarity_threshold > 100 {
        return Err(DatabaseError::InvalidValue {
            column: "similarity_threshold",
            value: settings.similarity_threshold.to_string(),
        });
    }

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO detection_settings (id, similarity_threshold, auto_delete_days, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                similarity_threshold = excluded.similarity_threshold,
                auto_delete_days = excluded.auto_delete_days,
                updated_at = excluded.updated_at",
            params![
                settings.similarity_threshold,
                settings.auto_delete_days,
                timestamp(at)
            ],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_seeded() {
        let db = Database::open_in_memory().unwrap();
        let settings = get(&db).unwrap();
        assert_eq!(settings.threshold(), 75);
        assert_eq!(settings.auto_delete_days(), 30);
    }

    #[test]
    fn test_missing_row_falls_back_to_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute("DELETE FROM detection_settings", [])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(get(&db).unwrap(), DetectionSettings::default());
    }

    #[test]
    fn test_update_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let settings = DetectionSettings {
            similarity_threshold: 60,
            auto_delete_days: 0,
        };
        update(&db, &settings, Utc::now()).unwrap();
        assert_eq!(get(&db).unwrap(), settings);
    }

    #[test]
    fn test_update_rejects_threshold_above_100() {
        let db = Database::open_in_memory().unwrap();
        let result = update(
            &db,
            &DetectionSettings {
                similarity_threshold: 101,
                auto_delete_days: 30,
            },
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(DatabaseError::InvalidValue {
                column: "similarity_threshold",
                ..
            })
        ));
        assert_eq!(get(&db).unwrap().threshold(), 75);
    }
}
