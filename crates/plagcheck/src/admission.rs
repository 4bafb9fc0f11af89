//! Admission control: one active check per user and a daily upload quota.
//!
//! The checks and the counter increment run in one immediate SQLite
//! transaction, so concurrent submissions from the same user cannot both
//! pass a check that only one of them should pass.

use chrono::{Local, NaiveDate};

use crate::db::job_repo::{self, NewJob};
use crate::db::{quota_repo, Database, DatabaseError};
use crate::error::AdmissionError;

pub struct QuotaGuard {
    db: Database,
    default_limit: u32,
}

impl QuotaGuard {
    pub fn new(db: Database, default_limit: u32) -> Self {
        Self { db, default_limit }
    }

    /// Admits `jobs` for today in the server's local time zone.
    pub fn admit(&self, user_id: &str, jobs: &[NewJob]) -> Result<(), AdmissionError> {
        self.admit_at(user_id, jobs, Local::now().date_naive())
    }

    /// Admits all of `jobs` or none of them.
    ///
    /// On success the day's counter grows by `jobs.len()` and one pending
    /// history record exists per job.
    pub fn admit_at(&self, user_id: &str, jobs: &[NewJob], day: NaiveDate) -> Result<(), AdmissionError> {
        if jobs.is_empty() {
            return Err(AdmissionError::EmptySubmission);
        }
        let requested = u32::try_from(jobs.len()).unwrap_or(u32::MAX);

        self.db.with_transaction(|tx| {
            if job_repo::has_active_on(tx, user_id)? {
                return Err(AdmissionError::ActiveJob);
            }

            let limit = quota_repo::daily_limit_on(tx, user_id, self.default_limit)?;
            let used = quota_repo::used_on(tx, user_id, day)?;
            let remaining = limit.saturating_sub(used);
            if requested > remaining {
                return Err(AdmissionError::QuotaExceeded {
                    remaining,
                    requested,
                });
            }

            let total = quota_repo::increment_on(tx, user_id, day, requested)?;
            for job in jobs {
                job_repo::insert_pending_on(tx, job)?;
            }

            tracing::debug!(user_id, requested, used_today = total, limit, "Submission admitted");
            Ok(())
        })
    }

    /// Uploads the user may still submit today.
    pub fn remaining(&self, user_id: &str) -> Result<u32, DatabaseError> {
        quota_repo::remaining(&self.db, user_id, Local::now().date_naive(), self.default_limit)
    }

    pub fn daily_limit(&self, user_id: &str) -> Result<u32, DatabaseError> {
        quota_repo::daily_limit(&self.db, user_id, self.default_limit)
    }
}
