pub mod media;

pub use media::{MediaStorage, StoredReport, REPORTS_DIR, TEMP_DIR};
