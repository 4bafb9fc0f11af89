pub mod job;
pub mod pool;

pub use job::{CheckJob, JobResult};
pub use pool::WorkerPool;
