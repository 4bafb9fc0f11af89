use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use log::{debug, error, info};
use tokio::sync::broadcast;

use crate::broadcast::job_progress::JobProgressEvent;
use crate::error::WorkerError;
use crate::pipeline::progress::{BroadcastProgress, NoopProgress, ProgressReporter};
use crate::pipeline::Pipeline;
use crate::worker::job::{CheckJob, JobResult};

/// Finished results held for [`WorkerPool::recv_result`]. When callers do
/// not drain them the oldest are dropped; the job records keep every outcome.
pub const RESULT_BUFFER: usize = 1024;

pub struct WorkerPool {
    job_sender: Sender<CheckJob>,
    // Kept so jobs left in the queue after a shutdown can be handed back.
    job_receiver: Receiver<CheckJob>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize) -> Result<Self, WorkerError> {
        Self::with_progress_sender(pipeline, worker_count, None)
    }

    /// Starts `worker_count` workers (at least one) sharing `pipeline`.
    pub fn with_progress_sender(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
    ) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        // Admitted jobs are already recorded and counted against the quota,
        // so queueing them must never wait on worker capacity.
        let (job_sender, job_receiver) = unbounded::<CheckJob>();
        let (result_sender, result_receiver) = bounded::<JobResult>(RESULT_BUFFER);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let result_rx = result_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);
            let sender = progress_sender.clone();

            let handle = thread::Builder::new()
                .name(format!("plagcheck-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        job_rx,
                        result_tx,
                        result_rx,
                        shutdown_flag,
                        worker_pipeline,
                        sender,
                    );
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            job_receiver,
            result_receiver,
            workers,
            shutdown,
        })
    }

    /// Queues a job. Never blocks.
    pub fn submit(&self, job: CheckJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    /// Asks workers to stop after their current job.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Waits for all workers to stop. Queued jobs are drained by the
    /// workers unless [`WorkerPool::shutdown`] was called first; jobs that
    /// never started are returned.
    pub fn wait(self) -> Vec<CheckJob> {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        let leftover: Vec<CheckJob> = self.job_receiver.try_iter().collect();
        if !leftover.is_empty() {
            info!("{} queued job(s) did not start", leftover.len());
        }
        info!("All workers have stopped");
        leftover
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Hands a result to the buffer, dropping the oldest one when it is full.
/// Returns false when nobody can receive results any more.
fn deliver(sender: &Sender<JobResult>, receiver: &Receiver<JobResult>, result: JobResult) -> bool {
    let mut pending = result;
    loop {
        match sender.try_send(pending) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if let Ok(dropped) = receiver.try_recv() {
                    debug!("Dropped unread result of job {}", dropped.job_id);
                }
                pending = back;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<CheckJob>,
    result_sender: Sender<JobResult>,
    result_receiver: Receiver<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing job {}", worker_id, job.id);

                let progress: Box<dyn ProgressReporter> = match &progress_sender {
                    Some(sender) => Box::new(BroadcastProgress::new(
                        &job.id,
                        &job.filename,
                        Arc::clone(sender),
                    )),
                    None => Box::new(NoopProgress),
                };

                let fallback = job.clone();
                let result = match panic::catch_unwind(AssertUnwindSafe(|| {
                    pipeline.run(job, progress.as_ref())
                })) {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!("Worker {} job {} panicked: {}", worker_id, fallback.id, message);
                        pipeline.record_panic(&fallback, &message, progress.as_ref())
                    }
                };

                if !deliver(&result_sender, &result_receiver, result) {
                    error!("Worker {} failed to send result: channel closed", worker_id);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
