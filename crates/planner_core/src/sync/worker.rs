//! Fixed set of background threads fed by one FIFO job queue.
//!
//! # Invariants
//! - At most `size` jobs run at once; the rest wait in the queue, not on
//!   parked threads.
//! - Dropping the pool closes the queue. Workers finish every job already
//!   queued, then exit.
//! - A panicking job is logged and does not take its worker down.

use log::{error, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    size: usize,
}

impl WorkerPool {
    /// Spawns up to `size` workers (at least one is attempted).
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut started = 0;
        for index in 0..size.max(1) {
            let receiver = Arc::clone(&receiver);
            let spawned = thread::Builder::new()
                .name(format!("planner-sync-{index}"))
                .spawn(move || run_worker(&receiver));
            match spawned {
                Ok(_) => started += 1,
                Err(err) => error!(
                    "event=worker_spawn module=sync status=error error_code=thread_spawn_failed error={}",
                    err
                ),
            }
        }
        info!("event=worker_pool module=sync status=ok workers={}", started);

        Self {
            sender: (started > 0).then_some(sender),
            size: started,
        }
    }

    /// Number of live workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues `job`. Hands it back when no worker can ever run it.
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        match &self.sender {
            Some(sender) => sender.send(job).map_err(|rejected| rejected.0),
            None => Err(job),
        }
    }
}

fn run_worker(receiver: &Mutex<Receiver<Job>>) {
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = next else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("event=worker_job module=sync status=error error_code=job_panicked");
        }
    }
}
