//! Bounded worker pool that executes engine commands off each connection's
//! read loop.
//!
//! A fixed number of workers drain one shared bounded queue rather than a
//! task per request, so a burst of slow clients degrades to an explicit
//! busy reply instead of unbounded buffering. Mirrors the original control
//! plane's fixed forward-worker pool.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use hkv_engine::Keyspace;

struct Job {
    keyspace: Arc<Keyspace>,
    line: String,
    reply: oneshot::Sender<Vec<u8>>,
}

/// Handle to a running worker pool. Cheap to clone; every clone shares the
/// same queue.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Spawns `worker_count` workers draining a queue bounded at
    /// `queue_capacity`.
    pub fn spawn(worker_count: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        for _ in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else { break };
                    let response = hkv_engine::execute_line(&job.keyspace, &job.line);
                    let _ = job.reply.send(response);
                }
            });
        }

        Dispatcher { sender }
    }

    /// Submits one command line for execution. Returns `Err(())` immediately
    /// if the queue is already full instead of waiting for room — that's
    /// the backpressure signal callers turn into `-ERR server busy`.
    pub fn try_submit(
        &self,
        keyspace: Arc<Keyspace>,
        line: String,
    ) -> Result<oneshot::Receiver<Vec<u8>>, ()> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .try_send(Job { keyspace, line, reply })
            .map_err(|_| ())?;
        Ok(rx)
    }
}
