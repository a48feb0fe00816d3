//! Bounded forward-worker pool: executes one command against a tenant's
//! Storage Node per job, borrowing a pooled connection and returning it on
//! completion. A client connection submits its commands one at a time and
//! awaits each reply before reading its next line, so per-connection reply
//! ordering falls out of that wait rather than needing separate sequencing
//! machinery.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};

use hkv_common::{HkvError, HkvResult};

use crate::pool::ConnectionPool;
use crate::resp_read::read_one_reply;

struct Job {
    host: String,
    port: u16,
    command_line: String,
    reply: oneshot::Sender<HkvResult<Vec<u8>>>,
}

#[derive(Clone)]
pub struct ForwardDispatcher {
    sender: mpsc::Sender<Job>,
}

impl ForwardDispatcher {
    pub fn spawn(worker_count: usize, queue_capacity: usize, pool: Arc<ConnectionPool>) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        for _ in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else { break };
                    let result = run_job(&pool, &job).await;
                    let _ = job.reply.send(result);
                }
            });
        }

        ForwardDispatcher { sender }
    }

    /// Submits a command for execution against `(host, port)`. Returns
    /// `Err(())` immediately if the queue is full.
    pub fn try_submit(
        &self,
        host: String,
        port: u16,
        command_line: String,
    ) -> Result<oneshot::Receiver<HkvResult<Vec<u8>>>, ()> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .try_send(Job { host, port, command_line, reply })
            .map_err(|_| ())?;
        Ok(rx)
    }
}

async fn run_job(pool: &ConnectionPool, job: &Job) -> HkvResult<Vec<u8>> {
    let mut stream = pool.acquire(&job.host, job.port).await?;
    stream
        .write_all(job.command_line.as_bytes())
        .await
        .map_err(|err| HkvError::Transport(err.to_string()))?;
    stream
        .write_all(b"\r\n")
        .await
        .map_err(|err| HkvError::Transport(err.to_string()))?;

    let mut reader = BufReader::new(&mut stream);
    let reply = read_one_reply(&mut reader).await?;
    drop(reader);
    pool.release(&job.host, job.port, stream);
    Ok(reply)
}
