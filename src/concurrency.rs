use anyhow::{Context, anyhow};
use std::sync::mpsc::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) -> anyhow::Result<Worker> {
        let thread = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || loop {
                let message = match receiver.lock() {
                    Ok(rx) => rx.recv(),
                    Err(_) => break,
                };
                match message {
                    Ok(job) => {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::warn!(worker = id, "job panicked");
                        }
                    }
                    Err(_) => break,
                }
            })
            .with_context(|| format!("Can't spawn worker {}", id))?;

        tracing::debug!(worker = id, "worker started");
        Ok(Worker { id, thread })
    }
}

/// Fixed set of threads pulling jobs off a shared queue.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());

        for worker in self.workers.drain(..) {
            if worker.thread.join().is_err() {
                tracing::warn!(worker = worker.id, "worker panicked");
            }
        }
    }
}

impl ThreadPool {
    pub fn new(size: usize) -> anyhow::Result<Self> {
        if size == 0 {
            return Err(anyhow!("Thread pool needs at least one worker"));
        }

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(id, Arc::clone(&receiver))?);
        }

        Ok(ThreadPool {
            workers,
            sender: Some(sender),
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(f) as Job;
        self.sender
            .as_ref()
            .ok_or_else(|| anyhow!("Thread pool is shut down"))?
            .send(job)
            .map_err(|_| anyhow!("All workers have stopped"))
    }
}

/// How connections get a thread of their own.
pub enum Workers {
    /// A fresh thread for every connection.
    PerConnection,
    Pool(ThreadPool),
}

impl Workers {
    pub fn new(pool_size: Option<usize>) -> anyhow::Result<Workers> {
        match pool_size {
            None => Ok(Workers::PerConnection),
            Some(size) => Ok(Workers::Pool(ThreadPool::new(size)?)),
        }
    }

    pub fn execute<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Workers::PerConnection => {
                thread::Builder::new()
                    .name("connection".to_string())
                    .spawn(f)
                    .context("Can't spawn connection thread")?;
                Ok(())
            }
            Workers::Pool(pool) => pool.execute(f),
        }
    }
}
