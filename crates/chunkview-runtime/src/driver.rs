#![forbid(unsafe_code)]

//! Threaded driver: one engine, a worker pool, and a completion channel.
//!
//! ```text
//!  caller thread                          worker threads
//!  ─────────────                          ──────────────
//!  navigate / set_query / ...
//!     │ engine.update ──► effects
//!     │   LoadChunk / FetchTotal ──job──►  DataSource::load_chunk / total
//!     │                                        │
//!  pump / pump_blocking / wait_idle ◄──msg─────┘
//!     │ engine.update ──► more effects
//! ```
//!
//! The engine is only ever touched on the caller's thread. Completions are
//! applied one at a time in arrival order, so every handler sees a
//! consistent snapshot. Workers only run blocking data-source calls.
//!
//! Dropping the driver closes the job channel and joins the workers after
//! they finish their current call.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use chunkview_core::{
    ChunkRequest, ChunkResponse, Effect, EngineEvent, EngineMsg, ItemAt, Navigation, QueryParams,
    SelectionCommand, ViewportConfig, ViewportEngine,
};

use crate::source::DataSource;

/// Worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Worker threads running data-source calls. At least one is spawned.
    pub workers: usize,
    /// Upper bound for a single blocking wait in [`Driver::wait_idle`].
    pub poll_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_timeout: Duration::from_millis(50),
        }
    }
}

impl DriverConfig {
    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the poll timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

/// Errors from the threaded driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Every worker has exited; outstanding requests will never complete.
    Disconnected,
    /// Requests were still outstanding when the wait gave up.
    Timeout(Duration),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "driver workers disconnected"),
            Self::Timeout(waited) => write!(f, "requests still pending after {waited:?}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

enum Job {
    Total(QueryParams),
    Chunk(ChunkRequest),
    Select(QueryParams, SelectionCommand),
}

type Observer = Box<dyn FnMut(&EngineEvent) + Send>;

/// Runs a [`ViewportEngine`] against a [`DataSource`] on worker threads.
pub struct Driver<T, S> {
    engine: ViewportEngine<T>,
    source: Arc<S>,
    jobs: Option<Sender<Job>>,
    completions: Receiver<EngineMsg<T>>,
    workers: Vec<JoinHandle<()>>,
    in_flight: usize,
    events: Vec<EngineEvent>,
    observer: Option<Observer>,
    config: DriverConfig,
}

impl<T, S> fmt::Debug for Driver<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("workers", &self.workers.len())
            .field("in_flight", &self.in_flight)
            .field("events", &self.events.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, S> Driver<T, S>
where
    T: Send + 'static,
    S: DataSource<T>,
{
    /// Spawn workers and request the initial total.
    pub fn new(config: ViewportConfig, source: S, driver_config: DriverConfig) -> DriverResult<Self> {
        Self::with_engine(ViewportEngine::new(config), Arc::new(source), driver_config)
    }

    /// Spawn workers around an existing engine and shared source.
    pub fn with_engine(
        engine: ViewportEngine<T>,
        source: Arc<S>,
        driver_config: DriverConfig,
    ) -> DriverResult<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel::<EngineMsg<T>>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let worker_count = driver_config.workers.max(1);
        let workers = (0..worker_count)
            .map(|_| {
                let jobs = Arc::clone(&job_rx);
                let done = done_tx.clone();
                let source = Arc::clone(&source);
                std::thread::spawn(move || worker_loop(&*source, &jobs, &done))
            })
            .collect();
        debug!(workers = worker_count, source = source.name(), "driver started");

        let mut driver = Self {
            engine,
            source,
            jobs: Some(job_tx),
            completions: done_rx,
            workers,
            in_flight: 0,
            events: Vec::new(),
            observer: None,
            config: driver_config,
        };
        let effects = driver.engine.init();
        driver.execute(effects)?;
        Ok(driver)
    }

    /// Receive every [`EngineEvent`] as it is emitted.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&EngineEvent) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// The engine, for reading state.
    pub fn engine(&self) -> &ViewportEngine<T> {
        &self.engine
    }

    /// The shared data source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Requests sent to workers and not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Navigate and dispatch whatever loads follow.
    pub fn navigate(&mut self, nav: Navigation) -> DriverResult<()> {
        let effects = self.engine.navigate(nav);
        self.execute(effects)
    }

    /// Replace sort/filter parameters.
    pub fn set_query(&mut self, query: QueryParams) -> DriverResult<()> {
        let effects = self.engine.set_query(query);
        self.execute(effects)
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: ViewportConfig) -> DriverResult<()> {
        let effects = self.engine.set_config(config);
        self.execute(effects)
    }

    /// Re-fetch the total and reload resident chunks.
    pub fn refresh(&mut self) -> DriverResult<()> {
        let effects = self.engine.refresh();
        self.execute(effects)
    }

    /// Send a selection command to the data source.
    ///
    /// The outcome is applied by a later `pump`.
    pub fn select(&mut self, command: SelectionCommand) -> DriverResult<()> {
        self.send_job(Job::Select(self.engine.query().clone(), command))
    }

    /// Item at `index`. Dispatches its chunk when absent and returns `None`.
    pub fn item_at(&mut self, index: usize) -> DriverResult<Option<&T>> {
        if self.engine.peek(index).is_none() {
            if let ItemAt::Requested(effects) = self.engine.item_at(index) {
                self.execute(effects)?;
            }
            return Ok(None);
        }
        Ok(self.engine.peek(index))
    }

    /// Apply every completion that has already arrived. Never blocks.
    ///
    /// Returns the number of completions applied.
    pub fn pump(&mut self) -> DriverResult<usize> {
        let mut applied = 0;
        loop {
            match self.completions.try_recv() {
                Ok(msg) => {
                    self.apply(msg)?;
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return Ok(applied),
                Err(TryRecvError::Disconnected) if self.in_flight > 0 => {
                    return Err(DriverError::Disconnected);
                }
                Err(TryRecvError::Disconnected) => return Ok(applied),
            }
        }
    }

    /// Wait up to `timeout` for one completion, then drain the rest.
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    pub fn pump_blocking(&mut self, timeout: Duration) -> DriverResult<usize> {
        if self.in_flight == 0 {
            return self.pump();
        }
        match self.completions.recv_timeout(timeout) {
            Ok(msg) => {
                self.apply(msg)?;
                Ok(1 + self.pump()?)
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::Disconnected),
        }
    }

    /// Pump until nothing is in flight or `timeout` elapses.
    ///
    /// Completions can trigger follow-up requests (a total triggers chunk
    /// loads), so this waits for the whole cascade.
    pub fn wait_idle(&mut self, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let now = Instant::now();
            if now >= deadline {
                warn!(in_flight = self.in_flight, ?timeout, "driver did not go idle");
                return Err(DriverError::Timeout(timeout));
            }
            let wait = (deadline - now).min(self.config.poll_timeout);
            self.pump_blocking(wait)?;
        }
        Ok(())
    }

    fn apply(&mut self, msg: EngineMsg<T>) -> DriverResult<()> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let effects = self.engine.update(msg);
        self.execute(effects)
    }

    fn execute(&mut self, effects: Vec<Effect>) -> DriverResult<()> {
        for effect in effects {
            match effect {
                Effect::FetchTotal(query) => self.send_job(Job::Total(query))?,
                Effect::LoadChunk(request) => self.send_job(Job::Chunk(request))?,
                Effect::Emit(event) => {
                    if let Some(observer) = self.observer.as_mut() {
                        observer(&event);
                    }
                    self.events.push(event);
                }
            }
        }
        Ok(())
    }

    fn send_job(&mut self, job: Job) -> DriverResult<()> {
        let sender = self.jobs.as_ref().ok_or(DriverError::Disconnected)?;
        sender.send(job).map_err(|_| DriverError::Disconnected)?;
        self.in_flight += 1;
        Ok(())
    }
}

impl<T, S> Drop for Driver<T, S> {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop.
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("driver worker panicked");
            }
        }
    }
}

fn worker_loop<T, S>(source: &S, jobs: &Mutex<Receiver<Job>>, done: &Sender<EngineMsg<T>>)
where
    S: DataSource<T> + ?Sized,
{
    loop {
        let job = match jobs.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => return,
        };
        let Ok(job) = job else {
            return;
        };
        if done.send(run_job(source, job)).is_err() {
            return;
        }
    }
}

fn run_job<T, S>(source: &S, job: Job) -> EngineMsg<T>
where
    S: DataSource<T> + ?Sized,
{
    match job {
        Job::Total(query) => {
            let result = source.total(&query);
            if let Err(error) = &result {
                warn!(source = source.name(), %error, "total fetch failed");
            }
            EngineMsg::TotalLoaded { query, result }
        }
        Job::Chunk(request) => match source.load_chunk(&request) {
            Ok(items) => EngineMsg::ChunkLoaded(ChunkResponse::new(request, items)),
            Err(error) => EngineMsg::ChunkFailed { request, error },
        },
        Job::Select(query, command) => EngineMsg::SelectionChanged(source.select(&query, &command)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec_source::{Row, VecDataSource};

    const WAIT: Duration = Duration::from_secs(5);

    fn driver(total: u32) -> Driver<Row<u32>, VecDataSource<u32>> {
        let config = ViewportConfig::new(10, 25).with_thresholds(3, 7);
        Driver::new(config, VecDataSource::new(0..total), DriverConfig::default()).unwrap()
    }

    #[test]
    fn initial_load_completes() {
        let mut driver = driver(1_000);
        driver.wait_idle(WAIT).unwrap();
        assert_eq!(driver.engine().total_items(), 1_000);
        assert!(driver.engine().can_scroll());
        assert_eq!(driver.engine().resident_chunks(), vec![0, 25]);
    }

    #[test]
    fn observer_sees_every_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut driver = driver(100).with_observer(move |event| {
            sink.lock().unwrap().push(event.kind());
        });
        driver.wait_idle(WAIT).unwrap();
        let drained = driver.drain_events();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), drained.len());
        assert!(seen.contains(&"chunk_load_completed"));
    }

    #[test]
    fn display_messages() {
        assert_eq!(DriverError::Disconnected.to_string(), "driver workers disconnected");
        assert!(
            DriverError::Timeout(Duration::from_millis(5))
                .to_string()
                .contains("5ms")
        );
    }

    #[test]
    fn zero_workers_still_spawns_one() {
        let config = ViewportConfig::new(5, 10);
        let mut driver: Driver<Row<u32>, _> = Driver::new(
            config,
            VecDataSource::new(0..50u32),
            DriverConfig::default().with_workers(0),
        )
        .unwrap();
        driver.wait_idle(WAIT).unwrap();
        assert_eq!(driver.engine().total_items(), 50);
    }
}
