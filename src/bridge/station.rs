//! Station abstraction: a loop that pulls from one bridging channel,
//! processes each item on a worker thread, and pushes to another.

use crate::bridge::channel::{BridgeReceiver, BridgeSender};
use crate::bridge::error::{ErrorReporter, StationError};
use crate::bridge::worker::{Submission, WorkerThread};
use crate::error::Result;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A processing station.
///
/// Each station receives input, processes it, and produces output.
/// Stations run as a long-lived job on a `WorkerThread`.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g., filtered)
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> std::result::Result<Option<Self::Output>, StationError>;

    /// Output to emit in place of a recoverable failure, if any.
    fn recover(&mut self, _error: &StationError) -> Option<Self::Output> {
        None
    }

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called when the station is shutting down.
    fn shutdown(&mut self) {}
}

/// Runs a station loop on a worker thread.
pub struct StationRunner<S: Station> {
    submission: Submission<()>,
    station_name: &'static str,
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    /// Submits the station loop to `worker`.
    ///
    /// The loop ends when the input channel closes, the output channel's
    /// reader goes away, or the station reports a fatal error.
    pub fn spawn(
        worker: &WorkerThread,
        mut station: S,
        input_rx: BridgeReceiver<S::Input>,
        output_tx: BridgeSender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let station_name = station.name();
        let submission = worker.submit(move || {
            Self::run_station(&mut station, input_rx, output_tx, error_reporter);
        })?;

        Ok(Self {
            submission,
            station_name,
            _phantom: PhantomData,
        })
    }

    /// Main processing loop for the station.
    fn run_station(
        station: &mut S,
        mut input_rx: BridgeReceiver<S::Input>,
        output_tx: BridgeSender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) {
        let station_name = station.name();

        while let Some(input) = input_rx.blocking_recv() {
            let output = match station.process(input) {
                Ok(output) => output,
                Err(err @ StationError::Recoverable(_)) => {
                    error_reporter.report(station_name, &err);
                    station.recover(&err)
                }
                Err(err @ StationError::Fatal(_)) => {
                    error_reporter.report(station_name, &err);
                    break;
                }
            };

            if let Some(output) = output
                && output_tx.send(output).is_err()
            {
                debug!(station = station_name, "output reader gone, stopping");
                break;
            }
        }

        station.shutdown();
    }

    /// Waits for the station loop to finish.
    pub async fn join(self) -> Result<()> {
        self.submission.join().await
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::unbounded;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct DoublerStation {
        shutdown_called: Arc<AtomicBool>,
    }

    impl Station for DoublerStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: i32) -> std::result::Result<Option<i32>, StationError> {
            Ok(Some(input * 2))
        }

        fn name(&self) -> &'static str {
            "Doubler"
        }

        fn shutdown(&mut self) {
            self.shutdown_called.store(true, Ordering::SeqCst);
        }
    }

    /// Fails on one value and substitutes a sentinel for it.
    struct SubstitutingStation {
        fail_on: i32,
    }

    impl Station for SubstitutingStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: i32) -> std::result::Result<Option<i32>, StationError> {
            if input == self.fail_on {
                Err(StationError::Recoverable(format!("Failed on {}", input)))
            } else {
                Ok(Some(input))
            }
        }

        fn recover(&mut self, _error: &StationError) -> Option<i32> {
            Some(-1)
        }

        fn name(&self) -> &'static str {
            "Substituting"
        }
    }

    struct FatalStation;

    impl Station for FatalStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: i32) -> std::result::Result<Option<i32>, StationError> {
            if input < 0 {
                Err(StationError::Fatal("negative".to_string()))
            } else {
                Ok(Some(input))
            }
        }

        fn name(&self) -> &'static str {
            "Fatal"
        }
    }

    #[derive(Default)]
    struct MockReporter {
        errors: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ErrorReporter for MockReporter {
        fn report(&self, station: &str, error: &StationError) {
            let mut errors = self.errors.lock().unwrap();
            errors.push((station.to_string(), error.to_string()));
        }
    }

    #[tokio::test]
    async fn test_station_runner_basic_processing() {
        let worker = WorkerThread::spawn("station-basic").unwrap();
        let (input_tx, input_rx) = unbounded();
        let (output_tx, mut output_rx) = unbounded();
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let station = DoublerStation {
            shutdown_called: shutdown_flag.clone(),
        };
        let runner = StationRunner::spawn(
            &worker,
            station,
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
        )
        .unwrap();
        assert_eq!(runner.name(), "Doubler");

        input_tx.send(1).unwrap();
        input_tx.send(2).unwrap();
        input_tx.send(3).unwrap();
        drop(input_tx);

        let mut outputs = Vec::new();
        while let Some(output) = output_rx.recv().await {
            outputs.push(output);
        }

        assert_eq!(outputs, vec![2, 4, 6]);
        runner.join().await.unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_recoverable_error_emits_recovery_output() {
        let worker = WorkerThread::spawn("station-recover").unwrap();
        let (input_tx, input_rx) = unbounded();
        let (output_tx, mut output_rx) = unbounded();
        let reporter = Arc::new(MockReporter::default());
        let errors = reporter.errors.clone();

        let runner = StationRunner::spawn(
            &worker,
            SubstitutingStation { fail_on: 2 },
            input_rx,
            output_tx,
            reporter,
        )
        .unwrap();

        for i in 1..=3 {
            input_tx.send(i).unwrap();
        }
        drop(input_tx);

        let mut outputs = Vec::new();
        while let Some(output) = output_rx.recv().await {
            outputs.push(output);
        }
        runner.join().await.unwrap();

        assert_eq!(outputs, vec![1, -1, 3]);
        let reported = errors.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].0, "Substituting");
        assert!(reported[0].1.contains("Failed on 2"));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_loop() {
        let worker = WorkerThread::spawn("station-fatal").unwrap();
        let (input_tx, input_rx) = unbounded();
        let (output_tx, mut output_rx) = unbounded();

        let runner = StationRunner::spawn(
            &worker,
            FatalStation,
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
        )
        .unwrap();

        input_tx.send(1).unwrap();
        input_tx.send(-1).unwrap();

        // Input stays open: only the fatal error can end the loop.
        runner.join().await.unwrap();
        assert_eq!(output_rx.recv().await, Some(1));
        assert_eq!(output_rx.recv().await, None);
        assert!(input_tx.is_closed());
    }

    #[tokio::test]
    async fn test_worker_usable_after_station_finishes() {
        let worker = WorkerThread::spawn("station-reuse").unwrap();
        let (input_tx, input_rx) = unbounded();
        let (output_tx, _output_rx) = unbounded();

        let runner = StationRunner::spawn(
            &worker,
            FatalStation,
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
        )
        .unwrap();
        drop(input_tx);
        runner.join().await.unwrap();

        let value = worker.submit(|| "still alive").unwrap().join().await.unwrap();
        assert_eq!(value, "still alive");
    }
}
