//! Chunked audio decode pipeline.
//!
//! A single `DecodeStation` runs on the pipeline's worker thread and turns
//! compressed chunks into encoded output chunks, one for one. An absent chunk
//! ends the current stream without stopping the worker, so one pipeline can
//! carry many streams back to back.

use crate::bridge::channel::{BridgeReceiver, BridgeSender, Capacity, channel};
use crate::bridge::error::{ErrorReporter, LogReporter, StationError};
use crate::bridge::station::{Station, StationRunner};
use crate::bridge::worker::WorkerThread;
use crate::config::SynthesizerConfig;
use crate::defaults;
use crate::error::{BridgeError, Result};
use crate::synth::decode::ChunkDecoder;
use crate::synth::transcode::Transcoder;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// One item on the pipeline's input or output channel.
///
/// `bytes == None` is the end-of-stream marker and is always paired with
/// `is_last == true` on output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub bytes: Option<Bytes>,
    pub is_last: bool,
}

impl AudioChunk {
    pub fn data(bytes: impl Into<Bytes>, is_last: bool) -> Self {
        Self {
            bytes: Some(bytes.into()),
            is_last,
        }
    }

    pub fn end_of_stream() -> Self {
        Self {
            bytes: None,
            is_last: true,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.bytes.is_none()
    }
}

/// Where the decode loop is for the chunk in hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    WaitingForChunk,
    Decoding,
    Resampling,
    Emitting,
}

impl DecodeState {
    fn as_str(self) -> &'static str {
        match self {
            DecodeState::WaitingForChunk => "waiting",
            DecodeState::Decoding => "decoding",
            DecodeState::Resampling => "resampling",
            DecodeState::Emitting => "emitting",
        }
    }
}

/// Station that decodes and transcodes one chunk at a time.
pub struct DecodeStation<D> {
    decoder: D,
    transcoder: Transcoder,
    /// Set after a failure until the failed stream's last chunk is seen.
    discarding: bool,
    state: DecodeState,
}

impl<D: ChunkDecoder> DecodeStation<D> {
    pub fn new(decoder: D, transcoder: Transcoder) -> Self {
        Self {
            decoder,
            transcoder,
            discarding: false,
            state: DecodeState::WaitingForChunk,
        }
    }

    fn enter(&mut self, state: DecodeState) {
        trace!(from = self.state.as_str(), to = state.as_str(), "decode state");
        self.state = state;
    }

    fn fail(&mut self, is_last: bool, err: BridgeError) -> StationError {
        // Later chunks of the failed stream are dropped; the marker already went out.
        self.discarding = !is_last;
        self.enter(DecodeState::WaitingForChunk);
        StationError::Recoverable(err.to_string())
    }
}

impl<D: ChunkDecoder> Station for DecodeStation<D> {
    type Input = AudioChunk;
    type Output = AudioChunk;

    fn process(&mut self, chunk: AudioChunk) -> std::result::Result<Option<AudioChunk>, StationError> {
        let AudioChunk { bytes, is_last } = chunk;

        if self.discarding {
            if is_last || bytes.is_none() {
                self.discarding = false;
            }
            debug!("dropping chunk from failed stream");
            return Ok(None);
        }

        let Some(bytes) = bytes else {
            return Ok(Some(AudioChunk::end_of_stream()));
        };

        self.enter(DecodeState::Decoding);
        let audio = match self.decoder.decode(&bytes) {
            Ok(audio) => audio,
            Err(err) => return Err(self.fail(is_last, err)),
        };

        self.enter(DecodeState::Resampling);
        let encoded = match self.transcoder.transcode(&audio) {
            Ok(encoded) => encoded,
            Err(err) => return Err(self.fail(is_last, err)),
        };

        self.enter(DecodeState::Emitting);
        debug!(is_last, bytes = encoded.len(), "chunk decoded");
        let output = AudioChunk {
            bytes: Some(encoded),
            is_last,
        };
        self.enter(DecodeState::WaitingForChunk);
        Ok(Some(output))
    }

    fn recover(&mut self, _error: &StationError) -> Option<AudioChunk> {
        Some(AudioChunk::end_of_stream())
    }

    fn name(&self) -> &'static str {
        "decode"
    }

    fn shutdown(&mut self) {
        debug!(decoder = self.decoder.name(), "decode station stopped");
    }
}

/// Decode pipeline owning its worker thread and both channels.
pub struct AudioDecodePipeline<D: ChunkDecoder> {
    input: BridgeSender<AudioChunk>,
    output: BridgeReceiver<AudioChunk>,
    runner: StationRunner<DecodeStation<D>>,
    worker: WorkerThread,
}

impl<D: ChunkDecoder> AudioDecodePipeline<D> {
    /// Starts a pipeline with unbounded channels that logs decode failures.
    pub fn new(config: &SynthesizerConfig, decoder: D) -> Result<Self> {
        Self::spawn(config, decoder, Capacity::Unbounded, Arc::new(LogReporter))
    }

    pub fn spawn(
        config: &SynthesizerConfig,
        decoder: D,
        capacity: Capacity,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let transcoder = Transcoder::new(config.sampling_rate, config.audio_encoding);
        let decoder_name = decoder.name();
        let worker = WorkerThread::spawn(defaults::DECODER_WORKER_NAME)?;

        let (input, input_rx) = channel(capacity);
        let (output_tx, output) = channel(capacity);
        let runner = StationRunner::spawn(
            &worker,
            DecodeStation::new(decoder, transcoder),
            input_rx,
            output_tx,
            reporter,
        )?;

        info!(
            decoder = decoder_name,
            sample_rate = config.sampling_rate,
            encoding = %config.audio_encoding,
            "audio decode pipeline started"
        );

        Ok(Self {
            input,
            output,
            runner,
            worker,
        })
    }

    /// Queues one compressed chunk; `None` ends the current stream.
    ///
    /// With a bounded capacity this blocks when the queue is full and must
    /// not be called from async code; use `enqueue_async` there.
    pub fn enqueue(&self, bytes: Option<Bytes>, is_last: bool) -> Result<()> {
        self.input
            .send(AudioChunk { bytes, is_last })
            .map_err(|_| input_closed())
    }

    pub async fn enqueue_async(&self, bytes: Option<Bytes>, is_last: bool) -> Result<()> {
        self.input
            .send_async(AudioChunk { bytes, is_last })
            .await
            .map_err(|_| input_closed())
    }

    /// Cloned write half, for feeding the pipeline from another task.
    ///
    /// `shutdown` does not return until every clone has been dropped.
    pub fn input(&self) -> BridgeSender<AudioChunk> {
        self.input.clone()
    }

    /// Next output chunk, or `None` once the decode loop has stopped.
    pub async fn next_chunk(&mut self) -> Option<AudioChunk> {
        self.output.recv().await
    }

    /// Reads output up to and including the current stream's last chunk.
    pub async fn collect_stream(&mut self) -> Result<Vec<AudioChunk>> {
        let mut chunks = Vec::new();
        loop {
            let chunk = self
                .output
                .recv()
                .await
                .ok_or(BridgeError::StreamInterrupted)?;
            let is_last = chunk.is_last;
            chunks.push(chunk);
            if is_last {
                return Ok(chunks);
            }
        }
    }

    /// Closes the input, waits for queued chunks to drain, and stops the worker.
    ///
    /// Every queued chunk is still decoded; output produced during the drain
    /// is discarded.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            input,
            mut output,
            runner,
            worker,
        } = self;
        drop(input);

        // The output closes once the decode loop has consumed the whole queue.
        let mut discarded = 0usize;
        while output.recv().await.is_some() {
            discarded += 1;
        }
        debug!(discarded, "decode queue drained");

        runner.join().await?;
        worker.shutdown()
    }
}

fn input_closed() -> BridgeError {
    BridgeError::ChannelClosed {
        channel: "audio decode input".to_string(),
    }
}
