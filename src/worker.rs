//! Threaded pipeline: one worker per stage, bounded queues in between.
//!
//! ```text
//! caller ──chunks──▶ [analysis] ──frames──▶ [synthesis]
//!                                                  │
//!           events ◀── [reconstruction] ◀──frames──┘
//! ```
//!
//! Every queue is a bounded `crossbeam-channel`, so a slow stage blocks its
//! producer instead of dropping data. Channels are FIFO and each stage is a
//! single thread, which keeps frames in sequence order end to end. End of
//! input travels down the chain as a message: each stage drains what it
//! holds, then forwards the end marker. A stage that hits a fatal error
//! forwards it and stops; the caller sees it as [`PipelineEvent::Failed`].
//!
//! The latest spectrogram, when recording, is published with `ArcSwap` so
//! readers never block the analysis thread.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam_channel::{
    bounded, select, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use tracing::{debug, info, warn};
use voxmorph_analysis::{SpectralRepresentation, Spectrogram};
use voxmorph_core::{AudioChunk, Error as CoreError, PhonemeTimeline};
use voxmorph_transform::{OverlapAddReconstructor, SynthesizedFrame};

use crate::config::PipelineConfig;
use crate::stages::{AnalysisStage, SynthesisStage};
use crate::stats::{RunStats, StatsRecorder};
use crate::{Error, Result};

/// What the caller receives from a running worker.
#[derive(Debug)]
pub enum PipelineEvent {
    /// Output samples in stream order.
    Samples(Vec<f32>),
    /// The stream drained normally. Always the last event.
    Finished(RunStats),
    /// A stage failed; no further events follow.
    Failed(CoreError),
}

enum Input {
    Chunk(AudioChunk),
    End,
}

/// Sent between stages.
enum Packet<T> {
    Item(T),
    End(StageEnd),
    Failed(CoreError),
}

struct StageEnd {
    input_len: u64,
    output_len: u64,
    stats: StatsRecorder,
}

/// Handle to a running threaded pipeline.
///
/// Dropping the handle without calling [`finish`](Self::finish) abandons
/// the run: the workers see their queues disconnect and exit.
pub struct PipelineWorker {
    input: Option<Sender<Input>>,
    events: Receiver<PipelineEvent>,
    spectrogram: Option<Arc<ArcSwap<Spectrogram>>>,
    threads: Vec<JoinHandle<()>>,
}

impl PipelineWorker {
    /// Validate `config`, build every stage and start the workers.
    pub fn spawn(config: PipelineConfig, timeline: PhonemeTimeline) -> Result<Self> {
        config.validate()?;
        let layout = config.layout()?;
        let analysis = AnalysisStage::new(&config, layout)?;
        let synthesis = SynthesisStage::new(&config, layout, timeline, analysis.bands())?;
        let reconstructor = OverlapAddReconstructor::new(layout, config.reconstructor())?;

        let capacity = config.queue_capacity;
        let (input_tx, input_rx) = bounded(capacity);
        let (frames_tx, frames_rx) = bounded(capacity);
        let (synth_tx, synth_rx) = bounded(capacity);
        let (events_tx, events_rx) = bounded(capacity);

        let spectrogram = config
            .record_spectrogram
            .then(|| Arc::new(ArcSwap::from_pointee(Spectrogram::default())));

        let mut threads = Vec::with_capacity(3);
        let published = spectrogram.clone();
        threads.push(spawn_named("voxmorph-analysis", move || {
            run_analysis(analysis, input_rx, frames_tx, published)
        })?);
        threads.push(spawn_named("voxmorph-synthesis", move || {
            run_synthesis(synthesis, frames_rx, synth_tx)
        })?);
        let sample_rate = config.sample_rate;
        threads.push(spawn_named("voxmorph-reconstruction", move || {
            run_reconstruction(reconstructor, sample_rate, synth_rx, events_tx)
        })?);

        info!(capacity, mode = ?config.mode, "pipeline workers started");

        Ok(Self {
            input: Some(input_tx),
            events: events_rx,
            spectrogram,
            threads,
        })
    }

    fn sender(&self) -> Result<&Sender<Input>> {
        self.input
            .as_ref()
            .ok_or(Error::Core(CoreError::StreamClosed))
    }

    /// Queue a chunk, blocking while the input queue is full.
    pub fn push(&self, chunk: AudioChunk) -> Result<()> {
        self.sender()?
            .send(Input::Chunk(chunk))
            .map_err(|_| Error::Core(CoreError::StreamClosed))
    }

    /// Queue a chunk without blocking. A full queue is reported as
    /// `ResourceExhaustion` and the chunk is not queued.
    pub fn try_push(&self, chunk: AudioChunk) -> Result<()> {
        match self.sender()?.try_send(Input::Chunk(chunk)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(CoreError::ResourceExhaustion("input queue is full".into()).into())
            }
            Err(TrySendError::Disconnected(_)) => Err(CoreError::StreamClosed.into()),
        }
    }

    /// Queue a chunk, waiting at most `timeout` for room.
    pub fn push_timeout(&self, chunk: AudioChunk, timeout: Duration) -> Result<()> {
        match self.sender()?.send_timeout(Input::Chunk(chunk), timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(CoreError::ResourceExhaustion(format!(
                "input queue stayed full for {timeout:?}"
            ))
            .into()),
            Err(SendTimeoutError::Disconnected(_)) => Err(CoreError::StreamClosed.into()),
        }
    }

    /// Signal end of input. Blocks while the input queue is full, so keep
    /// reading events or use [`join`](Self::join).
    pub fn finish(&mut self) -> Result<()> {
        let Some(sender) = self.input.take() else {
            return Err(CoreError::StreamClosed.into());
        };
        sender.send(Input::End).map_err(|_| Error::Core(CoreError::StreamClosed))
    }

    /// Block for the next event. `None` once every worker has exited.
    pub fn recv(&self) -> Option<PipelineEvent> {
        self.events.recv().ok()
    }

    pub fn try_recv(&self) -> Option<PipelineEvent> {
        self.events.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<PipelineEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Blocking iterator over events until the workers exit.
    pub fn events(&self) -> impl Iterator<Item = PipelineEvent> + '_ {
        self.events.iter()
    }

    /// Latest published spectrogram, when recording is on.
    pub fn spectrogram(&self) -> Option<Arc<Spectrogram>> {
        self.spectrogram.as_ref().map(|s| s.load_full())
    }

    /// Finish the input if needed, collect all remaining output and join
    /// the workers.
    pub fn join(mut self) -> Result<(Vec<f32>, RunStats)> {
        let mut output = Vec::new();
        let mut outcome = Err(Error::Worker("workers exited without finishing".into()));
        let mut handle = |event: PipelineEvent| match event {
            PipelineEvent::Samples(samples) => output.extend(samples),
            PipelineEvent::Finished(stats) => outcome = Ok(stats),
            PipelineEvent::Failed(err) => outcome = Err(err.into()),
        };

        // Keep draining output while the end marker waits for queue space
        if let Some(sender) = self.input.take() {
            loop {
                select! {
                    send(sender, Input::End) -> _ => break,
                    recv(self.events) -> event => match event {
                        Ok(event) => handle(event),
                        Err(_) => break,
                    },
                }
            }
        }
        for event in self.events.iter() {
            handle(event);
        }

        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                return Err(Error::Worker("a pipeline worker panicked".into()));
            }
        }
        outcome.map(|stats| (output, stats))
    }
}

impl std::fmt::Debug for PipelineWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineWorker")
            .field("accepting", &self.input.is_some())
            .field("threads", &self.threads.len())
            .finish()
    }
}

fn spawn_named<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(std::thread::Builder::new().name(name.into()).spawn(body)?)
}

fn run_analysis(
    mut stage: AnalysisStage,
    input: Receiver<Input>,
    output: Sender<Packet<SpectralRepresentation>>,
    spectrogram: Option<Arc<ArcSwap<Spectrogram>>>,
) {
    let publish = |stage: &AnalysisStage| {
        if let (Some(target), Some(snapshot)) = (&spectrogram, stage.spectrogram()) {
            target.store(Arc::new(snapshot));
        }
    };

    for message in input.iter() {
        match message {
            Input::Chunk(chunk) => match stage.push(&chunk) {
                Ok(frames) => {
                    publish(&stage);
                    for frame in frames {
                        if output.send(Packet::Item(frame)).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "analysis stage stopped");
                    let _ = output.send(Packet::Failed(err));
                    return;
                }
            },
            Input::End => {
                for frame in stage.finish() {
                    if output.send(Packet::Item(frame)).is_err() {
                        return;
                    }
                }
                publish(&stage);
                let end = StageEnd {
                    input_len: stage.total_input(),
                    output_len: 0,
                    stats: stage.stats().clone(),
                };
                let _ = output.send(Packet::End(end));
                debug!("analysis stage drained");
                return;
            }
        }
    }
    debug!("analysis input disconnected");
}

fn run_synthesis(
    mut stage: SynthesisStage,
    input: Receiver<Packet<SpectralRepresentation>>,
    output: Sender<Packet<SynthesizedFrame>>,
) {
    for packet in input.iter() {
        match packet {
            Packet::Item(representation) => match stage.push(representation) {
                Ok(frames) => {
                    for frame in frames {
                        if output.send(Packet::Item(frame)).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "synthesis stage stopped");
                    let _ = output.send(Packet::Failed(err));
                    return;
                }
            },
            Packet::End(mut end) => {
                let (frames, output_len) = stage.finish(end.input_len);
                for frame in frames {
                    if output.send(Packet::Item(frame)).is_err() {
                        return;
                    }
                }
                end.output_len = output_len;
                let _ = output.send(Packet::End(end));
                debug!("synthesis stage drained");
                return;
            }
            Packet::Failed(err) => {
                let _ = output.send(Packet::Failed(err));
                return;
            }
        }
    }
}

fn run_reconstruction(
    mut reconstructor: OverlapAddReconstructor,
    sample_rate: u32,
    input: Receiver<Packet<SynthesizedFrame>>,
    events: Sender<PipelineEvent>,
) {
    let mut stats = StatsRecorder::new(sample_rate);
    for packet in input.iter() {
        match packet {
            Packet::Item(frame) => match reconstructor.push(frame) {
                Ok(samples) => {
                    stats.record_synthesized(1);
                    if samples.is_empty() {
                        continue;
                    }
                    stats.record_output(&samples);
                    if events.send(PipelineEvent::Samples(samples)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "reconstruction stage stopped");
                    let _ = events.send(PipelineEvent::Failed(err));
                    return;
                }
            },
            Packet::End(end) => {
                let tail = reconstructor.finish(end.output_len);
                stats.record_output(&tail);
                if !tail.is_empty() && events.send(PipelineEvent::Samples(tail)).is_err() {
                    return;
                }
                let mut total = end.stats;
                total.merge(&stats);
                let summary = total.snapshot();
                info!(
                    input_secs = summary.input_secs(),
                    output_secs = summary.output_secs(),
                    frames = summary.frames_analyzed,
                    "pipeline workers drained"
                );
                let _ = events.send(PipelineEvent::Finished(summary));
                return;
            }
            Packet::Failed(err) => {
                let _ = events.send(PipelineEvent::Failed(err));
                return;
            }
        }
    }
}
