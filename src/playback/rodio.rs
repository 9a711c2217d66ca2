//! `rodio`-backed playback.
//!
//! A dedicated device thread owns the `OutputStream` (it is not `Send`) and
//! prepares paused sinks on request. Handle operations go straight to the
//! `Sink`, which is thread-safe; a per-handle monitor thread turns sink
//! observations into `Progress`/`Ended` events and re-queues the source when
//! looping.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, warn};

use super::{AudioBackend, AudioHandle, EventSink, PlaybackEvent};
use crate::error::{PlaybackError, Result};

/// Cadence of native `Progress` events.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

enum DeviceRequest {
    Open {
        path: String,
        reply: Sender<Result<Prepared>>,
    },
    /// Decode `path` again and append it to `sink` (loop wrap-around).
    Append { path: String, sink: Arc<Sink> },
}

struct Prepared {
    sink: Sink,
    duration: Option<Duration>,
}

/// Production backend. One instance per output device.
pub struct RodioBackend {
    tx: Sender<DeviceRequest>,
}

impl RodioBackend {
    /// Open the default output device.
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<DeviceRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        thread::spawn(move || device_loop(rx, ready_tx));
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PlaybackError::Device(
                "audio device thread exited during startup".to_string(),
            )),
        }
    }
}

impl AudioBackend for RodioBackend {
    fn open(&self, src: &str, events: EventSink) -> Result<Arc<dyn AudioHandle>> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(DeviceRequest::Open {
                path: src.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| PlaybackError::Device("audio device thread is gone".to_string()))?;
        let prepared = reply_rx
            .recv()
            .map_err(|_| PlaybackError::Device("audio device thread is gone".to_string()))??;

        let sink = Arc::new(prepared.sink);
        let state = Arc::new(Mutex::new(HandleState {
            volume: 1.0,
            muted: false,
            looping: false,
            ended: false,
        }));
        let closed = Arc::new(AtomicBool::new(false));

        spawn_monitor(
            sink.clone(),
            state.clone(),
            closed.clone(),
            events.clone(),
            self.tx.clone(),
            src.to_string(),
        );

        Ok(Arc::new(RodioHandle {
            sink,
            state,
            closed,
            events,
            duration: prepared.duration,
        }))
    }
}

fn device_loop(rx: Receiver<DeviceRequest>, ready: Sender<Result<()>>) {
    let mut stream: OutputStream = match OutputStreamBuilder::open_default_stream() {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(PlaybackError::Device(e.to_string())));
            return;
        }
    };
    // rodio logs to stderr when OutputStream is dropped; keep embedders' output clean.
    stream.log_on_drop(false);
    let _ = ready.send(Ok(()));

    // The loop also serves Append requests from monitor threads, so the
    // stream outlives the backend itself while any handle is still playing.
    while let Ok(req) = rx.recv() {
        match req {
            DeviceRequest::Open { path, reply } => {
                let _ = reply.send(prepare_sink(&stream, &path));
            }
            DeviceRequest::Append { path, sink } => match open_source(&path) {
                Ok((source, _)) => sink.append(source),
                Err(e) => warn!(src = %path, error = %e, "loop re-queue failed"),
            },
        }
    }
}

/// Decode `path` and wrap it in a paused `Sink` on `stream`.
fn prepare_sink(stream: &OutputStream, path: &str) -> Result<Prepared> {
    let (source, duration) = open_source(path)?;
    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);
    sink.pause();
    Ok(Prepared { sink, duration })
}

fn open_source(path: &str) -> Result<(Decoder<BufReader<File>>, Option<Duration>)> {
    let file = File::open(path)?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode {
        src: path.to_string(),
        reason: e.to_string(),
    })?;
    let duration = source.total_duration();
    Ok((source, duration))
}

struct HandleState {
    /// Logical volume; rodio has no mute, so muting zeroes the sink volume
    /// while this keeps the value to restore.
    volume: f32,
    muted: bool,
    looping: bool,
    ended: bool,
}

pub struct RodioHandle {
    sink: Arc<Sink>,
    state: Arc<Mutex<HandleState>>,
    closed: Arc<AtomicBool>,
    events: EventSink,
    duration: Option<Duration>,
}

impl AudioHandle for RodioHandle {
    fn play(&self) {
        if self.state.lock().unwrap().ended {
            return;
        }
        if self.sink.is_paused() {
            self.sink.play();
            self.events.emit(PlaybackEvent::Started);
        }
    }

    fn pause(&self) {
        if !self.sink.is_paused() {
            self.sink.pause();
            self.events.emit(PlaybackEvent::Paused);
        }
    }

    fn seek(&self, position: Duration) {
        if let Err(e) = self.sink.try_seek(position) {
            debug!(?position, error = ?e, "seek not supported for source");
        }
    }

    fn set_volume(&self, volume: f32) {
        let mut state = self.state.lock().unwrap();
        state.volume = volume;
        if !state.muted {
            self.sink.set_volume(volume);
        }
    }

    fn set_muted(&self, muted: bool) {
        let mut state = self.state.lock().unwrap();
        state.muted = muted;
        self.sink.set_volume(if muted { 0.0 } else { state.volume });
    }

    fn set_looping(&self, looping: bool) {
        self.state.lock().unwrap().looping = looping;
    }

    fn set_playback_rate(&self, rate: f32) {
        self.sink.set_speed(rate);
    }

    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    fn muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    fn looping(&self) -> bool {
        self.state.lock().unwrap().looping
    }

    fn playback_rate(&self) -> f32 {
        self.sink.speed()
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        self.sink.stop();
    }
}

fn spawn_monitor(
    sink: Arc<Sink>,
    state: Arc<Mutex<HandleState>>,
    closed: Arc<AtomicBool>,
    events: EventSink,
    device_tx: Sender<DeviceRequest>,
    src: String,
) {
    thread::spawn(move || {
        loop {
            thread::sleep(PROGRESS_INTERVAL);
            if closed.load(Ordering::Relaxed) {
                break;
            }
            if sink.is_paused() {
                continue;
            }
            if sink.empty() {
                let looping = state.lock().unwrap().looping;
                if looping {
                    let _ = device_tx.send(DeviceRequest::Append {
                        path: src.clone(),
                        sink: sink.clone(),
                    });
                    continue;
                }
                let first = {
                    let mut s = state.lock().unwrap();
                    let first = !s.ended;
                    s.ended = true;
                    first
                };
                if first {
                    events.emit(PlaybackEvent::Ended);
                }
                break;
            }
            events.emit(PlaybackEvent::Progress {
                position: sink.get_pos(),
            });
        }
    });
}
