#![allow(dead_code)]

//! Shared fixtures: a scripted backend, a hand-cranked scheduler and
//! callback counters.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use audiotracks::{
    AudioBackend, AudioHandle, AudiotrackManager, EventSink, PlaybackError, PlaybackEvent,
    RepeatingTask, Scheduler, Settings,
};

struct MockState {
    volume: f32,
    muted: bool,
    looping: bool,
    rate: f32,
    position: Duration,
    duration: Option<Duration>,
    paused: bool,
    finished: bool,
}

/// A handle that plays nothing. Playback flows from explicit test calls:
/// [`MockHandle::progress`], [`MockHandle::finish`] and [`MockHandle::fail`]
/// stand in for the signals a real output stream would raise.
pub struct MockHandle {
    pub src: String,
    state: Mutex<MockState>,
    events: EventSink,
}

impl MockHandle {
    fn new(src: &str, events: EventSink) -> Self {
        Self {
            src: src.to_string(),
            state: Mutex::new(MockState {
                volume: 1.0,
                muted: false,
                looping: false,
                rate: 1.0,
                position: Duration::ZERO,
                duration: Some(Duration::from_secs(30)),
                paused: true,
                finished: false,
            }),
            events,
        }
    }

    /// Moves the play head and raises a progress notification.
    pub fn progress(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
        self.events.emit(PlaybackEvent::Progress { position });
    }

    /// Moves the play head silently, for timer-driven polling tests.
    pub fn set_position(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    /// Signals the end of the source.
    pub fn finish(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.finished {
                return;
            }
            state.finished = true;
        }
        self.events.emit(PlaybackEvent::Ended);
    }

    /// Signals a playback failure.
    pub fn fail(&self, reason: &str) {
        self.state.lock().unwrap().finished = true;
        self.events.emit(PlaybackEvent::Error {
            message: reason.to_string(),
        });
    }

    pub fn is_playing(&self) -> bool {
        let state = self.state.lock().unwrap();
        !state.paused && !state.finished
    }
}

impl AudioHandle for MockHandle {
    fn play(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.finished || !state.paused {
                return;
            }
            state.paused = false;
        }
        self.events.emit(PlaybackEvent::Started);
    }

    fn pause(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.finished || state.paused {
                return;
            }
            state.paused = true;
        }
        self.events.emit(PlaybackEvent::Paused);
    }

    fn seek(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn set_looping(&self, looping: bool) {
        self.state.lock().unwrap().looping = looping;
    }

    fn set_playback_rate(&self, rate: f32) {
        self.state.lock().unwrap().rate = rate;
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
        self.state.lock().unwrap().rate
    }

    fn position(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().unwrap().duration
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }
}

/// Backend that hands out [`MockHandle`]s and records them in open order.
pub struct MockBackend {
    handles: Mutex<Vec<Arc<MockHandle>>>,
    fail_srcs: Mutex<HashSet<String>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handles: Mutex::new(Vec::new()),
            fail_srcs: Mutex::new(HashSet::new()),
        })
    }

    /// Makes every subsequent open of `src` fail.
    pub fn fail_on(&self, src: &str) {
        self.fail_srcs.lock().unwrap().insert(src.to_string());
    }

    pub fn open_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    /// The n-th handle handed out, in open order.
    pub fn handle(&self, index: usize) -> Arc<MockHandle> {
        self.handles.lock().unwrap()[index].clone()
    }

    /// The most recently opened handle for `src`.
    pub fn handle_for(&self, src: &str) -> Arc<MockHandle> {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|h| h.src == src)
            .cloned()
            .expect("no handle opened for src")
    }
}

impl AudioBackend for MockBackend {
    fn open(&self, src: &str, events: EventSink) -> audiotracks::Result<Arc<dyn AudioHandle>> {
        if self.fail_srcs.lock().unwrap().contains(src) {
            return Err(PlaybackError::Decode {
                src: src.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        let handle = Arc::new(MockHandle::new(src, events));
        self.handles.lock().unwrap().push(handle.clone());
        Ok(handle)
    }
}

struct ScheduledTask {
    every: Duration,
    tick: RepeatingTask,
}

/// Scheduler that only advances when the test cranks it.
pub struct ManualScheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Runs every scheduled task once, dropping the ones that cancel.
    /// Tasks are drained out of the lock first: a tick may re-enter the
    /// scheduler to register a replacement.
    pub fn tick_all(&self) {
        let drained: Vec<ScheduledTask> = std::mem::take(&mut *self.tasks.lock().unwrap());
        let mut kept = Vec::new();
        for mut task in drained {
            if (task.tick)() {
                kept.push(task);
            }
        }
        self.tasks.lock().unwrap().extend(kept);
    }
}

impl Scheduler for ManualScheduler {
    fn repeat(&self, every: Duration, tick: RepeatingTask) {
        self.tasks.lock().unwrap().push(ScheduledTask { every, tick });
    }
}

/// Engine wired to the scripted backend and manual scheduler.
pub fn engine(settings: Settings) -> (AudiotrackManager, Arc<MockBackend>, Arc<ManualScheduler>) {
    let backend = MockBackend::new();
    let scheduler = ManualScheduler::new();
    let manager = AudiotrackManager::with_scheduler(settings, backend.clone(), scheduler.clone());
    (manager, backend, scheduler)
}

/// Two tracks, full master volume, locales en+fr.
pub fn default_settings() -> Settings {
    Settings {
        track_length: 2,
        master_volume: 1.0,
        supported_locales: vec!["en".to_string(), "fr".to_string()],
        ..Settings::default()
    }
}

/// Thread-safe call counter for callback assertions.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ordered journal of callback firings.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
