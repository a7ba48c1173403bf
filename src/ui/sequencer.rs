//! Two-stage open/close choreography shared by every slide-in panel.
//!
//! A panel has a *frame* (the outer container whose size transitions) and
//! *content* (inner markup that must not be present while collapsed). Opening
//! shows the frame first, then the content. Closing starts the collapse first
//! and removes content only once the collapse has had time to finish.
//!
//! [`StageSequencer`] is the pure state machine. [`Panel`] drives it with
//! tokio timers. Every scheduled step carries the generation it was scheduled
//! in, and a step from an older generation is dropped. That is what keeps a
//! quick open-then-close from showing content after the close.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::time::Instant;

/// Delays that must match the CSS transition declared for the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTiming {
    /// Gap between showing the frame and mounting content.
    pub open_stagger: Duration,
    /// Length of the size transition; content is removed after this on close.
    pub transition: Duration,
}

impl PanelTiming {
    pub const NEWS: PanelTiming = PanelTiming {
        open_stagger: Duration::ZERO,
        transition: Duration::from_millis(500),
    };
    pub const POST_MODAL: PanelTiming = PanelTiming {
        open_stagger: Duration::from_millis(50),
        transition: Duration::from_millis(500),
    };
    pub const DETAIL: PanelTiming = PanelTiming {
        open_stagger: Duration::from_millis(10),
        transition: Duration::from_millis(500),
    };
    pub const NAVIGATION: PanelTiming = PanelTiming {
        open_stagger: Duration::ZERO,
        transition: Duration::from_millis(300),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Closed,
    OpeningFrame,
    OpeningContent,
    Open,
    ClosingContent,
    ClosingFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelEvent {
    FrameShown,
    ContentShown,
    ExpandStarted,
    Expanded,
    CollapseStarted,
    ContentHidden,
    FrameHidden,
}

/// A deferred step, valid only for the generation it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    generation: u64,
}

/// Result of driving the sequencer once.
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    pub events: Vec<PanelEvent>,
    pub schedule: Option<(Duration, Tick)>,
    /// The panel just reached `Closed` through a full close.
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    pub stage: Stage,
    pub frame_visible: bool,
    pub content_visible: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone)]
pub struct StageSequencer {
    timing: PanelTiming,
    stage: Stage,
    generation: u64,
    frame_visible: bool,
    content_visible: bool,
    expanded: bool,
}

impl StageSequencer {
    pub fn new(timing: PanelTiming) -> Self {
        Self {
            timing,
            stage: Stage::Closed,
            generation: 0,
            frame_visible: false,
            content_visible: false,
            expanded: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_open_or_opening(&self) -> bool {
        matches!(
            self.stage,
            Stage::OpeningFrame | Stage::OpeningContent | Stage::Open
        )
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            stage: self.stage,
            frame_visible: self.frame_visible,
            content_visible: self.content_visible,
            expanded: self.expanded,
        }
    }

    pub fn open(&mut self) -> Step {
        let mut step = Step::default();
        match self.stage {
            Stage::OpeningFrame | Stage::OpeningContent | Stage::Open => return step,
            Stage::Closed | Stage::ClosingFrame => {
                self.generation += 1;
                self.frame_visible = true;
                step.events.push(PanelEvent::FrameShown);
                self.stage = Stage::OpeningFrame;
                if self.timing.open_stagger.is_zero() {
                    self.mount_content(&mut step);
                } else {
                    step.schedule = Some((self.timing.open_stagger, self.tick_token()));
                }
            }
            Stage::ClosingContent => {
                // Reopened mid-collapse: frame and content are still up.
                self.generation += 1;
                self.mount_content(&mut step);
            }
        }
        step
    }

    pub fn close(&mut self) -> Step {
        let mut step = Step::default();
        match self.stage {
            Stage::Closed | Stage::ClosingContent | Stage::ClosingFrame => step,
            Stage::OpeningFrame | Stage::OpeningContent | Stage::Open => {
                self.generation += 1;
                self.expanded = false;
                step.events.push(PanelEvent::CollapseStarted);
                self.stage = Stage::ClosingContent;
                step.schedule = Some((self.timing.transition, self.tick_token()));
                step
            }
        }
    }

    /// Advance a scheduled step. Stale ticks are ignored.
    pub fn tick(&mut self, tick: Tick) -> Step {
        let mut step = Step::default();
        if tick.generation != self.generation {
            return step;
        }
        match self.stage {
            Stage::OpeningFrame => self.mount_content(&mut step),
            Stage::OpeningContent => {
                self.stage = Stage::Open;
                step.events.push(PanelEvent::Expanded);
            }
            Stage::ClosingContent => {
                if self.content_visible {
                    self.content_visible = false;
                    step.events.push(PanelEvent::ContentHidden);
                }
                self.stage = Stage::ClosingFrame;
                step.schedule = Some((Duration::ZERO, self.tick_token()));
            }
            Stage::ClosingFrame => {
                self.frame_visible = false;
                step.events.push(PanelEvent::FrameHidden);
                self.stage = Stage::Closed;
                step.closed = true;
            }
            Stage::Closed | Stage::Open => {}
        }
        step
    }

    fn mount_content(&mut self, step: &mut Step) {
        if !self.content_visible {
            self.content_visible = true;
            step.events.push(PanelEvent::ContentShown);
        }
        self.expanded = true;
        step.events.push(PanelEvent::ExpandStarted);
        self.stage = Stage::OpeningContent;
        step.schedule = Some((self.timing.transition, self.tick_token()));
    }

    fn tick_token(&self) -> Tick {
        Tick {
            generation: self.generation,
        }
    }
}

const HISTORY_LIMIT: usize = 64;

struct PanelInner {
    seq: StageSequencer,
    on_closed: Option<BoxFuture<'static, ()>>,
    history: Vec<(Instant, PanelEvent)>,
}

/// A sequencer driven by tokio timers, shareable across handlers.
#[derive(Clone)]
pub struct Panel {
    name: &'static str,
    inner: Arc<Mutex<PanelInner>>,
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("name", &self.name)
            .field("stage", &self.snapshot().stage)
            .finish()
    }
}

impl Panel {
    pub fn new(name: &'static str, timing: PanelTiming) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(PanelInner {
                seq: StageSequencer::new(timing),
                on_closed: None,
                history: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.lock().seq.snapshot()
    }

    pub fn is_open_or_opening(&self) -> bool {
        self.lock().seq.is_open_or_opening()
    }

    /// Events observed so far, oldest first.
    pub fn history(&self) -> Vec<(Instant, PanelEvent)> {
        self.lock().history.clone()
    }

    pub fn open(&self) {
        let step = {
            let mut inner = self.lock();
            let step = inner.seq.open();
            if !step.events.is_empty() && inner.on_closed.take().is_some() {
                tracing::debug!(
                    panel = self.name,
                    "Reopened before close finished, dropping completion"
                );
            }
            step
        };
        self.apply(step);
    }

    /// Start closing. `on_closed` runs after the frame is hidden, or right away
    /// if the panel is already closed. A panel that is already collapsing runs
    /// it after any completion queued by the earlier close.
    pub fn close(&self, on_closed: Option<BoxFuture<'static, ()>>) {
        let step = {
            let mut inner = self.lock();
            let step = inner.seq.close();
            if step.events.is_empty() {
                let Some(done) = on_closed else {
                    return;
                };
                if inner.seq.stage() == Stage::Closed {
                    tokio::spawn(done);
                } else {
                    tracing::debug!(panel = self.name, "Already closing, queueing completion");
                    let queued: BoxFuture<'static, ()> = match inner.on_closed.take() {
                        Some(pending) => Box::pin(async move {
                            pending.await;
                            done.await;
                        }),
                        None => done,
                    };
                    inner.on_closed = Some(queued);
                }
                return;
            }
            inner.on_closed = on_closed;
            step
        };
        self.apply(step);
    }

    fn apply(&self, step: Step) {
        let done = {
            let mut inner = self.lock();
            let now = Instant::now();
            for event in &step.events {
                tracing::trace!(panel = self.name, ?event, "Panel event");
                inner.history.push((now, *event));
            }
            let overflow = inner.history.len().saturating_sub(HISTORY_LIMIT);
            inner.history.drain(..overflow);
            if step.closed {
                inner.on_closed.take()
            } else {
                None
            }
        };

        if let Some((after, tick)) = step.schedule {
            let panel = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let next = panel.lock().seq.tick(tick);
                panel.apply(next);
            });
        }

        if let Some(done) = done {
            tokio::spawn(done);
        }
    }
}
