use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{CollabContext, CollabEvent, RoomError, RoomId};

/// The kind of study session a countdown runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Work,
    Break,
    LongBreak,
}

impl SessionKind {
    /// The fixed countdown length for each session kind, in seconds.
    pub fn duration_secs(self) -> u32 {
        match self {
            Self::Work => 25 * 60,
            Self::Break => 5 * 60,
            Self::LongBreak => 15 * 60,
        }
    }
}

/// The synchronized countdown owned by a room. Created idle, mutated only by
/// the [TimerEngine], and destroyed together with its room.
#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    pub is_active: bool,
    pub kind: SessionKind,
    pub duration: u32,
    pub time_remaining: u32,
    /// How many work sessions were started in this room. Breaks don't count.
    pub session_count: u32,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for Timer {
    fn default() -> Self {
        let duration = SessionKind::Work.duration_secs();

        Self {
            is_active: false,
            kind: SessionKind::Work,
            duration,
            time_remaining: duration,
            session_count: 0,
            started_at: None,
        }
    }
}

static TICK_GENERATION: AtomicCell<u64> = AtomicCell::new(1);

/// The scheduled tick task of one room. The generation stamp lets a task that
/// ran to completion unregister itself without ever touching a successor
/// installed by a later `start`.
pub(crate) struct ScheduledTicks {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Drives the per-room countdowns. At most one schedule exists per room id;
/// starting supersedes whatever was running before.
pub struct TimerEngine {
    context: CollabContext,
}

enum TickOutcome {
    Continue,
    Superseded,
    Completed { kind: SessionKind, session_count: u32 },
}

impl TimerEngine {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Starts a countdown of the given kind. Cancelling and rescheduling
    /// happen under the registry lock, so a restart can never leave two
    /// schedules racing to decrement the same timer.
    pub fn start(&self, room_id: RoomId, kind: SessionKind) -> Result<Timer, RoomError> {
        let timer = {
            let mut rooms = self.context.rooms.lock();
            let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;

            self.context.cancel_ticks(room_id);

            let duration = kind.duration_secs();
            let timer = &mut room.timer;

            if kind == SessionKind::Work {
                timer.session_count += 1;
            }

            timer.is_active = true;
            timer.kind = kind;
            timer.duration = duration;
            timer.time_remaining = duration;
            timer.started_at = Some(Utc::now());

            self.context.schedule_ticks(room_id);
            timer.clone()
        };

        self.context.emit(CollabEvent::TimerStarted {
            room_id,
            timer: timer.clone(),
        });

        Ok(timer)
    }

    /// Halts the countdown without touching the remaining time. Returns None
    /// if the room is absent.
    pub fn pause(&self, room_id: RoomId) -> Option<Timer> {
        let timer = {
            let mut rooms = self.context.rooms.lock();
            let room = rooms.get_mut(&room_id)?;

            self.context.cancel_ticks(room_id);
            room.timer.is_active = false;
            room.timer.clone()
        };

        self.context.emit(CollabEvent::TimerPaused {
            room_id,
            timer: timer.clone(),
        });

        Some(timer)
    }

    /// Halts the countdown and resets the timer to its idle defaults,
    /// including the session counter.
    pub fn stop(&self, room_id: RoomId) -> Option<Timer> {
        let timer = {
            let mut rooms = self.context.rooms.lock();
            let room = rooms.get_mut(&room_id)?;

            self.context.cancel_ticks(room_id);
            room.timer = Timer::default();
            room.timer.clone()
        };

        self.context.emit(CollabEvent::TimerStopped {
            room_id,
            timer: timer.clone(),
        });

        Some(timer)
    }

    /// Cancels the room's schedule if one exists. Used by room eviction.
    pub fn clear_for_room(&self, room_id: RoomId) {
        self.context.cancel_ticks(room_id);
    }

    /// Cancels every schedule in the process. Used at shutdown.
    pub fn clear_all(&self) {
        for entry in self.context.timers.iter() {
            entry.value().handle.abort();
        }

        self.context.timers.clear();
    }
}

impl CollabContext {
    /// Aborts and forgets the room's tick task, if any. Idempotent.
    pub(crate) fn cancel_ticks(&self, room_id: RoomId) {
        if let Some((_, ticks)) = self.timers.remove(&room_id) {
            ticks.handle.abort();
        }
    }

    /// Installs a fresh tick task for the room. Callers must have cancelled
    /// the previous one first.
    pub(crate) fn schedule_ticks(&self, room_id: RoomId) {
        let generation = TICK_GENERATION.fetch_add(1);
        let handle = spawn_ticks(self.clone(), room_id, generation);

        self.timers
            .insert(room_id, ScheduledTicks { generation, handle });
    }
}

/// Ticks once a second, decrementing the room's remaining time and
/// broadcasting progress, until the countdown completes or the schedule is
/// superseded or its room disappears.
fn spawn_ticks(context: CollabContext, room_id: RoomId, generation: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));

        // The first tick of a tokio interval completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;

            let outcome = {
                let mut rooms = context.rooms.lock();

                let still_current = context
                    .timers
                    .get(&room_id)
                    .map(|t| t.generation == generation)
                    .unwrap_or(false);

                match rooms.get_mut(&room_id).filter(|_| still_current) {
                    None => TickOutcome::Superseded,
                    Some(room) => {
                        let timer = &mut room.timer;
                        timer.time_remaining = timer.time_remaining.saturating_sub(1);

                        context.emit(CollabEvent::TimerUpdate {
                            room_id,
                            time_remaining: timer.time_remaining,
                            kind: timer.kind,
                            session_count: timer.session_count,
                        });

                        if timer.time_remaining == 0 {
                            timer.is_active = false;

                            TickOutcome::Completed {
                                kind: timer.kind,
                                session_count: timer.session_count,
                            }
                        } else {
                            TickOutcome::Continue
                        }
                    }
                }
            };

            match outcome {
                TickOutcome::Continue => {}
                TickOutcome::Superseded => break,
                TickOutcome::Completed {
                    kind,
                    session_count,
                } => {
                    context
                        .timers
                        .remove_if(&room_id, |_, t| t.generation == generation);

                    context.emit(CollabEvent::TimerCompleted {
                        room_id,
                        kind,
                        session_count,
                    });

                    break;
                }
            }
        }
    })
}
