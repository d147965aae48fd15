// src/client/session.rs
//! Optimistic client session.
//!
//! Eating a meal lowers the local quantity at once and schedules the server
//! call behind an undo window. Undoing inside the window aborts the timer and
//! restores the local quantity; nothing is sent. A failed commit rolls the
//! local change back and reports it as a [`SessionEvent::RolledBack`].
//!
//! Once its call is on the wire a decrement can no longer be undone. It stays
//! in the pending list until the reply arrives, so the local list is always the
//! last fetched server list with every pending decrement applied on top.
//!
//! A poller compares the server's last-update stamp with the last one seen and
//! refetches the list when it moves.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::{ApiError, MealApi};
use crate::meals::api::{MealView, ReplyStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Refreshed { meals: usize },
    Committed { ticket: Uuid, row: u32 },
    /// Server declined the decrement without failing (e.g. already at 0)
    Notice { ticket: Uuid, message: String },
    RolledBack { ticket: Uuid, row: u32, message: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Row {0} is not in the meal list")]
    UnknownRow(u32),
    #[error("No {0} left")]
    NothingLeft(String),
    #[error("All of {0} is assigned, eat from a person's portion")]
    AllAssigned(String),
    #[error("{person} has no portion of {meal}")]
    NoPortion { person: String, meal: String },
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Decrement {0} is no longer pending")]
    NotPending(Uuid),
    #[error(transparent)]
    Api(#[from] ApiError),
}

struct PendingDecrement {
    ticket: Uuid,
    row: u32,
    person: Option<String>,
    /// The server call has started; undo is no longer possible
    in_flight: bool,
    timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SessionState {
    /// List as last fetched from the server
    server_meals: Vec<MealView>,
    /// `server_meals` with every pending decrement applied
    meals: Vec<MealView>,
    last_update: Option<String>,
    pending: Vec<PendingDecrement>,
}

impl SessionState {
    fn rebuild(&mut self) {
        let mut meals = self.server_meals.clone();
        for entry in &self.pending {
            if let Err(e) = apply_local(&mut meals, entry.row, entry.person.as_deref()) {
                debug!("pending decrement on row {} no longer applies: {}", entry.row, e);
            }
        }
        self.meals = meals;
    }

    /// Mark a waiting decrement as sent. None if it was undone or already sent.
    fn start_commit(&mut self, ticket: Uuid) -> Option<(u32, Option<String>)> {
        let entry = self.pending.iter_mut().find(|p| p.ticket == ticket && !p.in_flight)?;
        entry.in_flight = true;
        Some((entry.row, entry.person.clone()))
    }

    fn finish(&mut self, ticket: Uuid) {
        self.pending.retain(|p| p.ticket != ticket);
    }
}

struct Shared {
    api: Arc<dyn MealApi>,
    state: Mutex<SessionState>,
    events: UnboundedSender<SessionEvent>,
    undo_window: Duration,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("session event dropped, no listener");
        }
    }
}

#[derive(Clone)]
pub struct MealSession {
    shared: Arc<Shared>,
}

impl MealSession {
    pub fn new(api: Arc<dyn MealApi>, undo_window: Duration) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = unbounded_channel();
        let shared = Arc::new(Shared {
            api,
            state: Mutex::new(SessionState::default()),
            events,
            undo_window,
        });
        (Self { shared }, receiver)
    }

    /// Snapshot of the local list, pending decrements included
    pub fn meals(&self) -> Vec<MealView> {
        self.shared.state().meals.clone()
    }

    pub fn last_update(&self) -> Option<String> {
        self.shared.state().last_update.clone()
    }

    /// Decrements not yet answered by the server, in-flight ones included
    pub fn pending_count(&self) -> usize {
        self.shared.state().pending.len()
    }

    pub async fn refresh(&self) -> Result<(), SessionError> {
        refresh(&self.shared).await
    }

    /// Eat one portion of `row`, from `person`'s share if given.
    pub fn eat(&self, row: u32, person: Option<&str>) -> Result<Uuid, SessionError> {
        let ticket = Uuid::new_v4();
        {
            let mut state = self.shared.state();
            apply_local(&mut state.meals, row, person)?;
            state.pending.push(PendingDecrement {
                ticket,
                row,
                person: person.map(str::to_string),
                in_flight: false,
                timer: None,
            });
        }

        let shared = Arc::clone(&self.shared);
        let window = self.shared.undo_window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let started = shared.state().start_commit(ticket);
            if let Some((row, person)) = started {
                commit(&shared, ticket, row, person).await;
            }
        });

        let mut state = self.shared.state();
        match state.pending.iter_mut().find(|p| p.ticket == ticket) {
            Some(pending) => pending.timer = Some(timer),
            // already answered
            None => drop(timer),
        }
        debug!("eat: row {} person {:?} pending as {}", row, person, ticket);
        Ok(ticket)
    }

    pub fn undo(&self, ticket: Uuid) -> Result<(), SessionError> {
        let mut state = self.shared.state();
        let index = state
            .pending
            .iter()
            .position(|p| p.ticket == ticket && !p.in_flight)
            .ok_or(SessionError::NotPending(ticket))?;
        let pending = state.pending.remove(index);
        if let Some(timer) = &pending.timer {
            timer.abort();
        }
        state.rebuild();
        info!("undo: row {} restored", pending.row);
        Ok(())
    }

    /// Undo the most recent decrement still inside its window
    pub fn undo_last(&self) -> Result<Uuid, SessionError> {
        let ticket = self
            .shared
            .state()
            .pending
            .iter()
            .rev()
            .find(|p| !p.in_flight)
            .map(|p| p.ticket)
            .ok_or(SessionError::NothingToUndo)?;
        self.undo(ticket)?;
        Ok(ticket)
    }

    /// Commit every waiting decrement now and wait for the ones already in flight
    pub async fn flush(&self) {
        let mut due = Vec::new();
        let mut running = Vec::new();
        {
            let mut state = self.shared.state();
            for entry in state.pending.iter_mut() {
                if entry.in_flight {
                    running.extend(entry.timer.take());
                } else {
                    entry.in_flight = true;
                    if let Some(timer) = entry.timer.take() {
                        timer.abort();
                    }
                    due.push((entry.ticket, entry.row, entry.person.clone()));
                }
            }
        }

        for (ticket, row, person) in due {
            commit(&self.shared, ticket, row, person).await;
        }
        for timer in running {
            if let Err(e) = timer.await {
                warn!("commit task ended abnormally: {}", e);
            }
        }
    }

    /// Refresh when the server's last-update stamp moved. Returns whether it did.
    pub async fn poll_once(&self) -> Result<bool, SessionError> {
        let remote = self.shared.api.get_last_update().await?;
        let changed = self.shared.state().last_update != remote;
        if changed {
            debug!("poll: last update moved to {:?}", remote);
            refresh(&self.shared).await?;
        }
        Ok(changed)
    }

    pub fn spawn_poller(&self, every: Duration) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = session.poll_once().await {
                    warn!("poll failed: {}", e);
                }
            }
        })
    }
}

async fn refresh(shared: &Shared) -> Result<(), SessionError> {
    // stamp before list: a write landing in between leaves the stored stamp behind
    let last_update = shared.api.get_last_update().await?;
    let meals = shared.api.get_meals().await?;

    let count = {
        let mut state = shared.state();
        state.server_meals = meals;
        state.last_update = last_update;
        state.rebuild();
        state.meals.len()
    };
    shared.emit(SessionEvent::Refreshed { meals: count });
    Ok(())
}

async fn commit(shared: &Shared, ticket: Uuid, row: u32, person: Option<String>) {
    let result = match &person {
        Some(person) => shared.api.decrement_person_qty(row, person).await,
        None => shared.api.decrement_qty(row).await,
    };

    match result {
        Ok(reply) if reply.status == ReplyStatus::Info => {
            let message = reply.message.unwrap_or_default();
            info!("commit: row {} declined: {}", row, message);
            {
                let mut state = shared.state();
                state.finish(ticket);
                state.rebuild();
            }
            shared.emit(SessionEvent::Notice { ticket, message });
            if let Err(e) = refresh(shared).await {
                warn!("refresh after notice failed: {}", e);
            }
        }
        Ok(_) => {
            debug!("commit: row {} saved", row);
            {
                let mut state = shared.state();
                state.finish(ticket);
                if let Err(e) = apply_local(&mut state.server_meals, row, person.as_deref()) {
                    debug!("saved decrement on row {} not in the fetched list: {}", row, e);
                }
                // a refresh racing the reply may already hold this write; refetch on the next poll
                state.last_update = None;
                state.rebuild();
            }
            shared.emit(SessionEvent::Committed { ticket, row });
        }
        Err(e) => {
            warn!("commit: row {} failed: {}", row, e);
            {
                let mut state = shared.state();
                state.finish(ticket);
                state.rebuild();
            }
            shared.emit(SessionEvent::RolledBack { ticket, row, message: e.to_string() });
        }
    }
}

fn apply_local(meals: &mut [MealView], row: u32, person: Option<&str>) -> Result<(), SessionError> {
    let meal = meals
        .iter_mut()
        .find(|m| m.row == row)
        .ok_or(SessionError::UnknownRow(row))?;

    match person {
        Some(person) => {
            let name = meal.name.clone();
            let portion = meal.portion_mut(person).ok_or_else(|| SessionError::NoPortion {
                person: person.to_string(),
                meal: name.clone(),
            })?;
            if *portion == 0 {
                return Err(SessionError::NoPortion { person: person.to_string(), meal: name });
            }
            *portion -= 1;
            meal.total = meal.total.saturating_sub(1);
        }
        None => {
            if meal.total == 0 {
                return Err(SessionError::NothingLeft(meal.name.clone()));
            }
            let assigned: u32 = meal.portions.iter().flat_map(|p| p.values()).sum();
            if meal.total <= assigned {
                return Err(SessionError::AllAssigned(meal.name.clone()));
            }
            meal.total -= 1;
        }
    }
    Ok(())
}
