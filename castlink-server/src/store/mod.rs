//! Shared widget state store
//!
//! Owns the counter widgets and the vote session behind a single `RwLock`,
//! so every mutation is atomic: a reader sees either the state before an
//! `apply` or the state after it, never a partial application.

mod counter;
mod voting;

pub use counter::CounterState;
pub use voting::VotingState;

use tokio::sync::RwLock;

use castlink_common::config::WidgetsConfig;
use castlink_common::events::{CounterSnapshot, MilestoneHit, VotingSnapshot};
use castlink_common::model::WidgetId;

use crate::error::{Error, Result};

pub struct Store {
    inner: RwLock<Inner>,
}

struct Inner {
    monetization: CounterState,
    guard_progress: CounterState,
    voting: VotingState,
}

impl Store {
    /// Build the store from widget configuration. Fails when a milestone
    /// list is invalid.
    pub fn new(widgets: &WidgetsConfig) -> Result<Self> {
        Ok(Self {
            inner: RwLock::new(Inner {
                monetization: CounterState::new(&widgets.monetization.milestones)?,
                guard_progress: CounterState::new(&widgets.guard_progress.milestones)?,
                voting: VotingState::new(),
            }),
        })
    }

    /// Apply a positive delta to a counter widget. Returns the post-apply
    /// snapshot and the milestones crossed by this delta, ascending.
    pub async fn apply(
        &self,
        widget: WidgetId,
        delta: f64,
    ) -> Result<(CounterSnapshot, Vec<MilestoneHit>)> {
        let mut inner = self.inner.write().await;
        let counter = Self::counter_mut(&mut inner, widget)?;
        let hits = counter.apply(delta)?;
        Ok((counter.snapshot(), hits))
    }

    /// Zero a counter widget and re-arm its milestones
    pub async fn reset(&self, widget: WidgetId) -> Result<CounterSnapshot> {
        let mut inner = self.inner.write().await;
        let counter = Self::counter_mut(&mut inner, widget)?;
        counter.reset();
        Ok(counter.snapshot())
    }

    pub async fn counter_snapshot(&self, widget: WidgetId) -> Result<CounterSnapshot> {
        let inner = self.inner.read().await;
        match widget {
            WidgetId::Monetization => Ok(inner.monetization.snapshot()),
            WidgetId::GuardProgress => Ok(inner.guard_progress.snapshot()),
            other => Err(Error::NotFound(format!("not a counter widget: {other}"))),
        }
    }

    pub async fn vote_start(
        &self,
        question: String,
        options: Vec<String>,
    ) -> Result<VotingSnapshot> {
        self.inner.write().await.voting.start(question, options)
    }

    pub async fn vote_cast(&self, sender_id: &str, option_index: usize) -> Result<VotingSnapshot> {
        let mut inner = self.inner.write().await;
        inner.voting.cast(sender_id, option_index)?;
        Ok(inner.voting.snapshot())
    }

    pub async fn vote_stop(&self) -> Result<VotingSnapshot> {
        let mut inner = self.inner.write().await;
        inner.voting.stop()?;
        Ok(inner.voting.snapshot())
    }

    pub async fn vote_reset(&self) -> VotingSnapshot {
        let mut inner = self.inner.write().await;
        inner.voting.reset();
        inner.voting.snapshot()
    }

    pub async fn voting_snapshot(&self) -> VotingSnapshot {
        self.inner.read().await.voting.snapshot()
    }

    fn counter_mut(inner: &mut Inner, widget: WidgetId) -> Result<&mut CounterState> {
        match widget {
            WidgetId::Monetization => Ok(&mut inner.monetization),
            WidgetId::GuardProgress => Ok(&mut inner.guard_progress),
            other => Err(Error::NotFound(format!("not a counter widget: {other}"))),
        }
    }
}
