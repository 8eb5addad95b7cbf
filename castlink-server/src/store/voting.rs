//! Vote session state
//!
//! One session at a time. Tallies mutate only while the session is running;
//! stop freezes them until an explicit reset. A sender gets one effective
//! vote per session: a later cast overwrites their earlier one.

use std::collections::HashMap;

use castlink_common::events::{VoteStatus, VotingSnapshot};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct VotingState {
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    question: String,
    options: Vec<String>,
    tallies: Vec<u64>,
    /// sender -> option index of their current vote
    ballots: HashMap<String, usize>,
    running: bool,
}

impl VotingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, replacing any previous one. Tallies start at
    /// zero for every option.
    pub fn start(&mut self, question: String, options: Vec<String>) -> Result<VotingSnapshot> {
        if options.len() < 2 {
            return Err(Error::InvalidVoteSession(format!(
                "need at least 2 options, got {}",
                options.len()
            )));
        }
        let tallies = vec![0; options.len()];
        self.session = Some(Session {
            question,
            options,
            tallies,
            ballots: HashMap::new(),
            running: true,
        });
        Ok(self.snapshot())
    }

    /// Record a vote. Rejected when no session is running or the option is
    /// out of bounds; a sender's repeat cast moves their vote.
    pub fn cast(&mut self, sender_id: &str, option_index: usize) -> Result<Vec<u64>> {
        let session = match &mut self.session {
            Some(s) if s.running => s,
            _ => return Err(Error::VoteNotRunning),
        };
        if option_index >= session.options.len() {
            return Err(Error::InvalidVoteOption(option_index));
        }

        if let Some(prev) = session.ballots.insert(sender_id.to_string(), option_index) {
            if prev == option_index {
                return Ok(session.tallies.clone());
            }
            session.tallies[prev] -= 1;
        }
        session.tallies[option_index] += 1;
        Ok(session.tallies.clone())
    }

    /// Close the running session. Tallies freeze at their final values.
    pub fn stop(&mut self) -> Result<Vec<u64>> {
        match &mut self.session {
            Some(s) if s.running => {
                s.running = false;
                Ok(s.tallies.clone())
            }
            _ => Err(Error::VoteNotRunning),
        }
    }

    /// Discard the session entirely, returning to idle
    pub fn reset(&mut self) {
        self.session = None;
    }

    pub fn snapshot(&self) -> VotingSnapshot {
        match &self.session {
            None => VotingSnapshot {
                status: VoteStatus::Idle,
                question: None,
                options: Vec::new(),
                tallies: Vec::new(),
            },
            Some(s) => VotingSnapshot {
                status: if s.running {
                    VoteStatus::Running
                } else {
                    VoteStatus::Stopped
                },
                question: Some(s.question.clone()),
                options: s.options.clone(),
                tallies: s.tallies.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> VotingState {
        let mut v = VotingState::new();
        v.start("next game?".into(), vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        v
    }

    #[test]
    fn test_start_zeroes_tallies() {
        let v = running();
        let snap = v.snapshot();
        assert_eq!(snap.status, VoteStatus::Running);
        assert_eq!(snap.tallies, vec![0, 0, 0]);
    }

    #[test]
    fn test_cast_rejected_when_not_running() {
        let mut v = VotingState::new();
        assert!(matches!(v.cast("alice", 0), Err(Error::VoteNotRunning)));

        let mut v = running();
        v.stop().unwrap();
        assert!(matches!(v.cast("alice", 0), Err(Error::VoteNotRunning)));
    }

    #[test]
    fn test_out_of_bounds_option_rejected() {
        let mut v = running();
        assert!(matches!(v.cast("alice", 3), Err(Error::InvalidVoteOption(3))));
        assert_eq!(v.snapshot().tallies, vec![0, 0, 0]);
    }

    #[test]
    fn test_repeat_cast_moves_vote() {
        let mut v = running();
        assert_eq!(v.cast("alice", 0).unwrap(), vec![1, 0, 0]);
        assert_eq!(v.cast("alice", 2).unwrap(), vec![0, 0, 1]);
        // same option again is a no-op
        assert_eq!(v.cast("alice", 2).unwrap(), vec![0, 0, 1]);
        assert_eq!(v.cast("bob", 2).unwrap(), vec![0, 0, 2]);
    }

    #[test]
    fn test_stop_freezes_and_reset_clears() {
        let mut v = running();
        v.cast("alice", 1).unwrap();
        assert_eq!(v.stop().unwrap(), vec![0, 1, 0]);
        assert_eq!(v.snapshot().status, VoteStatus::Stopped);

        v.reset();
        assert_eq!(v.snapshot().status, VoteStatus::Idle);
        assert!(v.snapshot().options.is_empty());
    }

    #[test]
    fn test_start_requires_two_options() {
        let mut v = VotingState::new();
        assert!(v.start("q".into(), vec!["only".into()]).is_err());
    }
}
