//! The conversation history and its trimming policy.

use crate::provider::ProviderFamily;
use crate::types::{Role, Turn};

/// An ordered list of turns, optionally led by a system turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Starts a conversation.  Families with a system role get a leading
    /// system turn when `system_prompt` is non-empty; the alternation family
    /// starts empty and receives the prompt inside its first user turn.
    pub fn initialize(system_prompt: Option<&str>, family: ProviderFamily) -> Self {
        let mut turns = Vec::new();
        if family.has_system_role()
            && let Some(prompt) = system_prompt.filter(|prompt| !prompt.is_empty())
        {
            turns.push(Turn::system(prompt));
        }
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Drops the oldest turns so at most `max_turns` remain after the
    /// optional leading system turn.
    ///
    /// When alternation is required an odd excess is rounded up so
    /// user/model pairs stay intact.  Returns how many turns were dropped.
    pub fn trim(&mut self, max_turns: usize, requires_alternation: bool) -> usize {
        let offset = usize::from(self.has_leading_system());
        let limit = max_turns + offset;
        if self.turns.len() <= limit {
            return 0;
        }
        let removable = self.turns.len() - offset;
        let mut excess = self.turns.len() - limit;
        if requires_alternation && excess % 2 == 1 && excess < removable {
            excess += 1;
        }
        self.turns.drain(offset..offset + excess);
        excess
    }

    /// Removes the last turn if it is a user turn.  Returns whether a turn
    /// was removed.
    pub fn rollback(&mut self) -> bool {
        if self.turns.last().is_some_and(|turn| turn.role == Role::User) {
            self.turns.pop();
            true
        } else {
            false
        }
    }

    /// Forgets everything, including the system turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Replaces the whole history, e.g. with a loaded session.
    pub fn replace(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }

    fn has_leading_system(&self) -> bool {
        self.turns.first().is_some_and(|turn| turn.role == Role::System)
    }
}
