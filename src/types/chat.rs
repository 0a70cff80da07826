use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered conversation, oldest turn at the front.
///
/// Truncation only ever evicts from the front, so the backing store is a
/// deque rather than a vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: VecDeque<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push_back(turn);
    }

    /// Removes and returns the oldest turn.
    pub fn pop_oldest(&mut self) -> Option<ChatTurn> {
        self.turns.pop_front()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }
}

impl FromIterator<ChatTurn> for ChatHistory {
    fn from_iter<I: IntoIterator<Item = ChatTurn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<ChatTurn>> for ChatHistory {
    fn from(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns: turns.into(),
        }
    }
}

/// The instruction part of a request: either a bare string or an already
/// role-tagged message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Turns(Vec<ChatTurn>),
}

impl Prompt {
    /// A bare prompt becomes a single user turn.
    pub fn into_turns(self) -> Vec<ChatTurn> {
        match self {
            Prompt::Text(text) => vec![ChatTurn::user(text)],
            Prompt::Turns(turns) => turns,
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

impl From<Vec<ChatTurn>> for Prompt {
    fn from(turns: Vec<ChatTurn>) -> Self {
        Prompt::Turns(turns)
    }
}
