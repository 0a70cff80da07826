use thiserror::Error;
use tracing::debug;

use crate::budget::{TokenCountError, TokenCounter};
use crate::config::ModelConfig;
use crate::types::{ChatHistory, ChatTurn, Prompt};

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error(
        "Token budget exhausted: {consumed} tokens already consumed, context length {context_length} with {reserved} reserved for generation"
    )]
    Exhausted {
        context_length: usize,
        reserved: usize,
        consumed: usize,
    },

    #[error("History share must be within (0, 1], got {0}")]
    InvalidHistoryShare(f64),

    #[error(transparent)]
    Counter(#[from] TokenCountError),
}

/// Outcome of fitting retrieved context into the remaining window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedContext {
    /// Surviving documents joined with newlines, in their original order.
    pub context: String,
    /// The history after front-truncation.
    pub history: ChatHistory,
    pub documents_kept: usize,
    pub documents_dropped: usize,
    /// Tokens of `context`.
    pub tokens: usize,
    /// Space that was left for context after prompt, history and query.
    pub available: usize,
}

/// Keeps prompt, history and retrieved context inside one model's window.
#[derive(Debug, Clone)]
pub struct TokenBudgetManager<C> {
    context_length: usize,
    reserved_generation_tokens: usize,
    counter: C,
}

impl<C: TokenCounter> TokenBudgetManager<C> {
    pub const DEFAULT_HISTORY_SHARE: f64 = 0.2;

    pub fn new(context_length: usize, reserved_generation_tokens: usize, counter: C) -> Self {
        Self {
            context_length,
            reserved_generation_tokens,
            counter,
        }
    }

    pub fn from_model(model: &ModelConfig, counter: C) -> Self {
        Self::new(model.context_length, model.reserved_generation_tokens, counter)
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn reserved_generation_tokens(&self) -> usize {
        self.reserved_generation_tokens
    }

    /// Window left once generation tokens are reserved.
    pub fn budget(&self) -> usize {
        self.context_length.saturating_sub(self.reserved_generation_tokens)
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    pub fn count_tokens(&self, text: &str) -> Result<usize, BudgetError> {
        Ok(self.counter.count_tokens(text)?)
    }

    /// Count a message list as its contents joined by newlines.
    ///
    /// Chat templates add role markers and separators this does not see, so
    /// the figure is a lower bound on what the provider bills.
    pub fn count_turns<'t, I>(&self, turns: I) -> Result<usize, BudgetError>
    where
        I: IntoIterator<Item = &'t ChatTurn>,
    {
        let joined = turns
            .into_iter()
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.count_tokens(&joined)
    }

    pub fn count_history(&self, history: &ChatHistory) -> Result<usize, BudgetError> {
        self.count_turns(history.iter())
    }

    /// `context_length - reserved - tokens(prompt)`, or `Exhausted` when that
    /// is not positive.
    pub fn get_avail_space(&self, prompt: &[ChatTurn]) -> Result<usize, BudgetError> {
        let consumed = self.count_turns(prompt)?;
        self.remaining_after(consumed)
    }

    /// Evict the oldest turns until [`count_history`](Self::count_history)
    /// fits in `floor(context_length * history_share)`. May empty the history.
    ///
    /// Returns the number of evicted turns.
    pub fn trunc_chat_history(&self, history: &mut ChatHistory, history_share: f64) -> Result<usize, BudgetError> {
        if !(history_share > 0.0 && history_share <= 1.0) {
            return Err(BudgetError::InvalidHistoryShare(history_share));
        }
        let limit = (self.context_length as f64 * history_share).floor() as usize;

        let mut evicted = 0;
        while !history.is_empty() && self.count_history(history)? > limit {
            history.pop_oldest();
            evicted += 1;
        }

        if evicted > 0 {
            debug!(evicted, remaining = history.len(), limit, "Chat history truncated");
        }
        Ok(evicted)
    }

    /// Fit `context` (documents in rank order) into what the prompt, history
    /// and query leave free.
    ///
    /// History is truncated first; a bare prompt counts as a single user
    /// turn. The lowest-ranked document is dropped until the newline-joined
    /// rest fits, down to an empty context.
    pub fn prepare_context<S: AsRef<str>>(
        &self,
        prompt: impl Into<Prompt>,
        context: &[S],
        query: Option<&str>,
        mut history: ChatHistory,
    ) -> Result<PreparedContext, BudgetError> {
        if !history.is_empty() {
            self.trunc_chat_history(&mut history, Self::DEFAULT_HISTORY_SHARE)?;
        }

        let prompt = prompt.into().into_turns();
        let query_len = match query {
            Some(q) if !q.is_empty() => self.count_tokens(q)?,
            _ => 0,
        };
        let consumed = self.count_turns(prompt.iter().chain(history.iter()))? + query_len;
        let available = self.remaining_after(consumed)?;

        let mut kept = context.len();
        let (joined, tokens) = loop {
            let joined = join_documents(&context[..kept]);
            let tokens = self.count_tokens(&joined)?;
            if tokens <= available || kept == 0 {
                break (joined, tokens);
            }
            debug!(tokens, available, remaining = kept - 1, "Context exceeds context window, removing one document");
            kept -= 1;
        };

        Ok(PreparedContext {
            context: joined,
            history,
            documents_kept: kept,
            documents_dropped: context.len() - kept,
            tokens,
            available,
        })
    }

    fn remaining_after(&self, consumed: usize) -> Result<usize, BudgetError> {
        match self.budget().checked_sub(consumed) {
            Some(available) if available > 0 => Ok(available),
            _ => Err(BudgetError::Exhausted {
                context_length: self.context_length,
                reserved: self.reserved_generation_tokens,
                consumed,
            }),
        }
    }
}

fn join_documents<S: AsRef<str>>(docs: &[S]) -> String {
    docs.iter().map(|d| d.as_ref()).collect::<Vec<_>>().join("\n")
}
