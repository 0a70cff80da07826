//! Token budgeting: per-family token counters and the manager that trims
//! chat history and retrieved context to a model's window.

pub mod counter;
#[cfg(feature = "tokenizers")]
pub mod hf;
pub mod manager;
pub mod registry;

pub use counter::{ApproxTokenCounter, SharedCounter, TokenCountError, TokenCounter};
#[cfg(feature = "tokenizers")]
pub use hf::HfTokenCounter;
pub use manager::{BudgetError, PreparedContext, TokenBudgetManager};
pub use registry::{model_family, CounterFactory, CounterRegistry};
