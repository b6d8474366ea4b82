//! Admission rules and per-caller state management.

mod backend;
mod history;
mod key;
mod registry;
mod rule;
mod service;
mod store;

pub use backend::AdmissionBackend;
pub use history::RequestHistory;
pub use key::HistoryKey;
pub use registry::{RuleConfig, RuleRegistry, RuleRegistryBuilder, RulesConfig};
pub use rule::{Admit, CountInWindow, MinSpacing, Rule};
pub use service::AdmissionService;
pub use store::{HistoryHandle, HistoryStore};
