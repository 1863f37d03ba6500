pub mod answer_store;
pub mod proctor;
pub mod scheduler;

pub use answer_store::{AnswerInput, AnswerStore};
pub use proctor::{ProctorMonitor, TabSignal};
pub use scheduler::{SectionAdvance, SectionScheduler};
