pub mod instruction;
pub mod question;
pub mod section;
pub mod wire;

pub use instruction::{default_instructions, Instruction};
pub use question::{QuestionRef, QuestionState, QuestionType};
pub use section::{Section, SectionKind};
pub use wire::{AnswerValue, AttemptData, ProctorAck, WireAnswerMap, WireAnswers};
