//! 考试说明
//!
//! 服务端获取失败时回退到内置默认说明（降级容错，会话照常进行）

use serde::{Deserialize, Serialize};

/// 一条考试说明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub title: String,
    pub content: String,
    pub format: String,
}

/// 服务端说明条目的 type 到展示标题的映射
pub fn title_for_type(kind: Option<&str>, index: usize) -> String {
    match kind {
        Some("general") => "General Instructions".to_string(),
        Some("test") => "Test Instructions".to_string(),
        Some("sections") => "Section Instructions".to_string(),
        _ => format!("Instruction {}", index + 1),
    }
}

/// 内置默认说明集
pub fn default_instructions() -> Vec<Instruction> {
    vec![
        Instruction {
            id: "ins-1".to_string(),
            title: "Instruction 1".to_string(),
            content: "Read these instructions carefully. This test is timed. Make sure you are \
                      seated in a distraction-free environment."
                .to_string(),
            format: "text".to_string(),
        },
        Instruction {
            id: "ins-2".to_string(),
            title: "Instruction 2".to_string(),
            content: "Do not refresh the page or switch tabs during the test. If you leave \
                      fullscreen, you will receive a warning and the test may end."
                .to_string(),
            format: "text".to_string(),
        },
        Instruction {
            id: "ins-3".to_string(),
            title: "Instruction 3".to_string(),
            content: "Keep your device charged and stable. Autosave will happen every few \
                      seconds. When you start the test, it will begin immediately."
                .to_string(),
            format: "text".to_string(),
        },
    ]
}
