//! 内置演示：选择题、分步辅导、角色扮演

use serde_json::json;

use crate::core::{Block, Choice, Directionality, JsonObject};

/// 按名称取演示块；未知名称或 "none" 返回空
pub fn demo_blocks(name: &str) -> Vec<Block> {
    match name.to_lowercase().as_str() {
        "quiz" | "mcq" => vec![capital_quiz()],
        "tutoring" => vec![equation_tutor()],
        "roleplay" => vec![temple_scene()],
        "all" => vec![capital_quiz(), equation_tutor(), temple_scene()],
        _ => Vec::new(),
    }
}

fn object(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// 非剧透选择题：全部 out + reveal，点击只揭示解释，不请求 LLM
pub fn capital_quiz() -> Block {
    let option = |id: &str, label: &str, feedback: &str| {
        Choice::new(id, label, Directionality::Out, true).with_hidden_content(feedback)
    };
    Block::new("q1")
        .with_content("What is the capital of France?")
        .with_choice(option("a", "A) London", "Incorrect. London is the capital of England."))
        .with_choice(option("b", "B) Berlin", "Incorrect. Berlin is the capital of Germany."))
        .with_choice(option("c", "C) Paris", "Correct! Paris is the capital of France."))
        .with_choice(option("d", "D) Madrid", "Incorrect. Madrid is the capital of Spain."))
}

/// 分步辅导：静态步骤 + 个性化提示（in-n-out）+ 主对话中的答案检查（in）
pub fn equation_tutor() -> Block {
    Block::new("math1")
        .with_content("Solve: 2x + 5 = 13")
        .with_choice(
            Choice::new("step1", "Show first step", Directionality::Out, true)
                .with_hidden_content("First, subtract 5 from both sides: 2x = 13 - 5 = 8"),
        )
        .with_choice(
            Choice::new("step2", "Show second step", Directionality::Out, true)
                .with_hidden_content("Then, divide both sides by 2: x = 8 / 2 = 4"),
        )
        .with_choice(
            Choice::new("hint", "Get a hint", Directionality::InNOut, true).with_input_data(
                object(json!({ "type": "explain", "context": "how to isolate x in 2x + 5 = 13" })),
            ),
        )
        .with_choice(
            Choice::new("check", "Check my answer", Directionality::In, false).with_input_data(
                object(json!({ "type": "answer_check", "problemId": "math1" })),
            ),
        )
}

/// 分支叙事：内联后果 + 故事续写
pub fn temple_scene() -> Block {
    Block::new("scene1")
        .with_content(
            "You stand at the entrance of an ancient temple. The air is thick with mystery. What do you do?",
        )
        .with_choice(
            Choice::new("merchant", "Talk to the merchant nearby", Directionality::InNOut, true)
                .with_hidden_content(
                    "The merchant eyes you suspiciously. \"Few travelers come this way,\" he mutters, adjusting his wares.",
                )
                .with_input_data(object(json!({
                    "action": "talk_to_merchant",
                    "scene": "temple_entrance"
                }))),
        )
        .with_choice(
            Choice::new("inspect", "Inspect the temple entrance", Directionality::InNOut, true)
                .with_hidden_content(
                    "You notice ancient runes carved into the stone. They seem to glow faintly in the dim light.",
                )
                .with_input_data(object(json!({
                    "action": "inspect_entrance",
                    "scene": "temple_entrance"
                }))),
        )
        .with_choice(
            Choice::new("enter", "Enter the temple", Directionality::In, false).with_input_data(
                object(json!({ "action": "enter_temple", "scene": "temple_entrance" })),
            ),
        )
}
