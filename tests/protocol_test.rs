//! 定界符协议与协调器摄入的端到端测试

use quint::core::Coordinator;
use quint::protocol::{parse_block, scan, split_display};

const PAYLOAD: &str = r#"{"blockId":"q1","content":"Capital of France?","choices":[{"choiceId":"a","label":"Paris","directionality":"out","reveal":true,"hiddenContent":"Correct!"}]}"#;

#[test]
fn test_message_with_payload_yields_block_and_display_parts() {
    let text = format!("Hello! ⟪QUINT⟫{}⟫QUINT⟫ Bye.", PAYLOAD);
    let result = scan(&text);

    let block = result.block.expect("payload should parse");
    assert_eq!(block.block_id, "q1");
    assert_eq!(block.choices.len(), 1);
    assert_eq!(block.choices[0].choice_id, "a");
    assert_eq!(block.choices[0].hidden_content.as_deref(), Some("Correct!"));

    assert_eq!(result.parts.before, "Hello!");
    assert_eq!(result.parts.after, "Bye.");
    assert_eq!(result.parts.payload, Some(PAYLOAD));
}

#[test]
fn test_unterminated_payload_is_plain_text() {
    let text = format!("Thinking… ⟪QUINT⟫{}", &PAYLOAD[..40]);
    let result = scan(&text);
    assert!(result.block.is_none());
    assert_eq!(result.parts.before, text);
    assert!(result.parts.payload.is_none());
    assert!(parse_block(&text).is_err());
}

#[test]
fn test_invalid_json_is_displayed_verbatim_around_markers() {
    let text = "Oops ⟪QUINT⟫{not json}⟫QUINT⟫ done";
    assert!(parse_block(text).is_err());
    let parts = split_display(text);
    assert_eq!(parts.before, "Oops");
    assert_eq!(parts.after, "done");
}

#[test]
fn test_coordinator_ingests_each_message_once() {
    let mut coordinator = Coordinator::new();
    let text = format!("Pick one ⟪QUINT⟫{}⟫QUINT⟫", PAYLOAD);

    assert_eq!(
        coordinator.ingest_assistant_message("msg-2", &text),
        Some("q1".to_string())
    );
    assert_eq!(coordinator.ingest_assistant_message("msg-2", &text), None);
    assert_eq!(coordinator.ingest_assistant_message("msg-4", &text), None);
    assert_eq!(coordinator.state().len(), 2);

    let plan = coordinator.activate("q1", "a").unwrap();
    assert!(!plan.needs_request());
    let reveal = coordinator
        .state()
        .reveal(plan.reveal_id.as_ref().unwrap())
        .unwrap();
    assert_eq!(reveal.display_content(), Some("Correct!"));
}
