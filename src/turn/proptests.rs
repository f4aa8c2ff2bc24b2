//! Property-based tests for the turn state machine

use super::effect::Effect;
use super::event::TurnEvent;
use super::state::TurnState;
use super::transition::transition;
use crate::directive::{END_DELIMITER, START_DELIMITER};
use crate::error::TurnError;
use crate::llm::StreamPayload;
use proptest::prelude::*;
use serde_json::json;

fn text(fragment: &str) -> TurnEvent {
    TurnEvent::Payload(StreamPayload::Text(fragment.to_string()))
}

fn arb_fragment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?']{0,16}"
}

fn arb_event() -> impl Strategy<Value = TurnEvent> {
    prop_oneof![
        6 => arb_fragment().prop_map(|f| text(&f)),
        1 => Just(text(START_DELIMITER)),
        1 => Just(text(END_DELIMITER)),
        1 => Just(text("{'prompt': 'a cat'}")),
        1 => Just(TurnEvent::Payload(StreamPayload::ToolUse {
            name: "generate_image".to_string(),
            fields: match json!({"type": "tool_use", "name": "generate_image", "input": {"prompt": "x"}}) {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        })),
        1 => Just(TurnEvent::StreamFailed(TurnError::transport("reset"))),
    ]
}

proptest! {
    #[test]
    fn prop_published_content_is_concatenation(fragments in proptest::collection::vec(arb_fragment(), 1..20)) {
        let mut state = TurnState::new();
        let mut expected = String::new();
        for fragment in &fragments {
            expected.push_str(fragment);
            let result = transition(state, text(fragment)).unwrap();
            prop_assert_eq!(result.effects, vec![Effect::PublishContent(expected.clone())]);
            state = result.new_state;
        }
    }

    #[test]
    fn prop_narration_frozen_after_start(
        before in arb_fragment(),
        after in proptest::collection::vec(arb_fragment(), 0..10),
    ) {
        let mut state = TurnState::new();
        let opened = transition(state, text(&format!("{before}{START_DELIMITER}"))).unwrap();
        prop_assert_eq!(
            opened.effects,
            vec![Effect::MarkToolLoading { narration: before.trim_end().to_string() }]
        );
        state = opened.new_state;
        for fragment in &after {
            let result = transition(state, text(fragment)).unwrap();
            prop_assert!(result.effects.is_empty());
            state = result.new_state;
        }
        prop_assert!(matches!(state, TurnState::DirectiveOpen { .. }), "expected DirectiveOpen");
    }

    #[test]
    fn prop_every_stream_reaches_terminal_state(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = TurnState::new();
        for event in events {
            if state.is_terminal() {
                // Runner stops reading here; nothing more may be appended
                prop_assert!(transition(state.clone(), event).is_err());
                break;
            }
            state = transition(state, event).unwrap().new_state;
        }
        if !state.is_terminal() {
            state = transition(state, TurnEvent::StreamEnded).unwrap().new_state;
        }
        prop_assert!(state.is_terminal());
    }

    #[test]
    fn prop_dispatch_only_from_resolved(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = TurnState::new();
        for event in events {
            if state.is_terminal() {
                break;
            }
            let result = transition(state, event).unwrap();
            let dispatches = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::DispatchTool(_)))
                .count();
            if dispatches > 0 {
                prop_assert_eq!(dispatches, 1);
                let resolved = matches!(result.new_state, TurnState::DirectiveResolved { .. });
                prop_assert!(resolved);
            }
            state = result.new_state;
        }
    }
}
