//! Property-based tests for the session state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::executor::ExecutionError;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_execution_error() -> impl Strategy<Value = ExecutionError> {
    "[a-zA-Z ]{0,30}".prop_flat_map(|msg| {
        prop_oneof![
            Just(ExecutionError::BackendUnavailable(msg.clone())),
            Just(ExecutionError::Timeout(msg.clone())),
            Just(ExecutionError::MalformedResponse(msg)),
        ]
    })
}

/// Non-empty text that is not the termination keyword
fn arb_question() -> impl Strategy<Value = String> {
    "[a-zA-Z?][a-zA-Z0-9 ?.,]{0,40}".prop_filter("not a termination command", |s| {
        !is_termination_command(s)
    })
}

fn arb_blank() -> impl Strategy<Value = String> {
    "[ \t\n]{0,5}"
}

/// "stop" in any casing, with optional surrounding whitespace
fn arb_stop_command() -> impl Strategy<Value = String> {
    (proptest::collection::vec(any::<bool>(), 4), "[ ]{0,2}", "[ \n]{0,2}").prop_map(
        |(upper, lead, trail)| {
            let word: String = "stop"
                .chars()
                .zip(upper)
                .map(|(c, u)| if u { c.to_ascii_uppercase() } else { c })
                .collect();
            format!("{lead}{word}{trail}")
        },
    )
}

fn arb_open_phase() -> impl Strategy<Value = SessionPhase> {
    prop_oneof![Just(SessionPhase::Idle), Just(SessionPhase::AwaitingInput)]
}

fn arb_user_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Start),
        Just(Event::Stop),
        Just(Event::Reset),
        arb_question().prop_map(|text| Event::Submit { text }),
        arb_blank().prop_map(|text| Event::Submit { text }),
    ]
}

fn state_in(phase: SessionPhase) -> SessionState {
    SessionState {
        phase,
        ..SessionState::default()
    }
}

/// Apply a transition the way the controller does, answering any reply
/// request with `reply`
fn apply(state: &mut SessionState, event: Event, reply: &Result<String, ExecutionError>) {
    let mut pending = vec![event];
    while let Some(event) = pending.pop() {
        let Ok(result) = transition(state, event) else {
            return;
        };
        state.phase = result.new_phase;
        for effect in result.effects {
            match effect {
                Effect::RecordTurns(turns) => state.log.append_all(turns),
                Effect::ClearLog => state.log.clear(),
                Effect::RequestReply { .. } => pending.push(match reply {
                    Ok(text) => Event::ReplyReceived { text: text.clone() },
                    Err(error) => Event::ReplyFailed {
                        error: error.clone(),
                    },
                }),
            }
        }
    }
}

proptest! {
    #[test]
    fn question_always_requests_exactly_one_reply(
        phase in arb_open_phase(),
        text in arb_question(),
    ) {
        let result = transition(&state_in(phase), Event::Submit { text: text.clone() }).unwrap();
        prop_assert_eq!(
            result.new_phase,
            SessionPhase::Processing { user_text: text.clone() }
        );
        prop_assert_eq!(result.effects, vec![Effect::RequestReply { user_text: text }]);
    }

    #[test]
    fn blank_input_never_reaches_backend(phase in arb_open_phase(), text in arb_blank()) {
        let result = transition(&state_in(phase), Event::Submit { text });
        prop_assert!(matches!(result, Err(SessionError::Validation(ValidationError::EmptyInput))));
    }

    #[test]
    fn stop_command_terminates(phase in arb_open_phase(), text in arb_stop_command()) {
        let result = transition(&state_in(phase), Event::Submit { text }).unwrap();
        prop_assert_eq!(result.new_phase, SessionPhase::Terminated);
        let requested = result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::RequestReply { .. }));
        prop_assert!(!requested);
    }

    #[test]
    fn backend_results_always_return_to_awaiting_input(
        text in arb_question(),
        reply in prop_oneof![
            "[a-zA-Z .!]{0,40}".prop_map(Ok),
            arb_execution_error().prop_map(Err),
        ],
    ) {
        let state = state_in(SessionPhase::Processing { user_text: text });
        let event = match reply {
            Ok(text) => Event::ReplyReceived { text },
            Err(error) => Event::ReplyFailed { error },
        };
        let result = transition(&state, event).unwrap();
        prop_assert_eq!(result.new_phase, SessionPhase::AwaitingInput);
    }

    #[test]
    fn failures_append_exactly_one_system_turn(
        text in arb_question(),
        error in arb_execution_error(),
    ) {
        let mut state = state_in(SessionPhase::AwaitingInput);
        apply(&mut state, Event::Submit { text }, &Err(error));
        prop_assert_eq!(state.log.len(), 1);
        prop_assert_eq!(state.log.turns()[0].speaker, Speaker::System);
        prop_assert_eq!(state.phase, SessionPhase::AwaitingInput);
    }

    #[test]
    fn terminated_rejects_everything_but_reset(event in arb_user_event()) {
        let state = state_in(SessionPhase::Terminated);
        let is_reset = matches!(event, Event::Reset);
        let result = transition(&state, event);
        if is_reset {
            prop_assert_eq!(result.unwrap().new_phase, SessionPhase::Idle);
        } else {
            prop_assert!(matches!(result, Err(SessionError::Terminated)));
        }
    }

    #[test]
    fn processing_rejects_all_user_events(event in arb_user_event()) {
        let state = state_in(SessionPhase::Processing { user_text: "busy".to_string() });
        prop_assert!(matches!(transition(&state, event), Err(SessionError::Busy)));
    }

    /// Every assistant turn directly follows the user turn it answers
    #[test]
    fn assistant_turns_always_follow_user_turns(
        steps in proptest::collection::vec(
            (arb_user_event(), prop_oneof![
                "[a-zA-Z .!]{1,20}".prop_map(Ok),
                arb_execution_error().prop_map(Err),
            ]),
            0..30,
        )
    ) {
        let mut state = SessionState::new();
        for (event, reply) in steps {
            apply(&mut state, event, &reply);
            prop_assert!(!state.is_processing());

            let turns = state.log.turns();
            for (i, turn) in turns.iter().enumerate() {
                if turn.speaker == Speaker::Assistant {
                    prop_assert!(i > 0);
                    prop_assert_eq!(turns[i - 1].speaker, Speaker::User);
                }
                if turn.speaker == Speaker::User {
                    prop_assert!(i + 1 < turns.len());
                    prop_assert_eq!(turns[i + 1].speaker, Speaker::Assistant);
                }
            }
        }
    }

    #[test]
    fn snapshot_is_stable_without_appends(
        texts in proptest::collection::vec(arb_question(), 0..10)
    ) {
        let mut state = SessionState::new();
        for text in texts {
            apply(&mut state, Event::Submit { text }, &Ok("ok".to_string()));
        }
        let first = state.log.snapshot();
        let second = state.log.snapshot();
        prop_assert_eq!(first, second);
    }
}
