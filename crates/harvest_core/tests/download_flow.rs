use harvest_core::{DownloadFlow, FlowEvent, FlowState, SkipReason};
use pretty_assertions::assert_eq;

#[test]
fn happy_path_reaches_done() {
    let mut flow = DownloadFlow::new(3);
    assert_eq!(flow.state(), &FlowState::SelectingResolution);
    flow.apply(FlowEvent::OptionMatched);
    assert_eq!(flow.state(), &FlowState::Confirming);
    flow.apply(FlowEvent::Confirmed);
    assert_eq!(flow.state(), &FlowState::AwaitingFile);
    let state = flow.apply(FlowEvent::FileDetected("clip_source.mp4".to_string()));
    assert_eq!(
        state,
        &FlowState::Done {
            file_name: "clip_source.mp4".to_string()
        }
    );
    assert!(flow.state().is_terminal());
    assert_eq!(flow.skip_reason(), None);
}

#[test]
fn missing_option_is_permanent() {
    let mut flow = DownloadFlow::new(3);
    flow.apply(FlowEvent::OptionMissing);
    assert!(flow.state().is_terminal());
    assert_eq!(flow.skip_reason(), Some(SkipReason::NoMatchingOption));
    assert_eq!(flow.attempt(), 1);
}

#[test]
fn timeouts_retry_up_to_the_cap_then_exhaust() {
    let mut flow = DownloadFlow::new(3);
    let mut cycles = 0;
    while !flow.state().is_terminal() {
        cycles += 1;
        flow.apply(FlowEvent::OptionMatched);
        flow.apply(FlowEvent::Confirmed);
        flow.apply(FlowEvent::FileWaitTimedOut);
        assert!(matches!(flow.state(), FlowState::TransientFail { .. }));
        flow.apply(FlowEvent::Retry);
        assert!(cycles <= 3, "flow must not loop past its cap");
    }
    assert_eq!(cycles, 3);
    assert_eq!(flow.state(), &FlowState::Exhausted { attempts: 3 });
    assert_eq!(
        flow.skip_reason(),
        Some(SkipReason::RetriesExhausted { attempts: 3 })
    );
}

#[test]
fn interaction_failure_is_transient_and_retry_restarts_selection() {
    let mut flow = DownloadFlow::new(2);
    flow.apply(FlowEvent::InteractionFailed("menu did not open".to_string()));
    assert_eq!(
        flow.state(),
        &FlowState::TransientFail {
            reason: "menu did not open".to_string()
        }
    );
    flow.apply(FlowEvent::Retry);
    assert_eq!(flow.state(), &FlowState::SelectingResolution);
    assert_eq!(flow.attempt(), 2);
}

#[test]
fn out_of_order_events_are_ignored() {
    let mut flow = DownloadFlow::new(1);
    flow.apply(FlowEvent::Confirmed);
    flow.apply(FlowEvent::FileDetected("x.mp4".to_string()));
    flow.apply(FlowEvent::Retry);
    assert_eq!(flow.state(), &FlowState::SelectingResolution);

    flow.apply(FlowEvent::OptionMissing);
    flow.apply(FlowEvent::OptionMatched);
    assert_eq!(flow.skip_reason(), Some(SkipReason::NoMatchingOption));
}

#[test]
fn zero_cap_still_allows_one_attempt() {
    let mut flow = DownloadFlow::new(0);
    assert_eq!(flow.max_attempts(), 1);
    flow.apply(FlowEvent::InteractionFailed("boom".to_string()));
    flow.apply(FlowEvent::Retry);
    assert_eq!(flow.state(), &FlowState::Exhausted { attempts: 1 });
}
