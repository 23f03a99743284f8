//! Contract Test: Poll-Converge Loop
//!
//! Constraints verified:
//! - The loop stops on the first target state and returns its snapshot
//! - A state outside both sets fails immediately
//! - A loop that never converges fails with a timeout
//! - Absence is the success condition of a deletion wait
//!
//! If this test fails, handlers may return before remote changes settle.

mod common;

use cloudplane_core::Error;
use cloudplane_core::poll::{Backoff, PollSettings, Waiter, states};
use common::*;
use std::time::Duration;

fn settings() -> PollSettings {
    PollSettings {
        delay: Duration::from_millis(1),
        interval: Duration::from_millis(5),
        backoff: Backoff::Fixed,
        retry_interval: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn converges_after_exactly_three_refreshes() {
    let remote = ScriptedRemote::new(vec![Some("pending"), Some("pending"), Some("target")]);

    let snapshot = Waiter::new(["pending"], ["target"])
        .settings(&settings())
        .timeout(Duration::from_secs(5))
        .wait(&remote)
        .await
        .expect("loop converges");

    assert_eq!(snapshot, 3);
    assert_eq!(remote.calls(), 3);
}

#[tokio::test]
async fn never_converging_times_out() {
    let remote = ScriptedRemote::new(vec![Some(states::BUILD)]);

    let err = Waiter::new([states::BUILD], [states::AVAILABLE])
        .settings(&settings())
        .timeout(Duration::from_millis(50))
        .wait(&remote)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn backoff_still_converges() {
    let remote = ScriptedRemote::new(vec![Some("pending"), Some("pending"), Some("pending"), Some("target")]);
    let settings = PollSettings {
        backoff: Backoff::Exponential {
            max: Duration::from_millis(20),
        },
        ..settings()
    };

    Waiter::new(["pending"], ["target"])
        .settings(&settings)
        .timeout(Duration::from_secs(5))
        .wait(&remote)
        .await
        .expect("loop converges");

    assert_eq!(remote.calls(), 4);
}

#[tokio::test]
async fn refresh_errors_surface_immediately() {
    let remote = ScriptedRemote::new(vec![Some("pending"), None]);

    let err = Waiter::new(["pending"], ["target"])
        .settings(&settings())
        .wait(&remote)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Refresh(_)));
    assert!(err.is_not_found());
    assert_eq!(remote.calls(), 2);
}
