//! Exercises the front/supervisor process pair end to end for the parts of the RPC surface
//! that don't require a live SSH target: an idle task table, and the `UnknownTask` lookup-miss
//! path named explicitly in spec scenario 6. Capture-worker scenarios against a real SSH
//! endpoint remain documented integration expectations (see SPEC_FULL.md §8).

use hostsniff_core::config::FrontConfig;
use hostsniff_core::error::FrontError;
use hostsniff_core::front::{TaskFront, SUPERVISOR_BIN_ENV};

#[tokio::test]
async fn fresh_supervisor_has_no_tasks_and_rejects_unknown_ids() {
    std::env::set_var(
        SUPERVISOR_BIN_ENV,
        env!("CARGO_BIN_EXE_hostsniff-supervisor"),
    );

    let mut front = TaskFront::new(FrontConfig::default());
    front.start().await.expect("supervisor process spawns");

    let tasks = front.get_all_tasks().await.expect("rpc succeeds");
    assert!(tasks.is_empty());

    let err = front.get_task_info("yhsf76ha").await.unwrap_err();
    assert_unknown_task(&err, "yhsf76ha");

    let err = front.stop_task("yhsf76ha").await.unwrap_err();
    assert_unknown_task(&err, "yhsf76ha");

    front.stop().await;
}

#[tokio::test]
async fn methods_before_start_fail_with_not_started() {
    let front = TaskFront::new(FrontConfig::default());
    let err = front.get_all_tasks().await.unwrap_err();
    assert!(matches!(err, FrontError::NotStarted));
}

fn assert_unknown_task(err: &FrontError, task_id: &str) {
    match err {
        FrontError::Supervisor(inner) => {
            assert_eq!(
                inner.to_string(),
                format!("Task with id=\"{task_id}\" not found in task list.")
            );
        }
        other => panic!("expected Supervisor(UnknownTask), got {other:?}"),
    }
}
