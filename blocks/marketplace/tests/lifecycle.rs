mod common;

use chrono::Utc;
use std::sync::Arc;

use common::{file, harness, member, new_task, publisher, Interleaved};
use errand_atoms::error::Error;
use errand_atoms::page::Page;
use errand_atoms::participation::{Participation, ParticipationStatus};
use errand_atoms::tasks::{Reward, TaskFilter, TaskPatch, TaskSort, TaskStatus};
use marketplace_block::{Caller, TaskManager};

#[tokio::test]
async fn created_task_is_a_private_draft() {
    let h = harness().await;
    let task = h.draft(3, false).await;

    assert_eq!(task.status, TaskStatus::Draft);
    assert_eq!(task.player_count, 0);
    assert!(matches!(
        h.tasks.view(&member("alice"), &task.task_id).await,
        Err(Error::NotFound(_))
    ));
    let own = h.tasks.view(&publisher(), &task.task_id).await.unwrap();
    assert_eq!(own.publisher.unwrap().nickname, "publisher nick");
}

#[tokio::test]
async fn create_rejects_bad_window_and_zero_reward() {
    let h = harness().await;
    let mut backwards = new_task(0, false);
    std::mem::swap(&mut backwards.start_time, &mut backwards.end_time);
    assert!(matches!(
        h.tasks.create(&publisher(), backwards).await,
        Err(Error::InvalidInput(_))
    ));

    let mut free = new_task(0, false);
    free.reward = Reward::Points { amount: 0 };
    assert!(matches!(
        h.tasks.create(&publisher(), free).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn only_the_publisher_or_an_admin_changes_status() {
    let h = harness().await;
    let task = h.draft(0, false).await;

    assert!(matches!(
        h.tasks.change_status(&member("alice"), &task.task_id, TaskStatus::Wait).await,
        Err(Error::PermissionDenied(_))
    ));
    let published = h
        .tasks
        .change_status(&Caller::admin("moderator"), &task.task_id, TaskStatus::Wait)
        .await
        .unwrap();
    assert_eq!(published.status, TaskStatus::Wait);
}

#[tokio::test]
async fn closing_a_task_closes_running_participations_and_notifies() {
    let h = harness().await;
    let task = h.published(0, true).await;
    for user in ["alice", "bob"] {
        let p = h.participations.apply(&member(user), &task.task_id, "on it").await.unwrap();
        assert_eq!(p.status, ParticipationStatus::Running);
    }
    assert!(h.sink.sent().await.is_empty());

    let closed = h
        .tasks
        .change_status(&publisher(), &task.task_id, TaskStatus::Close)
        .await
        .unwrap();
    assert_eq!(closed.status, TaskStatus::Close);
    assert_eq!(h.reload(&task.task_id).await.status, TaskStatus::Close);

    for user in ["alice", "bob"] {
        let p = h.participations.get(&publisher(), &task.task_id, user).await.unwrap();
        assert_eq!(p.status, ParticipationStatus::Close);
        assert_eq!(h.sink.sent_to(user).await.len(), 1);
    }
    assert_eq!(h.sink.sent().await.len(), 2);
}

#[tokio::test]
async fn closing_leaves_resolved_participations_alone() {
    let h = harness().await;
    let task = h.published(0, false).await;
    h.participations.apply(&member("alice"), &task.task_id, "").await.unwrap();
    h.participations.apply(&member("bob"), &task.task_id, "").await.unwrap();
    h.participations
        .change_status(&publisher(), &task.task_id, "bob", ParticipationStatus::Refuse)
        .await
        .unwrap();
    let before = h.sink.sent().await.len();

    h.tasks
        .change_status(&publisher(), &task.task_id, TaskStatus::Close)
        .await
        .unwrap();

    let bob = h.participations.get(&publisher(), &task.task_id, "bob").await.unwrap();
    let alice = h.participations.get(&publisher(), &task.task_id, "alice").await.unwrap();
    assert_eq!(bob.status, ParticipationStatus::Refuse);
    assert_eq!(alice.status, ParticipationStatus::Close);
    assert_eq!(h.sink.sent().await.len(), before + 1);
}

#[tokio::test]
async fn close_with_failing_notifications_still_commits() {
    let h = harness().await;
    let task = h.published(0, true).await;
    h.participations.apply(&member("alice"), &task.task_id, "").await.unwrap();
    h.sink.set_failing(true);

    let result = h
        .tasks
        .change_status(&publisher(), &task.task_id, TaskStatus::Close)
        .await;
    assert!(matches!(result, Err(Error::Unavailable(_))));
    assert_eq!(h.reload(&task.task_id).await.status, TaskStatus::Close);
    let alice = h.participations.get(&publisher(), &task.task_id, "alice").await.unwrap();
    assert_eq!(alice.status, ParticipationStatus::Close);
}

#[tokio::test]
async fn finish_waits_for_every_participation_to_resolve() {
    let h = harness().await;
    let task = h.published(0, false).await;
    h.participations.apply(&member("alice"), &task.task_id, "").await.unwrap();

    let result = h
        .tasks
        .change_status(&publisher(), &task.task_id, TaskStatus::Finish)
        .await;
    assert!(matches!(result, Err(Error::StateViolation(_))));
    assert_eq!(h.reload(&task.task_id).await.status, TaskStatus::Wait);

    h.participations
        .change_status(&publisher(), &task.task_id, "alice", ParticipationStatus::Running)
        .await
        .unwrap();
    h.participations
        .change_status(&publisher(), &task.task_id, "alice", ParticipationStatus::Finish)
        .await
        .unwrap();
    let finished = h
        .tasks
        .change_status(&publisher(), &task.task_id, TaskStatus::Finish)
        .await
        .unwrap();
    assert_eq!(finished.status, TaskStatus::Finish);
}

#[tokio::test]
async fn terminal_tasks_are_never_resurrected_or_edited() {
    let h = harness().await;
    let task = h.published(0, false).await;
    h.tasks
        .change_status(&publisher(), &task.task_id, TaskStatus::Close)
        .await
        .unwrap();

    for to in TaskStatus::ALL {
        assert!(matches!(
            h.tasks.change_status(&publisher(), &task.task_id, to).await,
            Err(Error::StateViolation(_))
        ));
    }
    let patch = TaskPatch {
        title: Some("Reopened".to_string()),
        ..TaskPatch::default()
    };
    assert!(matches!(
        h.tasks.edit(&publisher(), &task.task_id, &patch).await,
        Err(Error::StateViolation(_))
    ));
}

#[tokio::test]
async fn published_capacity_and_reward_only_go_up() {
    let h = harness().await;
    let task = h.published(2, false).await;

    let lower = TaskPatch {
        max_player: Some(1),
        ..TaskPatch::default()
    };
    assert!(matches!(
        h.tasks.edit(&publisher(), &task.task_id, &lower).await,
        Err(Error::StateViolation(_))
    ));

    let cheaper = TaskPatch {
        reward: Some(Reward::Money { amount: 100 }),
        ..TaskPatch::default()
    };
    assert!(matches!(
        h.tasks.edit(&publisher(), &task.task_id, &cheaper).await,
        Err(Error::StateViolation(_))
    ));

    let better = TaskPatch {
        max_player: Some(5),
        reward: Some(Reward::Money { amount: 2000 }),
        ..TaskPatch::default()
    };
    let edited = h.tasks.edit(&publisher(), &task.task_id, &better).await.unwrap();
    assert_eq!(edited.max_player, 5);
    assert_eq!(h.reload(&task.task_id).await.reward, Reward::Money { amount: 2000 });
}

#[tokio::test]
async fn draft_edits_may_lower_anything() {
    let h = harness().await;
    let task = h.draft(4, false).await;
    let patch = TaskPatch {
        max_player: Some(1),
        reward: Some(Reward::Points { amount: 1 }),
        ..TaskPatch::default()
    };
    let edited = h.tasks.edit(&publisher(), &task.task_id, &patch).await.unwrap();
    assert_eq!(edited.max_player, 1);
    assert_eq!(edited.reward, Reward::Points { amount: 1 });
}

#[tokio::test]
async fn attachment_edits_bind_new_and_release_dropped_files() {
    let h = harness().await;
    for id in ["f1", "f2", "f3"] {
        h.files.register(file(id)).await;
    }
    let mut draft = new_task(0, false);
    draft.attachments = vec!["f1".to_string(), "f2".to_string()];
    let task = h.tasks.create(&publisher(), draft).await.unwrap();
    assert_eq!(h.files.get("f1").await.unwrap().owner_id.as_deref(), Some(task.task_id.as_str()));

    let patch = TaskPatch {
        attachments: Some(vec!["f2".to_string(), "f3".to_string()]),
        ..TaskPatch::default()
    };
    let edited = h.tasks.edit(&publisher(), &task.task_id, &patch).await.unwrap();

    assert_eq!(edited.attachments, vec!["f2".to_string(), "f3".to_string()]);
    assert_eq!(h.files.released().await, vec!["f1".to_string()]);
    assert_eq!(h.files.get("f3").await.unwrap().owner_id.as_deref(), Some(task.task_id.as_str()));
}

#[tokio::test]
async fn unknown_attachment_is_rejected() {
    let h = harness().await;
    let mut draft = new_task(0, false);
    draft.attachments = vec!["missing".to_string()];
    assert!(matches!(
        h.tasks.create(&publisher(), draft).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn only_drafts_are_removed_and_their_files_released() {
    let h = harness().await;
    h.files.register(file("f1")).await;
    let mut draft = new_task(0, false);
    draft.attachments = vec!["f1".to_string()];
    let task = h.tasks.create(&publisher(), draft).await.unwrap();

    h.tasks.remove(&publisher(), &task.task_id).await.unwrap();
    assert!(matches!(h.tasks.get(&task.task_id).await, Err(Error::NotFound(_))));
    assert_eq!(h.files.released().await, vec!["f1".to_string()]);

    let live = h.published(0, false).await;
    assert!(matches!(
        h.tasks.remove(&publisher(), &live.task_id).await,
        Err(Error::StateViolation(_))
    ));
}

#[tokio::test]
async fn listings_hide_other_publishers_drafts() {
    let h = harness().await;
    h.draft(0, false).await;
    let open = h.published(0, false).await;
    h.tasks.add_view(&open.task_id).await.unwrap();

    let everyone = h
        .tasks
        .list(&member("alice"), TaskFilter { include_drafts: true, ..TaskFilter::default() }, TaskSort::MostViewed, Page::default())
        .await
        .unwrap();
    assert_eq!(everyone.total, 1);
    assert_eq!(everyone.items[0].task_id, open.task_id);
    assert_eq!(everyone.items[0].views, 1);

    let mine = h
        .tasks
        .list(
            &publisher(),
            TaskFilter {
                publisher_id: Some("publisher".to_string()),
                include_drafts: true,
                ..TaskFilter::default()
            },
            TaskSort::Newest,
            Page::new(0, 1),
        )
        .await
        .unwrap();
    assert_eq!(mine.total, 2);
    assert_eq!(mine.items.len(), 1);
    assert!(mine.has_more());
}

#[tokio::test]
async fn attachments_of_another_task_cannot_be_taken() {
    let h = harness().await;
    h.files.register(file("f1")).await;
    let mut draft = new_task(0, false);
    draft.attachments = vec!["f1".to_string()];
    let original = h.tasks.create(&publisher(), draft).await.unwrap();

    let mut grab = new_task(0, false);
    grab.attachments = vec!["f1".to_string()];
    assert!(matches!(
        h.tasks.create(&member("bob"), grab).await,
        Err(Error::PermissionDenied(_))
    ));

    let bobs = h.tasks.create(&member("bob"), new_task(0, false)).await.unwrap();
    let patch = TaskPatch {
        attachments: Some(vec!["f1".to_string()]),
        ..TaskPatch::default()
    };
    assert!(matches!(
        h.tasks.edit(&member("bob"), &bobs.task_id, &patch).await,
        Err(Error::PermissionDenied(_))
    ));
    h.tasks.remove(&member("bob"), &bobs.task_id).await.unwrap();

    let kept = h.files.get("f1").await.expect("file survives");
    assert_eq!(kept.owner_id.as_deref(), Some(original.task_id.as_str()));
    assert!(h.files.released().await.is_empty());
    assert_eq!(h.reload(&original.task_id).await.attachments, vec!["f1".to_string()]);
}

#[tokio::test]
async fn dropping_an_attachment_owned_elsewhere_keeps_the_file() {
    let h = harness().await;
    h.files.register(file("f1")).await;
    let mut draft = new_task(0, false);
    draft.attachments = vec!["f1".to_string()];
    let task = h.tasks.create(&publisher(), draft).await.unwrap();

    let mut moved = file("f1");
    moved.owner_id = Some("other-task".to_string());
    h.files.register(moved).await;

    let patch = TaskPatch {
        attachments: Some(Vec::new()),
        ..TaskPatch::default()
    };
    let edited = h.tasks.edit(&publisher(), &task.task_id, &patch).await.unwrap();
    assert!(edited.attachments.is_empty());
    assert!(h.files.released().await.is_empty());
    assert_eq!(h.files.get("f1").await.unwrap().owner_id.as_deref(), Some("other-task"));
}

#[tokio::test]
async fn view_without_publisher_profile_omits_the_brief() {
    let h = harness().await;
    let ghost = Caller::member("ghost");
    let task = h.tasks.create(&ghost, new_task(0, false)).await.unwrap();
    h.tasks
        .change_status(&ghost, &task.task_id, TaskStatus::Wait)
        .await
        .unwrap();

    let view = h.tasks.view(&member("alice"), &task.task_id).await.unwrap();
    assert_eq!(view.task.task_id, task.task_id);
    assert!(view.publisher.is_none());
}

#[tokio::test]
async fn finish_closes_an_application_that_slipped_past_the_guard() {
    let h = harness().await;
    let task = h.published(0, false).await;
    let late = Participation::new(
        "late-application".to_string(),
        task.task_id.clone(),
        "alice".to_string(),
        ParticipationStatus::Wait,
        String::new(),
        Utc::now(),
    );
    let store = Interleaved::new(h.store.clone());
    *store.upsert_after_listing.lock().await = Some(late);
    let mut deps = h.deps.clone();
    deps.participations = Arc::new(store);
    let tasks = TaskManager::new(deps);

    let finished = tasks
        .change_status(&publisher(), &task.task_id, TaskStatus::Finish)
        .await
        .unwrap();
    assert_eq!(finished.status, TaskStatus::Finish);

    let alice = h.participations.get(&publisher(), &task.task_id, "alice").await.unwrap();
    assert_eq!(alice.status, ParticipationStatus::Close);
    assert_eq!(h.sink.sent_to("alice").await.len(), 1);
}
