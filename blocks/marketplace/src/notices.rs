use errand_atoms::messages::{Notification, NotificationKind};
use errand_atoms::participation::ParticipationStatus;
use errand_atoms::tasks::Task;

fn participation_title(status: ParticipationStatus) -> &'static str {
    match status {
        ParticipationStatus::Wait => "New application",
        ParticipationStatus::Running => "Application accepted",
        ParticipationStatus::Refuse => "Application declined",
        ParticipationStatus::Close => "Task closed",
        ParticipationStatus::Finish => "Task completed",
        ParticipationStatus::GiveUp => "Participant gave up",
        ParticipationStatus::Failure => "Task marked as failed",
    }
}

/// Message to the counterpart of a participation transition.
pub(crate) fn participation_changed(
    task: &Task,
    recipient: &str,
    participant_id: &str,
    status: ParticipationStatus,
) -> Notification {
    let content = match status {
        ParticipationStatus::GiveUp => {
            format!("User {participant_id} gave up on \"{}\".", task.title)
        }
        ParticipationStatus::Close => format!(
            "\"{}\" is no longer open; your participation has ended.",
            task.title
        ),
        other => format!("Your participation in \"{}\" is now {other}.", task.title),
    };

    Notification {
        to_user_id: recipient.to_string(),
        kind: NotificationKind::Participation,
        title: participation_title(status).to_string(),
        content,
        about_id: task.task_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use errand_atoms::tasks::{NewTask, Reward, TaskType};

    #[test]
    fn closing_notice_goes_to_the_participant() {
        let now = Utc::now();
        let task = Task::draft(
            "t1".to_string(),
            "publisher".to_string(),
            NewTask {
                title: "Fix the fence".to_string(),
                content: String::new(),
                task_type: TaskType::Info,
                reward: Reward::None,
                start_time: now,
                end_time: now + Duration::hours(1),
                max_player: 0,
                auto_accept: false,
                attachments: Vec::new(),
            },
            now,
        );

        let notice = participation_changed(&task, "alice", "alice", ParticipationStatus::Close);
        assert_eq!(notice.kind, NotificationKind::Participation);
        assert_eq!(notice.to_user_id, "alice");
        assert_eq!(notice.about_id, "t1");
        assert_eq!(notice.title, "Task closed");
        assert!(notice.content.contains("Fix the fence"));
    }
}
