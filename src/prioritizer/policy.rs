//! The ordering policy and the prompt contract handed to ranking backends.
//!
//! Every backend receives the same policy text. The language-model backend
//! sends it verbatim; the deterministic backend implements it in code.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use crate::task::TaskDescriptor;

/// Quick wins are tasks estimated to take at most this long.
pub const QUICK_WIN_MINUTES: u32 = 15;

/// The fixed prioritization policy.
pub const RANKING_POLICY: &str = r#"Build a single task order that lets the user gain momentum and finish the whole list as fast as possible while respecting deadlines. First estimate how long each task takes (for example 5 minutes, 2 hours, 1 day) from its title and description.

1. Quick wins first: tasks that can be finished in under 15 minutes (reply to an email, make a quick call, pay a bill) go to the very top.
2. Urgent deadlines next: order the remaining tasks with deadlines by how soon they are due, soonest first. A task whose deadline is very close (within a few hours) may go above quick wins when its own duration makes it time-critical: a 2-hour task due in 3 hours beats a 5-minute task with no deadline. A higher priority label adds weight. When two deadlines are comparably close, the higher priority label goes first; with equal priority, the shorter task goes first.
3. Everything else: order by logical workflow (a task that blocks others comes first) with a bias toward shorter tasks, but mix small and large tasks so that no task is pushed to the bottom forever just because others are faster.
4. Review the result as one flat list, not three concatenated lists. Workflow ordering may lift a task above a deadline task only if no deadline becomes more at risk."#;

/// System message framing the ranking call.
pub const SYSTEM_PROMPT: &str = "You are a task prioritization assistant. You reorder task lists and answer with JSON only.";

/// Render the task list as the JSON array the backend must echo back.
pub fn render_task_list(tasks: &[TaskDescriptor]) -> String {
    let entries: Vec<serde_json::Value> = tasks
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "title": t.title,
                "deadline": t.deadline.map(|d| d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                "priority": t.priority,
                "description": t.description,
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
}

/// Build the user message: policy, reference time, tasks and the return contract.
///
/// `now` is injected so deadline urgency is reproducible under test.
pub fn build_user_prompt(policy: &str, tasks: &[TaskDescriptor], now: DateTime<Utc>) -> String {
    format!(
        r#"Prioritization policy:
{policy}

Current time: {now}

Tasks to prioritize ({count}):
{tasks}

Return a JSON object of the form {{"tasks": [...]}} containing every task above, reordered. Echo every original field of each task unchanged, especially "id". Do not add, remove, merge or edit tasks; only change their order. Respond with the JSON object and nothing else."#,
        policy = policy.trim(),
        now = now.to_rfc3339_opts(SecondsFormat::Secs, true),
        count = tasks.len(),
        tasks = render_task_list(tasks),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::PriorityLabel;
    use chrono::TimeZone;

    #[test]
    fn prompt_pins_time_and_lists_every_task() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap();
        let tasks = vec![
            TaskDescriptor::new("a", "Reply to email"),
            TaskDescriptor::new("b", "Write report")
                .with_deadline(now + chrono::Duration::hours(3))
                .with_priority(PriorityLabel::High),
        ];
        let prompt = build_user_prompt(RANKING_POLICY, &tasks, now);
        assert!(prompt.contains("Current time: 2026-05-01T08:30:00Z"));
        assert!(prompt.contains("Tasks to prioritize (2)"));
        assert!(prompt.contains(r#""id": "a""#));
        assert!(prompt.contains(r#""deadline": "2026-05-01T11:30:00Z""#));
        assert!(prompt.contains(r#""priority": "high""#));
        assert!(prompt.contains("Quick wins first"));
    }

    #[test]
    fn deadlines_keep_sub_second_precision() {
        let due = Utc.with_ymd_and_hms(2026, 5, 1, 11, 30, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        let rendered = render_task_list(&[TaskDescriptor::new("a", "Send invoice").with_deadline(due)]);
        assert!(rendered.contains(r#""deadline": "2026-05-01T11:30:00.250Z""#));
    }

    #[test]
    fn empty_list_renders_as_empty_array() {
        assert_eq!(render_task_list(&[]), "[]");
    }
}
