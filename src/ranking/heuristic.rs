//! Deterministic ranking backend.
//!
//! Implements the ordering policy in code instead of delegating it to a
//! model. Tasks are placed into four bands and the bands are emitted in order:
//!
//! 1. critical: overdue, or too little slack left before the deadline
//! 2. quick wins: estimated at or under `QUICK_WIN_MINUTES`
//! 3. deadline tasks: by urgency bucket, then priority, then effort
//! 4. the rest: by priority, then effort, interleaving small and large work
//!
//! Descriptors are echoed unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::OnceLock;

use super::{RankingCapability, RankingError, RankingRequest};
use crate::prioritizer::policy::QUICK_WIN_MINUTES;
use crate::task::{PriorityLabel, TaskDescriptor};

/// Effort assumed when nothing in the text hints at one.
const DEFAULT_MINUTES: u32 = 45;
const QUICK_TASK_MINUTES: u32 = 10;
const HEAVY_TASK_MINUTES: u32 = 120;

/// Slack (minutes to deadline minus estimate) below which a task is critical.
const CRITICAL_SLACK_MINUTES: i64 = 4 * 60;
const CRITICAL_SLACK_HIGH_MINUTES: i64 = 8 * 60;

/// Deadlines within the same bucket count as "comparably close".
const URGENCY_BUCKET_MINUTES: i64 = 6 * 60;

/// Tasks at or above this estimate count as large when interleaving.
const LARGE_TASK_MINUTES: u32 = 60;
/// Small tasks emitted per large task in the final band.
const SMALL_PER_LARGE: usize = 2;

const QUICK_WORDS: &[&str] = &[
    "reply", "respond", "email", "e-mail", "text", "call", "phone", "pay", "book", "schedule",
    "send", "check", "confirm", "remind", "switch", "buy", "order", "sign", "rsvp", "print",
    "water", "cancel", "renew",
];

const HEAVY_WORDS: &[&str] = &[
    "write", "report", "research", "build", "design", "prepare", "plan", "refactor",
    "implement", "study", "clean", "organize", "migrate", "draft", "presentation", "essay",
    "thesis", "taxes", "review", "develop",
];

fn duration_hint() -> &'static Regex {
    static HINT: OnceLock<Regex> = OnceLock::new();
    HINT.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,4})\s*(minutes?|mins?|m|hours?|hrs?|h|days?|d)\b")
            .expect("duration hint pattern is valid")
    })
}

/// Estimate effort in minutes from a task's text.
///
/// An explicit hint such as "10 min", "(2h)" or "1 day" wins; otherwise the
/// words of the title and description are matched against quick and heavy
/// vocabularies. Heavy words dominate quick ones.
pub fn estimate_minutes(title: &str, description: Option<&str>) -> u32 {
    for text in std::iter::once(title).chain(description) {
        if let Some(caps) = duration_hint().captures(text) {
            let amount: u32 = caps[1].parse().unwrap_or(0);
            let unit = caps[2].to_ascii_lowercase();
            let minutes = match unit.chars().next() {
                Some('h') => amount.saturating_mul(60),
                Some('d') => amount.saturating_mul(8 * 60),
                _ => amount,
            };
            if minutes > 0 {
                return minutes;
            }
        }
    }

    let words: Vec<String> = std::iter::once(title)
        .chain(description)
        .flat_map(|text| text.split(|c: char| !c.is_alphanumeric() && c != '-'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    if words.iter().any(|w| HEAVY_WORDS.contains(&w.as_str())) {
        HEAVY_TASK_MINUTES
    } else if words.iter().any(|w| QUICK_WORDS.contains(&w.as_str())) {
        QUICK_TASK_MINUTES
    } else {
        DEFAULT_MINUTES
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Critical,
    QuickWin,
    Deadline,
    Rest,
}

#[derive(Debug)]
struct Scored {
    index: usize,
    minutes: u32,
    weight: u8,
    deadline: Option<DateTime<Utc>>,
    /// Minutes until the deadline (negative once overdue)
    minutes_left: Option<i64>,
    band: Band,
}

/// Deterministic ranking backend.
#[derive(Debug, Default, Clone)]
pub struct HeuristicRanker;

impl HeuristicRanker {
    pub fn new() -> Self {
        Self
    }

    fn score(index: usize, task: &TaskDescriptor, now: DateTime<Utc>) -> Scored {
        let minutes = estimate_minutes(&task.title, task.description.as_deref());
        // Unlabelled tasks weigh the same as Medium.
        let weight = task.priority.unwrap_or(PriorityLabel::Medium).weight();
        let minutes_left = task.deadline.map(|d| (d - now).num_minutes());

        let critical_slack = if task.priority == Some(PriorityLabel::High) {
            CRITICAL_SLACK_HIGH_MINUTES
        } else {
            CRITICAL_SLACK_MINUTES
        };
        let band = match minutes_left {
            Some(left) if left - i64::from(minutes) < critical_slack => Band::Critical,
            _ if minutes <= QUICK_WIN_MINUTES => Band::QuickWin,
            Some(_) => Band::Deadline,
            None => Band::Rest,
        };

        Scored {
            index,
            minutes,
            weight,
            deadline: task.deadline,
            minutes_left,
            band,
        }
    }

    /// Compute the order as indices into `tasks`.
    pub fn order(&self, tasks: &[TaskDescriptor], now: DateTime<Utc>) -> Vec<usize> {
        let scored: Vec<Scored> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| Self::score(i, t, now))
            .collect();
        let band = |b: Band| scored.iter().filter(move |s| s.band == b).collect::<Vec<_>>();

        let mut critical = band(Band::Critical);
        critical.sort_by_key(|s| {
            (
                s.minutes_left.unwrap_or(0).div_euclid(60),
                Reverse(s.weight),
                s.minutes,
                s.deadline,
                s.index,
            )
        });

        let mut quick = band(Band::QuickWin);
        quick.sort_by_key(|s| (Reverse(s.weight), s.deadline.is_none(), s.deadline, s.minutes, s.index));

        let mut deadline = band(Band::Deadline);
        deadline.sort_by_key(|s| {
            (
                s.minutes_left.unwrap_or(0).div_euclid(URGENCY_BUCKET_MINUTES),
                Reverse(s.weight),
                s.minutes,
                s.deadline,
                s.index,
            )
        });

        let mut rest = band(Band::Rest);
        rest.sort_by_key(|s| (Reverse(s.weight), s.minutes, s.index));

        critical
            .iter()
            .chain(quick.iter())
            .chain(deadline.iter())
            .map(|s| s.index)
            .chain(interleave_by_size(&rest))
            .collect()
    }
}

/// Within each priority tier, emit `SMALL_PER_LARGE` small tasks per large one
/// so large tasks keep surfacing instead of sinking below every quick task.
fn interleave_by_size(sorted: &[&Scored]) -> Vec<usize> {
    let mut out = Vec::with_capacity(sorted.len());
    let mut tier_start = 0;
    while tier_start < sorted.len() {
        let weight = sorted[tier_start].weight;
        let tier_end = sorted[tier_start..]
            .iter()
            .position(|s| s.weight != weight)
            .map_or(sorted.len(), |p| tier_start + p);

        let (mut small, mut large): (VecDeque<&Scored>, VecDeque<&Scored>) = sorted
            [tier_start..tier_end]
            .iter()
            .copied()
            .partition(|s| s.minutes < LARGE_TASK_MINUTES);

        while !small.is_empty() || !large.is_empty() {
            for _ in 0..SMALL_PER_LARGE {
                if let Some(s) = small.pop_front() {
                    out.push(s.index);
                }
            }
            if let Some(l) = large.pop_front() {
                out.push(l.index);
            }
        }
        tier_start = tier_end;
    }
    out
}

#[async_trait]
impl RankingCapability for HeuristicRanker {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn rank(&self, request: RankingRequest) -> Result<Vec<TaskDescriptor>, RankingError> {
        let order = self.order(&request.tasks, request.now);
        Ok(order
            .into_iter()
            .map(|i| request.tasks[i].clone())
            .collect())
    }
}
