use crate::domain::dates::{at_time, parse_weekday, DayWindow};
use crate::domain::models::{Category, RecurrenceFreq, Task, TaskKind};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;

/// One concrete slot of a schedule-block task on the target date.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScheduleBlockSlot {
    pub task_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Reference to the block that shadows an occurrence.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlockRef {
    pub task_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Occurrence {
    pub task_id: String,
    pub title: String,
    /// `None` marks a floating occurrence with no position on the timeline.
    pub occurrence_time: Option<DateTime<Utc>>,
    pub task_type: String,
    pub category: Option<Category>,
    pub task: Task,
    pub blocked: bool,
    pub blocked_by: Option<BlockRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayFeed {
    pub date: String,
    pub schedule_blocks: Vec<ScheduleBlockSlot>,
    pub occurrences: Vec<Occurrence>,
}

/// Expands every task into its contribution for the target day, marks
/// occurrences shadowed by schedule blocks, and orders the result
/// deterministically.
pub fn resolve_day(
    tasks: &[Task],
    window: &DayWindow,
    tz: Tz,
    categories: &HashMap<String, Category>,
) -> DayFeed {
    let target_weekday = window.date.weekday();
    let mut schedule_blocks = Vec::new();
    let mut occurrences = Vec::new();

    for task in tasks {
        match &task.kind {
            TaskKind::ScheduleBlock { schedule } => {
                // Every matching entry emits its own slot; no deduplication.
                for entry in schedule {
                    if parse_weekday(&entry.day) != Some(target_weekday) {
                        continue;
                    }
                    let (Some(start), Some(end)) = (
                        at_time(window.date, &entry.start, tz),
                        at_time(window.date, &entry.end, tz),
                    ) else {
                        continue;
                    };
                    schedule_blocks.push(ScheduleBlockSlot {
                        task_id: task.id.clone(),
                        title: task.title.clone(),
                        start,
                        end,
                    });
                }
            }
            TaskKind::Recurring { recurrence, time } => {
                let clock = recurrence.time.as_deref().or(time.as_deref());
                let due = match recurrence.freq {
                    RecurrenceFreq::Daily => true,
                    RecurrenceFreq::Weekly => recurrence
                        .days
                        .iter()
                        .any(|day| parse_weekday(day) == Some(target_weekday)),
                    RecurrenceFreq::None | RecurrenceFreq::Custom => false,
                };
                // A recurring task with no resolvable clock time contributes
                // nothing rather than a floating entry.
                if let (true, Some(clock)) = (due, clock) {
                    if let Some(instant) = at_time(window.date, clock, tz) {
                        occurrences.push(make_occurrence(task, Some(instant), categories));
                    }
                }
            }
            TaskKind::Reminder {
                date,
                time,
                start_time,
            } => {
                if let Some(clock) = time.as_deref() {
                    if let Some(instant) = at_time(window.date, clock, tz) {
                        occurrences.push(make_occurrence(task, Some(instant), categories));
                    }
                } else if let Some(date) = date {
                    // Stored dates are UTC-midnight anchors; membership is a
                    // calendar-date comparison so a western configured
                    // timezone cannot shift a task off its own day.
                    if date.date_naive() == window.date {
                        let instant = start_time.unwrap_or(*date);
                        occurrences.push(make_occurrence(task, Some(instant), categories));
                    }
                } else {
                    occurrences.push(make_occurrence(task, None, categories));
                }
            }
            TaskKind::OneTime {
                date,
                time,
                start_time,
                ..
            } => {
                if let Some(date) = date {
                    if date.date_naive() == window.date {
                        let instant = start_time.unwrap_or(*date);
                        occurrences.push(make_occurrence(task, Some(instant), categories));
                    }
                } else if time.is_none() {
                    occurrences.push(make_occurrence(task, None, categories));
                }
            }
        }
    }

    schedule_blocks.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task_id.cmp(&b.task_id)));
    mark_blocked(&mut occurrences, &schedule_blocks);
    sort_occurrences(&mut occurrences);

    DayFeed {
        date: window.date.format("%Y-%m-%d").to_string(),
        schedule_blocks,
        occurrences,
    }
}

fn make_occurrence(
    task: &Task,
    occurrence_time: Option<DateTime<Utc>>,
    categories: &HashMap<String, Category>,
) -> Occurrence {
    let category = task
        .category
        .as_deref()
        .and_then(|id| categories.get(id))
        .cloned();
    Occurrence {
        task_id: task.id.clone(),
        title: task.title.clone(),
        occurrence_time,
        task_type: task.kind.type_name().to_string(),
        category,
        task: task.clone(),
        blocked: false,
        blocked_by: None,
    }
}

/// Marks every timed occurrence that falls inside a block interval. Bounds
/// are inclusive; the first block in sorted start order wins when intervals
/// overlap. Floating occurrences are never blocked.
fn mark_blocked(occurrences: &mut [Occurrence], blocks: &[ScheduleBlockSlot]) {
    for occurrence in occurrences.iter_mut() {
        let Some(instant) = occurrence.occurrence_time else {
            continue;
        };
        if let Some(block) = blocks
            .iter()
            .find(|block| block.start <= instant && instant <= block.end)
        {
            occurrence.blocked = true;
            occurrence.blocked_by = Some(BlockRef {
                task_id: block.task_id.clone(),
                title: block.title.clone(),
                start: block.start,
                end: block.end,
            });
        }
    }
}

/// Timed entries ascending, floating entries after them; ties broken by
/// task id so equal timestamps order the same way on every run.
fn sort_occurrences(occurrences: &mut [Occurrence]) {
    occurrences.sort_by(|a, b| match (a.occurrence_time, b.occurrence_time) {
        (Some(left), Some(right)) => left.cmp(&right).then_with(|| a.task_id.cmp(&b.task_id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.task_id.cmp(&b.task_id),
    });
}

/// Tasks relevant anywhere in `[start, end]`, bounds inclusive. Dated tasks
/// are filtered by their calendar date; recurring and schedule-block tasks
/// are returned as definitions rather than expanded per day.
pub fn resolve_range(tasks: &[Task], start: &DayWindow, end: &DayWindow) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| match &task.kind {
            TaskKind::OneTime { date, .. } | TaskKind::Reminder { date, .. } => match date {
                Some(date) => {
                    let day = date.date_naive();
                    day >= start.date && day <= end.date
                }
                None => true,
            },
            TaskKind::Recurring { .. } | TaskKind::ScheduleBlock { .. } => true,
        })
        .cloned()
        .collect()
}
