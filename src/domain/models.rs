use crate::domain::dates::{parse_clock_time, parse_weekday};
use crate::infrastructure::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFreq {
    None,
    Daily,
    Weekly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recurrence {
    #[serde(rename = "type")]
    pub freq: RecurrenceFreq,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub days: Vec<String>,
}

impl Recurrence {
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.freq {
            RecurrenceFreq::Weekly => {
                if self.days.is_empty() {
                    return Err(CoreError::Validation(
                        "weekly recurrence requires a non-empty days list".to_string(),
                    ));
                }
                for day in &self.days {
                    if parse_weekday(day).is_none() {
                        return Err(CoreError::Validation(format!(
                            "invalid weekly recurrence day: '{}'",
                            day
                        )));
                    }
                }
                validate_optional_clock_time(self.time.as_deref(), "recurrence.time")
            }
            RecurrenceFreq::Daily => {
                validate_optional_clock_time(self.time.as_deref(), "recurrence.time")
            }
            RecurrenceFreq::None | RecurrenceFreq::Custom => Ok(()),
        }
    }
}

/// One weekly interval of a schedule-block task, bound to a single day.
/// Overnight spans are not supported, so `start` must precede `end`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub day: String,
    pub start: String,
    pub end: String,
}

impl ScheduleEntry {
    pub fn validate(&self) -> Result<(), CoreError> {
        if parse_weekday(&self.day).is_none() {
            return Err(CoreError::Validation(format!(
                "invalid schedule day: '{}'",
                self.day
            )));
        }
        let start = parse_clock_time(&self.start)
            .ok_or_else(|| CoreError::Validation("schedule.start must be HH:mm".to_string()))?;
        let end = parse_clock_time(&self.end)
            .ok_or_else(|| CoreError::Validation("schedule.end must be HH:mm".to_string()))?;
        if end <= start {
            return Err(CoreError::Validation(
                "schedule.end must be after schedule.start".to_string(),
            ));
        }
        Ok(())
    }
}

/// Temporal shape of a task. Exactly one interpretation path applies per
/// variant; fields irrelevant to a shape simply do not exist on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskKind {
    OneTime {
        #[serde(default)]
        date: Option<DateTime<Utc>>,
        #[serde(default)]
        time: Option<String>,
        #[serde(default)]
        start_time: Option<DateTime<Utc>>,
        #[serde(default)]
        end_time: Option<DateTime<Utc>>,
    },
    Reminder {
        #[serde(default)]
        date: Option<DateTime<Utc>>,
        #[serde(default)]
        time: Option<String>,
        #[serde(default)]
        start_time: Option<DateTime<Utc>>,
    },
    Recurring {
        recurrence: Recurrence,
        #[serde(default)]
        time: Option<String>,
    },
    ScheduleBlock {
        schedule: Vec<ScheduleEntry>,
    },
}

impl TaskKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::OneTime { .. } => "one-time",
            Self::Reminder { .. } => "reminder",
            Self::Recurring { .. } => "recurring",
            Self::ScheduleBlock { .. } => "schedule-block",
        }
    }

    /// The calendar-date anchor, for the shapes that have one.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::OneTime { date, .. } | Self::Reminder { date, .. } => *date,
            Self::Recurring { .. } | Self::ScheduleBlock { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::OneTime { time, .. } | Self::Reminder { time, .. } => {
                validate_optional_clock_time(time.as_deref(), "time")
            }
            Self::Recurring { recurrence, time } => {
                recurrence.validate()?;
                validate_optional_clock_time(time.as_deref(), "time")
            }
            Self::ScheduleBlock { schedule } => {
                for entry in schedule {
                    entry.validate()?;
                }
                Ok(())
            }
        }
    }
}

/// Per-calendar-date completion record; `date` is always UTC midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub owner: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(flatten)]
    pub kind: TaskKind,
    pub completed: bool,
    pub status: TaskStatus,
    #[serde(default)]
    pub completions: Vec<CompletionRecord>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.owner, "task.owner")?;
        validate_non_empty(&self.title, "task.title")?;
        self.kind.validate()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.kind.date()
    }

    /// Whether a completion record exists for the given calendar date.
    /// Records hold UTC-midnight timestamps, so the date-only comparison is
    /// stable across client timezones.
    pub fn is_completed_for(&self, date: chrono::NaiveDate) -> bool {
        self.completions
            .iter()
            .any(|record| record.date.date_naive() == date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Category {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_non_empty(&self.id, "category.id")?;
        validate_non_empty(&self.owner, "category.owner")?;
        validate_non_empty(&self.name, "category.name")
    }
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "{field_name} must not be empty"
        )));
    }
    Ok(())
}

fn validate_optional_clock_time(value: Option<&str>, field_name: &str) -> Result<(), CoreError> {
    match value {
        Some(raw) if parse_clock_time(raw).is_none() => Err(CoreError::Validation(format!(
            "{field_name} must be HH:mm"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_task(kind: TaskKind) -> Task {
        Task {
            id: "tsk-1".to_string(),
            owner: "user-1".to_string(),
            title: "Morning review".to_string(),
            description: None,
            priority: Priority::Medium,
            tags: vec!["routine".to_string()],
            category: None,
            kind,
            completed: false,
            status: TaskStatus::Pending,
            completions: Vec::new(),
            created_at: fixed_time("2026-02-01T08:00:00Z"),
        }
    }

    #[test]
    fn weekly_recurrence_requires_days() {
        let recurrence = Recurrence {
            freq: RecurrenceFreq::Weekly,
            time: Some("09:00".to_string()),
            days: Vec::new(),
        };
        assert!(recurrence.validate().is_err());
    }

    #[test]
    fn weekly_recurrence_accepts_mixed_case_days() {
        let recurrence = Recurrence {
            freq: RecurrenceFreq::Weekly,
            time: None,
            days: vec!["Monday".to_string(), "FRIDAY".to_string()],
        };
        assert!(recurrence.validate().is_ok());
    }

    #[test]
    fn weekly_recurrence_rejects_unknown_day() {
        let recurrence = Recurrence {
            freq: RecurrenceFreq::Weekly,
            time: None,
            days: vec!["monday".to_string(), "noday".to_string()],
        };
        assert!(recurrence.validate().is_err());
    }

    #[test]
    fn daily_recurrence_rejects_bad_time() {
        let recurrence = Recurrence {
            freq: RecurrenceFreq::Daily,
            time: Some("25:00".to_string()),
            days: Vec::new(),
        };
        assert!(recurrence.validate().is_err());
    }

    #[test]
    fn daily_recurrence_without_time_is_valid() {
        let recurrence = Recurrence {
            freq: RecurrenceFreq::Daily,
            time: None,
            days: Vec::new(),
        };
        assert!(recurrence.validate().is_ok());
    }

    #[test]
    fn schedule_entry_rejects_reversed_interval() {
        let entry = ScheduleEntry {
            day: "monday".to_string(),
            start: "14:00".to_string(),
            end: "08:00".to_string(),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn schedule_entry_accepts_valid_interval() {
        let entry = ScheduleEntry {
            day: "Monday".to_string(),
            start: "08:00".to_string(),
            end: "14:00".to_string(),
        };
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn task_validate_rejects_blank_title() {
        let mut task = sample_task(TaskKind::OneTime {
            date: None,
            time: None,
            start_time: None,
            end_time: None,
        });
        task.title = "   ".to_string();
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_kind_serializes_with_type_tag() {
        let task = sample_task(TaskKind::Recurring {
            recurrence: Recurrence {
                freq: RecurrenceFreq::Daily,
                time: Some("10:00".to_string()),
                days: Vec::new(),
            },
            time: None,
        });

        let json = serde_json::to_value(&task).expect("serialize task");
        assert_eq!(json["type"], "recurring");
        assert_eq!(json["recurrence"]["type"], "daily");

        let roundtrip: Task = serde_json::from_value(json).expect("deserialize task");
        assert_eq!(roundtrip, task);
    }

    #[test]
    fn schedule_block_serde_roundtrip() {
        let task = sample_task(TaskKind::ScheduleBlock {
            schedule: vec![ScheduleEntry {
                day: "monday".to_string(),
                start: "08:00".to_string(),
                end: "14:00".to_string(),
            }],
        });

        let encoded = serde_json::to_string(&task).expect("serialize task");
        let roundtrip: Task = serde_json::from_str(&encoded).expect("deserialize task");
        assert_eq!(roundtrip, task);
        assert_eq!(roundtrip.kind.type_name(), "schedule-block");
    }

    #[test]
    fn is_completed_for_compares_calendar_dates() {
        let mut task = sample_task(TaskKind::Reminder {
            date: None,
            time: Some("09:00".to_string()),
            start_time: None,
        });
        task.completions.push(CompletionRecord {
            date: fixed_time("2026-02-16T00:00:00Z"),
        });

        let day = chrono::NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        let other = chrono::NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
        assert!(task.is_completed_for(day));
        assert!(!task.is_completed_for(other));
    }
}
