use crate::application::bootstrap::bootstrap_workspace;
use crate::application::resolver::{resolve_day, resolve_range, DayFeed};
use crate::domain::dates::{normalize, offset, utc_midnight, DayWindow};
use crate::domain::models::{
    Category, Priority, Task, TaskKind, TaskStatus, validate_non_empty,
};
use crate::infrastructure::category_repository::{CategoryRepository, SqliteCategoryRepository};
use crate::infrastructure::config::read_timezone;
use crate::infrastructure::error::CoreError;
use crate::infrastructure::task_repository::{SqliteTaskRepository, TaskRepository};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    timezone: Tz,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, CoreError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");
        let timezone = read_timezone(&config_dir)?;

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            timezone,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn tasks(&self) -> SqliteTaskRepository {
        SqliteTaskRepository::new(&self.database_path)
    }

    fn categories(&self) -> SqliteCategoryRepository {
        SqliteCategoryRepository::new(&self.database_path)
    }

    pub fn operation_error(&self, operation: &str, error: &CoreError) -> String {
        self.log_error(operation, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, operation: &str, message: &str) {
        self.append_log("info", operation, message);
    }

    pub fn log_error(&self, operation: &str, message: &str) {
        self.append_log("error", operation, message);
    }

    fn append_log(&self, level: &str, operation: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "operation": operation,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub kind: TaskKind,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub kind: Option<TaskKind>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletionStatus {
    pub task_id: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_for_date: Option<bool>,
}

/// Anchors `date` fields to UTC midnight of their calendar date, the
/// timezone-stable storage form.
fn normalized_kind(kind: TaskKind) -> TaskKind {
    let anchor = |value: chrono::DateTime<Utc>| utc_midnight(value.date_naive());
    match kind {
        TaskKind::OneTime {
            date,
            time,
            start_time,
            end_time,
        } => TaskKind::OneTime {
            date: date.map(anchor),
            time,
            start_time,
            end_time,
        },
        TaskKind::Reminder {
            date,
            time,
            start_time,
        } => TaskKind::Reminder {
            date: date.map(anchor),
            time,
            start_time,
        },
        other => other,
    }
}

fn ensure_unlocked(task: &Task, today: NaiveDate) -> Result<(), CoreError> {
    if task.completed {
        return Err(CoreError::Locked(format!(
            "task is completed and locked: {}",
            task.id
        )));
    }
    if let Some(date) = task.date() {
        if date.date_naive() < today {
            return Err(CoreError::Locked(format!(
                "task date has passed and is locked: {}",
                task.id
            )));
        }
    }
    Ok(())
}

fn fetch_task(
    repository: &dyn TaskRepository,
    owner: &str,
    task_id: &str,
) -> Result<Task, CoreError> {
    repository
        .get(owner, task_id)?
        .ok_or_else(|| CoreError::NotFound(format!("task not found: {task_id}")))
}

fn category_map(state: &AppState, owner: &str) -> Result<HashMap<String, Category>, CoreError> {
    let categories = state.categories().list(owner)?;
    Ok(categories
        .into_iter()
        .map(|category| (category.id.clone(), category))
        .collect())
}

fn resolve_window(state: &AppState, date: Option<&str>) -> Result<DayWindow, CoreError> {
    match date {
        Some(value) => normalize(value, state.timezone()),
        None => Ok(offset(0, state.timezone())),
    }
}

pub fn create_task_impl(state: &AppState, owner: &str, new: NewTask) -> Result<Task, CoreError> {
    validate_non_empty(owner, "owner")?;

    let task = Task {
        id: next_id("tsk"),
        owner: owner.to_string(),
        title: new.title.trim().to_string(),
        description: new.description,
        priority: new.priority.unwrap_or_default(),
        tags: new.tags,
        category: new.category,
        kind: normalized_kind(new.kind),
        completed: false,
        status: TaskStatus::Pending,
        completions: Vec::new(),
        created_at: Utc::now(),
    };
    task.validate()?;

    state.tasks().insert(&task)?;
    state.log_info("create_task", &format!("created {}", task.id));
    Ok(task)
}

pub fn get_task_impl(state: &AppState, owner: &str, task_id: &str) -> Result<Task, CoreError> {
    fetch_task(&state.tasks(), owner, task_id)
}

/// All of the owner's tasks, highest priority first, newest first within a
/// priority. With a date, only tasks dated on that calendar day remain;
/// undated tasks are dropped.
pub fn list_tasks_impl(
    state: &AppState,
    owner: &str,
    date: Option<String>,
) -> Result<Vec<Task>, CoreError> {
    let mut tasks = state.tasks().list(owner)?;

    if let Some(value) = date {
        let window = normalize(&value, state.timezone())?;
        tasks.retain(|task| {
            task.date()
                .is_some_and(|date| date.date_naive() == window.date)
        });
    }

    tasks.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(tasks)
}

pub fn feed_for_date_impl(
    state: &AppState,
    owner: &str,
    date: Option<String>,
) -> Result<DayFeed, CoreError> {
    let window = resolve_window(state, date.as_deref())?;
    let tasks = state.tasks().list(owner)?;
    let categories = category_map(state, owner)?;
    Ok(resolve_day(&tasks, &window, state.timezone(), &categories))
}

pub fn range_impl(
    state: &AppState,
    owner: &str,
    start: &str,
    end: &str,
) -> Result<Vec<Task>, CoreError> {
    let start = normalize(start, state.timezone())?;
    let end = normalize(end, state.timezone())?;
    if end.date < start.date {
        return Err(CoreError::Validation(
            "range end must not precede range start".to_string(),
        ));
    }

    let tasks = state.tasks().list(owner)?;
    Ok(resolve_range(&tasks, &start, &end))
}

pub fn complete_task_impl(
    state: &AppState,
    owner: &str,
    task_id: &str,
    date: Option<String>,
) -> Result<Task, CoreError> {
    let repository = state.tasks();
    let mut task = fetch_task(&repository, owner, task_id)?;

    match date {
        Some(value) => {
            let window = normalize(&value, state.timezone())?;
            // The repository insert is the atomic authority; a false return
            // means another writer recorded the same date first.
            if !repository.add_completion(owner, task_id, window.utc_midnight)? {
                return Err(CoreError::Conflict(format!(
                    "task already completed for {}: {task_id}",
                    window.date
                )));
            }
            state.log_info(
                "complete_task",
                &format!("completed {task_id} for {}", window.date),
            );
            task = fetch_task(&repository, owner, task_id)?;
        }
        None => {
            if task.completed {
                return Err(CoreError::Conflict(format!(
                    "task already completed: {task_id}"
                )));
            }
            task.completed = true;
            task.status = TaskStatus::Completed;
            repository.update(&task)?;
            state.log_info("complete_task", &format!("completed {task_id}"));
        }
    }
    Ok(task)
}

pub fn uncomplete_task_impl(
    state: &AppState,
    owner: &str,
    task_id: &str,
    date: &str,
) -> Result<Task, CoreError> {
    let repository = state.tasks();
    fetch_task(&repository, owner, task_id)?;

    let window = normalize(date, state.timezone())?;
    if !repository.remove_completion(owner, task_id, window.utc_midnight)? {
        return Err(CoreError::NotFound(format!(
            "no completion recorded for {}: {task_id}",
            window.date
        )));
    }
    state.log_info(
        "uncomplete_task",
        &format!("uncompleted {task_id} for {}", window.date),
    );
    fetch_task(&repository, owner, task_id)
}

pub fn completion_status_impl(
    state: &AppState,
    owner: &str,
    task_id: &str,
    date: Option<String>,
) -> Result<CompletionStatus, CoreError> {
    let task = fetch_task(&state.tasks(), owner, task_id)?;

    let (date, completed_for_date) = match date {
        Some(value) => {
            let window = normalize(&value, state.timezone())?;
            (
                Some(window.date.format("%Y-%m-%d").to_string()),
                Some(task.is_completed_for(window.date)),
            )
        }
        None => (None, None),
    };

    Ok(CompletionStatus {
        task_id: task.id,
        completed: task.completed,
        date,
        completed_for_date,
    })
}

pub fn update_task_impl(
    state: &AppState,
    owner: &str,
    task_id: &str,
    update: TaskUpdate,
) -> Result<Task, CoreError> {
    let repository = state.tasks();
    let mut task = fetch_task(&repository, owner, task_id)?;

    let today = offset(0, state.timezone()).date;
    ensure_unlocked(&task, today)?;

    if let Some(title) = update.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = update.description {
        task.description = Some(description);
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if let Some(tags) = update.tags {
        task.tags = tags;
    }
    if let Some(category) = update.category {
        task.category = Some(category);
    }
    if let Some(status) = update.status {
        task.status = status;
    }
    if let Some(kind) = update.kind {
        task.kind = normalized_kind(kind);
    }
    task.validate()?;

    repository.update(&task)?;
    state.log_info("update_task", &format!("updated {task_id}"));
    Ok(task)
}

pub fn delete_task_impl(state: &AppState, owner: &str, task_id: &str) -> Result<(), CoreError> {
    let repository = state.tasks();
    let task = fetch_task(&repository, owner, task_id)?;

    let today = offset(0, state.timezone()).date;
    ensure_unlocked(&task, today)?;

    if !repository.delete(owner, task_id)? {
        return Err(CoreError::NotFound(format!("task not found: {task_id}")));
    }
    state.log_info("delete_task", &format!("deleted {task_id}"));
    Ok(())
}

pub fn create_category_impl(
    state: &AppState,
    owner: &str,
    name: &str,
    icon: Option<String>,
    color: Option<String>,
) -> Result<Category, CoreError> {
    let category = Category {
        id: next_id("cat"),
        owner: owner.to_string(),
        name: name.trim().to_string(),
        icon,
        color,
    };
    category.validate()?;

    state.categories().insert(&category)?;
    state.log_info("create_category", &format!("created {}", category.id));
    Ok(category)
}

pub fn list_categories_impl(state: &AppState, owner: &str) -> Result<Vec<Category>, CoreError> {
    state.categories().list(owner)
}

pub fn delete_category_impl(
    state: &AppState,
    owner: &str,
    category_id: &str,
) -> Result<(), CoreError> {
    if !state.categories().delete(owner, category_id)? {
        return Err(CoreError::NotFound(format!(
            "category not found: {category_id}"
        )));
    }
    state.log_info("delete_category", &format!("deleted {category_id}"));
    Ok(())
}
