use crate::domain::dates::{parse_calendar_date, utc_midnight};
use crate::domain::models::{CompletionRecord, Task};
use crate::infrastructure::error::CoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Completion dates are keyed by calendar date, one record per task per day.
pub trait TaskRepository: Send + Sync {
    fn list(&self, owner: &str) -> Result<Vec<Task>, CoreError>;
    fn get(&self, owner: &str, task_id: &str) -> Result<Option<Task>, CoreError>;
    fn insert(&self, task: &Task) -> Result<(), CoreError>;
    fn update(&self, task: &Task) -> Result<(), CoreError>;
    fn delete(&self, owner: &str, task_id: &str) -> Result<bool, CoreError>;
    /// Records a completion for the calendar date of `date`. Returns `false`
    /// when a record for that date already exists; the check and the insert
    /// are a single atomic write.
    fn add_completion(
        &self,
        owner: &str,
        task_id: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, CoreError>;
    /// Removes the completion record for the calendar date of `date`.
    /// Returns `false` when no such record exists.
    fn remove_completion(
        &self,
        owner: &str,
        task_id: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, CoreError>;
}

fn completion_key(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone)]
pub struct SqliteTaskRepository {
    db_path: PathBuf,
}

impl SqliteTaskRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, CoreError> {
        Connection::open(&self.db_path).map_err(CoreError::from)
    }

    fn load_completions(
        connection: &Connection,
        task_id: &str,
    ) -> Result<Vec<CompletionRecord>, CoreError> {
        let mut statement = connection
            .prepare("SELECT date FROM completions WHERE task_id = ?1 ORDER BY date ASC")?;
        let rows = statement.query_map(params![task_id], |row| row.get::<_, String>(0))?;

        let mut completions = Vec::new();
        for row in rows {
            let raw = row?;
            let date = parse_calendar_date(&raw).map_err(|_| {
                CoreError::InvalidConfig(format!("invalid completion date '{raw}' for {task_id}"))
            })?;
            completions.push(CompletionRecord {
                date: utc_midnight(date),
            });
        }
        Ok(completions)
    }

    fn decode_task(
        connection: &Connection,
        task_id: &str,
        payload: &str,
    ) -> Result<Task, CoreError> {
        let mut task: Task = serde_json::from_str(payload)?;
        task.completions = Self::load_completions(connection, task_id)?;
        Ok(task)
    }

    fn encode_task(task: &Task) -> Result<String, CoreError> {
        // Completion records live in their own table; the payload never
        // duplicates them.
        let mut stored = task.clone();
        stored.completions = Vec::new();
        serde_json::to_string(&stored).map_err(CoreError::from)
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn list(&self, owner: &str) -> Result<Vec<Task>, CoreError> {
        let connection = self.connect()?;
        let mut statement =
            connection.prepare("SELECT id, payload FROM tasks WHERE owner = ?1 ORDER BY id ASC")?;
        let rows = statement.query_map(params![owner], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let decoded: Vec<(String, String)> = rows.collect::<Result<_, _>>()?;
        let mut tasks = Vec::with_capacity(decoded.len());
        for (task_id, payload) in decoded {
            tasks.push(Self::decode_task(&connection, &task_id, &payload)?);
        }
        Ok(tasks)
    }

    fn get(&self, owner: &str, task_id: &str) -> Result<Option<Task>, CoreError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row(
                "SELECT payload FROM tasks WHERE owner = ?1 AND id = ?2",
                params![owner, task_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        Ok(Some(Self::decode_task(&connection, task_id, &payload)?))
    }

    fn insert(&self, task: &Task) -> Result<(), CoreError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO tasks (id, owner, payload) VALUES (?1, ?2, ?3)",
            params![task.id, task.owner, Self::encode_task(task)?],
        )?;
        Ok(())
    }

    fn update(&self, task: &Task) -> Result<(), CoreError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE tasks SET payload = ?1 WHERE owner = ?2 AND id = ?3",
            params![Self::encode_task(task)?, task.owner, task.id],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(format!("task not found: {}", task.id)));
        }
        Ok(())
    }

    fn delete(&self, owner: &str, task_id: &str) -> Result<bool, CoreError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM tasks WHERE owner = ?1 AND id = ?2",
            params![owner, task_id],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        // Completion rows go only once the owner-scoped delete landed.
        connection.execute(
            "DELETE FROM completions WHERE task_id = ?1",
            params![task_id],
        )?;
        Ok(true)
    }

    fn add_completion(
        &self,
        owner: &str,
        task_id: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "INSERT OR IGNORE INTO completions (task_id, date)
             SELECT id, ?3 FROM tasks WHERE owner = ?1 AND id = ?2",
            params![owner, task_id, completion_key(date)],
        )?;
        Ok(changed > 0)
    }

    fn remove_completion(
        &self,
        owner: &str,
        task_id: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM completions
             WHERE date = ?3
               AND task_id IN (SELECT id FROM tasks WHERE owner = ?1 AND id = ?2)",
            params![owner, task_id, completion_key(date)],
        )?;
        Ok(changed > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<String, Task>>,
}

impl InMemoryTaskRepository {
    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Task>>, CoreError> {
        self.tasks
            .lock()
            .map_err(|error| CoreError::InvalidConfig(format!("task store lock poisoned: {error}")))
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn list(&self, owner: &str) -> Result<Vec<Task>, CoreError> {
        let tasks = self.locked()?;
        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|task| task.owner == owner)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    fn get(&self, owner: &str, task_id: &str) -> Result<Option<Task>, CoreError> {
        let tasks = self.locked()?;
        Ok(tasks
            .get(task_id)
            .filter(|task| task.owner == owner)
            .cloned())
    }

    fn insert(&self, task: &Task) -> Result<(), CoreError> {
        let mut tasks = self.locked()?;
        if tasks.contains_key(&task.id) {
            return Err(CoreError::Conflict(format!(
                "task already exists: {}",
                task.id
            )));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn update(&self, task: &Task) -> Result<(), CoreError> {
        let mut tasks = self.locked()?;
        match tasks.get(&task.id) {
            Some(existing) if existing.owner == task.owner => {
                tasks.insert(task.id.clone(), task.clone());
                Ok(())
            }
            _ => Err(CoreError::NotFound(format!("task not found: {}", task.id))),
        }
    }

    fn delete(&self, owner: &str, task_id: &str) -> Result<bool, CoreError> {
        let mut tasks = self.locked()?;
        match tasks.get(task_id) {
            Some(existing) if existing.owner == owner => {
                tasks.remove(task_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn add_completion(
        &self,
        owner: &str,
        task_id: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let mut tasks = self.locked()?;
        let Some(task) = tasks.get_mut(task_id).filter(|task| task.owner == owner) else {
            return Ok(false);
        };
        let key = completion_key(date);
        if task
            .completions
            .iter()
            .any(|record| completion_key(record.date) == key)
        {
            return Ok(false);
        }
        task.completions.push(CompletionRecord { date });
        task.completions.sort_by_key(|record| record.date);
        Ok(true)
    }

    fn remove_completion(
        &self,
        owner: &str,
        task_id: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let mut tasks = self.locked()?;
        let Some(task) = tasks.get_mut(task_id).filter(|task| task.owner == owner) else {
            return Ok(false);
        };
        let key = completion_key(date);
        let before = task.completions.len();
        task.completions
            .retain(|record| completion_key(record.date) != key);
        Ok(task.completions.len() < before)
    }
}
