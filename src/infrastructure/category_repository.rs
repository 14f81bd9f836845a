use crate::domain::models::Category;
use crate::infrastructure::error::CoreError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait CategoryRepository: Send + Sync {
    fn list(&self, owner: &str) -> Result<Vec<Category>, CoreError>;
    fn get(&self, owner: &str, category_id: &str) -> Result<Option<Category>, CoreError>;
    fn insert(&self, category: &Category) -> Result<(), CoreError>;
    fn delete(&self, owner: &str, category_id: &str) -> Result<bool, CoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCategoryRepository {
    db_path: PathBuf,
}

impl SqliteCategoryRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, CoreError> {
        Connection::open(&self.db_path).map_err(CoreError::from)
    }
}

impl CategoryRepository for SqliteCategoryRepository {
    fn list(&self, owner: &str) -> Result<Vec<Category>, CoreError> {
        let connection = self.connect()?;
        let mut statement =
            connection.prepare("SELECT payload FROM categories WHERE owner = ?1")?;
        let rows = statement.query_map(params![owner], |row| row.get::<_, String>(0))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(serde_json::from_str::<Category>(&row?)?);
        }
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    fn get(&self, owner: &str, category_id: &str) -> Result<Option<Category>, CoreError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row(
                "SELECT payload FROM categories WHERE owner = ?1 AND id = ?2",
                params![owner, category_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    fn insert(&self, category: &Category) -> Result<(), CoreError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO categories (id, owner, payload) VALUES (?1, ?2, ?3)",
            params![category.id, category.owner, serde_json::to_string(category)?],
        )?;
        Ok(())
    }

    fn delete(&self, owner: &str, category_id: &str) -> Result<bool, CoreError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM categories WHERE owner = ?1 AND id = ?2",
            params![owner, category_id],
        )?;
        Ok(changed > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCategoryRepository {
    categories: Mutex<HashMap<String, Category>>,
}

impl CategoryRepository for InMemoryCategoryRepository {
    fn list(&self, owner: &str) -> Result<Vec<Category>, CoreError> {
        let categories = self.categories.lock().map_err(|error| {
            CoreError::InvalidConfig(format!("category store lock poisoned: {error}"))
        })?;
        let mut matching: Vec<Category> = categories
            .values()
            .filter(|category| category.owner == owner)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }

    fn get(&self, owner: &str, category_id: &str) -> Result<Option<Category>, CoreError> {
        let categories = self.categories.lock().map_err(|error| {
            CoreError::InvalidConfig(format!("category store lock poisoned: {error}"))
        })?;
        Ok(categories
            .get(category_id)
            .filter(|category| category.owner == owner)
            .cloned())
    }

    fn insert(&self, category: &Category) -> Result<(), CoreError> {
        let mut categories = self.categories.lock().map_err(|error| {
            CoreError::InvalidConfig(format!("category store lock poisoned: {error}"))
        })?;
        if categories.contains_key(&category.id) {
            return Err(CoreError::Conflict(format!(
                "category already exists: {}",
                category.id
            )));
        }
        categories.insert(category.id.clone(), category.clone());
        Ok(())
    }

    fn delete(&self, owner: &str, category_id: &str) -> Result<bool, CoreError> {
        let mut categories = self.categories.lock().map_err(|error| {
            CoreError::InvalidConfig(format!("category store lock poisoned: {error}"))
        })?;
        match categories.get(category_id) {
            Some(existing) if existing.owner == owner => {
                categories.remove(category_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
