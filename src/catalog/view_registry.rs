use crate::core::{DbError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Level, event};

/// A named, stored query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    name: String,
    definition: String,
}

impl View {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The SELECT statement the view expands to.
    pub fn definition(&self) -> &str {
        &self.definition
    }
}

/// (lowercase database, lowercase view name)
type ViewKey = (String, String);

fn view_key(db_name: &str, view_name: &str) -> ViewKey {
    (db_name.to_lowercase(), view_name.to_lowercase())
}

/// Views of every database.
#[derive(Default)]
pub struct ViewRegistry {
    views: RwLock<BTreeMap<ViewKey, Arc<View>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`DbError::ViewAlreadyExists`] if the database already has a view with that name.
    pub fn register(&self, db_name: &str, view: View) -> Result<()> {
        let key = view_key(db_name, view.name());

        let mut views = self.views.write();
        if views.contains_key(&key) {
            return Err(DbError::ViewAlreadyExists(db_name.to_string(), view.name().to_string()));
        }

        event!(Level::DEBUG, database = %key.0, view = %key.1, "view registered");
        views.insert(key, Arc::new(view));
        Ok(())
    }

    pub fn delete(&self, db_name: &str, view_name: &str) -> Result<()> {
        let key = view_key(db_name, view_name);
        match self.views.write().remove(&key) {
            Some(_) => {
                event!(Level::DEBUG, database = %key.0, view = %key.1, "view dropped");
                Ok(())
            }
            None => Err(DbError::ViewNotFound(db_name.to_string(), view_name.to_string())),
        }
    }

    pub fn view(&self, db_name: &str, view_name: &str) -> Result<Arc<View>> {
        self.views
            .read()
            .get(&view_key(db_name, view_name))
            .cloned()
            .ok_or_else(|| DbError::ViewNotFound(db_name.to_string(), view_name.to_string()))
    }

    pub fn exists(&self, db_name: &str, view_name: &str) -> bool {
        self.views.read().contains_key(&view_key(db_name, view_name))
    }

    /// Every registered view, ordered by database then name.
    pub fn all_views(&self) -> Vec<Arc<View>> {
        self.views.read().values().cloned().collect()
    }

    /// Views of one database, ordered by name.
    pub fn views_in_database(&self, db_name: &str) -> Vec<Arc<View>> {
        let db_name = db_name.to_lowercase();
        self.views
            .read()
            .iter()
            .filter(|((db, _), _)| *db == db_name)
            .map(|(_, view)| view.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB_NAME: &str = "db";
    const VIEW_NAME: &str = "myview";

    fn mock_view() -> View {
        View::new(VIEW_NAME, "SELECT 1")
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = ViewRegistry::new();
        assert!(registry.all_views().is_empty());
    }

    #[test]
    fn test_register_non_existing_view() {
        let registry = ViewRegistry::new();
        registry.register(DB_NAME, mock_view()).unwrap();
        assert_eq!(registry.all_views().len(), 1);

        let actual = registry.view(DB_NAME, VIEW_NAME).unwrap();
        assert_eq!(*actual, mock_view());
    }

    #[test]
    fn test_register_existing_view() {
        let registry = ViewRegistry::new();
        registry.register(DB_NAME, mock_view()).unwrap();

        let err = registry.register(DB_NAME, mock_view()).unwrap_err();
        assert!(matches!(err, DbError::ViewAlreadyExists(_, _)));

        let err = registry.register("DB", View::new("MyView", "SELECT 2")).unwrap_err();
        assert!(matches!(err, DbError::ViewAlreadyExists(_, _)));
        assert_eq!(registry.all_views().len(), 1);
    }

    #[test]
    fn test_delete_existing_view() {
        let registry = ViewRegistry::new();
        registry.register(DB_NAME, mock_view()).unwrap();
        registry.delete(DB_NAME, "MYVIEW").unwrap();
        assert!(registry.all_views().is_empty());
    }

    #[test]
    fn test_delete_non_existing_view() {
        let registry = ViewRegistry::new();
        let err = registry.delete("random", "randomer").unwrap_err();
        assert!(matches!(err, DbError::ViewNotFound(_, _)));
    }

    #[test]
    fn test_get_non_existing_view() {
        let registry = ViewRegistry::new();
        let err = registry.view(DB_NAME, VIEW_NAME).unwrap_err();
        assert!(matches!(err, DbError::ViewNotFound(_, _)));
        assert!(!registry.exists(DB_NAME, VIEW_NAME));
    }

    #[test]
    fn test_views_in_database() {
        let registry = ViewRegistry::new();
        let databases = [("db0", 0), ("db1", 5), ("db2", 10)];

        for (db, num_views) in databases {
            for i in 0..num_views {
                registry
                    .register(db, View::new(format!("{}{}", VIEW_NAME, i), "SELECT 1"))
                    .unwrap();
            }
            assert_eq!(registry.views_in_database(db).len(), num_views);
        }
        assert_eq!(registry.all_views().len(), 15);
        assert_eq!(registry.views_in_database("DB1").len(), 5);
    }
}
