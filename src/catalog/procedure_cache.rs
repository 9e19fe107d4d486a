use super::procedure::{Arity, Procedure, compare_overloads};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{Level, event};

type OverloadMap = BTreeMap<Arity, Arc<Procedure>>;

/// Stored procedures of every database, keyed by (database, name, arity).
///
/// Database and procedure names are case-insensitive on every path.
#[derive(Default)]
pub struct ProcedureCache {
    db_to_procedures: RwLock<HashMap<String, HashMap<String, OverloadMap>>>,
}

impl ProcedureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `procedure` under `db_name`, replacing any procedure with the same
    /// name and arity.
    pub fn register(&self, db_name: &str, procedure: Procedure) {
        let db_name = db_name.to_lowercase();
        let name = procedure.name.to_lowercase();
        let arity = procedure.arity();

        let mut map = self.db_to_procedures.write();
        let replaced = map
            .entry(db_name.clone())
            .or_default()
            .entry(name.clone())
            .or_default()
            .insert(arity, Arc::new(procedure))
            .is_some();

        event!(
            Level::DEBUG,
            database = %db_name,
            procedure = %name,
            arity = %arity,
            replaced,
            "procedure registered"
        );
    }

    /// Looks up a procedure for a call with `num_params` arguments.
    ///
    /// An overload with exactly `num_params` parameters wins. Otherwise the
    /// overload with the greatest arity is returned (a variadic one if
    /// present), so the caller can report an argument-count error against it.
    pub fn get(&self, db_name: &str, procedure_name: &str, num_params: usize) -> Option<Arc<Procedure>> {
        let db_name = db_name.to_lowercase();
        let procedure_name = procedure_name.to_lowercase();

        let map = self.db_to_procedures.read();
        let overloads = map.get(&db_name)?.get(&procedure_name)?;
        if let Some(procedure) = overloads.get(&Arity::Fixed(num_params)) {
            return Some(procedure.clone());
        }

        overloads
            .values()
            .max_by(|a, b| compare_overloads(a, b))
            .cloned()
    }

    /// All procedures of a database, sorted by name then parameter count.
    pub fn all_for_database(&self, db_name: &str) -> Vec<Arc<Procedure>> {
        let db_name = db_name.to_lowercase();
        let map = self.db_to_procedures.read();
        let Some(procedures) = map.get(&db_name) else {
            return Vec::new();
        };

        let mut all: Vec<Arc<Procedure>> = procedures
            .values()
            .flat_map(|overloads| overloads.values().cloned())
            .collect();
        all.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.params.len().cmp(&b.params.len()))
        });
        all
    }

    /// Removes every overload of a procedure. Returns how many were removed.
    pub fn unregister(&self, db_name: &str, procedure_name: &str) -> usize {
        let db_name = db_name.to_lowercase();
        let procedure_name = procedure_name.to_lowercase();

        let mut map = self.db_to_procedures.write();
        let Some(procedures) = map.get_mut(&db_name) else {
            return 0;
        };
        let removed = procedures
            .remove(&procedure_name)
            .map(|overloads| overloads.len())
            .unwrap_or(0);
        if procedures.is_empty() {
            map.remove(&db_name);
        }

        if removed > 0 {
            event!(
                Level::DEBUG,
                database = %db_name,
                procedure = %procedure_name,
                removed,
                "procedure dropped"
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.db_to_procedures
            .read()
            .values()
            .flat_map(|procedures| procedures.values())
            .map(|overloads| overloads.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
