//! Name resolution against the catalog registries carried by a [`Context`].

use crate::catalog::{Procedure, View};
use crate::context::Context;
use crate::core::{DbError, Result};
use std::sync::Arc;

/// Database to resolve a name in: the qualifier if present, else the
/// session's current database.
fn target_database(ctx: &Context, database: Option<&str>) -> String {
    match database {
        Some(db) if !db.is_empty() => db.to_string(),
        _ => ctx.session().current_database(),
    }
}

/// Picks the overload of `name` a `CALL` with `arg_count` arguments runs.
pub fn resolve_procedure(
    ctx: &Context,
    database: Option<&str>,
    name: &str,
    arg_count: usize,
) -> Result<Arc<Procedure>> {
    let db = target_database(ctx, database);
    ctx.procedures()
        .get(&db, name, arg_count)
        .ok_or_else(|| DbError::ProcedureNotFound(db, name.to_string()))
}

pub fn resolve_view(ctx: &Context, database: Option<&str>, name: &str) -> Result<Arc<View>> {
    let db = target_database(ctx, database);
    ctx.views().view(&db, name)
}
