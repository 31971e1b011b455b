//! Owned handle around the SQLite connection. The caller opens one store at
//! startup and passes it to query builders and the lookup cache; nothing in
//! the crate holds a global connection.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::catalog::Catalog;
use crate::error::Result;

const MIGRATION_SQL_0001: &str = include_str!("../migrations/0001_initial.sql");

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub struct Store {
  conn: Connection,
  catalog: Catalog,
}

impl Store {
  pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
    if let Some(parent) = db_path.as_ref().parent() {
      if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
      }
    }
    Self::from_connection(Connection::open(db_path)?)
  }

  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(MIGRATION_SQL_0001)?;
    register_regexp(&conn)?;
    Ok(Store { conn, catalog: Catalog::default() })
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  pub fn catalog_mut(&mut self) -> &mut Catalog {
    &mut self.catalog
  }

  pub(crate) fn conn(&self) -> &Connection {
    &self.conn
  }
}

/// Case-insensitive substring-regex predicate for generated SQL.
/// `X REGEXP Y` reaches the function as `regexp(pattern, text)`; the
/// compiled pattern is cached on the statement via the aux-data slot.
fn register_regexp(conn: &Connection) -> Result<()> {
  conn.create_scalar_function(
    "regexp",
    2,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    move |ctx| {
      let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
        Ok(RegexBuilder::new(vr.as_str()?).case_insensitive(true).build()?)
      })?;
      let text = ctx
        .get_raw(1)
        .as_str_or_null()
        .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
      Ok(match text {
        Some(text) => pattern.is_match(text),
        None => false,
      })
    },
  )?;
  Ok(())
}
