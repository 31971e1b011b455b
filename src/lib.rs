//! Query engine for the card collection database.
//!
//! Everything interactive funnels through here: the chainable
//! [`CardQuery`] builder compiles filter predicates against the relational
//! card schema, the executor materializes deduplicated [`Card`] entities,
//! and [`CardCache`] memoizes the hot identity lookups. The caller owns the
//! [`Store`] handle and passes it in; the crate never holds a global
//! connection.
//!
//! ```no_run
//! use magiccollection_core::Store;
//!
//! # fn main() -> Result<(), magiccollection_core::Error> {
//! let store = Store::open("res/cards.sqlite3")?;
//! let lands = store
//!   .cards()
//!   .where_contains("type_line", "Land")?
//!   .negated()
//!   .where_contains("type_line", "Basic")?
//!   .find_all()?;
//! for card in lands {
//!   println!("{}", card?.name);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod card;
mod catalog;
mod error;
mod executor;
mod predicate;
mod query;
mod store;

#[cfg(test)]
mod fixtures;

pub use cache::{CacheBackend, CacheStats, CardCache, JsonFileBackend, MemoryBackend, Snapshot};
pub use card::{Card, Printing, Ruling};
pub use catalog::{Catalog, FieldDef, FieldKind, FieldSource, Resolver};
pub use error::{Error, Result};
pub use executor::Cards;
pub use predicate::{Operator, Term};
pub use query::CardQuery;
pub use store::Store;
