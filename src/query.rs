//! Chainable query builder over the card tables.
//!
//! Clauses accumulate into a flat conjunctive chain; `use_or` switches the
//! connector, `negated` flips the next clause, and `start_block`/`end_block`
//! group a sub-expression behind parentheses. Field and operator errors
//! surface on the offending call, before any store access.

use rusqlite::types::Value;

use crate::card::Card;
use crate::error::Result;
use crate::executor::{self, Cards, PostFilter, SCALAR_COLUMNS};
use crate::predicate::{self, Compiled, Joins, Operator, Term};
use crate::store::Store;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Connector {
  And,
  Or,
}

impl Connector {
  fn sql(self) -> &'static str {
    match self {
      Connector::And => " AND ",
      Connector::Or => " OR ",
    }
  }
}

pub struct CardQuery<'a> {
  store: &'a Store,
  clauses: String,
  params: Vec<Value>,
  connector: Connector,
  has_clause: bool,
  pending_not: bool,
  open_blocks: Vec<(Connector, bool)>,
  filters: Vec<PostFilter>,
  joins: Joins,
}

impl<'a> std::fmt::Debug for CardQuery<'a> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CardQuery")
      .field("clauses", &self.clauses)
      .field("params", &self.params)
      .field("connector", &self.connector)
      .field("has_clause", &self.has_clause)
      .field("pending_not", &self.pending_not)
      .field("open_blocks", &self.open_blocks)
      .field("filters", &format_args!("<{} filters>", self.filters.len()))
      .field("joins", &self.joins)
      .finish()
  }
}

impl<'a> CardQuery<'a> {
  pub fn new(store: &'a Store) -> Self {
    CardQuery {
      store,
      clauses: String::new(),
      params: Vec::new(),
      connector: Connector::And,
      has_clause: false,
      pending_not: false,
      open_blocks: Vec::new(),
      filters: Vec::new(),
      joins: Joins::default(),
    }
  }

  pub fn where_eq(self, field: &str, value: impl Into<Term>) -> Result<Self> {
    self.push(field, Operator::Equals, value.into())
  }

  pub fn where_contains(self, field: &str, value: impl Into<Term>) -> Result<Self> {
    self.push(field, Operator::Contains, value.into())
  }

  /// One `contains` clause per value, each connected like any other clause.
  pub fn where_contains_all<I>(mut self, field: &str, values: I) -> Result<Self>
  where
    I: IntoIterator,
    I::Item: Into<Term>,
  {
    for value in values {
      self = self.where_contains(field, value)?;
    }
    Ok(self)
  }

  pub fn where_matches(self, field: &str, pattern: &str) -> Result<Self> {
    self.push(field, Operator::Matches, pattern.into())
  }

  pub fn where_at_least(self, field: &str, value: impl Into<Term>) -> Result<Self> {
    self.push(field, Operator::AtLeast, value.into())
  }

  pub fn where_at_most(self, field: &str, value: impl Into<Term>) -> Result<Self> {
    self.push(field, Operator::AtMost, value.into())
  }

  pub fn where_greater(self, field: &str, value: impl Into<Term>) -> Result<Self> {
    self.push(field, Operator::Greater, value.into())
  }

  pub fn where_lesser(self, field: &str, value: impl Into<Term>) -> Result<Self> {
    self.push(field, Operator::Lesser, value.into())
  }

  /// Escape hatch: an arbitrary test applied to each materialized card,
  /// after the SQL result comes back. Honors a pending `negated()`.
  pub fn with_predicate<F>(mut self, pred: F) -> Self
  where
    F: Fn(&Card) -> bool + 'static,
  {
    let negate = std::mem::take(&mut self.pending_not);
    if negate {
      self.filters.push(Box::new(move |card| !pred(card)));
    } else {
      self.filters.push(Box::new(pred));
    }
    self
  }

  /// Flips the negation flag; the next clause (or block) consumes it.
  pub fn negated(mut self) -> Self {
    self.pending_not = !self.pending_not;
    self
  }

  pub fn use_and(mut self) -> Self {
    self.connector = Connector::And;
    self
  }

  pub fn use_or(mut self) -> Self {
    self.connector = Connector::Or;
    self
  }

  /// Opens a parenthesized sub-expression. The enclosing connector state is
  /// restored when the block closes.
  pub fn start_block(mut self) -> Self {
    self.begin_clause();
    if std::mem::take(&mut self.pending_not) {
      self.clauses.push_str("NOT ");
    }
    self.clauses.push('(');
    self.open_blocks.push((self.connector, self.has_clause));
    self.connector = Connector::And;
    self.has_clause = false;
    self
  }

  pub fn end_block(mut self) -> Self {
    match self.open_blocks.pop() {
      Some((connector, _)) => {
        self.clauses.push(')');
        self.connector = connector;
        self.has_clause = true;
      }
      None => log::warn!("end_block without matching start_block; ignored"),
    }
    self
  }

  /// The accumulated WHERE clause text, mainly for diagnostics.
  pub fn where_sql(&self) -> &str {
    &self.clauses
  }

  /// The full statement this builder will execute.
  pub fn statement_sql(&self) -> String {
    let mut sql = format!("SELECT {} FROM cards", SCALAR_COLUMNS);
    if self.joins.printings {
      sql.push_str(" JOIN printings ON printings.card_name = cards.name");
    }
    if self.joins.sets {
      sql.push_str(" JOIN sets ON sets.code = printings.set_code");
    }
    if !self.clauses.is_empty() {
      sql.push_str(" WHERE ");
      sql.push_str(&self.clauses);
    }
    sql
  }

  pub fn find_all(self) -> Result<Cards<'a>> {
    let sql = self.statement_sql();
    log::debug!("card query: {} params={:?}", sql, self.params);
    let rows = executor::fetch_scalar_rows(self.store, &sql, &self.params)?;
    Ok(Cards::new(self.store, rows, self.filters))
  }

  pub fn find_one(self) -> Result<Option<Card>> {
    self.find_all()?.next().transpose()
  }

  fn push(mut self, field: &str, op: Operator, value: Term) -> Result<Self> {
    match predicate::compile(self.store.catalog(), field, op, value)? {
      Compiled::Fragment { sql, param, joins } => {
        self.begin_clause();
        if std::mem::take(&mut self.pending_not) {
          self.clauses.push_str("NOT (");
          self.clauses.push_str(&sql);
          self.clauses.push(')');
        } else {
          self.clauses.push_str(&sql);
        }
        self.params.push(param);
        self.joins.printings |= joins.printings;
        self.joins.sets |= joins.sets;
        self.has_clause = true;
      }
      Compiled::Filter(filter) => {
        let negate = std::mem::take(&mut self.pending_not);
        if negate {
          self.filters.push(Box::new(move |card| !filter(card)));
        } else {
          self.filters.push(filter);
        }
      }
    }
    Ok(self)
  }

  fn begin_clause(&mut self) {
    if self.has_clause {
      self.clauses.push_str(self.connector.sql());
    }
  }
}

impl Store {
  /// Entry point for card queries: `store.cards().where_eq(...)...`.
  pub fn cards(&self) -> CardQuery<'_> {
    CardQuery::new(self)
  }
}
