//! Compiles one (operator, field, value) triple into a parameterized SQL
//! fragment, or into a post-fetch filter for resolver-backed fields.

use rusqlite::types::Value;

use crate::card::Card;
use crate::catalog::{Catalog, FieldSource};
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
  Equals,
  Contains,
  Matches,
  AtLeast,
  AtMost,
  Greater,
  Lesser,
}

impl Operator {
  fn comparison(self) -> &'static str {
    match self {
      Operator::Equals => "=",
      Operator::AtLeast => ">=",
      Operator::AtMost => "<=",
      Operator::Greater => ">",
      Operator::Lesser => "<",
      Operator::Contains | Operator::Matches => unreachable!("not a comparison operator"),
    }
  }
}

/// A value supplied to a `where_*` call, before binding.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
  Text(String),
  Int(i64),
  Real(f64),
}

impl Term {
  fn into_value(self) -> Value {
    match self {
      Term::Text(s) => Value::Text(s),
      Term::Int(i) => Value::Integer(i),
      Term::Real(r) => Value::Real(r),
    }
  }

  fn as_f64(&self) -> Option<f64> {
    match self {
      Term::Int(i) => Some(*i as f64),
      Term::Real(r) => Some(*r),
      Term::Text(_) => None,
    }
  }

  fn raw_text(&self) -> String {
    match self {
      Term::Text(s) => s.clone(),
      Term::Int(i) => i.to_string(),
      Term::Real(r) => r.to_string(),
    }
  }
}

impl From<&str> for Term {
  fn from(value: &str) -> Self {
    Term::Text(value.to_string())
  }
}

impl From<String> for Term {
  fn from(value: String) -> Self {
    Term::Text(value)
  }
}

impl From<i64> for Term {
  fn from(value: i64) -> Self {
    Term::Int(value)
  }
}

impl From<i32> for Term {
  fn from(value: i32) -> Self {
    Term::Int(value as i64)
  }
}

impl From<f64> for Term {
  fn from(value: f64) -> Self {
    Term::Real(value)
  }
}

/// Which joins a compiled fragment forces onto the base query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Joins {
  pub printings: bool,
  pub sets: bool,
}

pub(crate) enum Compiled {
  Fragment { sql: String, param: Value, joins: Joins },
  Filter(Box<dyn Fn(&Card) -> bool>),
}

impl std::fmt::Debug for Compiled {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Compiled::Fragment { sql, param, joins } => f
        .debug_struct("Fragment")
        .field("sql", sql)
        .field("param", param)
        .field("joins", joins)
        .finish(),
      Compiled::Filter(_) => f.debug_tuple("Filter").field(&"<closure>").finish(),
    }
  }
}

pub(crate) fn compile(catalog: &Catalog, field: &str, op: Operator, value: Term) -> Result<Compiled> {
  let def = catalog
    .field(field)
    .ok_or_else(|| Error::UnknownField(field.to_string()))?;

  if !def.kind.supports(op) {
    return Err(Error::InvalidOperator { op, field: field.to_string() });
  }

  match &def.source {
    FieldSource::Cards(col) => scalar_fragment(&format!("cards.{}", col), op, value),
    FieldSource::Printings(col) => {
      scalar_fragment(&format!("printings.{}", col), op, value).map(|compiled| match compiled {
        Compiled::Fragment { sql, param, .. } => Compiled::Fragment {
          sql,
          param,
          joins: Joins { printings: true, sets: false },
        },
        other => other,
      })
    }
    FieldSource::Sets(col) => {
      scalar_fragment(&format!("sets.{}", col), op, value).map(|compiled| match compiled {
        Compiled::Fragment { sql, param, .. } => Compiled::Fragment {
          sql,
          param,
          joins: Joins { printings: true, sets: true },
        },
        other => other,
      })
    }
    FieldSource::Association(table) => Ok(list_fragment(table, op, value)),
    FieldSource::Computed => {
      let resolver = def
        .resolver
        .clone()
        .ok_or_else(|| Error::UnknownField(field.to_string()))?;
      let threshold = value
        .as_f64()
        .ok_or_else(|| Error::InvalidOperator { op, field: field.to_string() })?;
      Ok(Compiled::Filter(Box::new(move |card| {
        match resolver(card) {
          Some(resolved) => match op {
            Operator::Equals => resolved == threshold,
            Operator::AtLeast => resolved >= threshold,
            Operator::AtMost => resolved <= threshold,
            Operator::Greater => resolved > threshold,
            Operator::Lesser => resolved < threshold,
            Operator::Contains | Operator::Matches => false,
          },
          None => false,
        }
      })))
    }
  }
}

fn scalar_fragment(col: &str, op: Operator, value: Term) -> Result<Compiled> {
  let (sql, param) = match op {
    Operator::Contains => (
      format!("{} LIKE ?", col),
      Value::Text(format!("%{}%", value.raw_text())),
    ),
    Operator::Matches => (format!("{} REGEXP ?", col), Value::Text(value.raw_text())),
    _ => (
      format!("{} {} ?", col, op.comparison()),
      value.into_value(),
    ),
  };
  Ok(Compiled::Fragment { sql, param, joins: Joins::default() })
}

fn list_fragment(table: &str, op: Operator, value: Term) -> Compiled {
  let (sql, param) = match op {
    Operator::Contains => (
      format!(
        "EXISTS (SELECT 1 FROM {t} WHERE {t}.card_name = cards.name AND {t}.value = ?)",
        t = table
      ),
      value.into_value(),
    ),
    // Cardinality comparison over the association rows. The scalar COUNT
    // form keeps a card with zero rows at cardinality 0, which must still
    // satisfy AtMost.
    _ => (
      format!(
        "(SELECT COUNT(*) FROM {t} WHERE {t}.card_name = cards.name) {op} ?",
        t = table,
        op = op.comparison()
      ),
      value.into_value(),
    ),
  };
  Compiled::Fragment { sql, param, joins: Joins::default() }
}
