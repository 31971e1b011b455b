//! Registry of queryable card fields: which table owns each one, its value
//! kind, and which comparison operators apply to it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::card::Card;
use crate::predicate::Operator;

/// Derives a value from an already-materialized card. Fields backed by a
/// resolver are filtered after the rows come back, not in SQL.
pub type Resolver = Arc<dyn Fn(&Card) -> Option<f64> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Integer,
  List,
  Computed,
}

impl FieldKind {
  pub fn supports(self, op: Operator) -> bool {
    match self {
      FieldKind::Text => matches!(op, Operator::Equals | Operator::Contains | Operator::Matches),
      FieldKind::Integer | FieldKind::Computed => matches!(
        op,
        Operator::Equals | Operator::AtLeast | Operator::AtMost | Operator::Greater | Operator::Lesser
      ),
      FieldKind::List => matches!(
        op,
        Operator::Contains | Operator::AtLeast | Operator::AtMost | Operator::Greater | Operator::Lesser
      ),
    }
  }
}

/// Where a field's data lives. Fields owned by `printings` or `sets` force
/// the base query to join those tables; list fields live in their own
/// association table keyed by card name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldSource {
  Cards(&'static str),
  Printings(&'static str),
  Sets(&'static str),
  Association(&'static str),
  Computed,
}

#[derive(Clone)]
pub struct FieldDef {
  pub kind: FieldKind,
  pub source: FieldSource,
  pub resolver: Option<Resolver>,
}

pub struct Catalog {
  fields: HashMap<String, FieldDef>,
}

impl Catalog {
  pub fn field(&self, name: &str) -> Option<&FieldDef> {
    self.fields.get(name)
  }

  pub fn is_queryable(&self, name: &str) -> bool {
    self.fields.contains_key(name)
  }

  /// Register (or replace) a computed field. Predicates on it are applied
  /// after materialization via the resolver.
  pub fn register_computed<F>(&mut self, name: &str, resolver: F)
  where
    F: Fn(&Card) -> Option<f64> + Send + Sync + 'static,
  {
    self.fields.insert(
      name.to_string(),
      FieldDef {
        kind: FieldKind::Computed,
        source: FieldSource::Computed,
        resolver: Some(Arc::new(resolver)),
      },
    );
  }
}

fn stored(kind: FieldKind, source: FieldSource) -> FieldDef {
  FieldDef { kind, source, resolver: None }
}

impl Default for Catalog {
  fn default() -> Self {
    let mut fields = HashMap::new();

    let text = |fields: &mut HashMap<String, FieldDef>, name: &str, source: FieldSource| {
      fields.insert(name.to_string(), stored(FieldKind::Text, source));
    };
    let integer = |fields: &mut HashMap<String, FieldDef>, name: &str, source: FieldSource| {
      fields.insert(name.to_string(), stored(FieldKind::Integer, source));
    };

    text(&mut fields, "name", FieldSource::Cards("name"));
    text(&mut fields, "mana_cost", FieldSource::Cards("mana_cost"));
    integer(&mut fields, "cmc", FieldSource::Cards("cmc"));
    text(&mut fields, "type_line", FieldSource::Cards("type_line"));
    text(&mut fields, "text", FieldSource::Cards("text"));
    text(&mut fields, "flavor", FieldSource::Cards("flavor"));
    text(&mut fields, "power", FieldSource::Cards("power"));
    text(&mut fields, "toughness", FieldSource::Cards("toughness"));
    integer(&mut fields, "loyalty", FieldSource::Cards("loyalty"));

    text(&mut fields, "rarity", FieldSource::Printings("rarity"));
    text(&mut fields, "artist", FieldSource::Printings("artist"));
    text(&mut fields, "set", FieldSource::Printings("set_code"));
    integer(&mut fields, "number", FieldSource::Printings("collector_number"));
    integer(&mut fields, "multiverse_id", FieldSource::Printings("id"));
    text(&mut fields, "set_name", FieldSource::Sets("name"));

    for table in ["supertypes", "types", "subtypes", "colors", "color_identity"] {
      fields.insert(table.to_string(), stored(FieldKind::List, FieldSource::Association(table)));
    }

    let mut catalog = Catalog { fields };
    // No price source is wired into this crate; the pricing feed belongs to
    // the host application, which re-registers the field with a real
    // resolver.
    catalog.register_computed("price", |_card| None);
    catalog
  }
}
