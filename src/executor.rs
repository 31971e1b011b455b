//! Runs compiled statements and turns result rows into fully-populated
//! `Card` entities.
//!
//! The base query can join `cards` against `printings` and `sets`, so one
//! logical card may come back once per matching printing; iteration collapses
//! those to the first-seen row per name before materializing.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::card::{Card, Printing, Ruling};
use crate::error::{Error, Result};
use crate::store::Store;

pub(crate) const SCALAR_COLUMNS: &str =
  "cards.name, cards.mana_cost, cards.cmc, cards.type_line, cards.text, \
   cards.flavor, cards.power, cards.toughness, cards.loyalty";

/// Scalar card columns of one result row, before association lookups.
pub(crate) struct ScalarRow {
  name: String,
  mana_cost: Option<String>,
  cmc: Option<i64>,
  type_line: Option<String>,
  text: Option<String>,
  flavor: Option<String>,
  power: Option<String>,
  toughness: Option<String>,
  loyalty: Option<i64>,
}

pub(crate) fn fetch_scalar_rows(store: &Store, sql: &str, params: &[Value]) -> Result<Vec<ScalarRow>> {
  let mut statement = store.conn().prepare(sql)?;
  let rows = statement.query_map(params_from_iter(params.iter()), |row| {
    Ok(ScalarRow {
      name: row.get(0)?,
      mana_cost: row.get(1)?,
      cmc: row.get(2)?,
      type_line: row.get(3)?,
      text: row.get(4)?,
      flavor: row.get(5)?,
      power: row.get(6)?,
      toughness: row.get(7)?,
      loyalty: row.get(8)?,
    })
  })?;

  let mut out = Vec::new();
  for row in rows {
    out.push(row?);
  }
  Ok(out)
}

fn association_values(store: &Store, table: &str, card_name: &str) -> Result<BTreeSet<String>> {
  let mut statement = store
    .conn()
    .prepare(&format!("SELECT value FROM {} WHERE card_name = ?1", table))?;
  let rows = statement.query_map([card_name], |row| row.get::<usize, String>(0))?;

  let mut values = BTreeSet::new();
  for row in rows {
    values.insert(row?);
  }
  Ok(values)
}

fn load_rulings(store: &Store, card_name: &str) -> Result<Vec<Ruling>> {
  let mut statement = store.conn().prepare(
    "SELECT ruling_date, ruling_text FROM rulings WHERE card_name = ?1 ORDER BY ruling_date",
  )?;
  let rows = statement.query_map([card_name], |row| {
    Ok((row.get::<usize, String>(0)?, row.get::<usize, String>(1)?))
  })?;

  let mut rulings = Vec::new();
  for row in rows {
    let (date, text) = row?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
      Error::DataIntegrity(format!("ruling for {} has malformed date {}", card_name, date))
    })?;
    rulings.push(Ruling { date, text });
  }
  Ok(rulings)
}

fn load_printings(store: &Store, card_name: &str) -> Result<Vec<Printing>> {
  let mut statement = store.conn().prepare(
    "SELECT p.id, p.set_code, s.name, p.collector_number, p.artist, p.rarity,
            p.flavor, p.image_url, p.original_text, p.original_type
     FROM printings p
     LEFT JOIN sets s ON s.code = p.set_code
     WHERE p.card_name = ?1
     ORDER BY p.id",
  )?;
  let rows = statement.query_map([card_name], |row| {
    Ok((
      row.get::<usize, i64>(0)?,
      row.get::<usize, String>(1)?,
      row.get::<usize, Option<String>>(2)?,
      row.get::<usize, Option<i64>>(3)?,
      row.get::<usize, Option<String>>(4)?,
      row.get::<usize, Option<String>>(5)?,
      row.get::<usize, Option<String>>(6)?,
      row.get::<usize, Option<String>>(7)?,
      row.get::<usize, Option<String>>(8)?,
      row.get::<usize, Option<String>>(9)?,
    ))
  })?;

  let mut printings = Vec::new();
  for row in rows {
    let (id, set_code, set_name, collector_number, artist, rarity, flavor, image_url, original_text, original_type) =
      row?;
    let set_name = set_name.ok_or_else(|| {
      Error::DataIntegrity(format!("printing {} references missing set {}", id, set_code))
    })?;
    printings.push(Printing {
      id,
      set_code,
      set_name,
      collector_number,
      artist,
      rarity,
      flavor,
      image_url,
      original_text,
      original_type,
    });
  }
  Ok(printings)
}

/// Builds the full entity for one scalar row: association sets, rulings and
/// printings keyed by card name, representative rarity from the lowest-id
/// printing.
pub(crate) fn materialize(store: &Store, row: ScalarRow) -> Result<Card> {
  let printings = load_printings(store, &row.name)?;
  let rarity = printings.first().and_then(|printing| printing.rarity.clone());

  Ok(Card {
    supertypes: association_values(store, "supertypes", &row.name)?,
    types: association_values(store, "types", &row.name)?,
    subtypes: association_values(store, "subtypes", &row.name)?,
    colors: association_values(store, "colors", &row.name)?,
    color_identity: association_values(store, "color_identity", &row.name)?,
    rulings: load_rulings(store, &row.name)?,
    printings,
    rarity,
    name: row.name,
    mana_cost: row.mana_cost,
    cmc: row.cmc,
    type_line: row.type_line,
    text: row.text,
    flavor: row.flavor,
    power: row.power,
    toughness: row.toughness,
    loyalty: row.loyalty,
  })
}

pub(crate) type PostFilter = Box<dyn Fn(&Card) -> bool>;

/// Lazy, single-pass result sequence. Materialization and post-fetch
/// filtering happen per `next()`; once exhausted it stays empty.
pub struct Cards<'a> {
  store: &'a Store,
  rows: std::vec::IntoIter<ScalarRow>,
  seen: HashSet<String>,
  filters: Vec<PostFilter>,
}

impl<'a> Cards<'a> {
  pub(crate) fn new(store: &'a Store, rows: Vec<ScalarRow>, filters: Vec<PostFilter>) -> Self {
    Cards {
      store,
      rows: rows.into_iter(),
      seen: HashSet::new(),
      filters,
    }
  }
}

impl Iterator for Cards<'_> {
  type Item = Result<Card>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let row = self.rows.next()?;
      if !self.seen.insert(row.name.clone()) {
        continue;
      }
      let card = match materialize(self.store, row) {
        Ok(card) => card,
        Err(e) => return Some(Err(e)),
      };
      if self.filters.iter().all(|filter| filter(&card)) {
        return Some(Ok(card));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures;

  fn names(cards: Cards<'_>) -> Vec<String> {
    cards.map(|card| card.unwrap().name).collect()
  }

  #[test]
  fn multiple_printings_collapse_to_one_card() {
    let store = fixtures::seeded_store();
    let found = names(
      store
        .cards()
        .where_contains("type_line", "Land")
        .unwrap()
        .find_all()
        .unwrap(),
    );
    assert_eq!(found, vec!["Forest"]);
  }

  #[test]
  fn returned_cards_are_fully_populated() {
    let store = fixtures::seeded_store();
    let forest = store
      .cards()
      .where_eq("name", "Forest")
      .unwrap()
      .find_one()
      .unwrap()
      .unwrap();
    assert!(forest.supertypes.contains("Basic"));
    assert!(forest.types.contains("Land"));
    assert!(forest.subtypes.contains("Forest"));
    assert!(forest.colors.is_empty());
    assert!(forest.color_identity.is_empty());
    assert_eq!(forest.printings.len(), 3);
    assert_eq!(forest.printings[0].id, 100);
    assert_eq!(forest.printings[0].set_name, "Magic Origins");
    assert_eq!(forest.rarity.as_deref(), Some("common"));
  }

  #[test]
  fn at_least_one_color_excludes_colorless() {
    let store = fixtures::seeded_store();
    let found = names(store.cards().where_at_least("colors", 1).unwrap().find_all().unwrap());
    assert!(!found.contains(&"Forest".to_string()));
    assert!(found.contains(&"Lightning Bolt".to_string()));
    assert!(found.contains(&"Fire // Ice".to_string()));
  }

  #[test]
  fn at_most_zero_colors_matches_colorless() {
    let store = fixtures::seeded_store();
    let found = names(store.cards().where_at_most("colors", 0).unwrap().find_all().unwrap());
    assert_eq!(found, vec!["Forest"]);
  }

  #[test]
  fn at_least_two_colors_matches_the_split_card_only() {
    let store = fixtures::seeded_store();
    let found = names(store.cards().where_at_least("colors", 2).unwrap().find_all().unwrap());
    assert_eq!(found, vec!["Fire // Ice"]);
  }

  #[test]
  fn color_identity_contains_and_its_negation() {
    let store = fixtures::seeded_store();
    let found = names(
      store
        .cards()
        .where_contains("color_identity", "U")
        .unwrap()
        .find_all()
        .unwrap(),
    );
    assert!(found.contains(&"Fire // Ice".to_string()));
    assert!(found.contains(&"Jace Beleren".to_string()));
    assert!(!found.contains(&"Lightning Bolt".to_string()));

    let excluded = names(
      store
        .cards()
        .negated()
        .where_contains("color_identity", "U")
        .unwrap()
        .find_all()
        .unwrap(),
    );
    assert!(!excluded.contains(&"Fire // Ice".to_string()));
    assert!(excluded.contains(&"Forest".to_string()));
    assert!(excluded.contains(&"Lightning Bolt".to_string()));
  }

  #[test]
  fn find_one_on_no_match_is_none() {
    let store = fixtures::seeded_store();
    let found = store
      .cards()
      .where_eq("name", "Black Lotus")
      .unwrap()
      .find_one()
      .unwrap();
    assert!(found.is_none());
  }

  #[test]
  fn printing_field_filter_dedups_across_the_join() {
    let store = fixtures::seeded_store();
    let found = names(store.cards().where_eq("rarity", "common").unwrap().find_all().unwrap());
    // Forest matches through three common printings but appears once.
    assert_eq!(found.len(), 2);
    assert!(found.contains(&"Forest".to_string()));
    assert!(found.contains(&"Lightning Bolt".to_string()));
  }

  #[test]
  fn set_name_filter_joins_through_sets() {
    let store = fixtures::seeded_store();
    let found = names(
      store
        .cards()
        .where_eq("set_name", "Magic 2010")
        .unwrap()
        .find_all()
        .unwrap(),
    );
    assert_eq!(found.len(), 2);
    assert!(found.contains(&"Lightning Bolt".to_string()));
    assert!(found.contains(&"Jace Beleren".to_string()));
  }

  #[test]
  fn regex_match_is_case_insensitive_substring() {
    let store = fixtures::seeded_store();
    let found = names(
      store
        .cards()
        .where_matches("text", "DEALS .* damage")
        .unwrap()
        .find_all()
        .unwrap(),
    );
    assert_eq!(found, vec!["Fire // Ice", "Lightning Bolt"]);
  }

  #[test]
  fn rulings_come_back_with_parsed_dates() {
    let store = fixtures::seeded_store();
    let card = store
      .cards()
      .where_eq("name", "Fire // Ice")
      .unwrap()
      .find_one()
      .unwrap()
      .unwrap();
    assert_eq!(card.rulings.len(), 1);
    assert_eq!(card.rulings[0].date, NaiveDate::from_ymd_opt(2013, 4, 15).unwrap());
  }

  #[test]
  fn malformed_ruling_date_is_a_data_integrity_error() {
    let store = fixtures::seeded_store();
    fixtures::insert_ruling(&store, "Forest", "sometime in 2013", "Forests are green.");
    let err = store
      .cards()
      .where_eq("name", "Forest")
      .unwrap()
      .find_one()
      .unwrap_err();
    assert!(matches!(err, Error::DataIntegrity(_)));
  }

  #[test]
  fn printing_with_missing_set_is_a_data_integrity_error() {
    let store = fixtures::seeded_store();
    store.conn().execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    store
      .conn()
      .execute(
        "INSERT INTO printings (id, card_name, set_code) VALUES (999, 'Forest', 'XXX')",
        [],
      )
      .unwrap();
    let err = store
      .cards()
      .where_eq("name", "Forest")
      .unwrap()
      .find_one()
      .unwrap_err();
    assert!(matches!(err, Error::DataIntegrity(_)));
  }

  #[test]
  fn computed_field_filters_after_materialization() {
    let mut store = fixtures::seeded_store();
    store
      .catalog_mut()
      .register_computed("price", |card| card.cmc.map(|cmc| cmc as f64));
    let found = names(store.cards().where_at_least("price", 3.0).unwrap().find_all().unwrap());
    assert_eq!(found.len(), 2);
    assert!(found.contains(&"Fire // Ice".to_string()));
    assert!(found.contains(&"Jace Beleren".to_string()));
  }

  #[test]
  fn unresolved_computed_field_never_matches() {
    let store = fixtures::seeded_store();
    // Default price resolver yields None for every card.
    let found = names(store.cards().where_at_least("price", 0.0).unwrap().find_all().unwrap());
    assert!(found.is_empty());
  }

  #[test]
  fn escape_hatch_predicate_honors_negation() {
    let store = fixtures::seeded_store();
    let found = names(
      store
        .cards()
        .negated()
        .with_predicate(|card| card.colors.is_empty())
        .find_all()
        .unwrap(),
    );
    assert!(!found.contains(&"Forest".to_string()));
    assert!(found.contains(&"Lightning Bolt".to_string()));
  }

  #[test]
  fn result_sequence_is_single_pass() {
    let store = fixtures::seeded_store();
    let mut cards = store
      .cards()
      .where_eq("name", "Forest")
      .unwrap()
      .find_all()
      .unwrap();
    assert!(cards.next().is_some());
    assert!(cards.next().is_none());
    assert!(cards.next().is_none());
  }
}
