//! Shared test data: a small dataset exercising multi-printing dedup,
//! colorless cards, split cards and planeswalkers.

use rusqlite::params;

use crate::store::Store;

pub(crate) fn insert_set(store: &Store, code: &str, name: &str) {
  store
    .conn()
    .execute("INSERT INTO sets (code, name) VALUES (?1, ?2)", params![code, name])
    .unwrap();
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_card(
  store: &Store,
  name: &str,
  mana_cost: Option<&str>,
  cmc: Option<i64>,
  type_line: &str,
  text: Option<&str>,
  loyalty: Option<i64>,
) {
  store
    .conn()
    .execute(
      "INSERT INTO cards (name, mana_cost, cmc, type_line, text, loyalty)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![name, mana_cost, cmc, type_line, text, loyalty],
    )
    .unwrap();
}

pub(crate) fn insert_printing(store: &Store, id: i64, card: &str, set: &str, rarity: &str) {
  store
    .conn()
    .execute(
      "INSERT INTO printings (id, card_name, set_code, rarity) VALUES (?1, ?2, ?3, ?4)",
      params![id, card, set, rarity],
    )
    .unwrap();
}

pub(crate) fn insert_values(store: &Store, table: &str, card: &str, values: &[&str]) {
  for value in values {
    store
      .conn()
      .execute(
        &format!("INSERT INTO {} (card_name, value) VALUES (?1, ?2)", table),
        params![card, value],
      )
      .unwrap();
  }
}

pub(crate) fn insert_ruling(store: &Store, card: &str, date: &str, text: &str) {
  store
    .conn()
    .execute(
      "INSERT INTO rulings (card_name, ruling_date, ruling_text) VALUES (?1, ?2, ?3)",
      params![card, date, text],
    )
    .unwrap();
}

/// Forest with three printings and no colors; Fire // Ice as one combined
/// card with colors {R, U}; Lightning Bolt; Jace Beleren for loyalty.
pub(crate) fn seed(store: &Store) {
  insert_set(store, "ORI", "Magic Origins");
  insert_set(store, "BFZ", "Battle for Zendikar");
  insert_set(store, "OGW", "Oath of the Gatewatch");
  insert_set(store, "APC", "Apocalypse");
  insert_set(store, "M10", "Magic 2010");

  insert_card(store, "Forest", None, Some(0), "Basic Land — Forest", Some("({T}: Add {G}.)"), None);
  insert_printing(store, 100, "Forest", "ORI", "common");
  insert_printing(store, 101, "Forest", "BFZ", "common");
  insert_printing(store, 102, "Forest", "OGW", "common");
  insert_values(store, "supertypes", "Forest", &["Basic"]);
  insert_values(store, "types", "Forest", &["Land"]);
  insert_values(store, "subtypes", "Forest", &["Forest"]);

  insert_card(
    store,
    "Fire // Ice",
    Some("{1}{R} // {1}{U}"),
    Some(4),
    "Instant // Instant",
    Some("Fire deals 2 damage divided as you choose. // Tap target permanent. Draw a card."),
    None,
  );
  insert_printing(store, 200, "Fire // Ice", "APC", "uncommon");
  insert_values(store, "types", "Fire // Ice", &["Instant"]);
  insert_values(store, "colors", "Fire // Ice", &["R", "U"]);
  insert_values(store, "color_identity", "Fire // Ice", &["R", "U"]);
  insert_ruling(store, "Fire // Ice", "2013-04-15", "You choose which half to cast.");

  insert_card(
    store,
    "Lightning Bolt",
    Some("{R}"),
    Some(1),
    "Instant",
    Some("Lightning Bolt deals 3 damage to any target."),
    None,
  );
  insert_printing(store, 300, "Lightning Bolt", "M10", "common");
  insert_values(store, "types", "Lightning Bolt", &["Instant"]);
  insert_values(store, "colors", "Lightning Bolt", &["R"]);
  insert_values(store, "color_identity", "Lightning Bolt", &["R"]);

  insert_card(
    store,
    "Jace Beleren",
    Some("{1}{U}{U}"),
    Some(3),
    "Legendary Planeswalker — Jace",
    Some("Each player draws a card."),
    Some(3),
  );
  insert_printing(store, 400, "Jace Beleren", "M10", "mythic");
  insert_values(store, "supertypes", "Jace Beleren", &["Legendary"]);
  insert_values(store, "types", "Jace Beleren", &["Planeswalker"]);
  insert_values(store, "subtypes", "Jace Beleren", &["Jace"]);
  insert_values(store, "colors", "Jace Beleren", &["U"]);
  insert_values(store, "color_identity", "Jace Beleren", &["U"]);
}

pub(crate) fn seeded_store() -> Store {
  let store = Store::open_in_memory().unwrap();
  seed(&store);
  store
}
