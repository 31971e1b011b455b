use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One appearance of a card in a set. `id` is the external multiverse id
/// used for cross-references (deck contents, image lookups).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Printing {
  pub id: i64,
  pub set_code: String,
  pub set_name: String,
  pub collector_number: Option<i64>,
  pub artist: Option<String>,
  pub rarity: Option<String>,
  pub flavor: Option<String>,
  pub image_url: Option<String>,
  pub original_text: Option<String>,
  pub original_type: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Ruling {
  pub date: NaiveDate,
  pub text: String,
}

/// A logical card, aggregated across its printings. Set-valued attributes
/// are always fully populated from the association tables; `rarity` is the
/// rarity of the representative (lowest-id) printing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Card {
  pub name: String,
  pub mana_cost: Option<String>,
  pub cmc: Option<i64>,
  pub type_line: Option<String>,
  pub text: Option<String>,
  pub flavor: Option<String>,
  pub power: Option<String>,
  pub toughness: Option<String>,
  pub loyalty: Option<i64>,
  pub rarity: Option<String>,
  pub supertypes: BTreeSet<String>,
  pub types: BTreeSet<String>,
  pub subtypes: BTreeSet<String>,
  pub colors: BTreeSet<String>,
  pub color_identity: BTreeSet<String>,
  pub rulings: Vec<Ruling>,
  pub printings: Vec<Printing>,
}

impl Card {
  /// Sort key used by result listings: converted mana cost, then name.
  pub fn default_sort_key(&self) -> (i64, &str) {
    (self.cmc.unwrap_or(0), self.name.as_str())
  }

  /// True if any printing of this card appeared in one of the given sets.
  /// Callers use this for format legality checks against a set-code list.
  pub fn printed_in(&self, codes: &[&str]) -> bool {
    self
      .printings
      .iter()
      .any(|printing| codes.iter().any(|code| *code == printing.set_code))
  }
}
