//! Identity-lookup cache for the hot paths: card by external printing id,
//! card by name, printing ids of a name. Population goes through the query
//! builder; each key is fetched at most once even under concurrent access,
//! and the resolved entries can be persisted through a pluggable backend.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::error::{Error, Result};
use crate::store::Store;

/// Durable form of the resolved entries. Cards are stored once, keyed by
/// name; the id index refers back into that map.
#[derive(Serialize, Deserialize, Default)]
pub struct Snapshot {
  cards: BTreeMap<String, Card>,
  ids: BTreeMap<i64, String>,
  printings: BTreeMap<String, Vec<i64>>,
}

/// Where resolved entries go between process runs.
pub trait CacheBackend: Send + Sync {
  fn load(&self) -> Result<Option<Snapshot>>;
  fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON file in the app data dir, read back on construction.
pub struct JsonFileBackend {
  path: PathBuf,
}

impl JsonFileBackend {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    JsonFileBackend { path: path.into() }
  }
}

impl CacheBackend for JsonFileBackend {
  fn load(&self) -> Result<Option<Snapshot>> {
    if !self.path.exists() {
      return Ok(None);
    }
    let body = fs::read_to_string(&self.path)?;
    Ok(Some(serde_json::from_str(&body)?))
  }

  fn save(&self, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
      }
    }
    fs::write(&self.path, serde_json::to_string(snapshot)?)?;
    Ok(())
  }
}

/// No persistence; entries live for the process only.
pub struct MemoryBackend;

impl CacheBackend for MemoryBackend {
  fn load(&self) -> Result<Option<Snapshot>> {
    Ok(None)
  }

  fn save(&self, _snapshot: &Snapshot) -> Result<()> {
    Ok(())
  }
}

#[derive(Default)]
pub struct CacheStats {
  hits: AtomicU64,
  misses: AtomicU64,
}

impl CacheStats {
  fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub fn hits(&self) -> u64 {
    self.hits.load(Ordering::Relaxed)
  }

  /// Each miss corresponds to one upstream query round.
  pub fn misses(&self) -> u64 {
    self.misses.load(Ordering::Relaxed)
  }
}

#[derive(Default)]
struct ResolvedMaps {
  by_id: HashMap<i64, Arc<Card>>,
  by_name: HashMap<String, Arc<Card>>,
  printings: HashMap<String, Arc<Vec<i64>>>,
}

type Flight = Arc<Mutex<()>>;

pub struct CardCache {
  backend: Box<dyn CacheBackend>,
  persist: AtomicBool,
  resolved: Mutex<ResolvedMaps>,
  id_flights: Mutex<HashMap<i64, Flight>>,
  name_flights: Mutex<HashMap<String, Flight>>,
  printings_flights: Mutex<HashMap<String, Flight>>,
  stats: CacheStats,
}

impl CardCache {
  fn empty(backend: Box<dyn CacheBackend>) -> Self {
    CardCache {
      backend,
      persist: AtomicBool::new(true),
      resolved: Mutex::new(ResolvedMaps::default()),
      id_flights: Mutex::new(HashMap::new()),
      name_flights: Mutex::new(HashMap::new()),
      printings_flights: Mutex::new(HashMap::new()),
      stats: CacheStats::default(),
    }
  }

  pub fn new<B: CacheBackend + 'static>(backend: B) -> Result<Self> {
    let cache = Self::empty(Box::new(backend));
    if let Some(snapshot) = cache.backend.load()? {
      let mut resolved = cache.resolved.lock();
      for (name, card) in snapshot.cards {
        resolved.by_name.insert(name, Arc::new(card));
      }
      for (id, name) in snapshot.ids {
        if let Some(card) = resolved.by_name.get(&name).cloned() {
          resolved.by_id.insert(id, card);
        }
      }
      for (name, ids) in snapshot.printings {
        resolved.printings.insert(name, Arc::new(ids));
      }
    }
    Ok(cache)
  }

  pub fn in_memory() -> Self {
    Self::empty(Box::new(MemoryBackend))
  }

  pub fn stats(&self) -> &CacheStats {
    &self.stats
  }

  pub fn find_by_id(&self, store: &Store, id: i64) -> Result<Option<Arc<Card>>> {
    if let Some(card) = self.resolved.lock().by_id.get(&id).cloned() {
      self.stats.record_hit();
      return Ok(Some(card));
    }

    let flight = self.id_flights.lock().entry(id).or_default().clone();
    let _guard = flight.lock();
    if let Some(card) = self.resolved.lock().by_id.get(&id).cloned() {
      self.stats.record_hit();
      return Ok(Some(card));
    }

    self.stats.record_miss();
    let card = self.fetch_by_id(store, id)?;
    let card = card.map(|card| self.remember(card));
    self.id_flights.lock().remove(&id);
    drop(_guard);

    if card.is_some() {
      self.maybe_persist()?;
    }
    Ok(card)
  }

  pub fn find_by_name(&self, store: &Store, name: &str) -> Result<Option<Arc<Card>>> {
    if let Some(card) = self.resolved.lock().by_name.get(name).cloned() {
      self.stats.record_hit();
      return Ok(Some(card));
    }

    let flight = self.name_flights.lock().entry(name.to_string()).or_default().clone();
    let _guard = flight.lock();
    if let Some(card) = self.resolved.lock().by_name.get(name).cloned() {
      self.stats.record_hit();
      return Ok(Some(card));
    }

    self.stats.record_miss();
    let card = store.cards().where_eq("name", name)?.find_one()?;
    let card = card.map(|card| self.remember(card));
    self.name_flights.lock().remove(name);
    drop(_guard);

    if card.is_some() {
      self.maybe_persist()?;
    }
    Ok(card)
  }

  /// External ids of every printing of the named card, lowest first.
  pub fn printings_of(&self, store: &Store, name: &str) -> Result<Vec<i64>> {
    if let Some(ids) = self.resolved.lock().printings.get(name).cloned() {
      self.stats.record_hit();
      return Ok(ids.as_ref().clone());
    }

    let flight = self.printings_flights.lock().entry(name.to_string()).or_default().clone();
    let _guard = flight.lock();
    if let Some(ids) = self.resolved.lock().printings.get(name).cloned() {
      self.stats.record_hit();
      return Ok(ids.as_ref().clone());
    }

    self.stats.record_miss();
    let mut statement = store
      .conn()
      .prepare("SELECT id FROM printings WHERE card_name = ?1 ORDER BY id")?;
    let rows = statement.query_map(params![name], |row| row.get::<usize, i64>(0))?;
    let mut ids = Vec::new();
    for row in rows {
      ids.push(row?);
    }

    if !ids.is_empty() {
      self.resolved.lock().printings.insert(name.to_string(), Arc::new(ids.clone()));
    }
    self.printings_flights.lock().remove(name);
    drop(_guard);

    if !ids.is_empty() {
      self.maybe_persist()?;
    }
    Ok(ids)
  }

  /// Warms the cache for every printing id in the dataset with per-lookup
  /// persistence off, then writes one snapshot. Returns the number of ids
  /// visited; the snapshot is written even if a lookup fails partway.
  pub fn prime(&self, store: &Store) -> Result<usize> {
    let ids: Vec<i64> = {
      let mut statement = store.conn().prepare("SELECT id FROM printings ORDER BY id")?;
      let rows = statement.query_map([], |row| row.get::<usize, i64>(0))?;
      let mut ids = Vec::new();
      for row in rows {
        ids.push(row?);
      }
      ids
    };

    log::info!("priming lookup cache for {} printings", ids.len());
    self.persist.store(false, Ordering::SeqCst);
    let result = (|| {
      for id in &ids {
        self.find_by_id(store, *id)?;
      }
      Ok(ids.len())
    })();
    self.persist.store(true, Ordering::SeqCst);
    self.flush()?;
    result
  }

  /// Writes the resolved entries through the backend.
  pub fn flush(&self) -> Result<()> {
    let snapshot = self.snapshot();
    self.backend.save(&snapshot)
  }

  fn snapshot(&self) -> Snapshot {
    let resolved = self.resolved.lock();
    let mut snapshot = Snapshot::default();
    for (name, card) in &resolved.by_name {
      snapshot.cards.insert(name.clone(), card.as_ref().clone());
    }
    for (id, card) in &resolved.by_id {
      snapshot.ids.insert(*id, card.name.clone());
      if !snapshot.cards.contains_key(&card.name) {
        snapshot.cards.insert(card.name.clone(), card.as_ref().clone());
      }
    }
    for (name, ids) in &resolved.printings {
      snapshot.printings.insert(name.clone(), ids.as_ref().clone());
    }
    snapshot
  }

  /// Indexes a fetched card under its name and every printing id.
  fn remember(&self, card: Card) -> Arc<Card> {
    let card = Arc::new(card);
    let mut resolved = self.resolved.lock();
    resolved.by_name.insert(card.name.clone(), card.clone());
    for printing in &card.printings {
      resolved.by_id.insert(printing.id, card.clone());
    }
    card
  }

  fn maybe_persist(&self) -> Result<()> {
    if self.persist.load(Ordering::SeqCst) {
      self.flush()?;
    }
    Ok(())
  }

  fn fetch_by_id(&self, store: &Store, id: i64) -> Result<Option<Card>> {
    let card_name: Option<String> = store
      .conn()
      .query_row("SELECT card_name FROM printings WHERE id = ?1", params![id], |row| row.get(0))
      .optional()?;
    let Some(card_name) = card_name else {
      return Ok(None);
    };
    match store.cards().where_eq("name", card_name.as_str())?.find_one()? {
      Some(card) => Ok(Some(card)),
      None => Err(Error::DataIntegrity(format!(
        "printing {} references missing card {}",
        id, card_name
      ))),
    }
  }
}
