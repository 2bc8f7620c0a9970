//! Persistence for isotope ledgers and the waste/dose history.
//!
//! [`JsonStore`] keeps one JSON document per isotope under `ledgers/`,
//! replaced atomically through a temp file and rename, plus append-only
//! JSON Lines files for waste (`waste.jsonl`) and doses (`doses.jsonl`).
//! [`MemoryStore`] holds the same data in memory for tests and dry runs.
//!
//! A commit appends the log records before replacing the ledger. A crash in
//! between leaves a waste record for a vial that is still on the ledger,
//! never a vial that vanished without one.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use nuclide_core::error::StoreError;
use nuclide_core::traits::InventoryStore;
use nuclide_core::types::{DoseRecord, IsotopeLedger, WasteItem};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const LEDGER_DIR: &str = "ledgers";
const WASTE_FILE: &str = "waste.jsonl";
const DOSES_FILE: &str = "doses.jsonl";

/// File-backed store rooted at a directory.
pub struct JsonStore {
    root: PathBuf,
    /// Serializes commits so log appends and ledger renames never interleave.
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Open or create a store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(LEDGER_DIR))?;
        debug!(root = %root.display(), "opened json store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ledger_path(&self, isotope: &str) -> PathBuf {
        self.root
            .join(LEDGER_DIR)
            .join(format!("{}.json", file_stem(isotope)))
    }

    fn waste_path(&self) -> PathBuf {
        self.root.join(WASTE_FILE)
    }

    fn doses_path(&self) -> PathBuf {
        self.root.join(DOSES_FILE)
    }
}

/// File-name-safe form of an isotope name.
fn file_stem(isotope: &str) -> String {
    isotope
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn append_lines<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    if records.is_empty() {
        return Ok(());
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    out.get_ref().sync_data()?;
    Ok(())
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| StoreError::Corrupted {
            path: path.display().to_string(),
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut out, value)?;
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl InventoryStore for JsonStore {
    fn load_ledgers(&self) -> Result<Vec<IsotopeLedger>, StoreError> {
        let mut ledgers = Vec::new();
        for entry in fs::read_dir(self.root.join(LEDGER_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path)?;
            let ledger: IsotopeLedger =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupted {
                    path: path.display().to_string(),
                    line: e.line(),
                    reason: e.to_string(),
                })?;
            ledgers.push(ledger);
        }
        ledgers.sort_by(|a, b| a.isotope.name.cmp(&b.isotope.name));
        Ok(ledgers)
    }

    fn load_waste(&self) -> Result<Vec<WasteItem>, StoreError> {
        read_lines(&self.waste_path())
    }

    fn load_doses(&self) -> Result<Vec<DoseRecord>, StoreError> {
        read_lines(&self.doses_path())
    }

    fn commit(
        &self,
        ledger: &IsotopeLedger,
        waste: &[WasteItem],
        doses: &[DoseRecord],
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        append_lines(&self.waste_path(), waste)?;
        append_lines(&self.doses_path(), doses)?;
        write_atomic(&self.ledger_path(&ledger.isotope.name), ledger)?;
        debug!(
            isotope = %ledger.isotope.name,
            vials = ledger.vials.len(),
            waste = waste.len(),
            doses = doses.len(),
            "committed ledger"
        );
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    ledgers: BTreeMap<String, IsotopeLedger>,
    waste: Vec<WasteItem>,
    doses: Vec<DoseRecord>,
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InventoryStore for MemoryStore {
    fn load_ledgers(&self) -> Result<Vec<IsotopeLedger>, StoreError> {
        Ok(self.state.lock().ledgers.values().cloned().collect())
    }

    fn load_waste(&self) -> Result<Vec<WasteItem>, StoreError> {
        Ok(self.state.lock().waste.clone())
    }

    fn load_doses(&self) -> Result<Vec<DoseRecord>, StoreError> {
        Ok(self.state.lock().doses.clone())
    }

    fn commit(
        &self,
        ledger: &IsotopeLedger,
        waste: &[WasteItem],
        doses: &[DoseRecord],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.waste.extend_from_slice(waste);
        state.doses.extend_from_slice(doses);
        state
            .ledgers
            .insert(ledger.isotope.name.clone(), ledger.clone());
        Ok(())
    }
}
