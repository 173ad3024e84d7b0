//! Catch records
//!
//! Every recognized catch becomes one immutable [`FishRecord`]. Records are
//! appended to a line-oriented file as soon as they are created and kept in
//! two in-memory views: the current session and the full history.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Timestamp format used in the record file
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Session id format
pub const SESSION_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name stored when OCR could not read one
pub const UNKNOWN_NAME: &str = "未知";

/// Weight stored when OCR could not read one
pub const UNKNOWN_WEIGHT: &str = "0";

/// Ordinal rarity of a catch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Quality {
    pub const ALL: [Quality; 5] = [
        Quality::Standard,
        Quality::Uncommon,
        Quality::Rare,
        Quality::Epic,
        Quality::Legendary,
    ];

    /// In-game quality words, searched in this order. `传奇` is an older
    /// spelling of legendary.
    pub const WORDS: [&'static str; 6] = ["标准", "非凡", "稀有", "史诗", "传说", "传奇"];

    /// In-game label, also the on-disk form
    pub fn label(&self) -> &'static str {
        match self {
            Quality::Standard => "标准",
            Quality::Uncommon => "非凡",
            Quality::Rare => "稀有",
            Quality::Epic => "史诗",
            Quality::Legendary => "传说",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::Uncommon => "uncommon",
            Quality::Rare => "rare",
            Quality::Epic => "epic",
            Quality::Legendary => "legendary",
        }
    }

    /// Parse an in-game label or an English name
    pub fn from_label(label: &str) -> Option<Quality> {
        let label = label.trim();
        match label {
            "标准" => Some(Quality::Standard),
            "非凡" => Some(Quality::Uncommon),
            "稀有" => Some(Quality::Rare),
            "史诗" => Some(Quality::Epic),
            "传说" | "传奇" => Some(Quality::Legendary),
            _ => Quality::ALL
                .into_iter()
                .find(|q| q.name().eq_ignore_ascii_case(label)),
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One catch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FishRecord {
    pub session_id: String,
    pub timestamp: NaiveDateTime,
    pub name: String,
    pub quality: Quality,
    pub weight: String,
}

impl FishRecord {
    /// New record stamped with the current local time
    ///
    /// Missing fields fall back to an unknown name, standard quality and a
    /// zero weight.
    pub fn new(
        session_id: impl Into<String>,
        name: Option<String>,
        quality: Option<Quality>,
        weight: Option<String>,
    ) -> Self {
        let now = Local::now().naive_local();
        Self {
            session_id: session_id.into(),
            timestamp: now.with_nanosecond(0).unwrap_or(now),
            name: sanitize(name.as_deref().unwrap_or(UNKNOWN_NAME)),
            quality: quality.unwrap_or(Quality::Standard),
            weight: sanitize(weight.as_deref().unwrap_or(UNKNOWN_WEIGHT)),
        }
    }

    /// `session|timestamp|name|quality|weight`
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.session_id,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.name,
            self.quality.label(),
            self.weight
        )
    }

    /// Parse one record line; unknown qualities read as standard
    pub fn from_line(line: &str) -> Result<Self, RecordError> {
        if line.contains(char::REPLACEMENT_CHARACTER) {
            return Err(RecordError::Malformed(format!("{line}: not valid UTF-8")));
        }
        let parts: Vec<&str> = line.trim().split('|').collect();
        if parts.len() < 5 {
            return Err(RecordError::Malformed(line.to_string()));
        }

        let timestamp = NaiveDateTime::parse_from_str(parts[1].trim(), TIMESTAMP_FORMAT)
            .map_err(|e| RecordError::Malformed(format!("{line}: {e}")))?;

        Ok(Self {
            session_id: parts[0].to_string(),
            timestamp,
            name: parts[2].to_string(),
            quality: Quality::from_label(parts[3]).unwrap_or(Quality::Standard),
            weight: parts[4].to_string(),
        })
    }
}

fn sanitize(field: &str) -> String {
    field.replace(['|', '\n', '\r'], " ").trim().to_string()
}

/// Append-only line persistence
pub trait RecordSink: Send + Sync {
    /// Durably append one line
    fn append(&self, line: &str) -> Result<(), RecordError>;

    /// Every stored line, oldest first
    fn read_all(&self) -> Result<Vec<String>, RecordError>;
}

/// Records in a UTF-8 text file, opened and closed per append
pub struct FileRecordSink {
    path: PathBuf,
}

impl FileRecordSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for FileRecordSink {
    fn append(&self, line: &str) -> Result<(), RecordError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, RecordError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        // Decoded per line so one corrupt line does not hide the rest
        let content = fs::read(&self.path)?;
        Ok(content
            .split(|b| *b == b'\n')
            .map(|line| {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8_lossy(line).into_owned()
            })
            .collect())
    }
}

impl RecordSink for Mutex<Vec<String>> {
    fn append(&self, line: &str) -> Result<(), RecordError> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, RecordError> {
        Ok(self.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Which view of the records to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Records of the running session
    Session,
    /// Full history, including reloaded records
    All,
}

/// Per-quality catch counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityCounts {
    counts: [usize; 5],
}

impl QualityCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a FishRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            counts.counts[record.quality.index()] += 1;
        }
        counts
    }

    pub fn get(&self, quality: Quality) -> usize {
        self.counts[quality.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// (quality, count) for every tier, lowest first
    pub fn iter(&self) -> impl Iterator<Item = (Quality, usize)> + '_ {
        Quality::ALL.into_iter().map(|q| (q, self.get(q)))
    }

    /// Share of each tier in percent; all zero when empty
    pub fn percentages(&self) -> [(Quality, f64); 5] {
        let total = self.total();
        Quality::ALL.map(|q| {
            let share = if total == 0 {
                0.0
            } else {
                self.get(q) as f64 * 100.0 / total as f64
            };
            (q, share)
        })
    }
}

impl fmt::Display for QualityCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(q, n)| format!("{q}: {n}"))
            .collect();
        if parts.is_empty() {
            f.write_str("no catches")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// A fishing session from start to stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub started_at: NaiveDateTime,
}

/// Summary produced when a session ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub total: usize,
    pub counts: QualityCounts,
}

type CatchListener = Arc<dyn Fn(&FishRecord) + Send + Sync>;

#[derive(Default)]
struct Views {
    session: Option<Session>,
    current: Vec<FishRecord>,
    all: Vec<FishRecord>,
}

/// Thread-safe record store
///
/// Reads return copies; nothing outside the store sees a view while it is
/// being mutated.
pub struct RecordStore {
    views: Mutex<Views>,
    sink: Box<dyn RecordSink>,
    listeners: Mutex<Vec<CatchListener>>,
}

impl RecordStore {
    pub fn new(sink: impl RecordSink + 'static) -> Self {
        Self {
            views: Mutex::new(Views::default()),
            sink: Box::new(sink),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Store persisting to `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileRecordSink::new(path))
    }

    /// Store that keeps nothing beyond the process
    pub fn in_memory() -> Self {
        Self::new(Mutex::new(Vec::<String>::new()))
    }

    /// Replace the history with what the sink holds; returns the count
    ///
    /// Malformed lines are skipped.
    pub fn load(&self) -> Result<usize, RecordError> {
        let lines = self.sink.read_all()?;
        let mut skipped = 0;
        let records: Vec<FishRecord> = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match FishRecord::from_line(l) {
                Ok(r) => Some(r),
                Err(e) => {
                    skipped += 1;
                    log::debug!("Skipping record line: {}", e);
                    None
                }
            })
            .collect();

        let count = records.len();
        self.lock().all = records;
        if skipped > 0 {
            log::warn!("Skipped {} malformed record lines", skipped);
        }
        log::info!("Loaded {} catch records", count);
        Ok(count)
    }

    /// Begin a new session and clear the current view
    pub fn start_session(&self) -> Session {
        let now = Local::now().naive_local();
        let session = Session {
            id: now.format(SESSION_ID_FORMAT).to_string(),
            started_at: now,
        };

        let mut views = self.lock();
        views.current.clear();
        views.session = Some(session.clone());
        log::info!("Fishing session {} started", session.id);
        session
    }

    /// Close the running session, logging its per-quality summary
    pub fn end_session(&self) -> Option<SessionSummary> {
        let mut views = self.lock();
        let session = views.session.take()?;
        let counts = QualityCounts::from_records(&views.current);
        drop(views);

        let summary = SessionSummary {
            id: session.id,
            total: counts.total(),
            counts,
        };
        log::info!(
            "Session {} ended with {} catches ({})",
            summary.id,
            summary.total,
            summary.counts
        );
        Some(summary)
    }

    pub fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Build a record for the running session; `None` outside a session
    pub fn new_record(
        &self,
        name: Option<String>,
        quality: Option<Quality>,
        weight: Option<String>,
    ) -> Option<FishRecord> {
        let session_id = self.lock().session.as_ref()?.id.clone();
        Some(FishRecord::new(session_id, name, quality, weight))
    }

    /// Persist `record`, then add it to the views and notify listeners
    ///
    /// When persistence fails nothing is added. Only records of the running
    /// session join the current view.
    pub fn add_record(&self, record: FishRecord) -> Result<(), RecordError> {
        self.sink.append(&record.to_line())?;

        {
            let mut views = self.lock();
            let in_session = views
                .session
                .as_ref()
                .is_some_and(|s| s.id == record.session_id);
            if in_session {
                views.current.push(record.clone());
            }
            views.all.push(record.clone());
        }

        log::info!(
            "Caught {} | quality: {} | weight: {}",
            record.name,
            record.quality,
            record.weight
        );

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(&record);
        }
        Ok(())
    }

    pub fn get_current_session(&self) -> Vec<FishRecord> {
        self.lock().current.clone()
    }

    pub fn get_all_records(&self) -> Vec<FishRecord> {
        self.lock().all.clone()
    }

    pub fn records(&self, scope: Scope) -> Vec<FishRecord> {
        match scope {
            Scope::Session => self.get_current_session(),
            Scope::All => self.get_all_records(),
        }
    }

    pub fn clear_current(&self) {
        self.lock().current.clear();
    }

    /// Clear both in-memory views; the record file is left untouched
    pub fn clear_all(&self) {
        let mut views = self.lock();
        views.current.clear();
        views.all.clear();
    }

    pub fn count_by_quality(&self, scope: Scope) -> QualityCounts {
        let views = self.lock();
        match scope {
            Scope::Session => QualityCounts::from_records(&views.current),
            Scope::All => QualityCounts::from_records(&views.all),
        }
    }

    /// Call `listener` after every successfully added record
    pub fn on_catch_recorded(&self, listener: impl Fn(&FishRecord) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    fn lock(&self) -> MutexGuard<'_, Views> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Record errors
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed record line: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_quality_labels() {
        assert_eq!(Quality::from_label("稀有"), Some(Quality::Rare));
        assert_eq!(Quality::from_label("传奇"), Some(Quality::Legendary));
        assert_eq!(Quality::from_label("Epic"), Some(Quality::Epic));
        assert_eq!(Quality::from_label("mythic"), None);
        assert_eq!(Quality::Uncommon.label(), "非凡");
    }

    #[test]
    fn test_line_format() {
        let record = FishRecord {
            session_id: "20260103_101500".into(),
            timestamp: NaiveDateTime::parse_from_str("2026-01-03 10:20:30", TIMESTAMP_FORMAT).unwrap(),
            name: "金鱼".into(),
            quality: Quality::Rare,
            weight: "1.23kg".into(),
        };
        let line = record.to_line();
        assert_eq!(line, "20260103_101500|2026-01-03 10:20:30|金鱼|稀有|1.23kg");
        assert_eq!(FishRecord::from_line(&line).unwrap(), record);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(FishRecord::from_line("a|b|c|d").is_err());
        assert!(FishRecord::from_line("s|not a time|n|标准|1kg").is_err());

        let odd = FishRecord::from_line("s|2026-01-03 10:20:30|鲤鱼|???|2kg").unwrap();
        assert_eq!(odd.quality, Quality::Standard);
    }

    #[test]
    fn test_defaults_and_sanitizing() {
        let record = FishRecord::new("s1", None, None, None);
        assert_eq!(record.name, UNKNOWN_NAME);
        assert_eq!(record.quality, Quality::Standard);
        assert_eq!(record.weight, UNKNOWN_WEIGHT);

        let piped = FishRecord::new("s1", Some("a|b".into()), None, None);
        assert_eq!(piped.to_line().split('|').count(), 5);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fish_records.txt");

        let store = RecordStore::open(&path);
        store.start_session();
        let record = store
            .new_record(Some("金鱼".into()), Some(Quality::Rare), Some("1.23kg".into()))
            .unwrap();
        store.add_record(record.clone()).unwrap();
        assert_eq!(store.get_current_session(), vec![record.clone()]);

        let reloaded = RecordStore::open(&path);
        assert_eq!(reloaded.load().unwrap(), 1);
        reloaded.start_session();

        let all = reloaded.get_all_records();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "金鱼");
        assert_eq!(all[0].quality, Quality::Rare);
        assert_eq!(all[0].weight, "1.23kg");
        assert_eq!(all[0], record);
        assert!(reloaded.get_current_session().is_empty());
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fish_records.txt");
        fs::write(
            &path,
            "s|2026-01-03 10:20:30|鲤鱼|标准|2kg\ngarbage\n\ns|2026-01-03 10:21:00|龙鱼|传说|9kg\n",
        )
        .unwrap();

        let store = RecordStore::open(&path);
        assert_eq!(store.load().unwrap(), 2);
        assert_eq!(store.count_by_quality(Scope::All).get(Quality::Legendary), 1);
    }

    #[test]
    fn test_load_skips_undecodable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fish_records.txt");
        let good = FishRecord::new("s1", Some("鲤鱼".into()), Some(Quality::Epic), Some("3kg".into()));
        let mut bytes = format!("{}\n", good.to_line()).into_bytes();
        bytes.extend_from_slice(b"\xff\xfe garbage\n");
        bytes.extend_from_slice("s1|2026-01-03 10:21:00|龙鱼|传说|9kg\r\n".as_bytes());
        bytes.extend_from_slice(b"s1|2026-01-03 10:22:00|\xff|\xe4\xbc\xa0\xe8\xaf\xb4|1kg\n");
        fs::write(&path, bytes).unwrap();

        let store = RecordStore::open(&path);
        assert_eq!(store.load().unwrap(), 2);
        let all = store.get_all_records();
        assert_eq!(all[0], good);
        assert_eq!(all[1].weight, "9kg");
    }

    #[test]
    fn test_records_outside_a_session() {
        let store = RecordStore::in_memory();
        assert!(store.new_record(Some("鲫鱼".into()), None, None).is_none());

        store.start_session();
        let record = store.new_record(Some("鲫鱼".into()), None, None).unwrap();
        store.end_session();
        assert!(store.new_record(None, None, None).is_none());

        // Late write after stop lands in history only
        store.add_record(record).unwrap();
        assert!(store.get_current_session().is_empty());
        assert_eq!(store.get_all_records().len(), 1);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("none.txt"));
        assert_eq!(store.load().unwrap(), 0);
    }

    #[test]
    fn test_quality_histogram() {
        let store = RecordStore::in_memory();
        store.start_session();
        for q in [
            Quality::Standard,
            Quality::Standard,
            Quality::Rare,
            Quality::Legendary,
            Quality::Legendary,
        ] {
            store.add_record(store.new_record(Some("鱼类".into()), Some(q), None).unwrap()).unwrap();
        }

        let counts = store.count_by_quality(Scope::Session);
        assert_eq!(counts.get(Quality::Standard), 2);
        assert_eq!(counts.get(Quality::Uncommon), 0);
        assert_eq!(counts.get(Quality::Rare), 1);
        assert_eq!(counts.get(Quality::Epic), 0);
        assert_eq!(counts.get(Quality::Legendary), 2);
        assert_eq!(counts.total(), 5);

        let sum: f64 = counts.percentages().iter().map(|(_, p)| p).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(counts.percentages()[0], (Quality::Standard, 40.0));
    }

    #[test]
    fn test_session_views_and_clearing() {
        let store = RecordStore::in_memory();
        store.start_session();
        store.add_record(store.new_record(Some("鲈鱼".into()), None, None).unwrap()).unwrap();

        let summary = store.end_session().unwrap();
        assert_eq!(summary.total, 1);
        assert!(store.end_session().is_none());

        store.start_session();
        assert!(store.get_current_session().is_empty());
        assert_eq!(store.get_all_records().len(), 1);

        store.add_record(store.new_record(Some("鲤鱼".into()), None, None).unwrap()).unwrap();
        store.clear_current();
        assert!(store.records(Scope::Session).is_empty());
        assert_eq!(store.records(Scope::All).len(), 2);

        store.clear_all();
        assert!(store.records(Scope::All).is_empty());
    }

    #[test]
    fn test_listeners_fire_after_add() {
        let store = RecordStore::in_memory();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        store.on_catch_recorded(move |record| {
            assert_eq!(record.name, "鲫鱼");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.start_session();
        store.add_record(store.new_record(Some("鲫鱼".into()), None, None).unwrap()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn append(&self, _line: &str) -> Result<(), RecordError> {
            Err(RecordError::Io(std::io::Error::other("disk full")))
        }

        fn read_all(&self) -> Result<Vec<String>, RecordError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_failed_persistence_adds_nothing() {
        let store = RecordStore::new(FailingSink);
        store.start_session();
        let record = store.new_record(Some("鲫鱼".into()), None, None).unwrap();
        assert!(store.add_record(record).is_err());
        assert!(store.get_all_records().is_empty());
    }
}
