#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use callsift::enrichment::ProcessedSet;
use callsift::llm::LlmProvider;
use callsift::storage::{CallRecord, CallStore, Database, Enrichment};
use callsift::EnrichError;

pub const VALID_REPLY: &str = r#"{
  "summary": "The customer asked about the premium plan and wants a callback.",
  "entities": {
    "name": "Ravi Kumar",
    "location": "Hyderabad",
    "phone_number": "9876543210",
    "age": null,
    "dob": null,
    "call_reschedule_time": null
  },
  "sentiment": "positive",
  "customer_interest": "Interested"
}"#;

pub fn run_callsift(args: &[&str]) -> Output {
    TestEnv::new().run(args)
}

pub struct TestEnv {
    home: TempDir,
    config: TempDir,
    data: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("create temporary HOME dir"),
            config: tempfile::tempdir().expect("create temporary XDG config dir"),
            data: tempfile::tempdir().expect("create temporary data dir"),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_callsift"));
        cmd.args(args)
            .current_dir(self.home.path())
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.config.path())
            .env("XDG_DATA_HOME", self.data.path())
            .env("CALLSIFT_DATA_DIR", self.data.path())
            .env_remove("CALLSIFT_API_KEY")
            .env_remove("GROQ_API_KEY")
            .env_remove("GEMINI_API_KEY")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .expect("failed to execute callsift binary")
    }

    pub fn run_with_env(&self, args: &[&str], vars: &[(&str, &str)]) -> Output {
        let mut cmd = self.command(args);
        for (key, value) in vars {
            cmd.env(key, value);
        }
        cmd.output().expect("failed to execute callsift binary")
    }

    pub fn data_dir(&self) -> &Path {
        self.data.path()
    }

    /// Write a transcript file into a fresh directory under HOME
    pub fn write_transcript(&self, name: &str, text: &str) -> PathBuf {
        let dir = self.home.path().join("transcripts");
        std::fs::create_dir_all(&dir).expect("create transcript dir");
        let path = dir.join(name);
        std::fs::write(&path, text).expect("write transcript");
        path
    }

    pub fn config_path(&self) -> PathBuf {
        let output = self.run(&["config", "path"]);
        assert!(
            output.status.success(),
            "config path should succeed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );

        let path = String::from_utf8_lossy(&output.stdout);
        PathBuf::from(path.trim())
    }

    pub fn write_config(&self, contents: &str) {
        let config_path = self.config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).expect("create config parent directory");
        }
        std::fs::write(&config_path, contents).expect("write config file");
    }
}

/// Fresh on-disk database holding one record per `(id, transcript)` pair.
pub fn seeded_database(dir: &Path, records: &[(&str, &str)]) -> Database {
    let db = Database::open_path(&dir.join("callsift.db")).expect("open test database");
    for (id, transcript) in records {
        db.insert_record(&CallRecord::new(*id, *transcript))
            .expect("insert test record");
    }
    db
}

/// Provider that replays a script of results, then repeats a fallback reply.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<callsift::Result<String>>>,
    fallback: String,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn always(reply: &str) -> Arc<Self> {
        Self::with_script(Vec::new(), reply)
    }

    pub fn with_script(script: Vec<callsift::Result<String>>, fallback: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> callsift::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Store wrapper that counts enrichment writes
pub struct CountingStore {
    pub db: Database,
    writes: Cell<usize>,
}

impl CountingStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            writes: Cell::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl CallStore for CountingStore {
    fn list_records(&self) -> callsift::Result<Vec<CallRecord>> {
        self.db.list_records()
    }

    fn get_record(&self, id: &str) -> callsift::Result<Option<CallRecord>> {
        CallStore::get_record(&self.db, id)
    }

    fn write_enrichment(&self, id: &str, enrichment: &Enrichment) -> callsift::Result<()> {
        self.db.write_enrichment(id, enrichment)?;
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn record_failure(&self, id: &str, reason: &str) -> callsift::Result<()> {
        self.db.record_failure(id, reason)
    }
}

/// Processed set whose marks fail, as if the process died right after a write
pub struct CrashingMarks {
    pub ids: HashSet<String>,
}

impl CrashingMarks {
    pub fn new() -> Self {
        Self {
            ids: HashSet::new(),
        }
    }
}

impl ProcessedSet for CrashingMarks {
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn mark(&mut self, id: &str) -> callsift::Result<()> {
        Err(EnrichError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("simulated crash before marking {}", id),
        )))
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
