use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// One workspace collection file and the key its payload may be wrapped
/// under. The acquisition service writes either a bare array or
/// `{"<key>": [...]}`; both shapes are accepted on read.
#[derive(Debug, Clone, Copy)]
pub struct Collection {
    pub file: &'static str,
    pub key: &'static str,
}

pub const BATCHES: Collection = Collection {
    file: "batches.json",
    key: "batches",
};
pub const TEACHERS: Collection = Collection {
    file: "teachers.json",
    key: "teachers",
};
pub const SUBJECTS: Collection = Collection {
    file: "subjects.json",
    key: "subjects",
};
pub const CAMERAS: Collection = Collection {
    file: "cameras.json",
    key: "cameras",
};
pub const TIMETABLE: Collection = Collection {
    file: "timetable.json",
    key: "timetable",
};
pub const CAMERA_SCHEDULE: Collection = Collection {
    file: "camera_schedule.json",
    key: "camera_schedule",
};
pub const ATTENDANCE: Collection = Collection {
    file: "attendance.json",
    key: "attendance",
};
pub const VIOLATIONS: Collection = Collection {
    file: "exam_violations.json",
    key: "violations",
};

// The students file predates the wrapped-array convention: it is an object
// keyed by roll number.
pub const STUDENTS_FILE: &str = "students_database.json";

/// Workspace data directory. Every load re-reads from disk, so a "refresh"
/// is simply the next request; nothing is cached between calls.
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("failed to create workspace {}", root.to_string_lossy()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_value(&self, file: &str) -> Option<Value> {
        let path = self.root.join(file);
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn write_value(&self, file: &str, value: &Value) -> anyhow::Result<()> {
        let path = self.root.join(file);
        let tmp = self.root.join(format!("{}.writing", file));
        let text = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize {}", file))?;
        std::fs::write(&tmp, text)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.to_string_lossy()))?;
        Ok(())
    }

    /// Raw records for a collection. Missing/unreadable files and
    /// non-sequence payloads degrade to an empty collection; an upstream
    /// acquisition failure must never surface as a fault here.
    pub fn load_records(&self, collection: Collection) -> Vec<Value> {
        match self.read_value(collection.file) {
            Some(Value::Array(records)) => records,
            Some(Value::Object(mut wrapper)) => match wrapper.remove(collection.key) {
                Some(Value::Array(records)) => records,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Typed records. Individually malformed records are skipped rather than
    /// failing the whole collection.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        self.load_records(collection)
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect()
    }

    pub fn save_records(&self, collection: Collection, records: Vec<Value>) -> anyhow::Result<()> {
        let mut wrapper = Map::new();
        wrapper.insert(collection.key.to_string(), Value::Array(records));
        self.write_value(collection.file, &Value::Object(wrapper))
    }

    /// The students object, keyed by roll number. A bare array of student
    /// records is also accepted and re-keyed.
    pub fn load_student_map(&self) -> Map<String, Value> {
        match self.read_value(STUDENTS_FILE) {
            Some(Value::Object(map)) => map,
            Some(Value::Array(records)) => {
                let mut map = Map::new();
                for record in records {
                    let roll = record
                        .get("roll_number")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    if !roll.is_empty() {
                        map.insert(roll, record);
                    }
                }
                map
            }
            _ => Map::new(),
        }
    }

    pub fn save_student_map(&self, map: Map<String, Value>) -> anyhow::Result<()> {
        self.write_value(STUDENTS_FILE, &Value::Object(map))
    }
}
