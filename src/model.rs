use serde::{Deserialize, Serialize};

// Records as the acquisition service writes them: snake_case fields, any of
// which may be missing or stale in older files. Everything defaults so a
// partially-populated record still deserializes; referential integrity across
// collections is not guaranteed and is resolved at report time.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Student {
    pub student_id: String,
    pub roll_number: String,
    pub name: String,
    pub batch_id: String,
    pub email: Option<String>,
    pub image_path: Option<String>,
    pub added_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Batch {
    pub batch_id: String,
    pub batch_name: String,
    pub semester: String,
    pub total_students: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Teacher {
    pub teacher_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    pub subject_id: String,
    pub subject_name: String,
    pub subject_code: String,
    pub teacher_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub camera_id: String,
    pub camera_name: String,
    // Older camera records carry the display name under `name` instead.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub location: String,
    pub ip_address: String,
    pub batch_id: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimetableEntry {
    pub timetable_id: String,
    pub batch_id: String,
    pub day: String,
    pub period: i64,
    pub start_time: String,
    pub end_time: String,
    // subject_id is NOT unique here: one subject may occupy several slots.
    pub subject_id: String,
    pub teacher_id: String,
    pub room: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSchedule {
    pub schedule_id: String,
    pub camera_id: String,
    pub timetable_id: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceRecord {
    pub attendance_id: String,
    pub student_id: String,
    pub roll_number: String,
    pub camera_id: String,
    pub timestamp: String,
    pub subject_id: String,
    pub batch_id: String,
    pub status: String,
    pub confidence_score: f64,
}

/// One recorded phone-detection incident during an exam session.
///
/// `camera_location`/`camera_name` are stamped onto the event by the
/// detection service when it knows them; otherwise the report engine resolves
/// a room label from the timetable and camera collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationEvent {
    pub violation_id: String,
    pub timestamp: String,
    pub student_id: String,
    pub student_name: Option<String>,
    pub teacher_id: String,
    pub subject_id: Option<String>,
    pub camera_id: String,
    pub camera_name: Option<String>,
    pub camera_location: Option<String>,
    pub confidence: f64,
    pub duration_seconds: Option<f64>,
    pub notes: Option<String>,
    pub severity: Option<String>,
}
