use crate::model::{Camera, Subject, Teacher, TimetableEntry, ViolationEvent};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl EngineError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Build an id -> entity map over one reference collection.
/// Last write wins on duplicate ids; lookups on absent ids just miss.
pub fn index_by_id<'a, T>(items: &'a [T], id: fn(&'a T) -> &'a str) -> HashMap<&'a str, &'a T> {
    let mut map: HashMap<&str, &T> = HashMap::with_capacity(items.len());
    for item in items {
        map.insert(id(item), item);
    }
    map
}

/// Reference indices for one report computation. Rebuilt from the snapshot on
/// every call; the engine holds nothing between invocations.
pub struct ReportContext<'a> {
    pub teachers: HashMap<&'a str, &'a Teacher>,
    pub cameras: HashMap<&'a str, &'a Camera>,
    pub subjects: HashMap<&'a str, &'a Subject>,
    pub timetable: &'a [TimetableEntry],
}

impl<'a> ReportContext<'a> {
    pub fn new(
        teachers: &'a [Teacher],
        cameras: &'a [Camera],
        subjects: &'a [Subject],
        timetable: &'a [TimetableEntry],
    ) -> Self {
        Self {
            teachers: index_by_id(teachers, |t| &t.teacher_id),
            cameras: index_by_id(cameras, |c| &c.camera_id),
            subjects: index_by_id(subjects, |s| &s.subject_id),
            timetable,
        }
    }
}

fn non_empty(opt: &Option<String>) -> Option<&str> {
    opt.as_deref().filter(|s| !s.is_empty())
}

fn non_empty_str(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Room/camera label for one violation, resolved through a strict fallback
/// chain. Each step is consulted only when every earlier one produced nothing;
/// empty strings count as nothing.
pub fn resolve_room_label(violation: &ViolationEvent, ctx: &ReportContext) -> String {
    if let Some(location) = non_empty(&violation.camera_location) {
        return location.to_string();
    }
    if let Some(name) = non_empty(&violation.camera_name) {
        return name.to_string();
    }
    if let Some(subject_id) = non_empty(&violation.subject_id) {
        // First entry in collection order; subject_id is not unique.
        if let Some(entry) = ctx.timetable.iter().find(|t| t.subject_id == subject_id) {
            if !entry.room.is_empty() {
                return entry.room.clone();
            }
        }
    }
    match non_empty_str(&violation.camera_id) {
        Some(camera_id) => match ctx.cameras.get(camera_id) {
            Some(camera) => [&camera.location, &camera.camera_name, &camera.name]
                .into_iter()
                .find(|s| !s.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("Room: {}", camera_id)),
            None => format!("Room: {}", camera_id),
        },
        None => "Room: Unknown".to_string(),
    }
}

/// Known teachers resolve to their name verbatim; unknown ids get a
/// placeholder label.
pub fn resolve_teacher_name(teacher_id: &str, ctx: &ReportContext) -> String {
    match ctx.teachers.get(teacher_id) {
        Some(teacher) => teacher.name.clone(),
        None => format!("Teacher {}", teacher_id),
    }
}

/// Unknown subject ids come back unchanged, not as a synthesized label.
pub fn resolve_subject_name(subject_id: &str, ctx: &ReportContext) -> String {
    match ctx.subjects.get(subject_id) {
        Some(subject) => subject.subject_name.clone(),
        None => subject_id.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedViolation<'a> {
    #[serde(flatten)]
    pub event: &'a ViolationEvent,
    #[serde(rename = "teacherName")]
    pub teacher_name: String,
    #[serde(rename = "subjectName")]
    pub subject_name: Option<String>,
    #[serde(rename = "roomLabel")]
    pub room_label: String,
}

pub fn enrich<'a>(violation: &'a ViolationEvent, ctx: &ReportContext<'a>) -> EnrichedViolation<'a> {
    EnrichedViolation {
        event: violation,
        teacher_name: resolve_teacher_name(&violation.teacher_id, ctx),
        subject_name: non_empty(&violation.subject_id)
            .map(|subject_id| resolve_subject_name(subject_id, ctx)),
        room_label: resolve_room_label(violation, ctx),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterBy {
    All,
    Today,
    Teacher,
    Camera,
}

impl FilterBy {
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw {
            "all" => Ok(FilterBy::All),
            "today" => Ok(FilterBy::Today),
            "teacher" => Ok(FilterBy::Teacher),
            "camera" => Ok(FilterBy::Camera),
            other => Err(EngineError::new(
                "invalid_filter_mode",
                format!("filterBy must be one of: all, today, teacher, camera (got {})", other),
            )),
        }
    }
}

/// Select the working subset. `today` is the reference ISO date (YYYY-MM-DD)
/// computed once by the caller; the comparison is a literal string prefix,
/// not timezone arithmetic. An empty secondary key on teacher/camera selects
/// everything.
pub fn filter<'a>(
    violations: &'a [ViolationEvent],
    filter_by: FilterBy,
    key: &str,
    today: &str,
) -> Vec<&'a ViolationEvent> {
    violations
        .iter()
        .filter(|v| match filter_by {
            FilterBy::All => true,
            FilterBy::Today => v.timestamp.starts_with(today),
            FilterBy::Teacher => key.is_empty() || v.teacher_id == key,
            FilterBy::Camera => key.is_empty() || v.camera_id == key,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationStats {
    pub total_violations: usize,
    pub today_violations: usize,
    pub unique_students: usize,
    pub unique_teachers: usize,
}

/// Summary counts over the complete, unfiltered collection. Never derived
/// from the currently displayed subset.
pub fn summarize(violations: &[ViolationEvent], today: &str) -> ViolationStats {
    let today_violations = violations
        .iter()
        .filter(|v| v.timestamp.starts_with(today))
        .count();
    let unique_students: HashSet<&str> =
        violations.iter().map(|v| v.student_id.as_str()).collect();
    let unique_teachers: HashSet<&str> =
        violations.iter().map(|v| v.teacher_id.as_str()).collect();

    ViolationStats {
        total_violations: violations.len(),
        today_violations,
        unique_students: unique_students.len(),
        unique_teachers: unique_teachers.len(),
    }
}

fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Most recent first. Unparseable timestamps order as the minimum instant
/// (oldest, so they land at the end); equal keys keep their input order.
pub fn sort_by_recency(mut rows: Vec<&ViolationEvent>) -> Vec<&ViolationEvent> {
    rows.sort_by_key(|v| Reverse(parse_instant(&v.timestamp)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(timestamp: &str) -> ViolationEvent {
        ViolationEvent {
            timestamp: timestamp.to_string(),
            ..Default::default()
        }
    }

    fn teacher(id: &str, name: &str) -> Teacher {
        Teacher {
            teacher_id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn camera(id: &str, camera_name: &str, location: &str) -> Camera {
        Camera {
            camera_id: id.to_string(),
            camera_name: camera_name.to_string(),
            location: location.to_string(),
            ..Default::default()
        }
    }

    fn subject(id: &str, name: &str) -> Subject {
        Subject {
            subject_id: id.to_string(),
            subject_name: name.to_string(),
            ..Default::default()
        }
    }

    fn slot(subject_id: &str, room: &str) -> TimetableEntry {
        TimetableEntry {
            subject_id: subject_id.to_string(),
            room: room.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn index_last_write_wins_and_misses_are_none() {
        let teachers = vec![teacher("T1", "First"), teacher("T1", "Second")];
        let idx = index_by_id(&teachers, |t| &t.teacher_id);
        assert_eq!(idx.get("T1").map(|t| t.name.as_str()), Some("Second"));
        assert!(idx.get("T9").is_none());
    }

    #[test]
    fn explicit_camera_location_wins_over_everything() {
        let cameras = vec![camera("CAM1", "Cam One", "Lab B")];
        let timetable = vec![slot("SUB1", "R101")];
        let ctx = ReportContext::new(&[], &cameras, &[], &timetable);

        let mut v = violation("2024-01-01T10:00:00");
        v.camera_location = Some("Hall A".to_string());
        v.camera_name = Some("Overridden".to_string());
        v.subject_id = Some("SUB1".to_string());
        v.camera_id = "CAM1".to_string();
        assert_eq!(resolve_room_label(&v, &ctx), "Hall A");
    }

    #[test]
    fn empty_location_falls_through_to_camera_name() {
        let ctx = ReportContext::new(&[], &[], &[], &[]);
        let mut v = violation("");
        v.camera_location = Some(String::new());
        v.camera_name = Some("Exam Cam".to_string());
        assert_eq!(resolve_room_label(&v, &ctx), "Exam Cam");
    }

    #[test]
    fn timetable_room_resolves_by_subject() {
        let timetable = vec![slot("SUB1", "R101"), slot("SUB1", "R202")];
        let ctx = ReportContext::new(&[], &[], &[], &timetable);
        let mut v = violation("");
        v.subject_id = Some("SUB1".to_string());
        // First matching entry in collection order, not the later one.
        assert_eq!(resolve_room_label(&v, &ctx), "R101");
    }

    #[test]
    fn roomless_timetable_match_falls_through_to_camera_index() {
        let timetable = vec![slot("SUB1", "")];
        let cameras = vec![camera("CAM1", "", "Lab B")];
        let ctx = ReportContext::new(&[], &cameras, &[], &timetable);
        let mut v = violation("");
        v.subject_id = Some("SUB1".to_string());
        v.camera_id = "CAM1".to_string();
        assert_eq!(resolve_room_label(&v, &ctx), "Lab B");
    }

    #[test]
    fn camera_index_prefers_location_then_names() {
        let cameras = vec![
            camera("CAM1", "Cam One", "Lab B"),
            camera("CAM2", "Cam Two", ""),
        ];
        let ctx = ReportContext::new(&[], &cameras, &[], &[]);

        let mut v = violation("");
        v.camera_id = "CAM1".to_string();
        assert_eq!(resolve_room_label(&v, &ctx), "Lab B");

        v.camera_id = "CAM2".to_string();
        assert_eq!(resolve_room_label(&v, &ctx), "Cam Two");

        let legacy = Camera {
            camera_id: "CAM3".to_string(),
            name: "Legacy Cam".to_string(),
            ..Default::default()
        };
        let cameras = vec![legacy];
        let ctx = ReportContext::new(&[], &cameras, &[], &[]);
        v.camera_id = "CAM3".to_string();
        assert_eq!(resolve_room_label(&v, &ctx), "Legacy Cam");
    }

    #[test]
    fn unknown_camera_gets_room_placeholder() {
        let ctx = ReportContext::new(&[], &[], &[], &[]);
        let mut v = violation("");
        v.camera_id = "CAM9".to_string();
        assert_eq!(resolve_room_label(&v, &ctx), "Room: CAM9");
    }

    #[test]
    fn missing_camera_id_gets_unknown_placeholder() {
        let ctx = ReportContext::new(&[], &[], &[], &[]);
        let v = violation("");
        assert_eq!(resolve_room_label(&v, &ctx), "Room: Unknown");
    }

    #[test]
    fn known_camera_with_no_display_fields_gets_room_placeholder() {
        let cameras = vec![camera("CAM5", "", "")];
        let ctx = ReportContext::new(&[], &cameras, &[], &[]);
        let mut v = violation("");
        v.camera_id = "CAM5".to_string();
        assert_eq!(resolve_room_label(&v, &ctx), "Room: CAM5");
    }

    #[test]
    fn teacher_and_subject_resolution_are_asymmetric() {
        let teachers = vec![teacher("T1", "Ada")];
        let subjects = vec![subject("SUB1", "Mathematics")];
        let ctx = ReportContext::new(&teachers, &[], &subjects, &[]);

        assert_eq!(resolve_teacher_name("T1", &ctx), "Ada");
        assert_eq!(resolve_teacher_name("T9", &ctx), "Teacher T9");
        assert_eq!(resolve_subject_name("SUB1", &ctx), "Mathematics");
        // Unknown subject ids pass through raw, no placeholder.
        assert_eq!(resolve_subject_name("SUB9", &ctx), "SUB9");
    }

    #[test]
    fn filter_today_is_a_string_prefix_match() {
        let violations = vec![
            violation("2024-01-01T10:00:00"),
            violation("2024-01-02T09:00:00"),
        ];
        let kept = filter(&violations, FilterBy::Today, "", "2024-01-02");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, "2024-01-02T09:00:00");
    }

    #[test]
    fn filter_by_teacher_and_camera_with_empty_key_selects_all() {
        let mut a = violation("2024-01-01T10:00:00");
        a.teacher_id = "T1".to_string();
        a.camera_id = "CAM1".to_string();
        let mut b = violation("2024-01-02T09:00:00");
        b.teacher_id = "T2".to_string();
        b.camera_id = "CAM2".to_string();
        let violations = vec![a, b];

        assert_eq!(
            filter(&violations, FilterBy::Teacher, "T2", "2024-01-02").len(),
            1
        );
        assert_eq!(
            filter(&violations, FilterBy::Teacher, "", "2024-01-02").len(),
            2
        );
        assert_eq!(
            filter(&violations, FilterBy::Camera, "CAM1", "2024-01-02").len(),
            1
        );
        assert_eq!(
            filter(&violations, FilterBy::Camera, "", "2024-01-02").len(),
            2
        );
    }

    #[test]
    fn unknown_filter_mode_is_an_error_not_a_default() {
        let e = FilterBy::parse("everything").expect_err("must reject");
        assert_eq!(e.code, "invalid_filter_mode");
    }

    #[test]
    fn stats_cover_the_full_collection_regardless_of_filter() {
        let mut a = violation("2024-01-02T09:00:00");
        a.student_id = "S1".to_string();
        a.teacher_id = "T1".to_string();
        let mut b = violation("2024-01-01T10:00:00");
        b.student_id = "S2".to_string();
        b.teacher_id = "T1".to_string();
        let mut c = violation("2024-01-02T11:00:00");
        c.student_id = "S1".to_string();
        c.teacher_id = "T2".to_string();
        let violations = vec![a, b, c];

        let stats = summarize(&violations, "2024-01-02");
        assert_eq!(stats.total_violations, 3);
        assert_eq!(stats.today_violations, 2);
        assert_eq!(stats.unique_students, 2);
        assert_eq!(stats.unique_teachers, 2);

        // Filtering down to one teacher must not change the summary.
        let narrowed = filter(&violations, FilterBy::Teacher, "T2", "2024-01-02");
        assert_eq!(narrowed.len(), 1);
        assert_eq!(summarize(&violations, "2024-01-02"), stats);
    }

    #[test]
    fn sort_is_descending_with_unparseable_last() {
        let violations = vec![
            violation("2024-01-01T10:00"),
            violation("not-a-timestamp"),
            violation("2024-01-02T09:00"),
        ];
        let sorted = sort_by_recency(violations.iter().collect());
        assert_eq!(sorted[0].timestamp, "2024-01-02T09:00");
        assert_eq!(sorted[1].timestamp, "2024-01-01T10:00");
        assert_eq!(sorted[2].timestamp, "not-a-timestamp");
    }

    #[test]
    fn sort_is_stable_for_equal_timestamps() {
        let mut a = violation("2024-01-02T09:00:00");
        a.student_id = "first".to_string();
        let mut b = violation("2024-01-02T09:00:00");
        b.student_id = "second".to_string();
        let violations = vec![a, b];
        let sorted = sort_by_recency(violations.iter().collect());
        assert_eq!(sorted[0].student_id, "first");
        assert_eq!(sorted[1].student_id, "second");
    }

    #[test]
    fn pipeline_is_idempotent_over_the_same_snapshot() {
        let teachers = vec![teacher("T1", "Ada")];
        let cameras = vec![camera("CAM1", "Cam One", "Lab B")];
        let subjects = vec![subject("SUB1", "Mathematics")];
        let timetable = vec![slot("SUB1", "R101")];

        let mut a = violation("2024-01-02T09:00:00");
        a.student_id = "S1".to_string();
        a.teacher_id = "T1".to_string();
        a.subject_id = Some("SUB1".to_string());
        let mut b = violation("2024-01-01T10:00:00");
        b.student_id = "S2".to_string();
        b.teacher_id = "T9".to_string();
        b.camera_id = "CAM1".to_string();
        let violations = vec![a, b];

        let run = || {
            let ctx = ReportContext::new(&teachers, &cameras, &subjects, &timetable);
            let rows = sort_by_recency(filter(&violations, FilterBy::All, "", "2024-01-02"));
            let enriched: Vec<EnrichedViolation> =
                rows.into_iter().map(|v| enrich(v, &ctx)).collect();
            let stats = summarize(&violations, "2024-01-02");
            serde_json::to_string(&serde_json::json!({
                "stats": stats,
                "violations": enriched,
            }))
            .expect("serialize report")
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn enrich_resolves_names_without_mutating_the_event() {
        let teachers = vec![teacher("T1", "Ada")];
        let subjects = vec![subject("SUB1", "Mathematics")];
        let timetable = vec![slot("SUB1", "R101")];
        let ctx = ReportContext::new(&teachers, &[], &subjects, &timetable);

        let mut v = violation("2024-01-02T09:00:00");
        v.teacher_id = "T1".to_string();
        v.subject_id = Some("SUB1".to_string());
        let before = v.clone();

        let row = enrich(&v, &ctx);
        assert_eq!(row.teacher_name, "Ada");
        assert_eq!(row.subject_name.as_deref(), Some("Mathematics"));
        assert_eq!(row.room_label, "R101");
        assert_eq!(v, before);
    }
}
