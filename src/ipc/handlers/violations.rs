use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Camera, Subject, Teacher, TimetableEntry, ViolationEvent};
use crate::report::{self, FilterBy, ReportContext};
use crate::store::{self, DataStore};
use chrono::Local;
use serde_json::json;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn local_date() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn save_violations(store: &DataStore, records: Vec<serde_json::Value>) -> Result<(), HandlerErr> {
    store
        .save_records(store::VIOLATIONS, records)
        .map_err(|e| HandlerErr {
            code: "store_write_failed",
            message: e.to_string(),
            details: Some(json!({ "file": store::VIOLATIONS.file })),
        })
}

/// The dashboard report: summary stats over the whole collection, then the
/// filtered, enriched, recency-sorted rows for display. All five collections
/// are re-read so the report always reflects the current snapshot.
fn violations_report(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let filter_by_raw = params
        .get("filterBy")
        .and_then(|v| v.as_str())
        .unwrap_or("all");
    let filter_value = params
        .get("filterValue")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let filter_by = FilterBy::parse(filter_by_raw).map_err(|e| HandlerErr {
        code: "invalid_filter_mode",
        message: e.message,
        details: e.details,
    })?;

    let violations: Vec<ViolationEvent> = store.load(store::VIOLATIONS);
    let teachers: Vec<Teacher> = store.load(store::TEACHERS);
    let cameras: Vec<Camera> = store.load(store::CAMERAS);
    let subjects: Vec<Subject> = store.load(store::SUBJECTS);
    let timetable: Vec<TimetableEntry> = store.load(store::TIMETABLE);

    let today = local_date();
    let stats = report::summarize(&violations, &today);
    let ctx = ReportContext::new(&teachers, &cameras, &subjects, &timetable);
    let rows = report::sort_by_recency(report::filter(
        &violations,
        filter_by,
        filter_value,
        &today,
    ));
    let enriched: Vec<serde_json::Value> =
        rows.into_iter().map(|v| json!(report::enrich(v, &ctx))).collect();

    Ok(json!({
        "stats": stats,
        "count": enriched.len(),
        "violations": enriched
    }))
}

fn violations_filter_options(store: &DataStore) -> serde_json::Value {
    let teachers: Vec<Teacher> = store.load(store::TEACHERS);
    let cameras: Vec<Camera> = store.load(store::CAMERAS);

    let teachers_json: Vec<serde_json::Value> = teachers
        .iter()
        .map(|t| json!({ "teacherId": t.teacher_id, "name": t.name }))
        .collect();
    let cameras_json: Vec<serde_json::Value> = cameras
        .iter()
        .map(|c| {
            let display_name = [&c.camera_name, &c.name, &c.camera_id]
                .into_iter()
                .find(|s| !s.is_empty())
                .cloned()
                .unwrap_or_default();
            json!({
                "cameraId": c.camera_id,
                "displayName": display_name,
                "location": c.location
            })
        })
        .collect();

    json!({ "teachers": teachers_json, "cameras": cameras_json })
}

/// Sink for the detection service. Fills in an id, timestamp, and severity
/// when the producer did not supply them.
fn violations_record(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let camera_id = get_required_str(params, "cameraId")?;

    let violation_id = get_optional_str(params, "violationId")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let timestamp = get_optional_str(params, "timestamp")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(local_timestamp);
    let severity = get_optional_str(params, "severity")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "high".to_string());

    let event = ViolationEvent {
        violation_id: violation_id.clone(),
        timestamp,
        student_id,
        student_name: get_optional_str(params, "studentName"),
        teacher_id,
        subject_id: get_optional_str(params, "subjectId"),
        camera_id,
        camera_name: get_optional_str(params, "cameraName"),
        camera_location: get_optional_str(params, "cameraLocation"),
        confidence: params
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0),
        duration_seconds: params.get("durationSeconds").and_then(|v| v.as_f64()),
        notes: get_optional_str(params, "notes"),
        severity: Some(severity),
    };

    let mut records = store.load_records(store::VIOLATIONS);
    records.push(json!(event));
    save_violations(store, records)?;

    Ok(json!({ "violationId": violation_id, "record": event }))
}

fn violations_for_student(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let matching: Vec<serde_json::Value> = store
        .load_records(store::VIOLATIONS)
        .into_iter()
        .filter(|r| r.get("student_id").and_then(|v| v.as_str()) == Some(student_id.as_str()))
        .collect();
    Ok(json!({ "count": matching.len(), "violations": matching }))
}

fn violations_delete(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let violation_id = get_required_str(params, "violationId")?;
    let mut records = store.load_records(store::VIOLATIONS);
    let before = records.len();
    records.retain(|r| {
        r.get("violation_id").and_then(|v| v.as_str()) != Some(violation_id.as_str())
    });
    if records.len() == before {
        return Err(HandlerErr {
            code: "not_found",
            message: "violation not found".to_string(),
            details: None,
        });
    }
    save_violations(store, records)?;
    Ok(json!({ "ok": true }))
}

fn handle_violations_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match violations_report(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_violations_filter_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    ok(&req.id, violations_filter_options(store))
}

fn handle_violations_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match violations_record(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_violations_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match violations_for_student(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_violations_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match violations_delete(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "violations.report" => Some(handle_violations_report(state, req)),
        "violations.filterOptions" => Some(handle_violations_filter_options(state, req)),
        "violations.record" => Some(handle_violations_record(state, req)),
        "violations.forStudent" => Some(handle_violations_for_student(state, req)),
        "violations.delete" => Some(handle_violations_delete(state, req)),
        _ => None,
    }
}
