use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceRecord;
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

fn field_str<'a>(record: &'a serde_json::Value, key: &str) -> &'a str {
    record.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Calendar-day key of a stored timestamp: its first ten characters
/// (YYYY-MM-DD), the same prefix rule the violation report uses.
fn day_prefix(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

fn attendance_list(store: &DataStore, params: &serde_json::Value) -> serde_json::Value {
    let batch_id = params.get("batchId").and_then(|v| v.as_str()).unwrap_or("");
    let records: Vec<serde_json::Value> = store
        .load_records(store::ATTENDANCE)
        .into_iter()
        .filter(|r| batch_id.is_empty() || field_str(r, "batch_id") == batch_id)
        .collect();
    json!({ "count": records.len(), "attendance": records })
}

fn attendance_for_student(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let records: Vec<serde_json::Value> = store
        .load_records(store::ATTENDANCE)
        .into_iter()
        .filter(|r| field_str(r, "roll_number") == roll_number)
        .collect();
    Ok(json!({ "count": records.len(), "attendance": records }))
}

fn attendance_check(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let date = get_required_str(params, "date")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let batch_id = get_required_str(params, "batchId")?;

    for record in store.load_records(store::ATTENDANCE) {
        if field_str(&record, "roll_number") == roll_number
            && field_str(&record, "subject_id") == subject_id
            && field_str(&record, "batch_id") == batch_id
            && day_prefix(field_str(&record, "timestamp")) == date
        {
            return Ok(json!({ "exists": true, "record": record }));
        }
    }
    Ok(json!({ "exists": false }))
}

fn attendance_mark(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;

    let attendance_id = Uuid::new_v4().to_string();
    let timestamp = params
        .get("timestamp")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string());
    let status = params
        .get("status")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("PRESENT");

    let record = AttendanceRecord {
        attendance_id: attendance_id.clone(),
        student_id: field_str(params, "studentId").to_string(),
        roll_number,
        camera_id: field_str(params, "cameraId").to_string(),
        timestamp,
        subject_id: field_str(params, "subjectId").to_string(),
        batch_id: field_str(params, "batchId").to_string(),
        status: status.to_string(),
        confidence_score: params
            .get("confidenceScore")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0),
    };

    let mut records = store.load_records(store::ATTENDANCE);
    records.push(json!(record));
    store
        .save_records(store::ATTENDANCE, records)
        .map_err(|e| HandlerErr {
            code: "store_write_failed",
            message: e.to_string(),
            details: Some(json!({ "file": store::ATTENDANCE.file })),
        })?;

    Ok(json!({ "attendanceId": attendance_id, "record": record }))
}

fn attendance_batch_report(
    store: &DataStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let batch_id = get_required_str(params, "batchId")?;

    let records: Vec<AttendanceRecord> = store
        .load::<AttendanceRecord>(store::ATTENDANCE)
        .into_iter()
        .filter(|r| r.batch_id == batch_id)
        .collect();

    let total_records = records.len();
    let present = records.iter().filter(|r| r.status == "PRESENT").count();
    let absent = records.iter().filter(|r| r.status == "ABSENT").count();
    let late = records.iter().filter(|r| r.status == "LATE").count();
    let attendance_percentage = if total_records > 0 {
        (present as f64) / (total_records as f64) * 100.0
    } else {
        0.0
    };

    Ok(json!({
        "batchId": batch_id,
        "totalRecords": total_records,
        "present": present,
        "absent": absent,
        "late": late,
        "attendancePercentage": attendance_percentage
    }))
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    ok(&req.id, attendance_list(store, &req.params))
}

fn handle_attendance_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_for_student(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_check(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_mark(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_batch_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_batch_report(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.forStudent" => Some(handle_attendance_for_student(state, req)),
        "attendance.check" => Some(handle_attendance_check(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.batchReport" => Some(handle_attendance_batch_report(state, req)),
        _ => None,
    }
}
