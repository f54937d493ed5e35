use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Batch, Student};
use crate::store::{self, DataStore};
use chrono::Local;
use serde_json::json;

fn field_str<'a>(record: &'a serde_json::Value, key: &str) -> &'a str {
    record.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn save_students(
    store: &DataStore,
    req: &Request,
    map: serde_json::Map<String, serde_json::Value>,
) -> Result<(), serde_json::Value> {
    store.save_student_map(map).map_err(|e| {
        err(
            &req.id,
            "store_write_failed",
            e.to_string(),
            Some(json!({ "file": store::STUDENTS_FILE })),
        )
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "count": 0, "students": [] }));
    };
    let batch_id = req
        .params
        .get("batchId")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    // Batch membership is either an explicit batch_id or a roll-number
    // prefix, matching how the roster was originally keyed.
    let students: Vec<serde_json::Value> = store
        .load_student_map()
        .into_iter()
        .map(|(_, record)| record)
        .filter(|record| {
            batch_id.is_empty()
                || field_str(record, "batch_id") == batch_id
                || field_str(record, "roll_number").starts_with(batch_id)
        })
        .collect();
    ok(&req.id, json!({ "count": students.len(), "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let roll_number = match req.params.get("rollNumber").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing rollNumber", None),
    };

    let mut map = store.load_student_map();
    if map.contains_key(&roll_number) {
        return err(
            &req.id,
            "duplicate",
            "student already exists",
            Some(json!({ "rollNumber": roll_number })),
        );
    }

    let record = Student {
        student_id: format!("STU_{}", roll_number),
        roll_number: roll_number.clone(),
        name: field_str(&req.params, "name").to_string(),
        batch_id: field_str(&req.params, "batchId").to_string(),
        email: req
            .params
            .get("email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        image_path: req
            .params
            .get("imagePath")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        added_date: Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    };
    map.insert(roll_number.clone(), json!(record));
    if let Err(resp) = save_students(store, req, map) {
        return resp;
    }

    ok(&req.id, json!({ "rollNumber": roll_number, "record": record }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let roll_number = match req.params.get("rollNumber").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing rollNumber", None),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch object", None);
    };

    let mut map = store.load_student_map();
    let Some(existing) = map.get_mut(&roll_number) else {
        return err(&req.id, "not_found", "student not found", None);
    };

    // Shallow merge, same semantics as the original update endpoint.
    if let Some(record) = existing.as_object_mut() {
        for (key, value) in patch {
            record.insert(key.clone(), value.clone());
        }
    }
    let updated = existing.clone();
    if let Err(resp) = save_students(store, req, map) {
        return resp;
    }

    ok(&req.id, json!({ "rollNumber": roll_number, "record": updated }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let roll_number = match req.params.get("rollNumber").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing rollNumber", None),
    };

    let mut map = store.load_student_map();
    if map.remove(&roll_number).is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }
    if let Err(resp) = save_students(store, req, map) {
        return resp;
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_batches_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "count": 0, "batches": [] }));
    };
    let batches = store.load_records(store::BATCHES);
    ok(&req.id, json!({ "count": batches.len(), "batches": batches }))
}

fn handle_batches_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let batch_id = match req.params.get("batchId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing batchId", None),
    };

    let record = Batch {
        batch_id: batch_id.clone(),
        batch_name: field_str(&req.params, "batchName").to_string(),
        semester: field_str(&req.params, "semester").to_string(),
        total_students: 0,
    };
    let mut records = store.load_records(store::BATCHES);
    records.push(json!(record));
    if let Err(e) = store.save_records(store::BATCHES, records) {
        return err(
            &req.id,
            "store_write_failed",
            e.to_string(),
            Some(json!({ "file": store::BATCHES.file })),
        );
    }

    ok(&req.id, json!({ "batchId": batch_id, "record": record }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "batches.list" => Some(handle_batches_list(state, req)),
        "batches.create" => Some(handle_batches_create(state, req)),
        _ => None,
    }
}
