use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Camera, CameraSchedule, Subject, Teacher, TimetableEntry};
use crate::store::{self, Collection, DataStore};
use serde_json::json;

fn field_str<'a>(record: &'a serde_json::Value, key: &str) -> &'a str {
    record.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn list_filtered(
    store: &DataStore,
    collection: Collection,
    field: &str,
    wanted: &str,
) -> Vec<serde_json::Value> {
    store
        .load_records(collection)
        .into_iter()
        .filter(|r| wanted.is_empty() || field_str(r, field) == wanted)
        .collect()
}

fn append_record(
    store: &DataStore,
    req: &Request,
    collection: Collection,
    record: serde_json::Value,
) -> Option<serde_json::Value> {
    let mut records = store.load_records(collection);
    records.push(record);
    match store.save_records(collection, records) {
        Ok(()) => None,
        Err(e) => Some(err(
            &req.id,
            "store_write_failed",
            e.to_string(),
            Some(json!({ "file": collection.file })),
        )),
    }
}

fn required_id(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

fn param_str<'a>(req: &'a Request, key: &str) -> &'a str {
    req.params.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "count": 0, "teachers": [] }));
    };
    let teachers = store.load_records(store::TEACHERS);
    ok(&req.id, json!({ "count": teachers.len(), "teachers": teachers }))
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_id = match required_id(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record = Teacher {
        teacher_id: teacher_id.clone(),
        name: param_str(req, "name").to_string(),
        email: param_str(req, "email").to_string(),
        phone: param_str(req, "phone").to_string(),
    };
    if let Some(resp) = append_record(store, req, store::TEACHERS, json!(record)) {
        return resp;
    }
    ok(&req.id, json!({ "teacherId": teacher_id, "record": record }))
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "count": 0, "subjects": [] }));
    };
    let subjects = store.load_records(store::SUBJECTS);
    ok(&req.id, json!({ "count": subjects.len(), "subjects": subjects }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = match required_id(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record = Subject {
        subject_id: subject_id.clone(),
        subject_name: param_str(req, "subjectName").to_string(),
        subject_code: param_str(req, "subjectCode").to_string(),
        teacher_id: param_str(req, "teacherId").to_string(),
    };
    if let Some(resp) = append_record(store, req, store::SUBJECTS, json!(record)) {
        return resp;
    }
    ok(&req.id, json!({ "subjectId": subject_id, "record": record }))
}

fn handle_cameras_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "count": 0, "cameras": [] }));
    };
    let cameras = list_filtered(store, store::CAMERAS, "batch_id", param_str(req, "batchId"));
    ok(&req.id, json!({ "count": cameras.len(), "cameras": cameras }))
}

fn handle_cameras_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let camera_id = match required_id(req, "cameraId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record = Camera {
        camera_id: camera_id.clone(),
        camera_name: param_str(req, "cameraName").to_string(),
        name: String::new(),
        location: param_str(req, "location").to_string(),
        ip_address: param_str(req, "ipAddress").to_string(),
        batch_id: param_str(req, "batchId").to_string(),
        is_active: Some(
            req.params
                .get("isActive")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
        ),
    };
    if let Some(resp) = append_record(store, req, store::CAMERAS, json!(record)) {
        return resp;
    }
    ok(&req.id, json!({ "cameraId": camera_id, "record": record }))
}

fn handle_timetable_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "count": 0, "timetable": [] }));
    };
    let entries = list_filtered(
        store,
        store::TIMETABLE,
        "batch_id",
        param_str(req, "batchId"),
    );
    ok(&req.id, json!({ "count": entries.len(), "timetable": entries }))
}

fn handle_timetable_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let timetable_id = match required_id(req, "timetableId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record = TimetableEntry {
        timetable_id: timetable_id.clone(),
        batch_id: param_str(req, "batchId").to_string(),
        day: param_str(req, "day").to_string(),
        period: req
            .params
            .get("period")
            .and_then(|v| v.as_i64())
            .unwrap_or(0),
        start_time: param_str(req, "startTime").to_string(),
        end_time: param_str(req, "endTime").to_string(),
        subject_id: param_str(req, "subjectId").to_string(),
        teacher_id: param_str(req, "teacherId").to_string(),
        room: param_str(req, "room").to_string(),
    };
    if let Some(resp) = append_record(store, req, store::TIMETABLE, json!(record)) {
        return resp;
    }
    ok(
        &req.id,
        json!({ "timetableId": timetable_id, "record": record }),
    )
}

fn handle_camera_schedule_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ "count": 0, "cameraSchedule": [] }));
    };
    let schedule = list_filtered(
        store,
        store::CAMERA_SCHEDULE,
        "camera_id",
        param_str(req, "cameraId"),
    );
    ok(
        &req.id,
        json!({ "count": schedule.len(), "cameraSchedule": schedule }),
    )
}

fn handle_camera_schedule_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let schedule_id = match required_id(req, "scheduleId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record = CameraSchedule {
        schedule_id: schedule_id.clone(),
        camera_id: param_str(req, "cameraId").to_string(),
        timetable_id: param_str(req, "timetableId").to_string(),
        is_active: Some(
            req.params
                .get("isActive")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
        ),
    };
    if let Some(resp) = append_record(store, req, store::CAMERA_SCHEDULE, json!(record)) {
        return resp;
    }
    ok(&req.id, json!({ "scheduleId": schedule_id, "record": record }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "cameras.list" => Some(handle_cameras_list(state, req)),
        "cameras.create" => Some(handle_cameras_create(state, req)),
        "timetable.list" => Some(handle_timetable_list(state, req)),
        "timetable.create" => Some(handle_timetable_create(state, req)),
        "cameraSchedule.list" => Some(handle_camera_schedule_list(state, req)),
        "cameraSchedule.create" => Some(handle_camera_schedule_create(state, req)),
        _ => None,
    }
}
