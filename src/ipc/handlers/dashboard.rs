use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

// Count cards for the landing page. Zeroes when no workspace is selected so
// the dashboard can render before setup.
fn handle_dashboard_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return ok(
            &req.id,
            json!({
                "totalStudents": 0,
                "totalBatches": 0,
                "totalTeachers": 0,
                "totalCameras": 0,
                "totalAttendanceRecords": 0,
                "totalViolations": 0
            }),
        );
    };

    ok(
        &req.id,
        json!({
            "totalStudents": store.load_student_map().len(),
            "totalBatches": store.load_records(store::BATCHES).len(),
            "totalTeachers": store.load_records(store::TEACHERS).len(),
            "totalCameras": store.load_records(store::CAMERAS).len(),
            "totalAttendanceRecords": store.load_records(store::ATTENDANCE).len(),
            "totalViolations": store.load_records(store::VIOLATIONS).len()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(handle_dashboard_summary(state, req)),
        _ => None,
    }
}
