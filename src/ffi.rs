//! FFI interface for a presentation host
//!
//! Requests and results cross the boundary as JSON strings. Every string
//! handed out is owned by Rust and must be returned through
//! `free_collect_result`.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ops::ControlFlow;
use std::ptr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CollectorConfig;
use crate::error::{CollectError, Result};
use crate::pipeline::{CollectQuery, Collector, ProgressEvent, RunSummary};
use crate::region::{City, RegionIndex};
use crate::source::RemoteSource;
use crate::table::RecordTable;

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via free_collect_result
#[repr(C)]
pub struct CollectResultFFI {
    /// JSON-serialized result (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if the call failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Receives one JSON progress event per call; the string is only valid for
/// the duration of the call. A non-zero return cancels the run: complexes
/// already in flight finish, and the result carries `"cancelled": true`.
pub type ProgressCallback =
    Option<unsafe extern "C" fn(event_json: *const c_char, user_data: *mut c_void) -> c_int>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectRequest {
    dataset_path: String,
    #[serde(flatten)]
    query: CollectQuery,
    #[serde(default)]
    config: CollectorConfig,
}

#[derive(Debug, Serialize)]
struct CollectResponse {
    table: RecordTable,
    summary: RunSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionsRequest {
    dataset_path: String,
}

#[derive(Debug, Serialize)]
struct RegionsResponse<'a> {
    cities: &'a [City],
}

/// Install a stderr `tracing` subscriber, filtered by `RUST_LOG`
/// (default `housing_collector=info`). Later calls are no-ops.
#[no_mangle]
pub extern "C" fn housing_init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("housing_collector=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run one collection.
///
/// # Arguments
/// * `request_json` - `{"datasetPath", "city", "district"?, "subDistrict"?, "config"?}`
///
/// # Returns
/// CollectResultFFI with `{"table", "summary"}` in json_ptr, or error_ptr set
/// when the dataset or region could not be resolved
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_collect_result`
#[no_mangle]
pub unsafe extern "C" fn collect_complexes_ffi(request_json: *const c_char) -> CollectResultFFI {
    collect_complexes_with_progress_ffi(request_json, None, ptr::null_mut())
}

/// Same as `collect_complexes_ffi`, reporting progress through `callback`,
/// which may also cancel the run.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string
/// - `callback`, when set, is invoked on the calling thread with `user_data`
/// - Caller must free the result via `free_collect_result`
#[no_mangle]
pub unsafe extern "C" fn collect_complexes_with_progress_ffi(
    request_json: *const c_char,
    callback: ProgressCallback,
    user_data: *mut c_void,
) -> CollectResultFFI {
    let request_str = match read_c_str(request_json, "Request JSON") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };

    match collect_json(request_str, callback_notifier(callback, user_data)) {
        Ok(json) => make_json_result(json),
        Err(msg) => make_error_result(&msg),
    }
}

/// List the region dataset for selection widgets.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string (`{"datasetPath"}`)
/// - Caller must free the result via `free_collect_result`
#[no_mangle]
pub unsafe extern "C" fn list_regions_ffi(request_json: *const c_char) -> CollectResultFFI {
    let request_str = match read_c_str(request_json, "Request JSON") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };
    match regions_json(request_str) {
        Ok(json) => make_json_result(json),
        Err(msg) => make_error_result(&msg),
    }
}

/// Free a CollectResultFFI returned by any function of this module
///
/// # Safety
/// - `result` must have been returned by this module
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_collect_result(result: CollectResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_c_str<'a>(raw: *const c_char, what: &str) -> std::result::Result<&'a str, String> {
    if raw.is_null() {
        return Err(format!("{what} is null"));
    }
    CStr::from_ptr(raw)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 in {what}"))
}

/// Adapt a host callback to a progress handler; `Break` requests cancellation.
///
/// # Safety
/// `callback` must stay callable with `user_data` for the handler's lifetime.
unsafe fn callback_notifier(
    callback: ProgressCallback,
    user_data: *mut c_void,
) -> impl FnMut(&ProgressEvent) -> ControlFlow<()> {
    move |event: &ProgressEvent| {
        let Some(cb) = callback else {
            return ControlFlow::Continue(());
        };
        let payload = serde_json::json!({ "label": event.label(), "event": event });
        let Ok(cstr) = CString::new(payload.to_string()) else {
            return ControlFlow::Continue(());
        };
        if unsafe { cb(cstr.as_ptr(), user_data) } != 0 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

fn collect_json(
    request_str: &str,
    notify: impl FnMut(&ProgressEvent) -> ControlFlow<()>,
) -> std::result::Result<String, String> {
    let request: CollectRequest = serde_json::from_str(request_str)
        .map_err(|e| format!("Failed to parse request JSON: {e}"))?;
    let response = run_collect(request, notify).map_err(|e| e.to_string())?;
    serde_json::to_string(&response).map_err(|e| format!("Failed to serialize result: {e}"))
}

fn regions_json(request_str: &str) -> std::result::Result<String, String> {
    let request: RegionsRequest = serde_json::from_str(request_str)
        .map_err(|e| format!("Failed to parse request JSON: {e}"))?;
    let regions = RegionIndex::load(&request.dataset_path).map_err(|e| e.to_string())?;
    serde_json::to_string(&RegionsResponse {
        cities: regions.cities(),
    })
    .map_err(|e| format!("Failed to serialize result: {e}"))
}

fn run_collect(
    request: CollectRequest,
    notify: impl FnMut(&ProgressEvent) -> ControlFlow<()>,
) -> Result<CollectResponse> {
    let regions = Arc::new(RegionIndex::load(&request.dataset_path)?);
    let attribute_columns = request.config.profile.attribute_whitelist.clone();
    let collector = Collector::http(regions, request.config)?;
    drive(&collector, &request.query, &attribute_columns, notify)
}

/// Run `collector` to completion on a fresh runtime, feeding progress to
/// `notify` on the calling thread.
fn drive<S: RemoteSource>(
    collector: &Collector<S>,
    query: &CollectQuery,
    attribute_columns: &[String],
    mut notify: impl FnMut(&ProgressEvent) -> ControlFlow<()>,
) -> Result<CollectResponse> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CollectError::Runtime(e.to_string()))?;

    let (tx, mut rx) = unbounded_channel();
    let cancel = CancellationToken::new();

    let report = runtime.block_on(async {
        let run = collector.run_with(query, Some(&tx), &cancel);
        tokio::pin!(run);
        let report = loop {
            tokio::select! {
                biased;
                Some(event) = rx.recv() => {
                    if notify(&event).is_break() && !cancel.is_cancelled() {
                        info!("Cancellation requested by host");
                        cancel.cancel();
                    }
                }
                result = &mut run => break result,
            }
        };
        // run is over; late answers can no longer cancel anything
        while let Ok(event) = rx.try_recv() {
            let _ = notify(&event);
        }
        report
    })?;

    let table = RecordTable::with_attribute_columns(&report.records, attribute_columns);
    info!(rows = table.len(), skipped = report.skipped_count(), "Collection result ready");
    Ok(CollectResponse {
        table,
        summary: report.summary(),
    })
}

fn make_json_result(json: String) -> CollectResultFFI {
    match CString::new(json) {
        Ok(cstr) => CollectResultFFI {
            json_ptr: cstr.into_raw(),
            error_ptr: ptr::null_mut(),
        },
        Err(_) => make_error_result("Result JSON contains null bytes"),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> CollectResultFFI {
    let error_cstr = CString::new(msg.replace('\0', "")).unwrap_or_default();
    CollectResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSource;
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;

    const DATASET: &str = r#"[{"si_do_name": "서울시", "sigungu": [
        {"sigungu_name": "강남구", "sigungu_code": "11680", "eup_myeon_dong": [
            {"code": "1168010100", "name": "역삼동"}
        ]}
    ]}]"#;

    fn dataset_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DATASET.as_bytes()).unwrap();
        file
    }

    fn request(path: &str, city: &str, sub_district: &str) -> String {
        serde_json::json!({
            "datasetPath": path,
            "city": city,
            "district": "강남구",
            "subDistrict": sub_district,
        })
        .to_string()
    }

    unsafe fn take(result: CollectResultFFI) -> (Option<String>, Option<String>) {
        let json = (!result.json_ptr.is_null())
            .then(|| CStr::from_ptr(result.json_ptr).to_string_lossy().into_owned());
        let error = (!result.error_ptr.is_null())
            .then(|| CStr::from_ptr(result.error_ptr).to_string_lossy().into_owned());
        free_collect_result(result);
        (json, error)
    }

    #[test]
    fn test_unmatched_sub_district_gives_empty_table() {
        // no sub-district matches, so no remote call is made
        let file = dataset_file();
        let path = file.path().to_string_lossy().into_owned();
        let json = collect_json(&request(&path, "서울시", "없는동"), |_| ControlFlow::Continue(())).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["table"]["rows"].as_array().map(Vec::len), Some(0));
        assert_eq!(value["table"]["columns"][0], "cityName");
        assert_eq!(value["summary"]["records"], 0);
        assert_eq!(value["summary"]["cancelled"], false);
        assert_eq!(value["summary"]["stage"]["stage"], "done");
    }

    #[test]
    fn test_unknown_city_is_an_error() {
        let file = dataset_file();
        let path = file.path().to_string_lossy().into_owned();
        let err = collect_json(&request(&path, "부산시", "전체"), |_| ControlFlow::Continue(())).unwrap_err();
        assert!(err.contains("region not found"), "{err}");
    }

    #[test]
    fn test_missing_dataset_through_c_abi() {
        let req = CString::new(request("/nonexistent/regions.json", "서울시", "전체")).unwrap();
        let (json, error) = unsafe { take(collect_complexes_ffi(req.as_ptr())) };
        assert!(json.is_none());
        assert!(error.unwrap().contains("/nonexistent/regions.json"));
    }

    #[test]
    fn test_null_and_malformed_requests() {
        let (_, error) = unsafe { take(collect_complexes_ffi(ptr::null())) };
        assert_eq!(error.as_deref(), Some("Request JSON is null"));

        let req = CString::new("{not json").unwrap();
        let (_, error) = unsafe { take(list_regions_ffi(req.as_ptr())) };
        assert!(error.unwrap().starts_with("Failed to parse request JSON"));
    }

    #[test]
    fn test_list_regions() {
        let file = dataset_file();
        let req = CString::new(
            serde_json::json!({ "datasetPath": file.path().to_string_lossy() }).to_string(),
        )
        .unwrap();
        let (json, error) = unsafe { take(list_regions_ffi(req.as_ptr())) };
        assert!(error.is_none());

        let value: serde_json::Value = serde_json::from_str(&json.unwrap()).unwrap();
        let city = &value["cities"][0];
        assert_eq!(city["cityName"], "서울시");
        assert_eq!(city["districts"][0]["districtCode"], "11680");
        assert_eq!(city["districts"][0]["subDistricts"][0]["name"], "역삼동");
    }

    fn two_sub_district_collector() -> Collector<MockSource> {
        let dataset = r#"[{"cityName": "서울시", "districts": [
            {"districtName": "강남구", "subDistricts": [
                {"code": "1168010100", "name": "역삼동"},
                {"code": "1168010300", "name": "개포동"}
            ]}
        ]}]"#;
        let listing = r#"<ul><li class="ComplexArticleItem_item__a">
            <span class="ComplexArticleItem_name__a">unit</span>
            <span class="ComplexArticleItem_price__a">5억</span>
        </li></ul>"#;
        // complex 11 is slow so the host's answer lands while it is in flight
        let mock = MockSource::new()
            .with_index(
                "1168010100",
                json!({"complexList": [{"complexNo": "10"}, {"complexNo": "11"}]}),
            )
            .with_index("1168010300", json!({"complexList": [{"complexNo": "20"}]}))
            .with_listings("10", listing)
            .with_listings("11", listing)
            .with_delay("11", Duration::from_millis(50))
            .with_listings("20", listing);
        let regions = Arc::new(RegionIndex::from_json(dataset).unwrap());
        Collector::new(regions, mock, CollectorConfig::default())
    }

    #[test]
    fn test_host_can_cancel_through_progress() {
        let collector = two_sub_district_collector();
        let query = CollectQuery::new("서울시").with_district("강남구");
        let columns = vec!["공급면적".to_string()];

        let mut seen = 0;
        let response = drive(&collector, &query, &columns, |_| {
            seen += 1;
            ControlFlow::Break(())
        })
        .unwrap();

        assert!(response.summary.cancelled);
        assert_eq!(response.table.len(), 2);
        assert!(seen >= 1);
        assert!(!collector.source().calls().contains(&"index:1168010300".to_string()));
    }

    #[test]
    fn test_run_without_cancellation_covers_everything() {
        let collector = two_sub_district_collector();
        let query = CollectQuery::new("서울시").with_district("강남구");
        let columns = vec!["공급면적".to_string()];

        let mut labels = Vec::new();
        let response = drive(&collector, &query, &columns, |event| {
            labels.push(event.label());
            ControlFlow::Continue(())
        })
        .unwrap();

        assert!(!response.summary.cancelled);
        assert_eq!(response.table.len(), 3);
        assert_eq!(response.summary.sub_districts_processed, 2);
        // three complexes and two sub-districts
        assert_eq!(labels.len(), 5);
    }

    unsafe extern "C" fn record_and_stop(event_json: *const c_char, user_data: *mut c_void) -> c_int {
        let seen = &mut *(user_data as *mut Vec<String>);
        seen.push(CStr::from_ptr(event_json).to_string_lossy().into_owned());
        1
    }

    #[test]
    fn test_callback_notifier_forwards_json_and_stop_request() {
        let mut seen: Vec<String> = Vec::new();
        let event = ProgressEvent::SubDistrictProcessed {
            code: "1168010100".into(),
            name: "역삼동".into(),
            position: 1,
            total: 2,
            records: 3,
        };

        let flow = unsafe {
            let mut notify =
                callback_notifier(Some(record_and_stop), &mut seen as *mut Vec<String> as *mut c_void);
            notify(&event)
        };
        assert!(flow.is_break());
        let value: serde_json::Value = serde_json::from_str(&seen[0]).unwrap();
        assert_eq!(value["label"], "역삼동 (1168010100) - 수집완료 [1/2]");
        assert_eq!(value["event"]["event"], "subDistrictProcessed");

        let mut silent = unsafe { callback_notifier(None, ptr::null_mut()) };
        assert!(silent(&event).is_continue());
    }

    #[test]
    fn test_error_message_with_nul_byte() {
        let (_, error) = unsafe { take(make_error_result("bad\0message")) };
        assert_eq!(error.as_deref(), Some("badmessage"));
    }
}
