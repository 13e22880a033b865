//! `lariat_ffi` — C-ABI surface for the Lariat function analyzer.
//!
//! This crate exposes a stable C API (`extern "C"`, `#[no_mangle]`) so the
//! platform's non-Rust language hosts can call the analyzer without
//! depending on Rust tooling.
//!
//! # Design
//! Results cross the boundary as JSON documents in NUL-terminated strings.
//! Memory is always owned by the Lariat side: every string returned by
//! [`lariat_analyze`] must be released with [`lariat_string_free`].

use std::ffi::{CStr, CString, c_char};

use lariat_core::closure::{self, FunctionAnalysis, globals};
use lariat_core::error::LariatError;
use serde_json::json;

fn to_c_string(value: serde_json::Value) -> *mut c_char {
    let text = value.to_string();
    // A serde_json string contains no interior NUL.
    match CString::new(text) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

fn success_json(analysis: &FunctionAnalysis) -> serde_json::Value {
    json!({ "ok": true, "analysis": analysis })
}

/// Analyze a NUL-terminated function source string.
///
/// Returns a newly allocated JSON document:
/// - `{"ok": true, "analysis": …}` on success;
/// - `{"ok": false, "error": …, "analysis": …}` when an arrow captured
///   `this` (the analysis is still populated);
/// - `{"ok": false, "error": …}` for every other failure.
///
/// Returns a null pointer when `source` is null or not valid UTF-8.  The
/// returned string must be released with [`lariat_string_free`].
///
/// # Safety
/// - `source` must be null or a valid pointer to a NUL-terminated string
///   that stays alive for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lariat_analyze(source: *const c_char) -> *mut c_char {
    if source.is_null() {
        return std::ptr::null_mut();
    }
    // SAFETY: `source` is non-null and NUL-terminated per the contract.
    let Ok(source) = unsafe { CStr::from_ptr(source) }.to_str() else {
        return std::ptr::null_mut();
    };

    let value = match closure::analyze(source.trim(), globals::is_node_global) {
        Ok(analysis) => success_json(&analysis),
        Err(LariatError::ArrowCapturedThis(analysis)) => json!({
            "ok": false,
            "error": LariatError::ArrowCapturedThis(analysis.clone()).to_string(),
            "analysis": analysis,
        }),
        Err(other) => json!({ "ok": false, "error": other.to_string() }),
    };
    to_c_string(value)
}

/// Release a string previously returned by [`lariat_analyze`].
///
/// # Safety
/// - `ptr` must be null or a pointer returned by [`lariat_analyze`].
/// - `ptr` must not be used after this call.
/// - This function must not be called more than once for the same pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lariat_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: pointer was created by `CString::into_raw` above.
        drop(unsafe { CString::from_raw(ptr) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_to_value(source: &str) -> serde_json::Value {
        let c_source = CString::new(source).unwrap();
        let result = unsafe { lariat_analyze(c_source.as_ptr()) };
        assert!(!result.is_null());
        let text = unsafe { CStr::from_ptr(result) }
            .to_str()
            .unwrap()
            .to_owned();
        unsafe { lariat_string_free(result) };
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_analyze_success_roundtrip() {
        let value = analyze_to_value("x => x + y");
        assert_eq!(value["ok"], true);
        assert_eq!(value["analysis"]["normalized"]["is_arrow"], true);
        assert!(value["analysis"]["captures"]["required"]["y"].is_string());
    }

    #[test]
    fn test_analyze_error_reports_message() {
        let value = analyze_to_value("[Function: bound]");
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"], "the function form was not understood.");
    }

    #[test]
    fn test_arrow_this_carries_analysis() {
        let value = analyze_to_value("() => this.foo");
        assert_eq!(value["ok"], false);
        assert!(value["analysis"]["captures"]["required"]["this"].is_object());
    }

    #[test]
    fn test_null_source_returns_null() {
        let result = unsafe { lariat_analyze(std::ptr::null()) };
        assert!(result.is_null());
    }
}
