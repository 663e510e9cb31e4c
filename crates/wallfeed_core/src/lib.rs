/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::ffi::{c_char, CString};

mod ffi;
pub mod graph;
pub mod net_metrics;
pub mod publish;
pub mod runtime;
pub mod session;
pub mod ui_events;
pub mod wall_db;
pub mod wall_sync;

#[no_mangle]
pub extern "C" fn wallfeed_core_version() -> *mut c_char {
    CString::new(env!("CARGO_PKG_VERSION"))
        .expect("version is valid CString")
        .into_raw()
}

#[no_mangle]
pub extern "C" fn wallfeed_core_string_free(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr));
    }
}
