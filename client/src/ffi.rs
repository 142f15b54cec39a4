//! C ABI over the two bridges. Handles and result ids cross the boundary as
//! `f64`. Returned strings stay valid until the next string-returning call
//! on the same thread.

use std::{
    cell::RefCell,
    ffi::{c_char, CStr, CString},
    slice,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use log::warn;

use roomlink_shared::{Handle, ResultId};

use crate::{
    BridgeConfig, CallbackBridge, HostCallback, OutcomeCallbacks, PollBridge, SessionLibrary,
};

/// A host function receiving a result id.
pub type CCallback = extern "C" fn(f64);

static POLL: OnceLock<Mutex<PollBridge>> = OnceLock::new();
static CALLBACK: OnceLock<CallbackBridge> = OnceLock::new();

thread_local! {
    static RETURNED: RefCell<CString> = RefCell::new(CString::default());
}

/// Installs the session library both bridges drive. Only the first call has
/// any effect; later calls return false.
pub fn install(library: Arc<dyn SessionLibrary>, config: BridgeConfig) -> bool {
    let poll = POLL
        .set(Mutex::new(PollBridge::with_config(library.clone(), config.clone())))
        .is_ok();
    let callback = CALLBACK
        .set(CallbackBridge::with_config(library, config))
        .is_ok();
    poll && callback
}

fn poll_bridge() -> Option<MutexGuard<'static, PollBridge>> {
    let Some(bridge) = POLL.get() else {
        warn!("roomlink bridge used before install");
        return None;
    };
    Some(bridge.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
}

fn callback_bridge() -> Option<&'static CallbackBridge> {
    let bridge = CALLBACK.get();
    if bridge.is_none() {
        warn!("roomlink bridge used before install");
    }
    bridge
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn read_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// # Safety
/// `ptr` must be null or valid for reads of `length` bytes.
unsafe fn read_bytes(ptr: *const u8, length: usize) -> Vec<u8> {
    if ptr.is_null() || length == 0 {
        return Vec::new();
    }
    slice::from_raw_parts(ptr, length).to_vec()
}

fn return_str(value: String) -> *const c_char {
    let value = CString::new(value).unwrap_or_else(|err| {
        let nul = err.nul_position();
        let mut bytes = err.into_vec();
        bytes.truncate(nul);
        CString::new(bytes).unwrap_or_default()
    });
    RETURNED.with(|slot| {
        *slot.borrow_mut() = value;
        slot.borrow().as_ptr()
    })
}

fn host_callback(callback: CCallback) -> HostCallback {
    Arc::new(move |result: ResultId| callback(result.to_f64()))
}

fn outcome_callbacks(on_success: CCallback, on_error: CCallback) -> OutcomeCallbacks {
    OutcomeCallbacks::new(host_callback(on_success), host_callback(on_error))
}

// Poll bridge

/// # Safety
/// `endpoint` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_create_client(endpoint: *const c_char, secure: bool) -> f64 {
    let endpoint = read_str(endpoint);
    poll_bridge()
        .map(|bridge| bridge.create_client(&endpoint, secure))
        .unwrap_or(Handle::NONE)
        .to_f64()
}

#[no_mangle]
pub extern "C" fn roomlink_get_endpoint(client: f64) -> *const c_char {
    let endpoint = poll_bridge()
        .map(|bridge| bridge.get_endpoint(Handle::from_f64(client)))
        .unwrap_or_default();
    return_str(endpoint)
}

/// # Safety
/// `name` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_join_or_create(
    client: f64,
    name: *const c_char,
    options: *const c_char,
) -> f64 {
    let (name, options) = (read_str(name), read_str(options));
    poll_bridge()
        .map(|bridge| bridge.join_or_create(Handle::from_f64(client), &name, &options))
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `name` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_create(
    client: f64,
    name: *const c_char,
    options: *const c_char,
) -> f64 {
    let (name, options) = (read_str(name), read_str(options));
    poll_bridge()
        .map(|bridge| bridge.create(Handle::from_f64(client), &name, &options))
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `name` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_join(
    client: f64,
    name: *const c_char,
    options: *const c_char,
) -> f64 {
    let (name, options) = (read_str(name), read_str(options));
    poll_bridge()
        .map(|bridge| bridge.join(Handle::from_f64(client), &name, &options))
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `room_id` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_join_by_id(
    client: f64,
    room_id: *const c_char,
    options: *const c_char,
) -> f64 {
    let (room_id, options) = (read_str(room_id), read_str(options));
    poll_bridge()
        .map(|bridge| bridge.join_by_id(Handle::from_f64(client), &room_id, &options))
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `token` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_reconnect(client: f64, token: *const c_char) -> f64 {
    let token = read_str(token);
    poll_bridge()
        .map(|bridge| bridge.reconnect(Handle::from_f64(client), &token))
        .unwrap_or(Handle::NONE)
        .to_f64()
}

#[no_mangle]
pub extern "C" fn roomlink_poll_event() -> u8 {
    poll_bridge()
        .map(|mut bridge| bridge.poll_event().code())
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_event_room() -> f64 {
    poll_bridge()
        .map(|bridge| bridge.event_room())
        .unwrap_or(Handle::NONE)
        .to_f64()
}

#[no_mangle]
pub extern "C" fn roomlink_event_code() -> i32 {
    poll_bridge()
        .map(|bridge| bridge.event_code())
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_event_message() -> *const c_char {
    let message = poll_bridge()
        .map(|bridge| bridge.event_message().to_string())
        .unwrap_or_default();
    return_str(message)
}

/// Copies up to `capacity` bytes of the current event's data into `out` and
/// returns the number copied.
///
/// # Safety
/// `out` must be null or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn roomlink_event_data(out: *mut u8, capacity: usize) -> usize {
    let Some(bridge) = poll_bridge() else {
        return 0;
    };
    copy_into(bridge.event_data(), out, capacity)
}

/// # Safety
/// `out` must be null or valid for writes of `capacity` bytes.
unsafe fn copy_into(data: &[u8], out: *mut u8, capacity: usize) -> usize {
    if out.is_null() {
        return 0;
    }
    let count = data.len().min(capacity);
    slice::from_raw_parts_mut(out, count).copy_from_slice(&data[..count]);
    count
}

#[no_mangle]
pub extern "C" fn roomlink_event_data_length() -> usize {
    poll_bridge()
        .map(|bridge| bridge.event_data_length())
        .unwrap_or_default()
}

/// # Safety
/// `kind` and `data` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_send(
    room: f64,
    kind: *const c_char,
    data: *const c_char,
) -> bool {
    let (kind, data) = (read_str(kind), read_str(data));
    poll_bridge()
        .map(|bridge| bridge.send(Handle::from_f64(room), &kind, &data))
        .unwrap_or_default()
}

/// # Safety
/// `data` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_send_int(room: f64, kind: i32, data: *const c_char) -> bool {
    let data = read_str(data);
    poll_bridge()
        .map(|bridge| bridge.send_int(Handle::from_f64(room), kind, &data))
        .unwrap_or_default()
}

/// # Safety
/// `kind` must be null or a NUL-terminated string. `data` must be null or
/// valid for reads of `length` bytes.
#[no_mangle]
pub unsafe extern "C" fn roomlink_send_bytes(
    room: f64,
    kind: *const c_char,
    data: *const u8,
    length: usize,
) -> bool {
    let kind = read_str(kind);
    let data = read_bytes(data, length);
    poll_bridge()
        .map(|bridge| bridge.send_bytes(Handle::from_f64(room), &kind, &data))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_leave(room: f64) -> bool {
    poll_bridge()
        .map(|bridge| bridge.leave(Handle::from_f64(room)))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_free(handle: f64) {
    if let Some(bridge) = poll_bridge() {
        bridge.free(Handle::from_f64(handle));
    }
}

#[no_mangle]
pub extern "C" fn roomlink_room_id(room: f64) -> *const c_char {
    let id = poll_bridge()
        .map(|bridge| bridge.room_id(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(id)
}

#[no_mangle]
pub extern "C" fn roomlink_session_id(room: f64) -> *const c_char {
    let id = poll_bridge()
        .map(|bridge| bridge.session_id(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(id)
}

#[no_mangle]
pub extern "C" fn roomlink_has_joined(room: f64) -> bool {
    poll_bridge()
        .map(|bridge| bridge.has_joined(Handle::from_f64(room)))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_room_name(room: f64) -> *const c_char {
    let name = poll_bridge()
        .map(|bridge| bridge.room_name(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(name)
}

#[no_mangle]
pub extern "C" fn roomlink_reconnection_token(room: f64) -> *const c_char {
    let token = poll_bridge()
        .map(|bridge| bridge.reconnection_token(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(token)
}

// Callback bridge

/// # Safety
/// `endpoint` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_create_client(endpoint: *const c_char, secure: bool) -> f64 {
    let endpoint = read_str(endpoint);
    callback_bridge()
        .map(|bridge| bridge.create_client(&endpoint, secure))
        .unwrap_or(Handle::NONE)
        .to_f64()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_get_endpoint(client: f64) -> *const c_char {
    let endpoint = callback_bridge()
        .map(|bridge| bridge.get_endpoint(Handle::from_f64(client)))
        .unwrap_or_default();
    return_str(endpoint)
}

#[no_mangle]
pub extern "C" fn roomlink_cb_get_result(result: f64) -> *const c_char {
    let json = callback_bridge()
        .map(|bridge| bridge.get_result(ResultId::from(result as u64)))
        .unwrap_or_else(|| "null".to_string());
    return_str(json)
}

/// # Safety
/// `name` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_join_or_create(
    client: f64,
    name: *const c_char,
    options: *const c_char,
    on_success: CCallback,
    on_error: CCallback,
) -> f64 {
    let (name, options) = (read_str(name), read_str(options));
    callback_bridge()
        .map(|bridge| {
            bridge.join_or_create(
                Handle::from_f64(client),
                &name,
                &options,
                outcome_callbacks(on_success, on_error),
            )
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `name` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_join(
    client: f64,
    name: *const c_char,
    options: *const c_char,
    on_success: CCallback,
    on_error: CCallback,
) -> f64 {
    let (name, options) = (read_str(name), read_str(options));
    callback_bridge()
        .map(|bridge| {
            bridge.join(
                Handle::from_f64(client),
                &name,
                &options,
                outcome_callbacks(on_success, on_error),
            )
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `name` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_create(
    client: f64,
    name: *const c_char,
    options: *const c_char,
    on_success: CCallback,
    on_error: CCallback,
) -> f64 {
    let (name, options) = (read_str(name), read_str(options));
    callback_bridge()
        .map(|bridge| {
            bridge.create(
                Handle::from_f64(client),
                &name,
                &options,
                outcome_callbacks(on_success, on_error),
            )
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `room_id` and `options` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_join_by_id(
    client: f64,
    room_id: *const c_char,
    options: *const c_char,
    on_success: CCallback,
    on_error: CCallback,
) -> f64 {
    let (room_id, options) = (read_str(room_id), read_str(options));
    callback_bridge()
        .map(|bridge| {
            bridge.join_by_id(
                Handle::from_f64(client),
                &room_id,
                &options,
                outcome_callbacks(on_success, on_error),
            )
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `token` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_reconnect(
    client: f64,
    token: *const c_char,
    on_success: CCallback,
    on_error: CCallback,
) -> f64 {
    let token = read_str(token);
    callback_bridge()
        .map(|bridge| {
            bridge.reconnect(
                Handle::from_f64(client),
                &token,
                outcome_callbacks(on_success, on_error),
            )
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_on_state_change(room: f64, callback: CCallback) -> bool {
    callback_bridge()
        .map(|bridge| bridge.set_on_state_change(Handle::from_f64(room), host_callback(callback)))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_on_message(room: f64, callback: CCallback) -> bool {
    callback_bridge()
        .map(|bridge| bridge.set_on_message(Handle::from_f64(room), host_callback(callback)))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_on_leave(room: f64, callback: CCallback) -> bool {
    callback_bridge()
        .map(|bridge| bridge.set_on_leave(Handle::from_f64(room), host_callback(callback)))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_on_error(room: f64, callback: CCallback) -> bool {
    callback_bridge()
        .map(|bridge| bridge.set_on_error(Handle::from_f64(room), host_callback(callback)))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_setup_raw_changes(room: f64, callback: CCallback) -> bool {
    callback_bridge()
        .map(|bridge| bridge.setup_raw_changes(Handle::from_f64(room), host_callback(callback)))
        .unwrap_or_default()
}

/// Returns the listener handle, or `Handle::NONE` as `f64` if it could not attach.
///
/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_listen(
    room: f64,
    path: *const c_char,
    callback: CCallback,
) -> f64 {
    let path = read_str(path);
    callback_bridge()
        .and_then(|bridge| {
            bridge
                .listen(Handle::from_f64(room), &path, host_callback(callback))
                .ok()
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `property` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_listen_entity(
    room: f64,
    ref_id: u32,
    property: *const c_char,
    callback: CCallback,
) -> f64 {
    let property = read_str(property);
    callback_bridge()
        .and_then(|bridge| {
            bridge
                .listen_entity(Handle::from_f64(room), ref_id, &property, host_callback(callback))
                .ok()
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_on_add(
    room: f64,
    path: *const c_char,
    callback: CCallback,
) -> f64 {
    let path = read_str(path);
    callback_bridge()
        .and_then(|bridge| {
            bridge
                .on_add(Handle::from_f64(room), &path, host_callback(callback))
                .ok()
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_on_remove(
    room: f64,
    path: *const c_char,
    callback: CCallback,
) -> f64 {
    let path = read_str(path);
    callback_bridge()
        .and_then(|bridge| {
            bridge
                .on_remove(Handle::from_f64(room), &path, host_callback(callback))
                .ok()
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_on_add_entity(
    room: f64,
    ref_id: u32,
    path: *const c_char,
    callback: CCallback,
) -> f64 {
    let path = read_str(path);
    callback_bridge()
        .and_then(|bridge| {
            bridge
                .on_add_entity(Handle::from_f64(room), ref_id, &path, host_callback(callback))
                .ok()
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_on_remove_entity(
    room: f64,
    ref_id: u32,
    path: *const c_char,
    callback: CCallback,
) -> f64 {
    let path = read_str(path);
    callback_bridge()
        .and_then(|bridge| {
            bridge
                .on_remove_entity(Handle::from_f64(room), ref_id, &path, host_callback(callback))
                .ok()
        })
        .unwrap_or(Handle::NONE)
        .to_f64()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_remove_listener(listener: f64) -> bool {
    callback_bridge()
        .map(|bridge| bridge.remove_listener(Handle::from_f64(listener)))
        .unwrap_or_default()
}

/// # Safety
/// `kind` and `data_json` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_send(
    room: f64,
    kind: *const c_char,
    data_json: *const c_char,
) -> bool {
    let (kind, data_json) = (read_str(kind), read_str(data_json));
    callback_bridge()
        .map(|bridge| bridge.send(Handle::from_f64(room), &kind, &data_json))
        .unwrap_or_default()
}

/// # Safety
/// `data_json` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn roomlink_cb_send_int(
    room: f64,
    kind: i32,
    data_json: *const c_char,
) -> bool {
    let data_json = read_str(data_json);
    callback_bridge()
        .map(|bridge| bridge.send_int(Handle::from_f64(room), kind, &data_json))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_leave(room: f64, consented: bool) -> bool {
    callback_bridge()
        .map(|bridge| bridge.leave(Handle::from_f64(room), consented))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_room_id(room: f64) -> *const c_char {
    let id = callback_bridge()
        .map(|bridge| bridge.room_id(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(id)
}

#[no_mangle]
pub extern "C" fn roomlink_cb_session_id(room: f64) -> *const c_char {
    let id = callback_bridge()
        .map(|bridge| bridge.session_id(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(id)
}

#[no_mangle]
pub extern "C" fn roomlink_cb_room_name(room: f64) -> *const c_char {
    let name = callback_bridge()
        .map(|bridge| bridge.room_name(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(name)
}

#[no_mangle]
pub extern "C" fn roomlink_cb_has_joined(room: f64) -> bool {
    callback_bridge()
        .map(|bridge| bridge.has_joined(Handle::from_f64(room)))
        .unwrap_or_default()
}

#[no_mangle]
pub extern "C" fn roomlink_cb_reconnection_token(room: f64) -> *const c_char {
    let token = callback_bridge()
        .map(|bridge| bridge.reconnection_token(Handle::from_f64(room)))
        .unwrap_or_default();
    return_str(token)
}

#[no_mangle]
pub extern "C" fn roomlink_cb_get_state(room: f64) -> *const c_char {
    let state = callback_bridge()
        .map(|bridge| bridge.get_state(Handle::from_f64(room)))
        .unwrap_or_else(|| "{}".to_string());
    return_str(state)
}

#[no_mangle]
pub extern "C" fn roomlink_cb_dispose_room(room: f64) {
    if let Some(bridge) = callback_bridge() {
        bridge.dispose_room(Handle::from_f64(room));
    }
}

#[no_mangle]
pub extern "C" fn roomlink_cb_dispose_client(client: f64) {
    if let Some(bridge) = callback_bridge() {
        bridge.dispose_client(Handle::from_f64(client));
    }
}
