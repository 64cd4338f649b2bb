//! [`Transport`] backed by the vendor's `libdhnetsdk`.
//!
//! The SDK calls back on its own threads with a handle and an integer user
//! word. Handlers are kept in process-wide registries keyed by handle, so the
//! user word is never cast back into a Rust reference.

use super::{LoginHandle, LoginReply, StreamHandle, StreamVariant, Transport};
use crate::bridge::{ConnectionEvent, ConnectionEvents, DataHandler};
use crate::commands::Credentials;
use crate::constants::{EM_LOGIN_SPEC_CAP_TCP, REALDATA_FLAG_RAW_DATA};
use crate::error::{DHStreamError, Result};
use dashmap::DashMap;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

// LLONG and LDWORD are pointer sized in every SDK build (INT64 on Win64, long elsewhere).
#[cfg(target_pointer_width = "64")]
type Llong = i64;
#[cfg(target_pointer_width = "64")]
type Ldword = u64;
#[cfg(target_pointer_width = "32")]
type Llong = i32;
#[cfg(target_pointer_width = "32")]
type Ldword = u32;
type Bool = c_int;

// CALLBACK and CALL_METHOD are __stdcall on Win32, "system" is "C" everywhere else.
type DisconnectCallback = Option<extern "system" fn(Llong, *mut c_char, c_int, Ldword)>;
type ReconnectCallback = Option<extern "system" fn(Llong, *mut c_char, c_int, Ldword)>;
type RealDataCallbackEx2 = Option<extern "system" fn(Llong, u32, *mut u8, u32, Llong, Ldword)>;

#[repr(C)]
#[allow(dead_code)]
struct NetDeviceInfoEx {
    serial_number: [u8; 48],
    alarm_in_port_num: c_int,
    alarm_out_port_num: c_int,
    disk_num: c_int,
    dvr_type: c_int,
    chan_num: c_int,
    limit_login_time: u8,
    left_log_times: u8,
    reserved: [u8; 2],
    lock_left_time: c_int,
    reserved_tail: [c_char; 24],
}

#[repr(C)]
#[allow(dead_code)]
struct NetInLoginWithHighLevelSecurity {
    size: u32,
    ip: [c_char; 64],
    port: c_int,
    user_name: [c_char; 64],
    password: [c_char; 64],
    spec_cap: c_int,
    reserved: [u8; 4],
    cap_param: *mut c_void,
}

#[repr(C)]
#[allow(dead_code)]
struct NetOutLoginWithHighLevelSecurity {
    size: u32,
    device_info: NetDeviceInfoEx,
    error: c_int,
    reserved: [u8; 132],
}

#[link(name = "dhnetsdk")]
unsafe extern "system" {
    fn CLIENT_Init(cb_disconnect: DisconnectCallback, user: Ldword) -> Bool;
    fn CLIENT_Cleanup();
    fn CLIENT_SetAutoReconnect(cb_reconnect: ReconnectCallback, user: Ldword);
    fn CLIENT_GetLastError() -> u32;
    fn CLIENT_LoginWithHighLevelSecurity(
        in_param: *mut NetInLoginWithHighLevelSecurity,
        out_param: *mut NetOutLoginWithHighLevelSecurity,
    ) -> Llong;
    fn CLIENT_Logout(login_id: Llong) -> Bool;
    fn CLIENT_RealPlayEx(login_id: Llong, channel: c_int, hwnd: *mut c_void, rtype: c_int)
    -> Llong;
    fn CLIENT_SetRealDataCallBackEx2(
        real_handle: Llong,
        cb_real_data: RealDataCallbackEx2,
        user: Ldword,
        flag: u32,
    ) -> Bool;
    fn CLIENT_StopRealPlayEx(real_handle: Llong) -> Bool;
}

static DATA_HANDLERS: LazyLock<DashMap<StreamHandle, Arc<dyn DataHandler>>> =
    LazyLock::new(DashMap::new);
static CONNECTION_EVENTS: RwLock<Option<Arc<dyn ConnectionEvents>>> = RwLock::new(None);

/// Copy `value` into a zeroed, NUL terminated C field. Callers validate length first.
fn c_field<const N: usize>(value: &str) -> [c_char; N] {
    let mut field = [0 as c_char; N];
    for (dst, src) in field.iter_mut().zip(value.bytes().take(N - 1)) {
        *dst = src as c_char;
    }
    field
}

fn event_from_raw(login: Llong, address: *mut c_char, port: c_int) -> ConnectionEvent {
    let address = if address.is_null() {
        String::new()
    } else {
        // SAFETY: the SDK passes a NUL terminated string valid for the callback.
        unsafe { CStr::from_ptr(address) }.to_string_lossy().into_owned()
    };
    ConnectionEvent::new(LoginHandle::from_raw(login as i64), address, port)
}

fn connection_events() -> Option<Arc<dyn ConnectionEvents>> {
    CONNECTION_EVENTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

extern "system" fn on_disconnect(login: Llong, address: *mut c_char, port: c_int, _user: Ldword) {
    if let Some(events) = connection_events() {
        events.on_disconnect(&event_from_raw(login, address, port));
    }
}

extern "system" fn on_reconnect(login: Llong, address: *mut c_char, port: c_int, _user: Ldword) {
    if let Some(events) = connection_events() {
        events.on_reconnect(&event_from_raw(login, address, port));
    }
}

extern "system" fn on_real_data(
    real_handle: Llong,
    data_type: u32,
    buffer: *mut u8,
    size: u32,
    _param: Llong,
    _user: Ldword,
) {
    let Some(stream) = StreamHandle::from_raw(real_handle as i64) else {
        return;
    };
    let Some(handler) = DATA_HANDLERS.get(&stream).map(|h| Arc::clone(h.value())) else {
        return;
    };
    let data: &[u8] = if buffer.is_null() || size == 0 {
        &[]
    } else {
        // SAFETY: the SDK owns `buffer` for the duration of this call.
        unsafe { std::slice::from_raw_parts(buffer, size as usize) }
    };
    handler.on_data(stream, data_type, data);
}

#[derive(Debug, Default)]
pub struct NetSdkTransport;

impl NetSdkTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for NetSdkTransport {
    fn init(&self, events: Arc<dyn ConnectionEvents>) -> Result<()> {
        *CONNECTION_EVENTS
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(events);

        // SAFETY: plain SDK setup; the callbacks are 'static functions.
        let ok = unsafe { CLIENT_Init(Some(on_disconnect), 0) };
        if ok == 0 {
            return Err(DHStreamError::TransportError("CLIENT_Init failed".to_string()));
        }
        unsafe { CLIENT_SetAutoReconnect(Some(on_reconnect), 0) };
        Ok(())
    }

    fn cleanup(&self) {
        unsafe { CLIENT_Cleanup() };
        DATA_HANDLERS.clear();
        *CONNECTION_EVENTS
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn login(&self, credentials: &Credentials) -> LoginReply {
        let mut in_param = NetInLoginWithHighLevelSecurity {
            size: size_of::<NetInLoginWithHighLevelSecurity>() as u32,
            ip: c_field(&credentials.address),
            port: credentials.port.into(),
            user_name: c_field(&credentials.username),
            password: c_field(&credentials.password),
            spec_cap: EM_LOGIN_SPEC_CAP_TCP,
            reserved: [0; 4],
            cap_param: std::ptr::null_mut(),
        };
        let mut out_param = NetOutLoginWithHighLevelSecurity {
            size: size_of::<NetOutLoginWithHighLevelSecurity>() as u32,
            device_info: NetDeviceInfoEx {
                serial_number: [0; 48],
                alarm_in_port_num: 0,
                alarm_out_port_num: 0,
                disk_num: 0,
                dvr_type: 0,
                chan_num: 0,
                limit_login_time: 0,
                left_log_times: 0,
                reserved: [0; 2],
                lock_left_time: 0,
                reserved_tail: [0; 24],
            },
            error: 0,
            reserved: [0; 132],
        };

        // SAFETY: both structs are fully initialised and carry their own size.
        let handle = unsafe { CLIENT_LoginWithHighLevelSecurity(&mut in_param, &mut out_param) };
        LoginReply {
            handle: LoginHandle::from_raw(handle as i64),
            error_code: out_param.error,
        }
    }

    fn last_error(&self) -> u32 {
        unsafe { CLIENT_GetLastError() }
    }

    fn start_realplay(
        &self,
        login: LoginHandle,
        channel: u32,
        variant: StreamVariant,
    ) -> Option<StreamHandle> {
        let channel = c_int::try_from(channel).ok()?;
        let handle = unsafe {
            CLIENT_RealPlayEx(
                login.raw() as Llong,
                channel,
                std::ptr::null_mut(),
                variant.realplay_type(),
            )
        };
        StreamHandle::from_raw(handle as i64)
    }

    fn set_data_handler(&self, stream: StreamHandle, handler: Arc<dyn DataHandler>) -> Result<()> {
        // Registered before the SDK can call back with this handle.
        DATA_HANDLERS.insert(stream, handler);
        let ok = unsafe {
            CLIENT_SetRealDataCallBackEx2(
                stream.raw() as Llong,
                Some(on_real_data),
                0,
                REALDATA_FLAG_RAW_DATA,
            )
        };
        if ok == 0 {
            DATA_HANDLERS.remove(&stream);
            return Err(DHStreamError::TransportError(format!(
                "CLIENT_SetRealDataCallBackEx2 failed: 0x{:08X}",
                self.last_error()
            )));
        }
        Ok(())
    }

    fn stop_realplay(&self, stream: StreamHandle) -> Result<()> {
        let ok = unsafe { CLIENT_StopRealPlayEx(stream.raw() as Llong) };
        DATA_HANDLERS.remove(&stream);
        if ok == 0 {
            return Err(DHStreamError::TransportError(format!(
                "CLIENT_StopRealPlayEx failed: 0x{:08X}",
                self.last_error()
            )));
        }
        Ok(())
    }

    fn logout(&self, login: LoginHandle) -> Result<()> {
        let ok = unsafe { CLIENT_Logout(login.raw() as Llong) };
        if ok == 0 {
            return Err(DHStreamError::TransportError(format!(
                "CLIENT_Logout failed: 0x{:08X}",
                self.last_error()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_types_are_pointer_sized() {
        assert_eq!(size_of::<Llong>(), size_of::<*const c_void>());
        assert_eq!(size_of::<Ldword>(), size_of::<*const c_void>());

        // Login ids above 32 bits must survive the round trip through LoginHandle.
        let raw: Llong = Llong::MAX;
        let handle = LoginHandle::from_raw(raw as i64).unwrap();
        assert_eq!(handle.raw() as Llong, raw);
    }

    #[test]
    fn c_field_is_nul_terminated() {
        let field: [c_char; 8] = c_field("admin");
        assert_eq!(field[..6], [b'a', b'd', b'm', b'i', b'n', 0].map(|b| b as c_char));

        let field: [c_char; 4] = c_field("abcdef");
        assert_eq!(field[3], 0);
    }
}
