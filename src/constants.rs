use phf::phf_map;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reasons reported in `nError` of a failed login.
pub static LOGIN_ERRORS: phf::Map<i32, &'static str> = phf_map! {
    0i32 => "Login Success",
    1i32 => "Account or Password Incorrect",
    2i32 => "User Is Not Exist",
    3i32 => "Login Timeout",
    4i32 => "Repeat Login",
    5i32 => "User Account is Locked",
    6i32 => "User In Blocklist",
    7i32 => "Device Busy",
    8i32 => "Sub Connect Failed",
    9i32 => "Host Connect Failed",
    10i32 => "Max Connect",
    11i32 => "Support Protocol3 Only",
    12i32 => "UKey Info Error",
    13i32 => "No Authorized",
    18i32 => "Device Account isn't Initialized",
};

pub const UNKNOWN_LOGIN_ERROR: &str = "Unknown Error";

/// Login `nError` value meaning "ask CLIENT_GetLastError".
pub const LOGIN_ERROR_SEE_LAST_ERROR: i32 = 255;

const fn ec(code: u32) -> u32 {
    0x8000_0000 | code
}

pub const NET_ERROR_MAC_VALIDATE_FAILED: u32 = ec(1122);
pub const NET_ERROR_SENIOR_VALIDATE_FAILED: u32 = ec(1123);

pub static LAST_ERRORS: phf::Map<u32, &'static str> = phf_map! {
    0x8000_0462u32 => "bad mac address",
    0x8000_0463u32 => "senior validate failed",
};

pub const UNKNOWN_LAST_ERROR: &str = "unknown error";

/// `szIP`, `szUserName` and `szPassword` are 64-byte C strings.
pub const MAX_FIELD_LEN: usize = 63;

/// Values of `DH_RealPlayType` used by the four stream variants.
pub const DH_RTYPE_REALPLAY: i32 = 0;
pub const DH_RTYPE_REALPLAY_1: i32 = 3;
pub const DH_RTYPE_REALPLAY_2: i32 = 4;
pub const DH_RTYPE_REALPLAY_3: i32 = 5;

pub const REALDATA_FLAG_RAW_DATA: u32 = 0x01;
pub const EM_LOGIN_SPEC_CAP_TCP: i32 = 0;

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// Upper bound on the shutdown poll interval, keeps signal latency short.
pub const MAX_POLL_INTERVAL_MS: u64 = 1000;
