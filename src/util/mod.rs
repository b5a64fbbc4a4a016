pub mod base64;
pub mod jwt;
pub mod time;

pub use base64::{
    base64_decode_bytes, base64_url_decode, base64_url_decode_bytes, base64_url_encode,
    base64_url_encode_bytes, DecodeBase64Error,
};
pub use jwt::{decode_jwt, encode_segment, signing_input, DecodedToken, JwtFormatError};
pub use time::{millis_to_system_time, system_time_to_millis, unix_seconds, Clock, SystemClock};
