//! Encoding helpers shared by the wire types and the relying party engine.
//!
//! Browsers emit unpadded `base64url` in `clientDataJSON` and in `toJSON()` output, but older
//! client libraries send padded `base64`, so decoding accepts both.

use data_encoding::{Specification, BASE64, BASE64URL, BASE64URL_NOPAD, BASE64_NOPAD};

/// Convert bytes to base64url without padding
pub fn base64url(data: &[u8]) -> String {
    BASE64URL_NOPAD.encode(data)
}

/// Try parsing from base64 with or without padding
pub fn try_from_base64(input: &str) -> Option<Vec<u8>> {
    let sane_string = input.trim_end_matches('=');
    BASE64_NOPAD.decode(sane_string.as_bytes()).ok()
}

/// Try parsing from base64url with or without padding
pub fn try_from_base64url(input: &str) -> Option<Vec<u8>> {
    let specs = Specification {
        check_trailing_bits: false,
        padding: None,
        ..BASE64URL.specification()
    };
    let encoding = specs.encoding().ok()?;
    let sane_string = input.trim_end_matches('=');
    encoding.decode(sane_string.as_bytes()).ok()
}
