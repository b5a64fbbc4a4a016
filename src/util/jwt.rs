use crate::util::base64::{base64_url_decode, base64_url_encode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Structural failure while splitting or decoding a compact JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtFormatError(String);

impl fmt::Display for JwtFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed JWT: {}", self.0)
    }
}

impl std::error::Error for JwtFormatError {}

/// The three segments of a compact JWT, with header and claims decoded but not verified.
#[derive(Debug, Clone, Default)]
pub struct DecodedToken {
    pub header: Value,
    pub claims: Value,
    pub signature: String,
}

/// Serialises `value` as JSON and encodes it as a base64url JWT segment.
pub fn encode_segment<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(base64_url_encode(&json))
}

/// The bytes a JWS signature is computed over: `"<header>.<payload>"`.
pub fn signing_input(header: &str, payload: &str) -> String {
    format!("{header}.{payload}")
}

/// Decodes a compact JWT without checking its signature.
pub fn decode_jwt(token: &str) -> Result<DecodedToken, JwtFormatError> {
    let mut parts = token.split('.');
    let (Some(header_part), Some(claims_part), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtFormatError("expected three dot-separated segments".into()));
    };

    Ok(DecodedToken {
        header: decode_part(header_part, "header")?,
        claims: decode_part(claims_part, "payload")?,
        signature: signature.to_string(),
    })
}

fn decode_part(part: &str, name: &str) -> Result<Value, JwtFormatError> {
    let json = base64_url_decode(part)
        .map_err(|err| JwtFormatError(format!("{name} segment: {err}")))?;
    match serde_json::from_str::<Value>(&json) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(JwtFormatError(format!("{name} segment is not a JSON object"))),
        Err(err) => Err(JwtFormatError(format!("{name} segment: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_token(header: &Value, claims: &Value) -> String {
        let header = encode_segment(header).unwrap();
        let claims = encode_segment(claims).unwrap();
        format!("{}.sig", signing_input(&header, &claims))
    }

    #[test]
    fn decode_extracts_header_and_claims() {
        let token = build_token(&json!({"alg": "RS256", "kid": "k1"}), &json!({"uid": "u"}));
        let decoded = decode_jwt(&token).unwrap();
        assert_eq!(decoded.header["kid"], json!("k1"));
        assert_eq!(decoded.claims["uid"], json!("u"));
        assert_eq!(decoded.signature, "sig");
    }

    #[test]
    fn segment_count_is_enforced() {
        assert!(decode_jwt("a.b").is_err());
        assert!(decode_jwt("a.b.c.d").is_err());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let header = encode_segment(&json!({"alg": "none"})).unwrap();
        let payload = encode_segment(&json!([1, 2])).unwrap();
        let err = decode_jwt(&format!("{header}.{payload}.")).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }
}
