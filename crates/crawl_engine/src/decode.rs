use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: &'static str,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("body is not valid {encoding}")]
    Malformed { encoding: &'static str },
}

/// Decodes a fetched body into text.
///
/// Precedence: byte order mark, then the `charset` parameter of the
/// `Content-Type` header, then a chardetng guess over the whole body.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedText, DecodeError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(&bytes[bom_len..], encoding);
    }

    if let Some(encoding) = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_with(bytes, encoding);
    }

    if std::str::from_utf8(bytes).is_ok() {
        return decode_with(bytes, UTF_8);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches(['"', '\'']))
        } else {
            None
        }
    })
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<DecodedText, DecodeError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(DecodeError::Malformed {
            encoding: encoding.name(),
        });
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: encoding.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_charset_wins_over_detection() {
        // "café" in latin-1
        let bytes = [0x63, 0x61, 0x66, 0xE9];
        let decoded = decode_body(&bytes, Some("text/css; Charset=\"ISO-8859-1\"")).unwrap();
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.encoding_label, "windows-1252");
    }

    #[test]
    fn bom_is_stripped() {
        let bytes = b"\xEF\xBB\xBFbody{}";
        let decoded = decode_body(bytes, Some("text/css; charset=iso-8859-1")).unwrap();
        assert_eq!(decoded.text, "body{}");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn plain_utf8_without_header() {
        let decoded = decode_body("<p>å</p>".as_bytes(), None).unwrap();
        assert_eq!(decoded.text, "<p>å</p>");
    }

    #[test]
    fn invalid_bytes_for_declared_charset_fail() {
        let err = decode_body(b"ok \xC3\x28", Some("text/html; charset=utf-8")).unwrap_err();
        assert_eq!(err, DecodeError::Malformed { encoding: "UTF-8" });
    }
}
