//! Request body encoders.
//!
//! # Design
//! Each encoder produces a complete `EncodedBody` or fails without producing
//! anything, so the builder can swap the whole body in one assignment. A
//! failed encoder never leaves a partially written body behind.

use serde::Serialize;

use crate::error::ConfigError;
use crate::flatten;
use crate::http::{EncodedBody, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, CONTENT_TYPE_STREAM};
use crate::inspect;
use crate::query::QueryPairs;
use crate::types::Multipart;

/// Raw passthrough.
pub fn stream(bytes: &[u8]) -> EncodedBody {
    EncodedBody::new(CONTENT_TYPE_STREAM, bytes.to_vec())
}

/// Canonical JSON serialization of `value`. NaN and infinities are
/// rejected rather than written as `null`.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<EncodedBody, ConfigError> {
    inspect::ensure_finite(value)?;
    let bytes = serde_json::to_vec(value)?;
    Ok(EncodedBody::new(CONTENT_TYPE_JSON, bytes))
}

/// Flatten `value` and URL-encode the pairs.
pub fn form<T: Serialize + ?Sized>(value: &T, max_depth: usize) -> Result<EncodedBody, ConfigError> {
    let mut pairs = QueryPairs::new();
    flatten::flatten(value, &mut pairs, max_depth)?;
    Ok(EncodedBody::new(CONTENT_TYPE_FORM, pairs.encode().into_bytes()))
}

/// `multipart/form-data` body with a freshly generated boundary.
pub fn multipart(spec: &Multipart) -> Result<EncodedBody, ConfigError> {
    multipart_with_boundary(spec, &gen_boundary())
}

pub(crate) fn multipart_with_boundary(spec: &Multipart, boundary: &str) -> Result<EncodedBody, ConfigError> {
    let mut writer = PartWriter::new(boundary);
    for (name, value) in &spec.form {
        writer.field(name, value)?;
    }
    for file in &spec.files {
        writer.file(&file.fieldname, &file.filename, &file.data)?;
    }
    let bytes = writer.finish();
    Ok(EncodedBody::new(
        format!("multipart/form-data; boundary={boundary}"),
        bytes,
    ))
}

/// Generate a random boundary string for multipart forms.
pub fn gen_boundary() -> String {
    let a: u64 = rand::random();
    let b: u64 = rand::random();
    let c: u64 = rand::random();
    let d: u64 = rand::random();

    format!("{a:016x}-{b:016x}-{c:016x}-{d:016x}")
}

struct PartWriter<'a> {
    boundary: &'a str,
    buf: Vec<u8>,
    parts: usize,
}

impl<'a> PartWriter<'a> {
    fn new(boundary: &'a str) -> Self {
        Self {
            boundary,
            buf: Vec::new(),
            parts: 0,
        }
    }

    fn open(&mut self, disposition: String, content_type: Option<&str>) {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.parts += 1;
        self.buf.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = content_type {
            self.buf.extend_from_slice(b"\r\nContent-Type: ");
            self.buf.extend_from_slice(content_type.as_bytes());
        }
        self.buf.extend_from_slice(b"\r\n\r\n");
    }

    fn field(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let disposition = format!("Content-Disposition: form-data; name=\"{}\"", quoted(name)?);
        self.open(disposition, None);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn file(&mut self, name: &str, filename: &str, data: &[u8]) -> Result<(), ConfigError> {
        let disposition = format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
            quoted(name)?,
            quoted(filename)?
        );
        self.open(disposition, Some(CONTENT_TYPE_STREAM));
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.buf
    }
}

/// Escape a header parameter value. Line breaks cannot be represented.
fn quoted(value: &str) -> Result<String, ConfigError> {
    if value.contains(['\r', '\n']) {
        return Err(ConfigError::Multipart(format!(
            "{value:?} contains a line break"
        )));
    }
    Ok(value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::flatten::FlattenError;
    use crate::types::File;

    /// Split a multipart body into `(headers, content)` pairs.
    fn parts(body: &[u8], boundary: &str) -> Vec<(String, Vec<u8>)> {
        let mut framed = b"\r\n".to_vec();
        framed.extend_from_slice(body);
        let delimiter = format!("\r\n--{boundary}");
        let needle = delimiter.as_bytes();

        let starts: Vec<usize> = (0..=framed.len() - needle.len())
            .filter(|&i| &framed[i..i + needle.len()] == needle)
            .collect();

        starts
            .windows(2)
            .map(|pair| {
                // skip the delimiter and the line break that follows it
                let section = &framed[pair[0] + needle.len() + 2..pair[1]];
                let split = section
                    .windows(4)
                    .position(|w| w == b"\r\n\r\n")
                    .expect("part has a header block");
                let headers = String::from_utf8(section[..split].to_vec()).unwrap();
                (headers, section[split + 4..].to_vec())
            })
            .collect()
    }

    #[test]
    fn stream_is_opaque_binary() {
        let body = stream(&[0, 159, 146, 150]);
        assert_eq!(body.content_type, "application/octet-stream");
        assert_eq!(body.bytes, vec![0, 159, 146, 150]);
    }

    #[test]
    fn json_body() {
        let body = json(&json!({ "name": "rex" })).unwrap();
        assert_eq!(body.content_type, "application/json");
        assert_eq!(body.bytes, br#"{"name":"rex"}"#.to_vec());
    }

    #[test]
    fn json_rejects_unserializable_values() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(json(&map).unwrap_err(), ConfigError::Json(_)));
    }

    #[test]
    fn json_rejects_non_finite_floats() {
        assert!(matches!(json(&f64::NAN).unwrap_err(), ConfigError::Json(_)));
        let mut map = std::collections::BTreeMap::new();
        map.insert("ratio", vec![1.0, f64::INFINITY]);
        assert!(matches!(json(&map).unwrap_err(), ConfigError::Json(_)));
    }

    #[test]
    fn form_body_is_sorted_and_encoded() {
        let body = form(&json!({ "b": [1, 2], "a": "x y" }), 16).unwrap();
        assert_eq!(body.content_type, "application/x-www-form-urlencoded");
        assert_eq!(body.bytes, b"a=x+y&b%5B0%5D=1&b%5B1%5D=2".to_vec());
    }

    #[test]
    fn form_propagates_flatten_errors() {
        let err = form("bare", 16).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Flatten(FlattenError::MissingKey { shape: "string" })
        ));
    }

    #[test]
    fn multipart_boundary_matches_content_type() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        let spec = Multipart::new()
            .field("id", "1")
            .file(File::new("img", "img.png", png.clone()));
        let body = multipart(&spec).unwrap();

        let boundary = body
            .content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        assert!(body.bytes.starts_with(format!("--{boundary}\r\n").as_bytes()));
        assert!(body.bytes.ends_with(format!("\r\n--{boundary}--\r\n").as_bytes()));

        let parts = parts(&body.bytes, &boundary);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, "Content-Disposition: form-data; name=\"id\"");
        assert_eq!(parts[0].1, b"1".to_vec());
        assert_eq!(
            parts[1].0,
            "Content-Disposition: form-data; name=\"img\"; filename=\"img.png\"\r\nContent-Type: application/octet-stream"
        );
        assert_eq!(parts[1].1, png);
    }

    #[test]
    fn multipart_escapes_quotes() {
        let spec = Multipart::new().field("a\"b", "v");
        let body = multipart_with_boundary(&spec, "XYZ").unwrap();
        assert_eq!(
            body.bytes,
            b"--XYZ\r\nContent-Disposition: form-data; name=\"a\\\"b\"\r\n\r\nv\r\n--XYZ--\r\n".to_vec()
        );
    }

    #[test]
    fn empty_multipart_is_just_the_closing_delimiter() {
        let body = multipart_with_boundary(&Multipart::new(), "XYZ").unwrap();
        assert_eq!(body.bytes, b"--XYZ--\r\n".to_vec());
        assert_eq!(body.content_type, "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn multipart_rejects_line_breaks_in_names() {
        let spec = Multipart::new()
            .field("ok", "1")
            .file(File::new("img", "evil\r\nname.png", vec![1]));
        assert!(matches!(
            multipart(&spec).unwrap_err(),
            ConfigError::Multipart(_)
        ));
    }

    #[test]
    fn boundaries_differ() {
        assert_ne!(gen_boundary(), gen_boundary());
    }
}
