//! Line-oriented record codec
//!
//! Each resource becomes a group of `KEY=value` lines; groups are separated
//! by a literal `---` line:
//!
//! ```text
//! KIND=package
//! PARAM_NAME=nginx
//! REQUIRES=network,repo-config
//! ---
//! KIND=file
//! PARAM_CONTENT_B64=<base64>
//! ```
//!
//! Values containing a line break travel as `KEY_B64=<base64>`. A parameter
//! whose own name ends in `_b64` is always base64-encoded, so the transport
//! suffix is stripped exactly once on decode and never eats part of a name.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{CodecError, ValidationError};
use crate::playbook::{ResourceDeclaration, check_identifier};

/// Line separating two records
pub const RECORD_SEPARATOR: &str = "---";

const B64_SUFFIX: &str = "_B64";
const PARAM_PREFIX: &str = "PARAM_";

/// Encode resources into the record format
///
/// # Errors
/// Returns `CodecError::Invalid` if a declaration holds a kind, id,
/// dependency or parameter key that the format cannot carry
pub fn encode(resources: &[ResourceDeclaration]) -> Result<String, CodecError> {
    let mut out = String::new();

    for (i, resource) in resources.iter().enumerate() {
        resource.validate()?;

        if i > 0 {
            out.push_str(RECORD_SEPARATOR);
            out.push('\n');
        }

        write_field(&mut out, "KIND", &resource.kind);
        if let Some(id) = &resource.id {
            write_field(&mut out, "ID", id);
        }
        for (key, value) in &resource.params {
            let field = format!("{PARAM_PREFIX}{}", key.to_ascii_uppercase());
            write_field(&mut out, &field, value);
        }
        if !resource.requires.is_empty() {
            write_field(&mut out, "REQUIRES", &resource.requires.join(","));
        }
    }

    Ok(out)
}

fn write_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    if value.contains(['\n', '\r']) || key.ends_with(B64_SUFFIX) {
        out.push_str(B64_SUFFIX);
        out.push('=');
        out.push_str(&STANDARD.encode(value));
    } else {
        out.push('=');
        out.push_str(value);
    }
    out.push('\n');
}

/// Decode the record format back into resources
///
/// # Errors
/// Returns `CodecError::MalformedRecord` naming the first offending line
pub fn decode(text: &str) -> Result<Vec<ResourceDeclaration>, CodecError> {
    let mut resources = Vec::new();
    let mut record = RecordBuilder::default();
    let mut last_line = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;

        if line == RECORD_SEPARATOR {
            resources.push(std::mem::take(&mut record).finish(line_no)?);
            continue;
        }

        let (raw_key, raw_value) = line
            .split_once('=')
            .ok_or_else(|| malformed(line_no, "expected KEY=value"))?;

        let (key, value) = match raw_key.strip_suffix(B64_SUFFIX) {
            Some(key) => (key, decode_base64(raw_value, line_no)?),
            None => (raw_key, raw_value.to_string()),
        };

        if !is_normalized_key(key) {
            return Err(malformed(
                line_no,
                format!("key '{raw_key}' is not in upper-case normalized form"),
            ));
        }

        record.set(key, value, line_no)?;
    }

    if last_line > 0 {
        resources.push(record.finish(last_line)?);
    }

    Ok(resources)
}

fn is_normalized_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn decode_base64(value: &str, line: usize) -> Result<String, CodecError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| malformed(line, format!("invalid base64 payload: {e}")))?;
    String::from_utf8(bytes).map_err(|_| malformed(line, "base64 payload is not valid UTF-8"))
}

fn malformed(line: usize, reason: impl Into<String>) -> CodecError {
    CodecError::MalformedRecord {
        line,
        reason: reason.into(),
    }
}

/// Accumulates the fields of one record
#[derive(Default)]
struct RecordBuilder {
    kind: Option<String>,
    id: Option<String>,
    params: BTreeMap<String, String>,
    requires: Option<Vec<String>>,
}

impl RecordBuilder {
    fn set(&mut self, key: &str, value: String, line: usize) -> Result<(), CodecError> {
        let duplicate = || malformed(line, format!("duplicate field '{key}'"));
        let invalid = |e: ValidationError| malformed(line, e.to_string());

        match key {
            "KIND" => {
                if self.kind.is_some() {
                    return Err(duplicate());
                }
                check_identifier("kind", &value).map_err(invalid)?;
                self.kind = Some(value);
            }
            "ID" => {
                if self.id.is_some() {
                    return Err(duplicate());
                }
                check_identifier("id", &value).map_err(invalid)?;
                self.id = Some(value);
            }
            "REQUIRES" => {
                if self.requires.is_some() {
                    return Err(duplicate());
                }
                let mut requires: Vec<String> = Vec::new();
                if !value.is_empty() {
                    for req in value.split(',') {
                        check_identifier("requires", req).map_err(invalid)?;
                        if !requires.iter().any(|r| r == req) {
                            requires.push(req.to_string());
                        }
                    }
                }
                self.requires = Some(requires);
            }
            _ => {
                let Some(name) = key.strip_prefix(PARAM_PREFIX).filter(|n| !n.is_empty()) else {
                    return Err(malformed(line, format!("unknown field '{key}'")));
                };
                let name = name.to_ascii_lowercase();
                if self.params.contains_key(&name) {
                    return Err(duplicate());
                }
                self.params.insert(name, value);
            }
        }
        Ok(())
    }

    fn finish(self, line: usize) -> Result<ResourceDeclaration, CodecError> {
        let kind = self
            .kind
            .ok_or_else(|| malformed(line, "record ends without a KIND field"))?;
        Ok(ResourceDeclaration {
            kind,
            id: self.id,
            params: self.params,
            requires: self.requires.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(decl: ResourceDeclaration) {
        let encoded = encode(std::slice::from_ref(&decl)).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, vec![decl], "encoded form:\n{encoded}");
    }

    #[test]
    fn test_encode_matches_wire_format() {
        let resources = vec![
            ResourceDeclaration::new("package")
                .with_param("name", "nginx")
                .requiring("network")
                .requiring("repo-config"),
            ResourceDeclaration::new("file").with_param("content", "a\nb"),
        ];

        let encoded = encode(&resources).unwrap();

        assert_eq!(
            encoded,
            "KIND=package\nPARAM_NAME=nginx\nREQUIRES=network,repo-config\n---\nKIND=file\nPARAM_CONTENT_B64=YQpi\n"
        );
    }

    #[test]
    fn test_round_trip_awkward_values() {
        round_trip(
            ResourceDeclaration::new("file")
                .with_id("motd")
                .with_param("empty", "")
                .with_param("separator", "---")
                .with_param("assignment", "a=b==c")
                .with_param("multiline", "line one\n---\nKIND=evil\n")
                .with_param("crlf", "dos\r\nline")
                .with_param("trailing_cr", "x\r")
                .with_param("unicode", "héllo ✓ 日本")
                .with_param("spaces", "  padded  "),
        );
    }

    #[test]
    fn test_round_trip_param_named_like_transport_suffix() {
        round_trip(
            ResourceDeclaration::new("file")
                .with_param("cert_b64", "TUlJQg==")
                .with_param("b64", "plain"),
        );
    }

    #[test]
    fn test_round_trip_requires_and_positional_resources() {
        let resources = vec![
            ResourceDeclaration::new("package").with_param("name", "curl"),
            ResourceDeclaration::new("service")
                .with_id("web")
                .requiring("0")
                .requiring("net"),
            ResourceDeclaration::new("noop").with_id("net"),
        ];

        let decoded = decode(&encode(&resources).unwrap()).unwrap();
        assert_eq!(decoded, resources);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_reports_line_number() {
        let text = "KIND=package\nPARAM_NAME=curl\nthis is not a field\n";
        let err = decode(text).unwrap_err();

        assert!(matches!(err, CodecError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn test_decode_rejects_blank_line() {
        let err = decode("KIND=package\n\nPARAM_NAME=curl\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_decode_rejects_lowercase_key() {
        let err = decode("KIND=package\nparam_name=curl\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode("KIND=file\nPARAM_CONTENT_B64=***\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_decode_rejects_unknown_and_duplicate_fields() {
        let err = decode("KIND=package\nOWNER=root\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedRecord { line: 2, .. }));

        let err = decode("KIND=package\nKIND=file\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_decode_requires_kind() {
        let err = decode("PARAM_NAME=curl\n---\nKIND=file\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_decode_trailing_separator_is_empty_record() {
        let err = decode("KIND=package\n---\n").unwrap_err();
        assert!(matches!(err, CodecError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_encode_rejects_unencodable_id() {
        let decl = ResourceDeclaration::new("package").with_id("a,b");
        assert!(matches!(encode(&[decl]), Err(CodecError::Invalid(_))));
    }

    #[test]
    fn test_encode_rejects_repeated_requirement() {
        let mut decl = ResourceDeclaration::new("file").requiring("p1");
        decl.requires.push("p1".to_string());

        assert!(matches!(
            encode(&[decl]),
            Err(CodecError::Invalid(ValidationError::DuplicateRequirement(_)))
        ));
    }
}
