//! Minimal IPP/1.1 `Print-Job` encoding (RFC 8010)
//!
//! Only what raw printing needs: one operation, operation attributes, the
//! document appended after the end-of-attributes tag.

use crate::error::{PrintError, PrintResult};

const VERSION: [u8; 2] = [0x01, 0x01];
const OP_PRINT_JOB: u16 = 0x0002;

const TAG_OPERATION_ATTRIBUTES: u8 = 0x01;
const TAG_END_OF_ATTRIBUTES: u8 = 0x03;
const TAG_NAME_WITHOUT_LANGUAGE: u8 = 0x42;
const TAG_URI: u8 = 0x45;
const TAG_CHARSET: u8 = 0x47;
const TAG_NATURAL_LANGUAGE: u8 = 0x48;
const TAG_MIME_MEDIA_TYPE: u8 = 0x49;

pub const CONTENT_TYPE: &str = "application/ipp";
pub const DEFAULT_PORT: u16 = 631;

/// Build a `Print-Job` request carrying `document` as raw octets
pub fn encode_print_job(printer_uri: &str, job_name: &str, request_id: u32, document: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + document.len());
    buf.extend_from_slice(&VERSION);
    buf.extend_from_slice(&OP_PRINT_JOB.to_be_bytes());
    buf.extend_from_slice(&request_id.to_be_bytes());

    buf.push(TAG_OPERATION_ATTRIBUTES);
    push_attribute(&mut buf, TAG_CHARSET, "attributes-charset", "utf-8");
    push_attribute(&mut buf, TAG_NATURAL_LANGUAGE, "attributes-natural-language", "en");
    push_attribute(&mut buf, TAG_URI, "printer-uri", printer_uri);
    push_attribute(&mut buf, TAG_NAME_WITHOUT_LANGUAGE, "requesting-user-name", "print-bridge");
    push_attribute(&mut buf, TAG_NAME_WITHOUT_LANGUAGE, "job-name", job_name);
    push_attribute(&mut buf, TAG_MIME_MEDIA_TYPE, "document-format", "application/octet-stream");
    buf.push(TAG_END_OF_ATTRIBUTES);

    buf.extend_from_slice(document);
    buf
}

fn push_attribute(buf: &mut Vec<u8>, tag: u8, name: &str, value: &str) {
    buf.push(tag);
    buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Check the status code of an IPP response (`successful-ok*` is 0x0000-0x00FF)
pub fn check_response(body: &[u8]) -> PrintResult<()> {
    if body.len() < 8 {
        return Err(PrintError::Ipp(format!("short response ({} bytes)", body.len())));
    }
    let status = u16::from_be_bytes([body[2], body[3]]);
    if status <= 0x00FF {
        Ok(())
    } else {
        Err(PrintError::Ipp(format!("status 0x{:04X}", status)))
    }
}

/// `ipp://host[:port]/path` to the HTTP URL the request is POSTed to
pub fn http_url(printer_uri: &str) -> PrintResult<String> {
    let lower = printer_uri.to_ascii_lowercase();
    let (scheme, rest) = if lower.starts_with("ipps://") {
        ("https", &printer_uri[7..])
    } else if lower.starts_with("ipp://") {
        ("http", &printer_uri[6..])
    } else {
        return Err(PrintError::InvalidConfig(format!("Not an IPP URI: {}", printer_uri)));
    };

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return Err(PrintError::InvalidConfig(format!("Missing host: {}", printer_uri)));
    }

    let has_port = authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()));
    if has_port {
        Ok(format!("{}://{}{}", scheme, authority, path))
    } else {
        Ok(format!("{}://{}:{}{}", scheme, authority, DEFAULT_PORT, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header_and_document() {
        let body = encode_print_job("ipp://printer.local/ipp/print", "job-1", 7, b"RAW");
        assert_eq!(&body[..2], &[0x01, 0x01]);
        assert_eq!(&body[2..4], &[0x00, 0x02]);
        assert_eq!(&body[4..8], &7u32.to_be_bytes());
        assert_eq!(body[8], TAG_OPERATION_ATTRIBUTES);
        assert!(body.ends_with(&[TAG_END_OF_ATTRIBUTES, b'R', b'A', b'W']));

        let needle = b"printer-uri";
        assert!(body.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_check_response() {
        assert!(check_response(&[1, 1, 0x00, 0x00, 0, 0, 0, 1, 3]).is_ok());
        assert!(check_response(&[1, 1, 0x04, 0x00, 0, 0, 0, 1, 3]).is_err());
        assert!(check_response(&[1, 1]).is_err());
    }

    #[test]
    fn test_http_url() {
        assert_eq!(
            http_url("ipp://10.0.0.5/ipp/print").unwrap(),
            "http://10.0.0.5:631/ipp/print"
        );
        assert_eq!(http_url("IPPS://host:8443").unwrap(), "https://host:8443/");
        assert!(http_url("lp0").is_err());
    }
}
