//! `file://` URI conversion.
//!
//! Servers differ in which characters they percent-encode, so URIs coming
//! back from a server are decoded to paths before any lookup.

use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Build a `file://` URI from an absolute path.
pub fn path_to_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut uri = String::with_capacity(FILE_SCHEME.len() + raw.len());
    uri.push_str(FILE_SCHEME);
    if !raw.starts_with('/') {
        uri.push('/');
    }
    for byte in raw.bytes() {
        let keep = byte.is_ascii_alphanumeric() || b"/-_.~".contains(&byte);
        if keep {
            uri.push(byte as char);
        } else if byte == b'\\' {
            uri.push('/');
        } else {
            uri.push_str(&format!("%{:02X}", byte));
        }
    }
    uri
}

/// Decode a `file://` URI into a path. Returns `None` for other schemes
/// and for malformed escapes.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix(FILE_SCHEME)?;
    // Drop an optional authority ("localhost").
    let rest = match rest.find('/') {
        Some(0) => rest,
        Some(i) => &rest[i..],
        None => return None,
    };

    let bytes = rest.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = rest.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    let decoded = String::from_utf8(decoded).ok()?;
    // Windows drive paths arrive as "/C:/..."
    let trimmed = match decoded.as_bytes() {
        [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() => &decoded[1..],
        _ => decoded.as_str(),
    };
    Some(PathBuf::from(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let uri = path_to_uri(Path::new("/home/dev/project/src/main.swift"));
        assert_eq!(uri, "file:///home/dev/project/src/main.swift");
        assert_eq!(
            uri_to_path(&uri).unwrap(),
            PathBuf::from("/home/dev/project/src/main.swift")
        );
    }

    #[test]
    fn test_escapes_spaces_and_unicode() {
        let path = Path::new("/tmp/My Project/Café.swift");
        let uri = path_to_uri(path);
        assert_eq!(uri, "file:///tmp/My%20Project/Caf%C3%A9.swift");
        assert_eq!(uri_to_path(&uri).unwrap(), path);
    }

    #[test]
    fn test_server_specific_encoding_normalizes() {
        // Some servers escape characters we leave alone, or vice versa.
        let a = uri_to_path("file:///tmp/a%2Db/x.swift").unwrap();
        let b = uri_to_path("file:///tmp/a-b/x.swift").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_localhost_authority() {
        assert_eq!(
            uri_to_path("file://localhost/etc/hosts").unwrap(),
            PathBuf::from("/etc/hosts")
        );
    }

    #[test]
    fn test_rejects_other_schemes_and_bad_escapes() {
        assert!(uri_to_path("https://example.com/x").is_none());
        assert!(uri_to_path("file:///tmp/%zz").is_none());
        assert!(uri_to_path("file:///tmp/%4").is_none());
        assert!(uri_to_path("file:///tmp/%+1").is_none());
        assert!(uri_to_path("file:///tmp/%-1").is_none());
    }
}
