//! Deterministic derivation of site identifiers and container names
//!
//! The container name embeds a reversible encoding of the display name, so
//! "does this site exist" is a single name lookup against the engine rather
//! than a scan of labels.

use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Identifiers derived from a raw, user-supplied site name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteNames {
    /// Sanitized display name (letters, digits, hyphen)
    pub display: String,
    /// URL-safe, unpadded encoding of the display name
    pub site_id: String,
    /// Full container name: prefix + site id
    pub container: String,
}

/// Strip everything outside `[A-Za-z0-9-]`
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Derive all identifiers for a site. Fails if nothing survives sanitization.
pub fn derive(prefix: &str, raw: &str) -> Result<SiteNames> {
    let display = sanitize(raw);
    if display.is_empty() {
        return Err(Error::InvalidName(raw.to_string()));
    }
    let site_id = URL_SAFE_NO_PAD.encode(display.as_bytes());
    let container = format!("{prefix}{site_id}");
    Ok(SiteNames {
        display,
        site_id,
        container,
    })
}

/// Recover the display name from an encoded site id
pub fn decode_site_id(site_id: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(site_id).ok()?;
    String::from_utf8(bytes).ok()
}

/// Recover the display name from a full container name
pub fn display_name_of(prefix: &str, container: &str) -> Option<String> {
    decode_site_id(container.strip_prefix(prefix)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_disallowed() {
        assert_eq!(sanitize("My Site!"), "MySite");
        assert_eq!(sanitize("My-Site"), "My-Site");
        assert_eq!(sanitize("demo_01"), "demo01");
        assert_eq!(sanitize("!!!"), "");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive("wp-", "demo").unwrap();
        let b = derive("wp-", "demo").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.container, format!("wp-{}", a.site_id));
    }

    #[test]
    fn test_derive_matches_known_encoding() {
        // base64url("demo") with padding stripped
        let names = derive("wp-", "demo").unwrap();
        assert_eq!(names.site_id, "ZGVtbw");
        assert_eq!(names.container, "wp-ZGVtbw");
    }

    #[test]
    fn test_empty_after_sanitize_is_rejected() {
        assert!(matches!(derive("wp-", "!! !!"), Err(Error::InvalidName(_))));
        assert!(matches!(derive("wp-", ""), Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_site_id_round_trips() {
        let names = derive("wp-", "My-Site").unwrap();
        assert_eq!(decode_site_id(&names.site_id).as_deref(), Some("My-Site"));
        assert_eq!(
            display_name_of("wp-", &names.container).as_deref(),
            Some("My-Site")
        );
    }

    #[test]
    fn test_display_name_of_foreign_container() {
        assert_eq!(display_name_of("wp-", "traefik"), None);
    }
}
