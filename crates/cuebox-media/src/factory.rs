//! URI resolution for media items.

use std::sync::Arc;

use cuebox_types::backend::ItemRef;
use cuebox_types::error::{CueError, Result};

use crate::item::{SyntheticItem, SyntheticKind};

/// Whether `token` looks like `scheme:rest`.
///
/// The scheme must start with a letter and contain only letters, digits,
/// `+`, `-` or `.`.
pub fn is_uri(token: &str) -> bool {
    let Some((scheme, _)) = token.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Opens items from URIs.
#[derive(Debug, Clone, Default)]
pub struct MediaFactory;

impl MediaFactory {
    pub fn new() -> Self {
        Self
    }

    /// Open `uri` as a shared item.
    pub fn open(&self, uri: &str) -> Result<ItemRef> {
        let scheme = uri
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| CueError::Media(format!("unable to open {uri}")))?;
        let kind = match scheme.as_str() {
            "test" => SyntheticKind::TestPattern,
            "colour" | "color" => SyntheticKind::Colour,
            _ => return Err(CueError::Media(format!("unable to open {uri}"))),
        };
        log::debug!("opened {uri} as {kind:?}");
        Ok(Arc::new(SyntheticItem::new(uri, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_detection() {
        assert!(is_uri("test:"));
        assert!(is_uri("colour:red"));
        assert!(is_uri("http://example.com/a.mp4"));
        assert!(is_uri("svg+xml:x"));
        assert!(!is_uri("plain"));
        assert!(!is_uri(":nothing"));
        assert!(!is_uri("1:2"));
        assert!(!is_uri("a b:c"));
    }

    #[test]
    fn opens_known_schemes() {
        let factory = MediaFactory::new();
        assert_eq!(factory.open("test:").unwrap().frames(), 250);
        assert_eq!(factory.open("colour:").unwrap().frames(), 1);
        assert_eq!(factory.open("COLOR:blue").unwrap().uri(), "COLOR:blue");
    }

    #[test]
    fn unknown_scheme_fails() {
        let err = MediaFactory::new().open("ftp://host/file").unwrap_err();
        assert_eq!(format!("{err}"), "media error: unable to open ftp://host/file");
    }
}
