//! Request data and the tags the component registry dispatches on.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use super::bitmap::{Bitmap, Drawable};

/// A parsed URI string with cheap access to its scheme and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri(String);

impl Uri {
    #[must_use]
    pub fn parse(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the scheme, lowercased by convention of the caller.
    ///
    /// Single letter prefixes are treated as drive letters, not schemes.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once(':')?;
        let mut chars = scheme.chars();
        let first = chars.next()?;
        let valid = first.is_ascii_alphabetic()
            && scheme.len() > 1
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then_some(scheme)
    }

    /// Returns the path component without authority, query or fragment.
    #[must_use]
    pub fn path(&self) -> &str {
        let rest = match self.scheme() {
            Some(scheme) => &self.0[scheme.len() + 1..],
            None => self.0.as_str(),
        };
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        match rest.strip_prefix("//") {
            Some(authority_and_path) => authority_and_path
                .find('/')
                .map_or("", |index| &authority_and_path[index..]),
            None => rest,
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable tag for each [`Data`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Null,
    String,
    Uri,
    Path,
    Bytes,
    Bitmap,
    Drawable,
    /// A caller-defined type identified by its tag.
    Custom(&'static str),
    /// Registration-only tag that accepts every kind.
    Any,
}

impl DataKind {
    /// Returns true if a component registered for `self` handles `kind`.
    #[must_use]
    pub fn accepts(self, kind: Self) -> bool {
        self == Self::Any || self == kind
    }
}

/// The thing a request loads.
#[derive(Clone)]
pub enum Data {
    /// Marker for "nothing to load"; never reaches the pipeline.
    Null,
    String(String),
    Uri(Uri),
    Path(PathBuf),
    Bytes(Bytes),
    Bitmap(Bitmap),
    Drawable(Drawable),
    Custom {
        tag: &'static str,
        value: Arc<dyn Any + Send + Sync>,
    },
}

impl Data {
    /// Wraps a caller-defined value under `tag`.
    pub fn custom<T: Any + Send + Sync>(tag: &'static str, value: T) -> Self {
        Self::Custom {
            tag,
            value: Arc::new(value),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Null => DataKind::Null,
            Self::String(_) => DataKind::String,
            Self::Uri(_) => DataKind::Uri,
            Self::Path(_) => DataKind::Path,
            Self::Bytes(_) => DataKind::Bytes,
            Self::Bitmap(_) => DataKind::Bitmap,
            Self::Drawable(_) => DataKind::Drawable,
            Self::Custom { tag, .. } => DataKind::Custom(tag),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrows the custom payload if it has type `T`.
    #[must_use]
    pub fn downcast_custom<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom { value, .. } => value.downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::String(value) => f.debug_tuple("String").field(value).finish(),
            Self::Uri(uri) => f.debug_tuple("Uri").field(&uri.as_str()).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Bitmap(bitmap) => f.debug_tuple("Bitmap").field(bitmap).finish(),
            Self::Drawable(drawable) => f.debug_tuple("Drawable").field(drawable).finish(),
            Self::Custom { tag, .. } => write!(f, "Custom({tag})"),
        }
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::String(value) => f.write_str(value),
            Self::Uri(uri) => f.write_str(uri.as_str()),
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Bitmap(bitmap) => write!(f, "<bitmap #{}>", bitmap.id()),
            Self::Drawable(Drawable::Bitmap(bitmap)) => write!(f, "<drawable #{}>", bitmap.id()),
            Self::Drawable(Drawable::Color { rgba, .. }) => write!(f, "<color {rgba:?}>"),
            Self::Custom { tag, .. } => write!(f, "<{tag}>"),
        }
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Uri> for Data {
    fn from(value: Uri) -> Self {
        Self::Uri(value)
    }
}

impl From<PathBuf> for Data {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<Bytes> for Data {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Bitmap> for Data {
    fn from(value: Bitmap) -> Self {
        Self::Bitmap(value)
    }
}

impl From<Drawable> for Data {
    fn from(value: Drawable) -> Self {
        Self::Drawable(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://example.com/a/b.png?x=1", Some("https"), "/a/b.png" ; "http url")]
    #[test_case("file:///tmp/cat.jpg", Some("file"), "/tmp/cat.jpg" ; "file url")]
    #[test_case("/tmp/cat.jpg", None, "/tmp/cat.jpg" ; "bare path")]
    #[test_case("C:/images/cat.jpg", None, "C:/images/cat.jpg" ; "drive letter")]
    #[test_case("content:cat", Some("content"), "cat" ; "opaque")]
    fn test_uri_parts(input: &str, scheme: Option<&str>, path: &str) {
        let uri = Uri::parse(input);
        assert_eq!(uri.scheme(), scheme);
        assert_eq!(uri.path(), path);
    }

    #[test]
    fn test_any_accepts_every_kind() {
        assert!(DataKind::Any.accepts(DataKind::Path));
        assert!(DataKind::Path.accepts(DataKind::Path));
        assert!(!DataKind::Uri.accepts(DataKind::Path));
        assert!(DataKind::Custom("asset").accepts(DataKind::Custom("asset")));
        assert!(!DataKind::Custom("asset").accepts(DataKind::Custom("other")));
    }

    #[test]
    fn test_custom_downcast() {
        let data = Data::custom("number", 42_u32);
        assert_eq!(data.kind(), DataKind::Custom("number"));
        assert_eq!(data.downcast_custom::<u32>(), Some(&42));
        assert_eq!(data.downcast_custom::<String>(), None);
    }
}
