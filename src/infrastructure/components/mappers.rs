//! Default data mappers.

use std::path::PathBuf;

use crate::domain::entities::{Data, Options, Uri};
use crate::domain::ports::Mapper;

/// Parses [`Data::String`] into a [`Data::Uri`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StringMapper;

impl Mapper for StringMapper {
    fn map(&self, data: &Data, _options: &Options) -> Option<Data> {
        match data {
            Data::String(value) => Some(Data::Uri(Uri::parse(value.as_str()))),
            _ => None,
        }
    }
}

/// Turns `file:` and scheme-less URIs into [`Data::Path`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileUriMapper;

impl Mapper for FileUriMapper {
    fn map(&self, data: &Data, _options: &Options) -> Option<Data> {
        let Data::Uri(uri) = data else {
            return None;
        };
        let is_file = uri
            .scheme()
            .is_none_or(|scheme| scheme.eq_ignore_ascii_case("file"));
        let path = uri.path();
        (is_file && !path.is_empty()).then(|| Data::Path(PathBuf::from(path)))
    }
}
