//! Ordered registrations of the components a loader uses.

use std::sync::Arc;

use crate::application::pipeline::Interceptor;
use crate::domain::entities::{Data, DataKind, Options};
use crate::domain::ports::{
    Decoder, DecoderFactory, Fetcher, FetcherFactory, Keyer, Mapper, SourceResult,
};

/// Interceptors, mappers, keyers, fetchers and decoders, searched in
/// registration order.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    interceptors: Vec<Arc<dyn Interceptor>>,
    mappers: Vec<(Arc<dyn Mapper>, DataKind)>,
    keyers: Vec<(Arc<dyn Keyer>, DataKind)>,
    fetcher_factories: Vec<(Arc<dyn FetcherFactory>, DataKind)>,
    decoder_factories: Vec<Arc<dyn DecoderFactory>>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns a builder seeded with this registry's components.
    #[must_use]
    pub fn new_builder(&self) -> RegistryBuilder {
        RegistryBuilder {
            registry: self.clone(),
        }
    }

    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Applies every mapper registered for the data's kind, in order.
    #[must_use]
    pub fn map(&self, data: Data, options: &Options) -> Data {
        self.mappers
            .iter()
            .fold(data, |current, (mapper, kind)| {
                if kind.accepts(current.kind()) {
                    mapper.map(&current, options).unwrap_or(current)
                } else {
                    current
                }
            })
    }

    /// Returns the first key produced by a keyer registered for the data's kind.
    #[must_use]
    pub fn key(&self, data: &Data, options: &Options) -> Option<String> {
        self.keyers
            .iter()
            .filter(|(_, kind)| kind.accepts(data.kind()))
            .find_map(|(keyer, _)| keyer.key(data, options))
    }

    /// Creates a fetcher from the first accepting factory at or after `start`.
    ///
    /// Returns the factory's index so a declined fetch can resume the search
    /// at the next one.
    #[must_use]
    pub fn new_fetcher(
        &self,
        data: &Data,
        options: &Options,
        start: usize,
    ) -> Option<(Box<dyn Fetcher>, usize)> {
        self.fetcher_factories
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(_, (_, kind))| kind.accepts(data.kind()))
            .find_map(|(index, (factory, _))| {
                factory.create(data, options).map(|fetcher| (fetcher, index))
            })
    }

    /// Creates a decoder from the first accepting factory at or after `start`.
    #[must_use]
    pub fn new_decoder(
        &self,
        result: &SourceResult,
        options: &Options,
        start: usize,
    ) -> Option<(Box<dyn Decoder>, usize)> {
        self.decoder_factories
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(index, factory)| {
                factory.create(result, options).map(|decoder| (decoder, index))
            })
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("interceptors", &self.interceptors.len())
            .field("mappers", &self.mappers.len())
            .field("keyers", &self.keyers.len())
            .field("fetcher_factories", &self.fetcher_factories.len())
            .field("decoder_factories", &self.decoder_factories.len())
            .finish()
    }
}

/// Accumulates registrations for a [`ComponentRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    registry: ComponentRegistry,
}

impl RegistryBuilder {
    #[must_use]
    pub fn add_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.registry.interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn add_mapper(mut self, mapper: Arc<dyn Mapper>, kind: DataKind) -> Self {
        self.registry.mappers.push((mapper, kind));
        self
    }

    #[must_use]
    pub fn add_keyer(mut self, keyer: Arc<dyn Keyer>, kind: DataKind) -> Self {
        self.registry.keyers.push((keyer, kind));
        self
    }

    #[must_use]
    pub fn add_fetcher(mut self, factory: Arc<dyn FetcherFactory>, kind: DataKind) -> Self {
        self.registry.fetcher_factories.push((factory, kind));
        self
    }

    #[must_use]
    pub fn add_decoder(mut self, factory: Arc<dyn DecoderFactory>) -> Self {
        self.registry.decoder_factories.push(factory);
        self
    }

    #[must_use]
    pub fn build(self) -> ComponentRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{DataSource, Uri};
    use crate::domain::ports::ImageSource;
    use crate::domain::ports::mocks::{MockDecoderFactory, MockFetcherFactory};
    use bytes::Bytes;

    struct Suffix(&'static str);

    impl Mapper for Suffix {
        fn map(&self, data: &Data, _options: &Options) -> Option<Data> {
            match data {
                Data::String(value) => Some(Data::String(format!("{value}{}", self.0))),
                _ => None,
            }
        }
    }

    struct ToUri;

    impl Mapper for ToUri {
        fn map(&self, data: &Data, _options: &Options) -> Option<Data> {
            match data {
                Data::String(value) => Some(Data::Uri(Uri::parse(value.as_str()))),
                _ => None,
            }
        }
    }

    struct FixedKeyer(Option<&'static str>);

    impl Keyer for FixedKeyer {
        fn key(&self, _data: &Data, _options: &Options) -> Option<String> {
            self.0.map(str::to_owned)
        }
    }

    #[test]
    fn test_map_folds_in_order_and_respects_kind() {
        let registry = ComponentRegistry::builder()
            .add_mapper(Arc::new(Suffix("-a")), DataKind::String)
            .add_mapper(Arc::new(ToUri), DataKind::String)
            .add_mapper(Arc::new(Suffix("-b")), DataKind::String)
            .build();

        let mapped = registry.map(Data::from("x"), &Options::default());

        assert!(matches!(mapped, Data::Uri(uri) if uri.as_str() == "x-a"));
    }

    #[test]
    fn test_key_returns_first_some() {
        let registry = ComponentRegistry::builder()
            .add_keyer(Arc::new(FixedKeyer(Some("wrong kind"))), DataKind::Path)
            .add_keyer(Arc::new(FixedKeyer(None)), DataKind::Any)
            .add_keyer(Arc::new(FixedKeyer(Some("second"))), DataKind::String)
            .build();

        let key = registry.key(&Data::from("x"), &Options::default());
        assert_eq!(key.as_deref(), Some("second"));
    }

    #[test]
    fn test_new_fetcher_resumes_after_index() {
        let registry = ComponentRegistry::builder()
            .add_fetcher(Arc::new(MockFetcherFactory::new(None)), DataKind::Any)
            .add_fetcher(Arc::new(MockFetcherFactory::new(None)), DataKind::Path)
            .add_fetcher(Arc::new(MockFetcherFactory::new(None)), DataKind::String)
            .build();
        let data = Data::from("x");
        let options = Options::default();

        let (_, first) = registry.new_fetcher(&data, &options, 0).unwrap();
        let (_, second) = registry.new_fetcher(&data, &options, first + 1).unwrap();

        assert_eq!((first, second), (0, 2));
        assert!(registry.new_fetcher(&data, &options, second + 1).is_none());
    }

    #[test]
    fn test_new_decoder_and_new_builder() {
        let registry = ComponentRegistry::builder()
            .add_decoder(Arc::new(MockDecoderFactory::new(1, 1)))
            .build();
        let extended = registry
            .new_builder()
            .add_decoder(Arc::new(MockDecoderFactory::new(2, 2)))
            .build();
        let source = SourceResult {
            source: ImageSource::from_bytes(Bytes::from_static(b"x")),
            mime_type: None,
            data_source: DataSource::Memory,
            disk_cache_file: None,
        };
        let options = Options::default();

        assert!(registry.new_decoder(&source, &options, 1).is_none());
        let (_, index) = extended.new_decoder(&source, &options, 1).unwrap();
        assert_eq!(index, 1);
    }
}
