use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::client::{AsyncOeisClient, OeisClient};
use crate::domain::{SequenceId, SequenceKey};
use crate::error::OeisError;
use crate::factory::SequenceFactory;
use crate::metadata::Metadata;
use crate::sequence::{Generator, Sequence, TermSource};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RegisterMeta {
    #[default]
    Omitted,
    Fetch,
    Provided(Metadata),
}

impl From<Metadata> for RegisterMeta {
    fn from(meta: Metadata) -> Self {
        RegisterMeta::Provided(meta)
    }
}

/// Keyed view over a factory's cache with no state of its own.
///
/// A registry mutably borrows its factory, so registries on one factory exist
/// one after another, never side by side; each sees the entries the previous
/// ones left in the cache.
pub struct Registry<'f, C> {
    factory: &'f mut SequenceFactory<C>,
}

impl<'f, C> Registry<'f, C> {
    pub fn from_factory(factory: &'f mut SequenceFactory<C>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &SequenceFactory<C> {
        &*self.factory
    }

    pub fn contains<K: SequenceKey>(&self, key: K) -> Result<bool, OeisError> {
        self.factory.contains(key)
    }

    pub fn get<K: SequenceKey>(&self, key: K) -> Result<Option<Arc<Sequence>>, OeisError> {
        self.factory.cached(key)
    }

    pub fn insert<K, S>(&mut self, key: K, sequence: S) -> Result<Option<Arc<Sequence>>, OeisError>
    where
        K: SequenceKey,
        S: Into<Arc<Sequence>>,
    {
        let id = key.sequence_id()?;
        let sequence = sequence.into();
        if sequence.id() != id {
            return Err(OeisError::RegistrationConflict {
                number: id.number(),
                found: sequence.number().to_string(),
            });
        }
        Ok(self.factory.cache_mut().insert(id.name(), sequence))
    }

    pub fn remove<K: SequenceKey>(&mut self, key: K) -> Result<Option<Arc<Sequence>>, OeisError> {
        let name = key.sequence_id()?.name();
        Ok(self.factory.cache_mut().remove(&name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Sequence>)> {
        self.factory
            .cache()
            .iter()
            .map(|(name, sequence)| (name.as_str(), sequence))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factory.cache().keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factory.is_empty()
    }

    pub fn clear(&mut self) {
        self.factory.clear();
    }

    fn store(
        &mut self,
        id: SequenceId,
        source: TermSource,
        meta: Option<Metadata>,
    ) -> Result<Arc<Sequence>, OeisError> {
        if let Some(meta) = &meta {
            check_number(id, meta)?;
        }
        let name = id.name();
        let cache = self.factory.cache_mut();
        let entry = match cache.get(&name) {
            Some(cached) if source.already_on(cached) => {
                debug!(%name, "already registered");
                return Ok(Arc::clone(cached));
            }
            Some(cached) => cached.derive_with(source),
            None => Sequence::from_parts(id, None, Arc::new(meta.unwrap_or_default()))
                .with_source(source),
        };
        debug!(%name, "registered sequence");
        let entry = Arc::new(entry);
        cache.insert(name, Arc::clone(&entry));
        Ok(entry)
    }
}

impl<C: OeisClient> Registry<'_, C> {
    /// Idempotent upsert of `key`.
    ///
    /// An entry already in the cache keeps its metadata and, unless new ones
    /// are given, its generator and index function; re-registering with
    /// unchanged inputs returns the cached instance itself. Supplied or fetched
    /// metadata must carry the same number as `key`, otherwise nothing is
    /// stored.
    pub fn register<K: SequenceKey>(
        &mut self,
        key: K,
        generator: Option<Generator>,
        meta: RegisterMeta,
    ) -> Result<Arc<Sequence>, OeisError> {
        self.register_with(key, generator.into(), meta)
    }

    pub fn register_with<K: SequenceKey>(
        &mut self,
        key: K,
        source: TermSource,
        meta: RegisterMeta,
    ) -> Result<Arc<Sequence>, OeisError> {
        let id = key.sequence_id()?;
        let meta = match meta {
            RegisterMeta::Omitted => None,
            RegisterMeta::Fetch => Some(
                self.factory
                    .load_meta(id)?
                    .ok_or_else(|| OeisError::MissingIdentifier(id.name()))?,
            ),
            RegisterMeta::Provided(meta) => Some(meta),
        };
        self.store(id, source, meta)
    }

    pub fn get_or_load<K: SequenceKey>(&mut self, key: K) -> Result<Arc<Sequence>, OeisError> {
        let id = key.sequence_id()?;
        match self.factory.cached(id)? {
            Some(sequence) => Ok(sequence),
            None => self.factory.load(id),
        }
    }
}

impl<C: AsyncOeisClient> Registry<'_, C> {
    pub async fn register_async<K: SequenceKey>(
        &mut self,
        key: K,
        generator: Option<Generator>,
        meta: RegisterMeta,
    ) -> Result<Arc<Sequence>, OeisError> {
        self.register_with_async(key, generator.into(), meta).await
    }

    pub async fn register_with_async<K: SequenceKey>(
        &mut self,
        key: K,
        source: TermSource,
        meta: RegisterMeta,
    ) -> Result<Arc<Sequence>, OeisError> {
        let id = key.sequence_id()?;
        let meta = match meta {
            RegisterMeta::Omitted => None,
            RegisterMeta::Fetch => Some(
                self.factory
                    .load_meta_async(id)
                    .await?
                    .ok_or_else(|| OeisError::MissingIdentifier(id.name()))?,
            ),
            RegisterMeta::Provided(meta) => Some(meta),
        };
        self.store(id, source, meta)
    }

    pub async fn get_or_load_async<K: SequenceKey>(
        &mut self,
        key: K,
    ) -> Result<Arc<Sequence>, OeisError> {
        let id = key.sequence_id()?;
        match self.factory.cached(id)? {
            Some(sequence) => Ok(sequence),
            None => self.factory.load_async(id).await,
        }
    }
}

impl<C> fmt::Display for Registry<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names().collect::<Vec<_>>();
        names.sort_unstable();
        write!(f, "Registry({})", names.join(", "))
    }
}

fn check_number(id: SequenceId, meta: &Metadata) -> Result<(), OeisError> {
    let found = meta.number().and_then(|number| number.sequence_id().ok());
    if found == Some(id) {
        return Ok(());
    }
    Err(OeisError::RegistrationConflict {
        number: id.number(),
        found: meta
            .number()
            .map(|number| number.to_string())
            .unwrap_or_else(|| "null".to_string()),
    })
}
