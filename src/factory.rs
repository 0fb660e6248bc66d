use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bfile::BFile;
use crate::client::{AsyncOeisClient, OeisClient, SearchResults, join_terms, validate_term};
use crate::domain::{SequenceId, SequenceKey};
use crate::error::OeisError;
use crate::metadata::Metadata;
use crate::registry::Registry;
use crate::sequence::Sequence;

pub type SequenceCache = HashMap<String, Arc<Sequence>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub cache_result: bool,
    pub with_bfile: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache_result: true,
            with_bfile: false,
        }
    }
}

impl LoadOptions {
    pub fn cache_result(mut self, cache_result: bool) -> Self {
        self.cache_result = cache_result;
        self
    }

    pub fn with_bfile(mut self, with_bfile: bool) -> Self {
        self.with_bfile = with_bfile;
        self
    }
}

enum Lookup {
    Ready(Arc<Sequence>),
    NeedsBfile(Arc<Sequence>),
    Miss,
}

/// Loads OEIS entries through a client and memoizes them by canonical name.
///
/// The cache has no internal locking: mutation goes through `&mut self`, so a
/// factory shared across threads needs external synchronization.
pub struct SequenceFactory<C> {
    client: Arc<C>,
    cache: SequenceCache,
    always_cache: bool,
}

impl<C> SequenceFactory<C> {
    pub fn new(client: C) -> Self {
        Self::with_client(Arc::new(client))
    }

    pub fn with_client(client: Arc<C>) -> Self {
        Self::from_cache(SequenceCache::new(), client, false)
    }

    pub fn from_cache(cache: SequenceCache, client: Arc<C>, always_cache: bool) -> Self {
        Self {
            client,
            cache,
            always_cache,
        }
    }

    pub fn always_cache(&self) -> bool {
        self.always_cache
    }

    pub fn set_always_cache(&mut self, always_cache: bool) {
        self.always_cache = always_cache;
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn cache(&self) -> &SequenceCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut SequenceCache {
        &mut self.cache
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn contains<K: SequenceKey>(&self, key: K) -> Result<bool, OeisError> {
        Ok(self.cache.contains_key(&key.sequence_id()?.name()))
    }

    pub fn cached<K: SequenceKey>(&self, key: K) -> Result<Option<Arc<Sequence>>, OeisError> {
        Ok(self.cache.get(&key.sequence_id()?.name()).cloned())
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn registry(&mut self) -> Registry<'_, C> {
        Registry::from_factory(self)
    }

    fn lookup(&self, name: &str, with_bfile: bool) -> Lookup {
        match self.cache.get(name) {
            Some(sequence) if with_bfile && !sequence.with_bfile() => {
                Lookup::NeedsBfile(Arc::clone(sequence))
            }
            Some(sequence) => Lookup::Ready(Arc::clone(sequence)),
            None => Lookup::Miss,
        }
    }

    fn admit(&mut self, name: String, sequence: Sequence, cache_result: bool) -> Arc<Sequence> {
        let sequence = Arc::new(sequence);
        if cache_result || self.always_cache {
            debug!(%name, "caching sequence");
            self.cache.insert(name, Arc::clone(&sequence));
        }
        sequence
    }

    fn apply_bfile(sequence: &Sequence, bfile: Option<BFile>) -> Result<(), OeisError> {
        match bfile {
            Some(bfile) => {
                let before = sequence.sample_len()?;
                if sequence.extend_from_bfile(&bfile)? {
                    info!(
                        name = %sequence.id(),
                        added = sequence.sample_len()? - before,
                        "extended sample from b-file"
                    );
                }
            }
            None => debug!(name = %sequence.id(), "no b-file available"),
        }
        Ok(())
    }

    fn build(id: &SequenceId, meta: Option<Metadata>) -> Result<Sequence, OeisError> {
        let meta = meta.ok_or_else(|| OeisError::MissingIdentifier(id.name()))?;
        let sequence = Sequence::from_metadata(meta)?;
        if sequence.id() != *id {
            return Err(OeisError::Decode(format!(
                "lookup for {id} returned entry {}",
                sequence.id()
            )));
        }
        Ok(sequence)
    }
}

impl<C: OeisClient> SequenceFactory<C> {
    pub fn load<K: SequenceKey>(&mut self, key: K) -> Result<Arc<Sequence>, OeisError> {
        self.load_with(key, LoadOptions::default())
    }

    pub fn load_with<K: SequenceKey>(
        &mut self,
        key: K,
        options: LoadOptions,
    ) -> Result<Arc<Sequence>, OeisError> {
        let id = key.sequence_id()?;
        let name = id.name();
        match self.lookup(&name, options.with_bfile) {
            Lookup::Ready(sequence) => {
                debug!(%name, "cache hit");
                return Ok(sequence);
            }
            Lookup::NeedsBfile(sequence) => {
                let bfile = self.client.fetch_bfile(&id)?;
                Self::apply_bfile(&sequence, bfile)?;
                return Ok(sequence);
            }
            Lookup::Miss => debug!(%name, "cache miss"),
        }
        let sequence = Self::build(&id, self.client.fetch_entry(&id)?)?;
        if options.with_bfile {
            Self::apply_bfile(&sequence, self.client.fetch_bfile(&id)?)?;
        }
        Ok(self.admit(name, sequence, options.cache_result))
    }

    pub fn call<K: SequenceKey>(&mut self, key: K) -> Result<Arc<Sequence>, OeisError> {
        let options = LoadOptions::default().cache_result(self.always_cache);
        self.load_with(key, options)
    }

    pub fn load_meta<K: SequenceKey>(&self, key: K) -> Result<Option<Metadata>, OeisError> {
        self.client.fetch_entry(&key.sequence_id()?)
    }

    pub fn exists<K: SequenceKey>(&self, key: K) -> Result<bool, OeisError> {
        self.client.exists(&key.sequence_id()?)
    }

    pub fn bfile_exists<K: SequenceKey>(&self, key: K) -> Result<bool, OeisError> {
        self.client.bfile_exists(&key.sequence_id()?)
    }

    pub fn search(&self, term: &str) -> Result<SearchResults, OeisError> {
        self.client.search(validate_term(term)?)
    }

    pub fn search_terms<I, T>(&self, terms: I) -> Result<SearchResults, OeisError>
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.search(&join_terms(terms))
    }
}

impl<C: AsyncOeisClient> SequenceFactory<C> {
    pub async fn load_async<K: SequenceKey>(&mut self, key: K) -> Result<Arc<Sequence>, OeisError> {
        self.load_with_async(key, LoadOptions::default()).await
    }

    pub async fn load_with_async<K: SequenceKey>(
        &mut self,
        key: K,
        options: LoadOptions,
    ) -> Result<Arc<Sequence>, OeisError> {
        let id = key.sequence_id()?;
        let name = id.name();
        match self.lookup(&name, options.with_bfile) {
            Lookup::Ready(sequence) => {
                debug!(%name, "cache hit");
                return Ok(sequence);
            }
            Lookup::NeedsBfile(sequence) => {
                let bfile = self.client.fetch_bfile(&id).await?;
                Self::apply_bfile(&sequence, bfile)?;
                return Ok(sequence);
            }
            Lookup::Miss => debug!(%name, "cache miss"),
        }
        let sequence = Self::build(&id, self.client.fetch_entry(&id).await?)?;
        if options.with_bfile {
            Self::apply_bfile(&sequence, self.client.fetch_bfile(&id).await?)?;
        }
        Ok(self.admit(name, sequence, options.cache_result))
    }

    pub async fn call_async<K: SequenceKey>(&mut self, key: K) -> Result<Arc<Sequence>, OeisError> {
        let options = LoadOptions::default().cache_result(self.always_cache);
        self.load_with_async(key, options).await
    }

    pub async fn load_meta_async<K: SequenceKey>(
        &self,
        key: K,
    ) -> Result<Option<Metadata>, OeisError> {
        self.client.fetch_entry(&key.sequence_id()?).await
    }

    pub async fn exists_async<K: SequenceKey>(&self, key: K) -> Result<bool, OeisError> {
        Ok(self.load_meta_async(key).await?.is_some())
    }

    pub async fn search_async(&self, term: &str) -> Result<SearchResults, OeisError> {
        self.client.search(validate_term(term)?).await
    }
}

impl<C> PartialEq for SequenceFactory<C> {
    fn eq(&self, other: &Self) -> bool {
        self.always_cache == other.always_cache
            && Arc::ptr_eq(&self.client, &other.client)
            && self.cache == other.cache
    }
}

impl<C> fmt::Debug for SequenceFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.cache.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("SequenceFactory")
            .field("cache", &names)
            .field("always_cache", &self.always_cache)
            .finish()
    }
}
