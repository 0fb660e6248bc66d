use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use num_bigint::BigInt;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::bfile::BFile;
use crate::domain::{SequenceId, SequenceKey, find_references};
use crate::error::OeisError;
use crate::metadata::Metadata;

static PROGRAM_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([^()]*)\)").expect("program tag pattern compiles"));

pub const UNTAGGED_PROGRAM: &str = "other";

pub type Terms = Box<dyn Iterator<Item = BigInt> + Send>;

/// Restartable term source: every call to [`Generator::terms`] starts again at
/// the sequence offset.
#[derive(Clone)]
pub struct Generator(Arc<dyn Fn() -> Terms + Send + Sync>);

impl Generator {
    pub fn new<F, I>(make_terms: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = BigInt>,
        I::IntoIter: Send + 'static,
    {
        Self(Arc::new(move || Box::new(make_terms().into_iter()) as Terms))
    }

    pub fn terms(&self) -> Terms {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &Generator) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Generator {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generator({:p})", Arc::as_ptr(&self.0))
    }
}

/// Closed form for term `n`, taking the absolute term index. `None` means the
/// function has no value there.
#[derive(Clone)]
pub struct IndexFunction(Arc<dyn Fn(i64) -> Option<BigInt> + Send + Sync>);

impl IndexFunction {
    pub fn new<F>(term: F) -> Self
    where
        F: Fn(i64) -> Option<BigInt> + Send + Sync + 'static,
    {
        Self(Arc::new(term))
    }

    pub fn at(&self, index: i64) -> Option<BigInt> {
        (self.0)(index)
    }

    pub fn ptr_eq(&self, other: &IndexFunction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for IndexFunction {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for IndexFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexFunction({:p})", Arc::as_ptr(&self.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermSource {
    pub generator: Option<Generator>,
    pub index_function: Option<IndexFunction>,
}

impl TermSource {
    pub fn is_empty(&self) -> bool {
        self.generator.is_none() && self.index_function.is_none()
    }

    pub fn already_on(&self, sequence: &Sequence) -> bool {
        let same_generator = match (&self.generator, sequence.generator()) {
            (None, _) => true,
            (Some(new), Some(old)) => new.ptr_eq(old),
            (Some(_), None) => false,
        };
        let same_index_function = match (&self.index_function, sequence.index_function()) {
            (None, _) => true,
            (Some(new), Some(old)) => new.ptr_eq(old),
            (Some(_), None) => false,
        };
        same_generator && same_index_function
    }
}

impl From<Generator> for TermSource {
    fn from(generator: Generator) -> Self {
        Self {
            generator: Some(generator),
            index_function: None,
        }
    }
}

impl From<Option<Generator>> for TermSource {
    fn from(generator: Option<Generator>) -> Self {
        Self {
            generator,
            index_function: None,
        }
    }
}

impl From<IndexFunction> for TermSource {
    fn from(index_function: IndexFunction) -> Self {
        Self {
            generator: None,
            index_function: Some(index_function),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferencedText {
    pub text: String,
    pub references: Vec<String>,
}

impl ReferencedText {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            references: find_references(text),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SampleState {
    values: Option<Vec<BigInt>>,
    with_bfile: bool,
}

pub struct Sequence {
    id: SequenceId,
    meta: Arc<Metadata>,
    generator: Option<Generator>,
    index_function: Option<IndexFunction>,
    sample: Mutex<SampleState>,
    programs: OnceLock<BTreeMap<String, Vec<String>>>,
    cross_references: OnceLock<Vec<ReferencedText>>,
    comments: OnceLock<Vec<ReferencedText>>,
}

impl Sequence {
    pub fn new(id: SequenceId) -> Self {
        Self::from_parts(id, None, Arc::new(Metadata::default()))
    }

    pub fn from_parts(id: SequenceId, generator: Option<Generator>, meta: Arc<Metadata>) -> Self {
        Self {
            id,
            meta,
            generator,
            index_function: None,
            sample: Mutex::new(SampleState::default()),
            programs: OnceLock::new(),
            cross_references: OnceLock::new(),
            comments: OnceLock::new(),
        }
    }

    pub fn from_metadata(meta: Metadata) -> Result<Self, OeisError> {
        let id = meta.number().unwrap_or(&Value::Null).sequence_id()?;
        Ok(Self::from_parts(id, None, Arc::new(meta)))
    }

    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_index_function(mut self, index_function: IndexFunction) -> Self {
        self.index_function = Some(index_function);
        self
    }

    pub fn with_source(mut self, source: TermSource) -> Self {
        if let Some(generator) = source.generator {
            self.generator = Some(generator);
        }
        if let Some(index_function) = source.index_function {
            self.index_function = Some(index_function);
        }
        self
    }

    pub fn derive_with(&self, source: TermSource) -> Self {
        self.clone().with_source(source)
    }

    pub fn derive_with_generator(&self, generator: Option<Generator>) -> Self {
        self.derive_with(generator.into())
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn number(&self) -> u64 {
        self.id.number()
    }

    pub fn name(&self) -> String {
        self.id.name()
    }

    pub fn short_name(&self) -> String {
        self.id.short_name()
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn generator(&self) -> Option<&Generator> {
        self.generator.as_ref()
    }

    pub fn index_function(&self) -> Option<&IndexFunction> {
        self.index_function.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.meta.name()
    }

    pub fn offset(&self) -> Result<i64, OeisError> {
        let Some(raw) = self.meta.offset() else {
            return Ok(0);
        };
        let first = raw.split(',').next().unwrap_or_default().trim();
        first
            .parse()
            .map_err(|_| OeisError::malformed("offset", raw))
    }

    pub fn sample(&self) -> Result<Vec<BigInt>, OeisError> {
        self.with_sample(<[BigInt]>::to_vec)
    }

    pub fn sample_len(&self) -> Result<usize, OeisError> {
        self.with_sample(<[BigInt]>::len)
    }

    pub fn with_sample<R>(&self, f: impl FnOnce(&[BigInt]) -> R) -> Result<R, OeisError> {
        let mut state = self.state();
        Ok(f(Self::derived(&mut state, &self.meta)?))
    }

    pub fn sample_append(&self, value: BigInt) -> Result<(), OeisError> {
        let mut state = self.state();
        Self::derived(&mut state, &self.meta)?.push(value);
        Ok(())
    }

    pub fn sample_extend<I>(&self, values: I) -> Result<(), OeisError>
    where
        I: IntoIterator<Item = BigInt>,
    {
        let mut state = self.state();
        Self::derived(&mut state, &self.meta)?.extend(values);
        Ok(())
    }

    pub fn sample_reset(&self) {
        *self.state() = SampleState::default();
    }

    pub fn with_bfile(&self) -> bool {
        self.state().with_bfile
    }

    /// Appends the part of `bfile` beyond the current sample. Returns `false`
    /// and leaves the sample alone when the file does not line up with it.
    pub(crate) fn extend_from_bfile(&self, bfile: &BFile) -> Result<bool, OeisError> {
        let offset = self.offset()?;
        let mut state = self.state();
        let values = Self::derived(&mut state, &self.meta)?;
        let next_term = offset + values.len() as i64;
        let Some(tail) = bfile.tail_from(next_term) else {
            debug!(
                name = %self.id,
                next_term,
                bfile_offset = bfile.offset,
                "b-file does not cover the sample tail"
            );
            return Ok(false);
        };
        values.extend_from_slice(tail);
        state.with_bfile = true;
        Ok(true)
    }

    /// Term `index` of the sequence: the sample first, then the index function,
    /// then a fresh run of the generator from the offset.
    pub fn get(&self, index: i64) -> Result<BigInt, OeisError> {
        let unavailable = || OeisError::IndexUnavailable {
            name: self.name(),
            index,
        };
        let relative = index
            .checked_sub(self.offset()?)
            .and_then(|rel| usize::try_from(rel).ok())
            .ok_or_else(unavailable)?;
        if let Some(value) = self.with_sample(|sample| sample.get(relative).cloned())? {
            return Ok(value);
        }
        if let Some(value) = self.index_function.as_ref().and_then(|term| term.at(index)) {
            return Ok(value);
        }
        match &self.generator {
            Some(generator) => generator.terms().nth(relative).ok_or_else(unavailable),
            None => Err(unavailable()),
        }
    }

    pub fn generate(&self) -> Option<Terms> {
        self.generator.as_ref().map(Generator::terms)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.meta
            .keyword()
            .map(|keywords| {
                keywords
                    .split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn formulas(&self) -> Vec<String> {
        self.meta.formula().into_iter().map(str::to_string).collect()
    }

    pub fn examples(&self) -> Vec<String> {
        self.meta.example().into_iter().map(str::to_string).collect()
    }

    /// Program listings keyed by lower-cased language tag. Lines from the
    /// dedicated `maple` and `mathematica` fields come ahead of any tagged
    /// lines for the same language.
    pub fn programs(&self) -> &BTreeMap<String, Vec<String>> {
        self.programs.get_or_init(|| {
            let mut programs = parse_programs(&self.meta.program());
            let listings = [
                ("maple", self.meta.maple()),
                ("mathematica", self.meta.mathematica()),
            ];
            for (key, lines) in listings {
                if self.meta.get(key).is_some() {
                    let tagged = programs.remove(key).unwrap_or_default();
                    let merged = lines
                        .into_iter()
                        .map(str::to_string)
                        .chain(tagged)
                        .collect();
                    programs.insert(key.to_string(), merged);
                }
            }
            programs
        })
    }

    pub fn cross_references(&self) -> &[ReferencedText] {
        self.cross_references.get_or_init(|| {
            self.meta
                .xref()
                .into_iter()
                .map(ReferencedText::new)
                .collect()
        })
    }

    pub fn comments(&self) -> &[ReferencedText] {
        self.comments.get_or_init(|| {
            self.meta
                .comment()
                .into_iter()
                .map(|comment| ReferencedText::new(comment.trim()))
                .collect()
        })
    }

    pub fn modified(&self) -> Result<Option<DateTime<FixedOffset>>, OeisError> {
        self.meta
            .time()
            .map(|raw| parse_timestamp("time", raw))
            .transpose()
    }

    pub fn created(&self) -> Result<Option<DateTime<FixedOffset>>, OeisError> {
        self.meta
            .created()
            .map(|raw| parse_timestamp("created", raw))
            .transpose()
    }

    pub fn finite(&self) -> Option<bool> {
        None
    }

    fn state(&self) -> MutexGuard<'_, SampleState> {
        self.sample.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn derived<'s>(
        state: &'s mut SampleState,
        meta: &Metadata,
    ) -> Result<&'s mut Vec<BigInt>, OeisError> {
        if state.values.is_none() {
            state.values = Some(parse_data(meta)?);
        }
        Ok(state.values.get_or_insert_with(Vec::new))
    }
}

impl Clone for Sequence {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            meta: Arc::clone(&self.meta),
            generator: self.generator.clone(),
            index_function: self.index_function.clone(),
            sample: Mutex::new(self.state().clone()),
            programs: self.programs.clone(),
            cross_references: self.cross_references.clone(),
            comments: self.comments.clone(),
        }
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.meta == other.meta
            && self.generator == other.generator
            && self.index_function == other.index_function
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name())
            .field("description", &self.description())
            .field("generator", &self.generator)
            .field("index_function", &self.index_function)
            .field("with_bfile", &self.with_bfile())
            .finish()
    }
}

impl SequenceKey for Sequence {
    fn sequence_id(&self) -> Result<SequenceId, OeisError> {
        Ok(self.id)
    }
}

fn parse_data(meta: &Metadata) -> Result<Vec<BigInt>, OeisError> {
    let Some(data) = meta.data() else {
        return Ok(Vec::new());
    };
    data.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            term.parse::<BigInt>()
                .map_err(|err| OeisError::malformed("data", format!("{term}: {err}")))
        })
        .collect()
}

fn parse_programs(lines: &[&str]) -> BTreeMap<String, Vec<String>> {
    let mut programs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut tag: Option<String> = None;
    for line in lines {
        if let Some(caps) = PROGRAM_TAG_RE.captures(line) {
            tag = Some(caps[1].to_string());
        }
        let (key, cleaned) = match &tag {
            Some(tag) => (tag.to_lowercase(), line.replace(&format!("({tag})"), "")),
            None => (UNTAGGED_PROGRAM.to_string(), line.to_string()),
        };
        programs
            .entry(key)
            .or_default()
            .push(cleaned.trim().to_string());
    }
    programs
}

fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<FixedOffset>, OeisError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .map(|naive| naive.and_utc().fixed_offset())
        })
        .map_err(|err| OeisError::malformed(field, format!("{raw}: {err}")))
}
