use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::bfile::BFile;
use crate::client::SearchResults;
use crate::domain::SequenceKey;
use crate::error::OeisError;
use crate::sequence::{ReferencedText, Sequence};

#[derive(Debug, Clone, Serialize)]
pub struct SequenceSummary {
    pub name: String,
    pub description: Option<String>,
    pub offset: i64,
    pub keywords: Vec<String>,
    pub terms: Vec<String>,
    pub with_bfile: bool,
    pub modified: Option<String>,
    pub created: Option<String>,
    pub programs: BTreeMap<String, Vec<String>>,
    pub cross_references: Vec<ReferencedText>,
}

impl SequenceSummary {
    pub fn from_sequence(sequence: &Sequence, terms: usize) -> Result<Self, OeisError> {
        let shown = sequence.with_sample(|sample| {
            sample
                .iter()
                .take(terms)
                .map(|term| term.to_string())
                .collect::<Vec<_>>()
        })?;
        Ok(Self {
            name: sequence.name(),
            description: sequence.description().map(str::to_string),
            offset: sequence.offset()?,
            keywords: sequence.keywords(),
            terms: shown,
            with_bfile: sequence.with_bfile(),
            modified: sequence.modified()?.map(|time| time.to_rfc3339()),
            created: sequence.created()?.map(|time| time.to_rfc3339()),
            programs: sequence.programs().clone(),
            cross_references: sequence.cross_references().to_vec(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub count: u64,
    pub hits: Vec<SearchHit>,
}

impl From<&SearchResults> for SearchSummary {
    fn from(results: &SearchResults) -> Self {
        let hits = results
            .results
            .iter()
            .map(|meta| SearchHit {
                name: meta
                    .number()
                    .and_then(|number| number.sequence_id().ok())
                    .map_or_else(|| "unknown".to_string(), |id| id.name()),
                description: meta.name().map(str::to_string),
            })
            .collect();
        Self {
            count: results.count,
            hits,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BFileSummary {
    pub name: String,
    pub offset: Option<i64>,
    pub values: Vec<String>,
}

impl BFileSummary {
    pub fn new(name: String, bfile: Option<&BFile>) -> Self {
        Self {
            name,
            offset: bfile.map(|bfile| bfile.offset),
            values: bfile
                .map(|bfile| bfile.values.iter().map(|v| v.to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_sequence(summary: &SequenceSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_search(summary: &SearchSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_bfile(summary: &BFileSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
