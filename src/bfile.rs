use num_bigint::BigInt;

use crate::error::OeisError;

const MISSING_PAGE_PHRASES: &[&str] = &[
    "Sorry, the page you requested was not found",
    "404 Not Found",
    "No such file",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BFile {
    pub offset: i64,
    pub values: Vec<BigInt>,
}

impl BFile {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values for terms `first_term` onwards, or `None` when `first_term` lies
    /// outside the file.
    pub fn tail_from(&self, first_term: i64) -> Option<&[BigInt]> {
        let start = usize::try_from(first_term.checked_sub(self.offset)?).ok()?;
        self.values.get(start..)
    }
}

pub fn is_missing_page(body: &str) -> bool {
    MISSING_PAGE_PHRASES
        .iter()
        .any(|phrase| body.contains(phrase))
}

pub fn parse_bfile(body: &str) -> Result<Option<BFile>, OeisError> {
    if is_missing_page(body) {
        return Ok(None);
    }
    let mut offset = None;
    let mut values = Vec::new();
    for (line_no, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(index), Some(value)) = (tokens.next(), tokens.next()) else {
            return Err(OeisError::Decode(format!(
                "b-file line {} has no value: {line}",
                line_no + 1
            )));
        };
        if offset.is_none() {
            offset = Some(index.parse::<i64>().map_err(|err| {
                OeisError::Decode(format!("b-file offset {index}: {err}"))
            })?);
        }
        let value = value.parse::<BigInt>().map_err(|err| {
            OeisError::Decode(format!("b-file line {}: {err}", line_no + 1))
        })?;
        values.push(value);
    }
    Ok(offset.map(|offset| BFile { offset, values }))
}
