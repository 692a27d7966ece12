//! Frame index resolution over a scene's forward-linked sample chain.

use std::collections::HashSet;

use crate::dataset::{Sample, SampleSource};
use crate::error::{Result, ViewerError};

/// Follows `next` from `first_sample` exactly `frame_index` times.
///
/// Seeking through a whole scene this way is quadratic; build a
/// [`FrameIndex`] once per scene instead.
pub fn resolve<'a, S: SampleSource + ?Sized>(
    source: &'a S,
    first_sample: &str,
    frame_index: usize,
) -> Result<&'a Sample> {
    let mut current = lookup(source, first_sample)?;
    for step in 0..frame_index {
        match current.next.as_deref() {
            Some(next) => current = lookup(source, next)?,
            None => {
                return Err(ViewerError::OutOfRange {
                    index: frame_index,
                    len: step + 1,
                })
            }
        }
    }
    Ok(current)
}

fn lookup<'a, S: SampleSource + ?Sized>(source: &'a S, token: &str) -> Result<&'a Sample> {
    source.sample(token).ok_or_else(|| ViewerError::UnknownToken {
        table: "sample",
        token: token.to_string(),
    })
}

/// Ordered sample tokens of one scene, resolved once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameIndex {
    tokens: Vec<String>,
}

impl FrameIndex {
    /// Walks the chain starting at `first_sample` a single time.
    ///
    /// An empty `first_sample` yields an empty index.
    pub fn build<S: SampleSource + ?Sized>(source: &S, first_sample: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(first_sample).filter(|t| !t.is_empty());

        while let Some(token) = next {
            if !seen.insert(token) {
                return Err(ViewerError::malformed(
                    "sample.json",
                    format!("sample chain revisits {}", token),
                ));
            }
            let sample = lookup(source, token)?;
            tokens.push(sample.token.clone());
            next = sample.next.as_deref();
        }

        Ok(Self { tokens })
    }

    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Sample token of frame `index`.
    pub fn get(&self, index: usize) -> Result<&str> {
        self.tokens
            .get(index)
            .map(String::as_str)
            .ok_or(ViewerError::OutOfRange {
                index,
                len: self.tokens.len(),
            })
    }

    pub fn last_index(&self) -> Option<usize> {
        self.tokens.len().checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}
