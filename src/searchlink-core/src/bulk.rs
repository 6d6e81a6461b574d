//! Bulk action records and size-bounded chunking
//!
//! A bulk request body is a sequence of pre-encoded action records, each
//! followed by a newline. [`bulk_chunks`] groups a lazy stream of records into
//! chunks that respect a record-count and/or byte-size limit.

use serde_json::{Map, Value as Json};

use crate::codec::Value;
use crate::error::EncodeError;

/// Upper bounds for one chunk. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_records: Option<usize>,
    /// Counts each record's length plus its trailing newline
    pub max_bytes: Option<usize>,
}

fn default_max_records() -> usize {
    300
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_records: Some(default_max_records()),
            max_bytes: None,
        }
    }
}

impl ChunkLimits {
    pub fn unbounded() -> Self {
        Self {
            max_records: None,
            max_bytes: None,
        }
    }

    pub fn records(max_records: usize) -> Self {
        Self {
            max_records: Some(max_records),
            max_bytes: None,
        }
    }

    pub fn bytes(max_bytes: usize) -> Self {
        Self {
            max_records: None,
            max_bytes: Some(max_bytes),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }
}

/// Lazy chunking adapter returned by [`bulk_chunks`]
pub struct BulkChunks<I: Iterator> {
    records: I,
    limits: ChunkLimits,
    current: Vec<I::Item>,
    current_bytes: usize,
}

/// Group records into chunks bounded by `limits`.
///
/// A record that alone exceeds the byte limit still goes out, as a chunk of its
/// own. Empty input yields no chunks.
pub fn bulk_chunks<I>(records: I, limits: ChunkLimits) -> BulkChunks<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    BulkChunks {
        records: records.into_iter(),
        limits,
        current: Vec::new(),
        current_bytes: 0,
    }
}

/// Whether adding a record of `record_bytes` to a chunk would break `limits`
fn would_overflow(limits: &ChunkLimits, records: usize, bytes: usize, record_bytes: usize) -> bool {
    let over_count = limits.max_records.is_some_and(|max| records + 1 > max);
    let over_bytes = limits.max_bytes.is_some_and(|max| bytes + record_bytes > max);
    over_count || over_bytes
}

impl<I> Iterator for BulkChunks<I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        for record in self.records.by_ref() {
            let record_bytes = record.as_ref().len() + 1;

            let ready = if !self.current.is_empty()
                && would_overflow(&self.limits, self.current.len(), self.current_bytes, record_bytes)
            {
                self.current_bytes = 0;
                Some(std::mem::take(&mut self.current))
            } else {
                None
            };

            self.current.push(record);
            self.current_bytes += record_bytes;

            if ready.is_some() {
                return ready;
            }
        }

        if self.current.is_empty() {
            None
        } else {
            self.current_bytes = 0;
            Some(std::mem::take(&mut self.current))
        }
    }
}

/// Join one chunk into a bulk request body, newline-terminated.
pub fn bulk_body<R: AsRef<[u8]>>(records: &[R]) -> Vec<u8> {
    let total = records.iter().map(|r| r.as_ref().len() + 1).sum();
    let mut body = Vec::with_capacity(total);
    for record in records {
        body.extend_from_slice(record.as_ref());
        body.push(b'\n');
    }
    body
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOp {
    Index,
    Create,
    Delete,
    Update,
}

impl BulkOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOp::Index => "index",
            BulkOp::Create => "create",
            BulkOp::Delete => "delete",
            BulkOp::Update => "update",
        }
    }
}

/// One bulk operation, encoded into a record by [`BulkAction::encode`]
#[derive(Debug, Clone, PartialEq)]
pub struct BulkAction {
    op: BulkOp,
    meta: Vec<(String, Value)>,
    source: Option<Value>,
}

impl BulkAction {
    /// Index a document, replacing any existing one with the same id.
    pub fn index(doc: impl Into<Value>) -> Self {
        Self::with_source(BulkOp::Index, doc.into())
    }

    /// Index a document, failing if one with the same id exists.
    pub fn create(doc: impl Into<Value>) -> Self {
        Self::with_source(BulkOp::Create, doc.into())
    }

    pub fn delete(id: impl Into<Value>) -> Self {
        Self {
            op: BulkOp::Delete,
            meta: vec![("_id".to_string(), id.into())],
            source: None,
        }
    }

    /// Partial update; `body` is the update payload, e.g. `{"doc": {...}}`.
    pub fn update(id: impl Into<Value>, body: impl Into<Value>) -> Self {
        Self {
            op: BulkOp::Update,
            meta: vec![("_id".to_string(), id.into())],
            source: Some(body.into()),
        }
    }

    fn with_source(op: BulkOp, source: Value) -> Self {
        Self {
            op,
            meta: Vec::new(),
            source: Some(source),
        }
    }

    pub fn op(&self) -> BulkOp {
        self.op
    }

    pub fn index_name(self, index: impl Into<String>) -> Self {
        self.meta("_index", index.into())
    }

    pub fn doc_type(self, doc_type: impl Into<String>) -> Self {
        self.meta("_type", doc_type.into())
    }

    pub fn id(self, id: impl Into<Value>) -> Self {
        self.meta("_id", id)
    }

    /// Set an action metadata field such as `_routing` or `_version`.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.meta.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.meta.push((key, value)),
        }
        self
    }

    /// Encode as one record: the action line, plus the source line if any.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let mut meta = Map::with_capacity(self.meta.len());
        for (key, value) in &self.meta {
            meta.insert(key.clone(), value.to_json()?);
        }
        let mut action = Map::with_capacity(1);
        action.insert(self.op.as_str().to_string(), Json::Object(meta));

        let mut record = Json::Object(action).to_string();
        if let Some(source) = &self.source {
            record.push('\n');
            record.push_str(&source.to_json()?.to_string());
        }
        Ok(record)
    }
}
