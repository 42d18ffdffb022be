//! JSON file-pool source
//!
//! Reads a pool of record files in order and chunks them into batches of
//! candidate groups.
//!
//! # Accepted input
//!
//! A file holds either a top-level JSON array or a stream of concatenated
//! (typically newline-delimited) JSON values. Streams are read lazily; arrays
//! are loaded whole, so very large inputs should use the stream form.
//!
//! Each value is one of:
//! - a flat record `{"id": ..., "url": "..."}` (id may be a string or number)
//! - a pre-grouped object `{"<id>": ["url", ...], ...}`
//!
//! Flat records sharing an id within a batch are merged into one group.

use crate::source::{BatchSource, SourceError, SourceResult};
use crate::state::CandidateGroup;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

type ValueStream = serde_json::StreamDeserializer<'static, serde_json::de::IoRead<BufReader<File>>, Value>;

/// Values of the file currently being read
enum RecordReader {
    Stream(ValueStream),
    Array(std::vec::IntoIter<Value>),
}

/// Source reading candidate groups from JSON record files
pub struct JsonFileSource {
    files: VecDeque<PathBuf>,
    current: Option<(PathBuf, RecordReader)>,
    queue: VecDeque<(String, Vec<String>)>,
    batch_size: usize,
    max_urls_per_group: usize,
    skipped_files: Vec<PathBuf>,
    skipped_records: usize,
}

impl JsonFileSource {
    /// Creates a source over `files`
    ///
    /// Every file must exist; a missing file is reported up front rather than
    /// halfway through a run.
    pub fn new(
        files: Vec<PathBuf>,
        batch_size: usize,
        max_urls_per_group: usize,
    ) -> SourceResult<Self> {
        for path in &files {
            std::fs::metadata(path).map_err(|source| SourceError::Open {
                path: path.clone(),
                source,
            })?;
        }

        Ok(Self {
            files: files.into(),
            current: None,
            queue: VecDeque::new(),
            batch_size: batch_size.max(1),
            max_urls_per_group: max_urls_per_group.max(1),
            skipped_files: Vec::new(),
            skipped_records: 0,
        })
    }

    /// Files abandoned because of unreadable or malformed content
    pub fn skipped_files(&self) -> &[PathBuf] {
        &self.skipped_files
    }

    /// Records ignored because they had no usable id or url
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    /// Opens a file and picks the reader for its shape
    fn open(path: &PathBuf) -> SourceResult<RecordReader> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.clone(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let is_array = loop {
            let buf = reader.fill_buf().map_err(|source| SourceError::Read {
                path: path.clone(),
                source,
            })?;
            if buf.is_empty() {
                break false;
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(pos) => {
                    let first = buf[pos];
                    reader.consume(pos);
                    break first == b'[';
                }
                None => {
                    let len = buf.len();
                    reader.consume(len);
                }
            }
        };

        if is_array {
            let values: Vec<Value> = serde_json::from_reader(reader).map_err(|e| {
                SourceError::Read {
                    path: path.clone(),
                    source: e.into(),
                }
            })?;
            Ok(RecordReader::Array(values.into_iter()))
        } else {
            Ok(RecordReader::Stream(
                serde_json::Deserializer::from_reader(reader).into_iter::<Value>(),
            ))
        }
    }

    /// Next raw value across the file pool
    fn next_value(&mut self) -> SourceResult<Option<Value>> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.files.pop_front() else {
                    return Ok(None);
                };

                match Self::open(&path) {
                    Ok(reader) => {
                        tracing::info!("Reading records from {}", path.display());
                        self.current = Some((path, reader));
                    }
                    Err(SourceError::Open { path, source }) => {
                        return Err(SourceError::Open { path, source });
                    }
                    Err(e) => {
                        tracing::error!("Skipping {}: {}", path.display(), e);
                        self.skipped_files.push(path);
                    }
                }
                continue;
            }

            let next = match self.current.as_mut() {
                Some((_, RecordReader::Array(values))) => values.next().map(Ok),
                Some((_, RecordReader::Stream(stream))) => stream.next(),
                None => None,
            };

            match next {
                Some(Ok(value)) => return Ok(Some(value)),
                Some(Err(e)) => {
                    if let Some((path, _)) = self.current.take() {
                        tracing::error!("Malformed JSON in {}, skipping rest of file: {}", path.display(), e);
                        self.skipped_files.push(path);
                    }
                }
                None => {
                    self.current = None;
                }
            }
        }
    }

    /// Turns one raw value into `(id, urls)` entries
    fn interpret(&mut self, value: Value) -> Vec<(String, Vec<String>)> {
        let Value::Object(map) = value else {
            self.skipped_records += 1;
            tracing::warn!("Skipping non-object record");
            return Vec::new();
        };

        if map.contains_key("url") || map.contains_key("id") {
            let id = map.get("id").and_then(id_string);
            let url = map.get("url").and_then(Value::as_str);
            return match (id, url) {
                (Some(id), Some(url)) if !url.trim().is_empty() => {
                    vec![(id, vec![url.trim().to_string()])]
                }
                _ => {
                    self.skipped_records += 1;
                    tracing::warn!("Skipping record without usable id/url");
                    Vec::new()
                }
            };
        }

        let mut entries = Vec::new();
        for (id, urls) in map {
            let urls: Vec<String> = match urls {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect(),
                Value::String(url) if !url.trim().is_empty() => vec![url.trim().to_string()],
                _ => Vec::new(),
            };

            if urls.is_empty() {
                self.skipped_records += 1;
                tracing::warn!("Skipping group {} without candidate URLs", id);
                continue;
            }
            entries.push((id, urls));
        }
        entries
    }
}

/// Accepts string and numeric ids
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accumulates entries into at most `batch_size` distinct groups
struct BatchBuilder {
    groups: Vec<CandidateGroup>,
    index: HashMap<String, usize>,
    batch_size: usize,
    max_urls_per_group: usize,
}

impl BatchBuilder {
    fn new(batch_size: usize, max_urls_per_group: usize) -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
            batch_size,
            max_urls_per_group,
        }
    }

    /// Adds an entry; returns it back if it would start a group in a full batch
    fn try_add(&mut self, id: String, urls: Vec<String>) -> Option<(String, Vec<String>)> {
        let position = match self.index.get(&id) {
            Some(&position) => position,
            None => {
                if self.groups.len() >= self.batch_size {
                    return Some((id, urls));
                }
                self.groups.push(CandidateGroup::new(id.clone(), Vec::new()));
                self.index.insert(id, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[position];
        for url in urls {
            if group.urls.len() >= self.max_urls_per_group {
                break;
            }
            if !group.urls.contains(&url) {
                group.urls.push(url);
            }
        }
        None
    }

    fn finish(self) -> Option<Vec<CandidateGroup>> {
        if self.groups.is_empty() {
            None
        } else {
            Some(self.groups)
        }
    }
}

impl BatchSource for JsonFileSource {
    fn next_batch(&mut self) -> SourceResult<Option<Vec<CandidateGroup>>> {
        let mut builder = BatchBuilder::new(self.batch_size, self.max_urls_per_group);

        loop {
            while let Some((id, urls)) = self.queue.pop_front() {
                if let Some(rejected) = builder.try_add(id, urls) {
                    self.queue.push_front(rejected);
                    return Ok(builder.finish());
                }
            }

            match self.next_value()? {
                Some(value) => {
                    let entries = self.interpret(value);
                    self.queue.extend(entries);
                }
                None => break,
            }
        }

        Ok(builder.finish())
    }
}
