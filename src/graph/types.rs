//! Stream node declarations

use crate::context::ContextRule;
use crate::decode::DecoderKind;
use crate::types::{Method, SyncMode};
use serde_json::Value;

/// How a stream turns requests into records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamKind {
    /// Cursor-paginated list endpoint
    #[default]
    Paginated,
    /// One object per request, no pagination parameters
    SingleObject,
    /// Recursive walk of a block tree rooted at the context's page
    BlockTree,
}

impl StreamKind {
    /// Decoder matching this kind
    pub fn decoder_kind(self) -> DecoderKind {
        match self {
            StreamKind::SingleObject => DecoderKind::Object,
            StreamKind::Paginated | StreamKind::BlockTree => DecoderKind::Envelope,
        }
    }
}

/// Link from a child stream to its parent
#[derive(Debug, Clone, PartialEq)]
pub struct ParentLink {
    /// Parent stream name
    pub stream: String,
    /// How parent records become contexts
    pub rule: ContextRule,
}

/// One declared stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamNode {
    /// Unique stream name
    pub name: String,
    /// Endpoint path template, e.g. `/blocks/{page_id}/children`
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Fixed JSON body for POST streams (pagination fields are added per request)
    pub body: Option<Value>,
    /// Request/decode behaviour
    pub kind: StreamKind,
    /// Full-table or incremental
    pub sync_mode: SyncMode,
    /// Field compared against the cutoff (incremental only)
    pub replication_key: Option<String>,
    /// Fields identifying a record
    pub primary_keys: Vec<String>,
    /// Parent stream, `None` for roots
    pub parent: Option<ParentLink>,
    /// Record fields copied from the context: `(field, context key)`
    pub lineage: Vec<(String, String)>,
}

impl StreamNode {
    fn new(name: impl Into<String>, method: Method, path: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            method,
            body: None,
            kind,
            sync_mode: SyncMode::FullTable,
            replication_key: None,
            primary_keys: vec!["id".to_string()],
            parent: None,
            lineage: Vec::new(),
        }
    }

    /// Declare a paginated list stream
    pub fn list(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self::new(name, method, path, StreamKind::Paginated)
    }

    /// Declare a single-object GET stream
    pub fn single_object(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path, StreamKind::SingleObject)
    }

    /// Declare a block-tree stream
    pub fn block_tree(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path, StreamKind::BlockTree)
    }

    /// Set the fixed request body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Make the stream incremental on a replication key
    #[must_use]
    pub fn incremental(mut self, replication_key: impl Into<String>) -> Self {
        self.sync_mode = SyncMode::Incremental;
        self.replication_key = Some(replication_key.into());
        self
    }

    /// Hang the stream off a parent
    #[must_use]
    pub fn child_of(mut self, parent: impl Into<String>, rule: ContextRule) -> Self {
        self.parent = Some(ParentLink {
            stream: parent.into(),
            rule,
        });
        self
    }

    /// Copy a context key into every emitted record
    #[must_use]
    pub fn stamp(mut self, field: impl Into<String>, context_key: impl Into<String>) -> Self {
        self.lineage.push((field.into(), context_key.into()));
        self
    }

    /// Name of the parent stream
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.stream.as_str())
    }

    /// Whether this stream has no parent
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether this stream filters by a cutoff
    pub fn is_incremental(&self) -> bool {
        self.sync_mode == SyncMode::Incremental
    }
}
