use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value as Json};
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::request::{concat, QueryParams, Request, Segment};
use crate::transport::{HttpTransport, Transport};
use crate::{ClientError, Result};
use searchlink_core::{
    bulk_body, bulk_chunks, BulkAction, ChunkLimits, ClientConfig, Endpoint, PoolSnapshot, Value,
};

/// Search or count criteria: a query-string expression or a query DSL body
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Sent as the `q` parameter, e.g. `name:joe`
    Text(String),
    Dsl(Value),
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Query::Text(s.to_string())
    }
}

impl From<String> for Query {
    fn from(s: String) -> Self {
        Query::Text(s)
    }
}

impl From<Json> for Query {
    fn from(dsl: Json) -> Self {
        Query::Dsl(Value::Json(dsl))
    }
}

impl From<Value> for Query {
    fn from(dsl: Value) -> Self {
        Query::Dsl(dsl)
    }
}

/// searchlink client
///
/// Cheap to clone; clones share one endpoint pool.
#[derive(Clone)]
pub struct Client {
    dispatcher: Arc<Dispatcher>,
}

impl Client {
    /// Create a client for the given node URLs with default settings
    pub fn new<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_config(ClientConfig::new(urls))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let mut transport = HttpTransport::new(config.insecure_skip_verify)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        if let Some(username) = &config.username {
            transport = transport.with_basic_auth(username.clone(), config.password.clone());
        }
        Self::with_transport(&config, Arc::new(transport))
    }

    /// Create a client over a custom transport
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let dispatcher = Dispatcher::new(config, transport)?;
        debug!(
            endpoints = config.urls.len(),
            max_retries = config.max_retries,
            "Client created"
        );
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Copies of the live and dead endpoint lists
    pub fn endpoints(&self) -> PoolSnapshot<Endpoint> {
        self.dispatcher.pool().snapshot()
    }

    /// Send an arbitrary request and return the decoded JSON response
    pub async fn send(&self, request: Request) -> Result<Json> {
        self.dispatcher.send(&request).await
    }

    /// Send a request and deserialize the response into `T`
    pub async fn send_as<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.send(request).await?;
        serde_json::from_value(response).map_err(ClientError::Deserialize)
    }

    // Documents

    /// Put a document into an index.
    ///
    /// Without an id the service assigns one. With `overwrite_existing` off,
    /// an existing document with the same id makes the call fail.
    pub async fn index(
        &self,
        index: &str,
        doc_type: &str,
        doc: impl Into<Value>,
        id: Option<&str>,
        overwrite_existing: bool,
        mut params: QueryParams,
    ) -> Result<Json> {
        if !overwrite_existing {
            params.insert("op_type", "create");
        }
        let request = if id.is_some() {
            Request::put()
        } else {
            Request::post()
        };
        self.send(
            request
                .segment(index)
                .segment(doc_type)
                .segment(id)
                .query(params)
                .json(doc),
        )
        .await
    }

    /// Send a pre-built newline-delimited bulk body
    pub async fn bulk(
        &self,
        body: impl Into<Vec<u8>>,
        index: Option<&str>,
        params: QueryParams,
    ) -> Result<Json> {
        self.send(
            Request::post()
                .segment(index)
                .segment("_bulk")
                .query(params)
                .raw(body),
        )
        .await
    }

    /// Index many documents in one request. A document's `id_field`, when
    /// present and not null, becomes its id.
    pub async fn bulk_index(
        &self,
        index: &str,
        doc_type: &str,
        docs: &[Json],
        id_field: &str,
        params: QueryParams,
    ) -> Result<Json> {
        if docs.is_empty() {
            return Err(ClientError::InvalidRequest(
                "no documents provided for bulk indexing".to_string(),
            ));
        }

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut action = BulkAction::index(doc.clone())
                .index_name(index)
                .doc_type(doc_type);
            match doc.get(id_field) {
                None | Some(Json::Null) => {}
                Some(id) => action = action.id(id.clone()),
            }
            records.push(action.encode()?);
        }

        self.bulk(bulk_body(&records), Some(index), params).await
    }

    /// Send bulk actions in chunks bounded by `limits`, one request per chunk.
    ///
    /// Every action is encoded before the first request goes out. Stops at the
    /// first failing chunk; earlier chunks stay applied.
    pub async fn bulk_chunked<I>(
        &self,
        actions: I,
        limits: ChunkLimits,
        params: QueryParams,
    ) -> Result<Vec<Json>>
    where
        I: IntoIterator<Item = BulkAction>,
    {
        let records = actions
            .into_iter()
            .map(|action| action.encode())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut responses = Vec::new();
        for (n, chunk) in bulk_chunks(records, limits).enumerate() {
            debug!(chunk = n, records = chunk.len(), "Sending bulk chunk");
            responses.push(self.bulk(bulk_body(&chunk), None, params.clone()).await?);
        }
        Ok(responses)
    }

    pub async fn delete(
        &self,
        index: &str,
        doc_type: &str,
        id: impl Into<Segment>,
        params: QueryParams,
    ) -> Result<Json> {
        let id = id.into();
        // An empty id would widen the call to the whole type
        if matches!(&id, Segment::Absent) || matches!(&id, Segment::Text(s) if s.is_empty()) {
            return Err(ClientError::InvalidRequest(
                "document id is empty; use delete_all to delete every document".to_string(),
            ));
        }
        self.send(
            Request::delete()
                .segment(index)
                .segment(doc_type)
                .segment(id)
                .query(params),
        )
        .await
    }

    /// Delete every document of a type
    pub async fn delete_all(&self, index: &str, doc_type: &str, params: QueryParams) -> Result<Json> {
        self.send(
            Request::delete()
                .segment(index)
                .segment(doc_type)
                .query(params),
        )
        .await
    }

    pub async fn delete_by_query(
        &self,
        index: &str,
        doc_type: &str,
        query: impl Into<Value>,
        params: QueryParams,
    ) -> Result<Json> {
        self.send(
            Request::delete()
                .segment(index)
                .segment(doc_type)
                .segment("_query")
                .query(params)
                .json(query),
        )
        .await
    }

    pub async fn get(
        &self,
        index: &str,
        doc_type: &str,
        id: impl Into<Segment>,
        params: QueryParams,
    ) -> Result<Json> {
        self.send(
            Request::get()
                .segment(index)
                .segment(doc_type)
                .segment(id)
                .query(params),
        )
        .await
    }

    /// Fetch several documents at once.
    ///
    /// Each entry is either a bare id or an object such as
    /// `{"_index": "a", "_type": "b", "_id": 1}`.
    pub async fn multi_get(
        &self,
        docs: &[Json],
        index: Option<&str>,
        doc_type: Option<&str>,
        params: QueryParams,
    ) -> Result<Json> {
        let docs: Vec<Json> = docs
            .iter()
            .map(|doc| match doc {
                Json::Object(_) => doc.clone(),
                id => json!({ "_id": id }),
            })
            .collect();

        self.send(
            Request::get()
                .segment(index)
                .segment(doc_type)
                .segment("_mget")
                .query(params)
                .json(json!({ "docs": docs })),
        )
        .await
    }

    /// Update a document with a script
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        index: &str,
        doc_type: &str,
        id: impl Into<Segment>,
        script: &str,
        script_params: Option<Json>,
        lang: Option<&str>,
        params: QueryParams,
    ) -> Result<Json> {
        let mut body = Map::new();
        body.insert("script".to_string(), Json::from(script));
        if let Some(script_params) = script_params {
            body.insert("params".to_string(), script_params);
        }
        if let Some(lang) = lang {
            body.insert("lang".to_string(), Json::from(lang));
        }

        self.send(
            Request::post()
                .segment(index)
                .segment(doc_type)
                .segment(id)
                .segment("_update")
                .query(params)
                .json(Json::Object(body)),
        )
        .await
    }

    // Search

    pub async fn search(
        &self,
        query: impl Into<Query>,
        indexes: &[&str],
        doc_types: &[&str],
        params: QueryParams,
    ) -> Result<Json> {
        self.search_or_count("_search", query.into(), indexes, doc_types, params)
            .await
    }

    pub async fn count(
        &self,
        query: impl Into<Query>,
        indexes: &[&str],
        doc_types: &[&str],
        params: QueryParams,
    ) -> Result<Json> {
        self.search_or_count("_count", query.into(), indexes, doc_types, params)
            .await
    }

    async fn search_or_count(
        &self,
        kind: &str,
        query: Query,
        indexes: &[&str],
        doc_types: &[&str],
        params: QueryParams,
    ) -> Result<Json> {
        let mut request = Request::get()
            .segment(concat(indexes))
            .segment(concat(doc_types))
            .segment(kind)
            .query(params);
        request = match query {
            Query::Text(q) => request.param("q", q),
            Query::Dsl(dsl) => request.json(dsl),
        };
        self.send(request).await
    }

    /// Find documents similar to one document, compared on `mlt_fields`
    pub async fn more_like_this(
        &self,
        index: &str,
        doc_type: &str,
        id: impl Into<Segment>,
        mlt_fields: &[&str],
        body: Option<Value>,
        params: QueryParams,
    ) -> Result<Json> {
        let mut request = Request::get()
            .segment(index)
            .segment(doc_type)
            .segment(id)
            .segment("_mlt")
            .query(params)
            .param("mlt_fields", concat(mlt_fields));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await
    }

    // Mappings

    pub async fn get_mapping(
        &self,
        indexes: &[&str],
        doc_types: &[&str],
        params: QueryParams,
    ) -> Result<Json> {
        self.send(
            Request::get()
                .segment(concat(indexes))
                .segment(concat(doc_types))
                .segment("_mapping")
                .query(params),
        )
        .await
    }

    pub async fn put_mapping(
        &self,
        indexes: &[&str],
        doc_type: &str,
        mapping: impl Into<Value>,
        params: QueryParams,
    ) -> Result<Json> {
        self.send(
            Request::put()
                .segment(concat(indexes))
                .segment(doc_type)
                .segment("_mapping")
                .query(params)
                .json(mapping),
        )
        .await
    }

    // Index administration

    pub async fn status(&self, indexes: &[&str], params: QueryParams) -> Result<Json> {
        self.send(
            Request::get()
                .segment(concat(indexes))
                .segment("_status")
                .query(params),
        )
        .await
    }

    pub async fn create_index(
        &self,
        index: &str,
        settings: Option<Value>,
        params: QueryParams,
    ) -> Result<Json> {
        let mut request = Request::put().segment(index).query(params);
        if let Some(settings) = settings {
            request = request.json(settings);
        }
        self.send(request).await
    }

    /// Delete one or more indexes. An empty list is refused; use
    /// [`Client::delete_all_indexes`] to delete everything.
    pub async fn delete_index(&self, indexes: &[&str], params: QueryParams) -> Result<Json> {
        if indexes.is_empty() {
            return Err(ClientError::InvalidRequest(
                "no indexes specified; use delete_all_indexes to delete every index".to_string(),
            ));
        }
        self.send(Request::delete().segment(concat(indexes)).query(params))
            .await
    }

    pub async fn delete_all_indexes(&self, params: QueryParams) -> Result<Json> {
        self.delete_index(&["_all"], params).await
    }

    pub async fn close_index(&self, index: &str, params: QueryParams) -> Result<Json> {
        self.send(Request::post().segment(index).segment("_close").query(params))
            .await
    }

    pub async fn open_index(&self, index: &str, params: QueryParams) -> Result<Json> {
        self.send(Request::post().segment(index).segment("_open").query(params))
            .await
    }

    /// Change settings of one or more indexes. An empty list is refused; use
    /// [`Client::update_all_settings`] for every index.
    pub async fn update_settings(
        &self,
        indexes: &[&str],
        settings: impl Into<Value>,
        params: QueryParams,
    ) -> Result<Json> {
        if indexes.is_empty() {
            return Err(ClientError::InvalidRequest(
                "no indexes specified; use update_all_settings to update every index".to_string(),
            ));
        }
        self.send(
            Request::put()
                .segment(concat(indexes))
                .segment("_settings")
                .query(params)
                .json(settings),
        )
        .await
    }

    pub async fn update_all_settings(
        &self,
        settings: impl Into<Value>,
        params: QueryParams,
    ) -> Result<Json> {
        self.send(
            Request::put()
                .segment("_settings")
                .query(params)
                .json(settings),
        )
        .await
    }

    pub async fn flush(&self, indexes: &[&str], params: QueryParams) -> Result<Json> {
        self.index_action(indexes, "_flush", params).await
    }

    pub async fn refresh(&self, indexes: &[&str], params: QueryParams) -> Result<Json> {
        self.index_action(indexes, "_refresh", params).await
    }

    pub async fn optimize(&self, indexes: &[&str], params: QueryParams) -> Result<Json> {
        self.index_action(indexes, "_optimize", params).await
    }

    /// Write the indexes' state to the shared gateway
    pub async fn gateway_snapshot(&self, indexes: &[&str], params: QueryParams) -> Result<Json> {
        self.send(
            Request::post()
                .segment(concat(indexes))
                .segment("_gateway")
                .segment("snapshot")
                .query(params),
        )
        .await
    }

    async fn index_action(&self, indexes: &[&str], action: &str, params: QueryParams) -> Result<Json> {
        self.send(
            Request::post()
                .segment(concat(indexes))
                .segment(action)
                .query(params),
        )
        .await
    }

    /// Cluster health, optionally narrowed to some indexes
    pub async fn health(&self, indexes: &[&str], params: QueryParams) -> Result<Json> {
        self.send(
            Request::get()
                .segment("_cluster")
                .segment("health")
                .segment(concat(indexes))
                .query(params),
        )
        .await
    }
}
