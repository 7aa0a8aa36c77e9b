//! Embedded graph store on SQLite.
//!
//! Nodes hold their scalar predicates as one JSON object; uid edges and an
//! equality index over scalar values live in side tables. Mutations are JSON
//! documents: in a `set` document an object with a `uid` merges into that
//! node, an object without one creates a node, and `_:name` uids create
//! blank nodes whose assigned uids are returned. Nested objects are accepted
//! only as `{"uid": ...}` edge references, so structured values have to be
//! encoded as text by the caller.

use ahash::{AHashMap, AHashSet};
use log::debug;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    errors::{ResultExt, StoreError, StoreResult},
    sql::db::open_connection,
};

use super::{
    query::{Field, GraphQuery, RootFunc, Vars},
    schema::ensure_schema,
    uid::Uid,
};

/// Blank-node names mapped to the uids created for them.
pub type Assigned = AHashMap<String, Uid>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mutation {
    pub set: Vec<Value>,
    pub delete: Vec<Value>,
}

impl Mutation {
    pub fn set(doc: Value) -> Self {
        Self {
            set: vec![doc],
            delete: Vec::new(),
        }
    }

    pub fn delete(doc: Value) -> Self {
        Self {
            set: Vec::new(),
            delete: vec![doc],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }
}

pub struct GraphStore {
    conn: Mutex<Connection>,
}

impl GraphStore {
    pub fn open(connect: &str) -> StoreResult<Self> {
        let conn = open_connection(connect)?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    fn from_connection(conn: Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(128);
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Runs `f` in a read-write transaction, committed only on success.
    pub fn with_txn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Txn<'_>) -> StoreResult<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("creating graph transaction")?;
        let out = f(&Txn {
            conn: &tx,
            read_only: false,
        })?;
        tx.commit().context("committing graph transaction")?;
        Ok(out)
    }

    /// Runs `f` with a read-only view; mutations are rejected.
    pub fn view<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Txn<'_>) -> StoreResult<T>,
    {
        let conn = self.conn.lock();
        f(&Txn {
            conn: &conn,
            read_only: true,
        })
    }

    pub fn node_count(&self) -> StoreResult<i64> {
        self.conn
            .lock()
            .query_row("SELECT count(*) FROM graph_nodes", [], |row| row.get(0))
            .context("counting graph nodes")
    }
}

pub struct Txn<'a> {
    conn: &'a Connection,
    read_only: bool,
}

impl Txn<'_> {
    pub fn mutate(&self, mutation: &Mutation) -> StoreResult<Assigned> {
        if self.read_only {
            return Err(StoreError::graph("mutation in a read-only transaction"));
        }
        let mut assigned = Assigned::new();
        for doc in &mutation.set {
            self.apply_set(doc, &mut assigned)?;
        }
        for doc in &mutation.delete {
            self.apply_delete(doc)?;
        }
        debug!(
            "event=graph_mutate module=graph.store status=ok set={} delete={} assigned={}",
            mutation.set.len(),
            mutation.delete.len(),
            assigned.len()
        );
        Ok(assigned)
    }

    pub fn query(&self, query: &GraphQuery, vars: &Vars) -> StoreResult<Vec<Value>> {
        let roots = self.root_uids(&query.root, vars)?;
        roots
            .into_iter()
            .map(|uid| self.render(uid, &query.fields))
            .collect()
    }

    /// Runs the query and decodes every root node.
    pub fn query_as<T: DeserializeOwned>(
        &self,
        query: &GraphQuery,
        vars: &Vars,
    ) -> StoreResult<Vec<T>> {
        self.query(query, vars)?
            .into_iter()
            .map(|node| serde_json::from_value(node).context("decoding graph node"))
            .collect()
    }

    /// First node whose `predicate` equals `value`.
    pub fn resolve(&self, predicate: &str, value: &str) -> StoreResult<Option<Uid>> {
        self.conn
            .prepare_cached(
                "SELECT uid FROM graph_index WHERE key = ?1 AND value = ?2 ORDER BY uid LIMIT 1",
            )
            .and_then(|mut stmt| {
                stmt.query_row(params![predicate, value], |row| row.get(0))
                    .optional()
            })
            .map(|uid| uid.map(Uid))
            .context(format!("resolving {predicate}"))
    }

    /// Whether the node exists and carries the scalar predicate.
    pub fn node_has(&self, uid: Uid, predicate: &str) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn
            .prepare_cached("SELECT 1 FROM graph_index WHERE uid = ?1 AND key = ?2")
            .and_then(|mut stmt| {
                stmt.query_row(params![uid.0, predicate], |row| row.get(0))
                    .optional()
            })
            .context(format!("checking {predicate} of node {uid}"))?;
        Ok(found.is_some())
    }

    pub fn has_edge(&self, from: Uid, predicate: &str, to: Uid) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn
            .prepare_cached(
                "SELECT 1 FROM graph_edges WHERE from_uid = ?1 AND predicate = ?2 AND to_uid = ?3",
            )
            .and_then(|mut stmt| {
                stmt.query_row(params![from.0, predicate, to.0], |row| row.get(0))
                    .optional()
            })
            .context(format!("checking {from} -{predicate}-> {to}"))?;
        Ok(found.is_some())
    }

    pub fn exists(&self, uid: Uid) -> StoreResult<bool> {
        Ok(self.load_data(uid)?.is_some())
    }

    fn apply_set(&self, doc: &Value, assigned: &mut Assigned) -> StoreResult<Uid> {
        let obj = doc
            .as_object()
            .ok_or_else(|| StoreError::graph("mutation documents must be objects"))?;
        let uid = match obj.get("uid") {
            None => self.create_node()?,
            Some(reference) => self.resolve_reference(reference, assigned)?,
        };
        let mut data = self
            .load_data(uid)?
            .ok_or_else(|| StoreError::graph(format!("node {uid} does not exist")))?;
        let mut touched = false;
        for (key, value) in obj {
            if key == "uid" {
                continue;
            }
            check_predicate(key)?;
            match value {
                Value::Object(inner) => {
                    let target = self.edge_target(inner, assigned)?;
                    self.insert_edge(uid, key, target)?;
                }
                Value::Array(items) => {
                    for item in items {
                        let inner = item.as_object().ok_or_else(|| {
                            StoreError::graph(format!("list values of {key} must be uid references"))
                        })?;
                        let target = self.edge_target(inner, assigned)?;
                        self.insert_edge(uid, key, target)?;
                    }
                }
                Value::Null => {
                    touched |= data.remove(key).is_some();
                    self.remove_index(uid, key)?;
                }
                scalar => {
                    data.insert(key.clone(), scalar.clone());
                    self.write_index(uid, key, scalar)?;
                    touched = true;
                }
            }
        }
        if touched {
            self.store_data(uid, &data)?;
        }
        Ok(uid)
    }

    fn apply_delete(&self, doc: &Value) -> StoreResult<()> {
        let obj = doc
            .as_object()
            .ok_or_else(|| StoreError::graph("mutation documents must be objects"))?;
        let uid: Uid = match obj.get("uid") {
            Some(Value::String(text)) => text.parse()?,
            _ => return Err(StoreError::graph("delete documents need an existing uid")),
        };
        let Some(mut data) = self.load_data(uid)? else {
            return Ok(());
        };

        if obj.len() == 1 {
            self.conn
                .prepare_cached("DELETE FROM graph_nodes WHERE uid = ?1")
                .and_then(|mut stmt| stmt.execute(params![uid.0]))
                .context(format!("deleting node {uid}"))?;
            return Ok(());
        }

        let mut touched = false;
        for (key, value) in obj {
            if key == "uid" {
                continue;
            }
            match value {
                Value::Object(inner) => self.delete_edge(uid, key, reference_uid(inner)?)?,
                Value::Array(items) => {
                    for item in items {
                        let inner = item.as_object().ok_or_else(|| {
                            StoreError::graph(format!("list values of {key} must be uid references"))
                        })?;
                        self.delete_edge(uid, key, reference_uid(inner)?)?;
                    }
                }
                _ => {
                    touched |= data.remove(key).is_some();
                    self.remove_index(uid, key)?;
                    self.conn
                        .prepare_cached("DELETE FROM graph_edges WHERE from_uid = ?1 AND predicate = ?2")
                        .and_then(|mut stmt| stmt.execute(params![uid.0, key]))
                        .context(format!("deleting {key} edges of node {uid}"))?;
                }
            }
        }
        if touched {
            self.store_data(uid, &data)?;
        }
        Ok(())
    }

    fn resolve_reference(&self, reference: &Value, assigned: &mut Assigned) -> StoreResult<Uid> {
        let text = reference
            .as_str()
            .ok_or_else(|| StoreError::graph("uid references must be strings"))?;
        if let Some(name) = text.strip_prefix("_:") {
            if let Some(uid) = assigned.get(name) {
                return Ok(*uid);
            }
            let uid = self.create_node()?;
            assigned.insert(name.to_string(), uid);
            return Ok(uid);
        }
        let uid: Uid = text.parse()?;
        if !self.exists(uid)? {
            return Err(StoreError::graph(format!("node {uid} does not exist")));
        }
        Ok(uid)
    }

    fn edge_target(&self, inner: &Map<String, Value>, assigned: &mut Assigned) -> StoreResult<Uid> {
        match inner.get("uid") {
            Some(reference) if inner.len() == 1 => self.resolve_reference(reference, assigned),
            _ => Err(StoreError::graph(
                "nested objects must be uid references; encode structured values as text",
            )),
        }
    }

    fn create_node(&self) -> StoreResult<Uid> {
        self.conn
            .prepare_cached("INSERT INTO graph_nodes(data) VALUES('{}')")
            .and_then(|mut stmt| stmt.execute([]))
            .context("creating graph node")?;
        Ok(Uid(self.conn.last_insert_rowid()))
    }

    fn load_data(&self, uid: Uid) -> StoreResult<Option<Map<String, Value>>> {
        let text: Option<String> = self
            .conn
            .prepare_cached("SELECT data FROM graph_nodes WHERE uid = ?1")
            .and_then(|mut stmt| stmt.query_row(params![uid.0], |row| row.get(0)).optional())
            .context(format!("loading node {uid}"))?;
        match text {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .context(format!("decoding node {uid}")),
            None => Ok(None),
        }
    }

    fn store_data(&self, uid: Uid, data: &Map<String, Value>) -> StoreResult<()> {
        let text = serde_json::to_string(data).context(format!("encoding node {uid}"))?;
        self.conn
            .prepare_cached("UPDATE graph_nodes SET data = ?1 WHERE uid = ?2")
            .and_then(|mut stmt| stmt.execute(params![text, uid.0]))
            .context(format!("storing node {uid}"))?;
        Ok(())
    }

    fn write_index(&self, uid: Uid, key: &str, value: &Value) -> StoreResult<()> {
        let text = index_value(value);
        self.conn
            .prepare_cached(
                "INSERT INTO graph_index(uid, key, value) VALUES(?1, ?2, ?3) ON CONFLICT(uid, key) DO UPDATE SET value = excluded.value",
            )
            .and_then(|mut stmt| stmt.execute(params![uid.0, key, text]))
            .context(format!("indexing {key} of node {uid}"))?;
        Ok(())
    }

    fn remove_index(&self, uid: Uid, key: &str) -> StoreResult<()> {
        self.conn
            .prepare_cached("DELETE FROM graph_index WHERE uid = ?1 AND key = ?2")
            .and_then(|mut stmt| stmt.execute(params![uid.0, key]))
            .context(format!("unindexing {key} of node {uid}"))?;
        Ok(())
    }

    fn insert_edge(&self, from: Uid, predicate: &str, to: Uid) -> StoreResult<()> {
        self.conn
            .prepare_cached(
                "INSERT OR IGNORE INTO graph_edges(from_uid, predicate, to_uid) VALUES(?1, ?2, ?3)",
            )
            .and_then(|mut stmt| stmt.execute(params![from.0, predicate, to.0]))
            .context(format!("linking {from} -{predicate}-> {to}"))?;
        Ok(())
    }

    fn delete_edge(&self, from: Uid, predicate: &str, to: Uid) -> StoreResult<()> {
        self.conn
            .prepare_cached(
                "DELETE FROM graph_edges WHERE from_uid = ?1 AND predicate = ?2 AND to_uid = ?3",
            )
            .and_then(|mut stmt| stmt.execute(params![from.0, predicate, to.0]))
            .context(format!("unlinking {from} -{predicate}-> {to}"))?;
        Ok(())
    }

    fn adjacent(&self, uid: Uid, predicate: &str) -> StoreResult<Vec<Uid>> {
        let sql = if predicate.starts_with('~') {
            "SELECT from_uid FROM graph_edges WHERE to_uid = ?1 AND predicate = ?2 ORDER BY from_uid"
        } else {
            "SELECT to_uid FROM graph_edges WHERE from_uid = ?1 AND predicate = ?2 ORDER BY to_uid"
        };
        let name = predicate.trim_start_matches('~');
        self.collect_uids(sql, params![uid.0, name])
            .context(format!("walking {predicate} of node {uid}"))
    }

    fn collect_uids(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<Uid>> {
        let mut stmt = self.conn.prepare_cached(sql).context("preparing graph query")?;
        let rows = stmt
            .query_map(args, |row| row.get(0).map(Uid))
            .context("executing graph query")?;
        let mut uids = Vec::new();
        for uid in rows {
            uids.push(uid.context("reading graph row")?);
        }
        Ok(uids)
    }

    fn root_uids(&self, root: &RootFunc, vars: &Vars) -> StoreResult<Vec<Uid>> {
        match root {
            RootFunc::Eq(predicate, term) => {
                let value = term.resolve(vars)?;
                self.collect_uids(
                    "SELECT uid FROM graph_index WHERE key = ?1 AND value = ?2 ORDER BY uid",
                    params![predicate, value],
                )
            }
            RootFunc::Has(predicate) => self.collect_uids(
                "SELECT uid FROM graph_index WHERE key = ?1 UNION SELECT from_uid FROM graph_edges WHERE predicate = ?1 ORDER BY 1",
                params![predicate],
            ),
            RootFunc::Uid(term) => {
                let list = term.resolve(vars)?;
                let mut seen = AHashSet::new();
                let mut uids = Vec::new();
                for part in list.split(',').map(str::trim).filter(|part| !part.is_empty()) {
                    let uid: Uid = part.parse()?;
                    if seen.insert(uid) && self.exists(uid)? {
                        uids.push(uid);
                    }
                }
                Ok(uids)
            }
        }
    }

    fn render(&self, uid: Uid, fields: &[Field]) -> StoreResult<Value> {
        let wants_scalars = fields.iter().any(|field| matches!(field, Field::Scalar(_)));
        let data = if wants_scalars {
            self.load_data(uid)?.unwrap_or_default()
        } else {
            Map::new()
        };
        let mut out = Map::new();
        for field in fields {
            match field {
                Field::Uid => {
                    out.insert("uid".to_string(), Value::String(uid.to_string()));
                }
                Field::Scalar(name) => {
                    if let Some(value) = data.get(name) {
                        out.insert(name.clone(), value.clone());
                    }
                }
                Field::Edge { predicate, fields } => {
                    let targets = self.adjacent(uid, predicate)?;
                    if targets.is_empty() {
                        continue;
                    }
                    let nested = targets
                        .into_iter()
                        .map(|target| self.render(target, fields))
                        .collect::<StoreResult<Vec<_>>>()?;
                    out.insert(predicate.clone(), Value::Array(nested));
                }
            }
        }
        Ok(Value::Object(out))
    }
}

fn check_predicate(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() || key.starts_with('~') {
        return Err(StoreError::graph(format!("invalid predicate name `{key}`")));
    }
    Ok(())
}

fn reference_uid(inner: &Map<String, Value>) -> StoreResult<Uid> {
    match inner.get("uid") {
        Some(Value::String(text)) if inner.len() == 1 => text.parse(),
        _ => Err(StoreError::graph("edge deletes need {\"uid\": ...} references")),
    }
}

fn index_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::graph::query::{fields, vars};

    fn store() -> GraphStore {
        GraphStore::open_in_memory().unwrap()
    }

    #[test]
    fn set_creates_and_merges_nodes() {
        let store = store();
        let uid = store
            .with_txn(|txn| {
                let assigned = txn.mutate(&Mutation::set(json!({"uid": "_:u", "login": "alice"})))?;
                Ok(assigned["u"])
            })
            .unwrap();
        store
            .with_txn(|txn| {
                txn.mutate(&Mutation::set(json!({"uid": uid.to_string(), "email": "a@b.cd"})))
            })
            .unwrap();
        let nodes = store
            .view(|txn| {
                txn.query(
                    &GraphQuery::eq("login", "$login").select(&["uid", "login", "email"]),
                    &vars([("$login", "alice".to_string())]),
                )
            })
            .unwrap();
        assert_eq!(
            nodes,
            vec![json!({"uid": uid.to_string(), "login": "alice", "email": "a@b.cd"})]
        );
    }

    #[test]
    fn nested_objects_must_be_references() {
        let store = store();
        let err = store
            .with_txn(|txn| txn.mutate(&Mutation::set(json!({"profile": {"theme": "dark"}}))))
            .unwrap_err();
        assert!(matches!(err, StoreError::Graph(_)));
        assert_eq!(store.node_count().unwrap(), 0);
    }

    #[test]
    fn edges_have_set_semantics_and_reverse_traversal() {
        let store = store();
        let assigned = store
            .with_txn(|txn| {
                txn.mutate(&Mutation {
                    set: vec![
                        json!({"uid": "_:f", "feed.link": "https://example.com/rss"}),
                        json!({"uid": "_:u", "login": "bob", "subscribed": {"uid": "_:f"}}),
                        json!({"uid": "_:u", "subscribed": [{"uid": "_:f"}]}),
                    ],
                    delete: Vec::new(),
                })
            })
            .unwrap();
        let feed = assigned["f"];
        let nodes = store
            .view(|txn| {
                txn.query(
                    &GraphQuery::uid("$id").edge("~subscribed", fields(&["login"])),
                    &vars([("$id", feed.to_string())]),
                )
            })
            .unwrap();
        assert_eq!(nodes, vec![json!({"~subscribed": [{"login": "bob"}]})]);
    }

    #[test]
    fn deleting_a_node_drops_its_edges() {
        let store = store();
        let assigned = store
            .with_txn(|txn| {
                txn.mutate(&Mutation::set(
                    json!({"uid": "_:u", "login": "carol", "unread": {"uid": "_:a"}}),
                ))
            })
            .unwrap();
        let article = assigned["a"];
        store
            .with_txn(|txn| txn.mutate(&Mutation::delete(json!({"uid": article.to_string()}))))
            .unwrap();
        let nodes = store
            .view(|txn| txn.query(&GraphQuery::has("unread").select(&["login"]), &Vars::new()))
            .unwrap();
        assert!(nodes.is_empty());
        // A second delete of the same node is a no-op.
        store
            .with_txn(|txn| txn.mutate(&Mutation::delete(json!({"uid": article.to_string()}))))
            .unwrap();
    }

    #[test]
    fn read_only_view_rejects_mutations() {
        let store = store();
        let err = store
            .view(|txn| txn.mutate(&Mutation::set(json!({"login": "dave"}))))
            .unwrap_err();
        assert!(matches!(err, StoreError::Graph(_)));
    }
}
