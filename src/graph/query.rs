//! Structured graph queries: a root function selects nodes, a field tree
//! selects what is returned for each of them.

use ahash::AHashMap;

use crate::errors::{StoreError, StoreResult};

/// Query variables, bound by name including the leading `$`.
pub type Vars = AHashMap<String, String>;

pub fn vars<const N: usize>(pairs: [(&str, String); N]) -> Vars {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// `$name`, looked up in the query variables.
    Var(String),
    Literal(String),
}

impl Term {
    pub fn resolve<'a>(&'a self, vars: &'a Vars) -> StoreResult<&'a str> {
        match self {
            Term::Literal(value) => Ok(value.as_str()),
            Term::Var(name) => vars
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| StoreError::graph(format!("unbound query variable {name}"))),
        }
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        if value.starts_with('$') {
            Term::Var(value.to_string())
        } else {
            Term::Literal(value.to_string())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootFunc {
    /// Nodes whose scalar predicate equals the term.
    Eq(String, Term),
    /// Nodes carrying the predicate, as a scalar or an outgoing edge.
    Has(String),
    /// Nodes named by a comma-separated uid list.
    Uid(Term),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field {
    Uid,
    Scalar(String),
    /// Edge traversal; a predicate prefixed with `~` walks the edge backwards.
    Edge {
        predicate: String,
        fields: Vec<Field>,
    },
}

impl Field {
    pub fn edge(predicate: &str, fields: Vec<Field>) -> Self {
        Field::Edge {
            predicate: predicate.to_string(),
            fields,
        }
    }
}

/// Builds a field list from names; `uid` selects the node identity.
pub fn fields(names: &[&str]) -> Vec<Field> {
    names
        .iter()
        .map(|name| match *name {
            "uid" => Field::Uid,
            other => Field::Scalar(other.to_string()),
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphQuery {
    pub root: RootFunc,
    pub fields: Vec<Field>,
}

impl GraphQuery {
    pub fn eq(predicate: &str, term: &str) -> Self {
        Self::new(RootFunc::Eq(predicate.to_string(), term.into()))
    }

    pub fn has(predicate: &str) -> Self {
        Self::new(RootFunc::Has(predicate.to_string()))
    }

    pub fn uid(term: &str) -> Self {
        Self::new(RootFunc::Uid(term.into()))
    }

    fn new(root: RootFunc) -> Self {
        Self {
            root,
            fields: Vec::new(),
        }
    }

    pub fn select(mut self, names: &[&str]) -> Self {
        self.fields.extend(fields(names));
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn edge(mut self, predicate: &str, fields: Vec<Field>) -> Self {
        self.fields.push(Field::edge(predicate, fields));
        self
    }
}
