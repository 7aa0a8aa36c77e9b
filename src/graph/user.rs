use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

use crate::{
    content::{Login, ProfileData, User},
    errors::{ResultExt, StoreError, StoreResult},
    repo::UserRepo,
};

use super::{
    query::{GraphQuery, fields, vars},
    store::{GraphStore, Mutation, Txn},
    uid::Uid,
};

pub(crate) const USER_FIELDS: &[&str] = &[
    "uid",
    "login",
    "firstName",
    "lastName",
    "email",
    "hashType",
    "admin",
    "active",
    "salt",
    "hash",
    "md5api",
    "profileData",
];

/// Profile data travels as a JSON string inside the node, since the store
/// only accepts nested objects as edge references.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct EncodedProfile(pub ProfileData);

impl Serialize for EncodedProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(&self.0).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for EncodedProfile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&text)
            .map(EncodedProfile)
            .map_err(serde::de::Error::custom)
    }
}

mod base64_text {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct UserNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    pub login: String,
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "hashType", default)]
    pub hash_type: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default, with = "base64_text")]
    pub salt: Vec<u8>,
    #[serde(default, with = "base64_text")]
    pub hash: Vec<u8>,
    #[serde(rename = "md5api", default, with = "base64_text")]
    pub md5_api: Vec<u8>,
    #[serde(rename = "profileData", default)]
    pub profile_data: EncodedProfile,
}

impl UserNode {
    fn from_user(user: &User, uid: Option<Uid>) -> Self {
        Self {
            uid,
            login: user.login.as_str().to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            hash_type: user.hash_type.clone(),
            admin: user.admin,
            active: user.active,
            salt: user.salt.clone(),
            hash: user.hash.clone(),
            md5_api: user.md5_api.clone(),
            profile_data: EncodedProfile(user.profile_data.clone()),
        }
    }
}

impl From<UserNode> for User {
    fn from(node: UserNode) -> Self {
        User {
            login: Login::new(node.login),
            first_name: node.first_name,
            last_name: node.last_name,
            email: node.email,
            hash_type: node.hash_type,
            admin: node.admin,
            active: node.active,
            salt: node.salt,
            hash: node.hash,
            md5_api: node.md5_api,
            profile_data: node.profile_data.0,
        }
    }
}

/// Uid of the user node with the given login.
pub(crate) fn user_uid(txn: &Txn<'_>, login: &Login) -> StoreResult<Option<Uid>> {
    txn.resolve("login", login.as_str())
}

pub(crate) fn require_user(txn: &Txn<'_>, user: &User) -> StoreResult<Uid> {
    user_uid(txn, &user.login)?.ok_or_else(|| StoreError::not_found(format!("user {user}")))
}

pub(crate) fn sorted_users(nodes: Vec<UserNode>) -> Vec<User> {
    let mut users: Vec<User> = nodes.into_iter().map(User::from).collect();
    users.sort_by(|a, b| a.login.cmp(&b.login));
    users
}

pub struct GraphUserRepo {
    store: Arc<GraphStore>,
}

impl GraphUserRepo {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    fn find_one(&self, predicate: &str, value: String) -> StoreResult<Option<User>> {
        let query = GraphQuery::eq(predicate, "$value").select(USER_FIELDS);
        let nodes: Vec<UserNode> = self
            .store
            .view(|txn| txn.query_as(&query, &vars([("$value", value)])))?;
        Ok(nodes.into_iter().next().map(User::from))
    }
}

impl UserRepo for GraphUserRepo {
    fn get(&self, login: &Login) -> StoreResult<User> {
        if login.is_empty() {
            return Err(StoreError::validation("user has no login"));
        }
        debug!("event=user_get module=graph.user status=start login={login}");
        self.find_one("login", login.as_str().to_string())
            .context(format!("getting user {login}"))?
            .ok_or_else(|| StoreError::not_found(format!("user {login}")))
    }

    fn all(&self) -> StoreResult<Vec<User>> {
        debug!("event=user_all module=graph.user status=start");
        let query = GraphQuery::has("login").select(USER_FIELDS);
        let nodes: Vec<UserNode> = self
            .store
            .view(|txn| txn.query_as(&query, &Default::default()))
            .context("getting all users")?;
        Ok(sorted_users(nodes))
    }

    fn update(&self, user: &User) -> StoreResult<()> {
        user.validate()?;
        info!("event=user_update module=graph.user status=start login={}", user.login);
        self.store
            .with_txn(|txn| {
                let uid = user_uid(txn, &user.login)?;
                let node = UserNode::from_user(user, uid);
                let doc = serde_json::to_value(&node).context("encoding user node")?;
                txn.mutate(&Mutation::set(doc))?;
                Ok(())
            })
            .context(format!("updating user {}", user.login))
    }

    fn delete(&self, user: &User) -> StoreResult<()> {
        user.validate()?;
        info!("event=user_delete module=graph.user status=start login={}", user.login);
        self.store
            .with_txn(|txn| {
                let Some(uid) = user_uid(txn, &user.login)? else {
                    return Ok(());
                };
                let query = GraphQuery::uid("$id").edge("tag", fields(&["uid"]));
                let nodes = txn.query(&query, &vars([("$id", uid.to_string())]))?;
                let mut mutation = Mutation::default();
                for tag in nodes
                    .iter()
                    .filter_map(|node| node.get("tag").and_then(|tags| tags.as_array()))
                    .flatten()
                {
                    if let Some(tag_uid) = tag.get("uid") {
                        mutation.delete.push(json!({ "uid": tag_uid }));
                    }
                }
                mutation.delete.push(json!({ "uid": uid }));
                txn.mutate(&mutation)?;
                Ok(())
            })
            .context(format!("deleting user {}", user.login))
    }

    fn find_by_md5(&self, hash: &[u8]) -> StoreResult<User> {
        if hash.is_empty() {
            return Err(StoreError::validation("md5 api hash is empty"));
        }
        debug!("event=user_find_by_md5 module=graph.user status=start");
        self.find_one("md5api", STANDARD.encode(hash))
            .context("getting user by md5 api hash")?
            .ok_or_else(|| StoreError::not_found("user with the given md5 api hash"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_data_is_stored_as_text() {
        let mut user = User::new("alice");
        user.profile_data
            .insert("theme".into(), serde_json::Value::String("dark".into()));
        user.md5_api = vec![1, 2, 3];
        let doc = serde_json::to_value(UserNode::from_user(&user, None)).unwrap();
        assert_eq!(doc["profileData"], json!("{\"theme\":\"dark\"}"));
        assert_eq!(doc["md5api"], json!("AQID"));
        assert!(doc.get("uid").is_none());

        let back: UserNode = serde_json::from_value(doc).unwrap();
        assert_eq!(User::from(back), user);
    }
}
