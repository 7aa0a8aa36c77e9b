use std::sync::Arc;

use log::{debug, info};
use rusqlite::{
    OptionalExtension, Row, params,
    types::{Type, Value},
};

use crate::{
    content::{Login, User},
    errors::{ResultExt, StoreError, StoreResult},
    repo::UserRepo,
};

use super::{
    db::{Args, Db},
    templates,
};

pub struct SqlUserRepo {
    db: Arc<Db>,
}

impl SqlUserRepo {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let profile: String = row.get(10)?;
    let profile_data = serde_json::from_str(&profile)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(err)))?;
    Ok(User {
        login: Login::new(row.get::<_, String>(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        hash_type: row.get(4)?,
        admin: row.get(5)?,
        active: row.get(6)?,
        salt: row.get::<_, Option<Vec<u8>>>(7)?.unwrap_or_default(),
        hash: row.get::<_, Option<Vec<u8>>>(8)?.unwrap_or_default(),
        md5_api: row.get::<_, Option<Vec<u8>>>(9)?.unwrap_or_default(),
        profile_data,
    })
}

fn blob_or_null(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        Value::Blob(bytes.to_vec())
    }
}

fn user_args(user: &User) -> StoreResult<Args> {
    let profile = serde_json::to_string(&user.profile_data)
        .context(format!("encoding profile data of user {user}"))?;
    Ok(vec![
        (":login".into(), Value::Text(user.login.as_str().into())),
        (":first_name".into(), Value::Text(user.first_name.clone())),
        (":last_name".into(), Value::Text(user.last_name.clone())),
        (":email".into(), Value::Text(user.email.clone())),
        (":hash_type".into(), Value::Text(user.hash_type.clone())),
        (":admin".into(), Value::Integer(i64::from(user.admin))),
        (":active".into(), Value::Integer(i64::from(user.active))),
        (":salt".into(), blob_or_null(&user.salt)),
        (":hash".into(), blob_or_null(&user.hash)),
        (":md5_api".into(), blob_or_null(&user.md5_api)),
        (":profile_data".into(), Value::Text(profile)),
    ])
}

impl UserRepo for SqlUserRepo {
    fn get(&self, login: &Login) -> StoreResult<User> {
        if login.is_empty() {
            return Err(StoreError::validation("user has no login"));
        }
        debug!("event=user_get module=sql.user status=start login={login}");
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::GET_USER, |stmt| {
                    stmt.query_row(params![login.as_str()], user_from_row)
                        .optional()
                        .context("executing user get stmt")
                })
            })
            .context(format!("getting user {login}"))?
            .ok_or_else(|| StoreError::not_found(format!("user {login}")))
    }

    fn all(&self) -> StoreResult<Vec<User>> {
        debug!("event=user_all module=sql.user status=start");
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::ALL_USERS, |stmt| {
                    stmt.query_map([], user_from_row)
                        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                        .context("executing user all stmt")
                })
            })
            .context("getting all users")
    }

    fn update(&self, user: &User) -> StoreResult<()> {
        user.validate()?;
        info!("event=user_update module=sql.user status=start login={}", user.login);
        let args = user_args(user)?;
        self.db
            .with_tx(|s| {
                if s.execute(templates::UPDATE_USER, &args)? > 0 {
                    return Ok(());
                }
                s.execute(templates::CREATE_USER, &args)?;
                Ok(())
            })
            .context(format!("updating user {}", user.login))
    }

    fn delete(&self, user: &User) -> StoreResult<()> {
        user.validate()?;
        info!("event=user_delete module=sql.user status=start login={}", user.login);
        self.db
            .with_tx(|s| {
                s.with_stmt(templates::DELETE_USER, |stmt| {
                    stmt.execute(params![user.login.as_str()])
                        .context("executing user delete stmt")
                })
            })
            .context(format!("deleting user {}", user.login))?;
        Ok(())
    }

    fn find_by_md5(&self, hash: &[u8]) -> StoreResult<User> {
        if hash.is_empty() {
            return Err(StoreError::validation("md5 api hash is empty"));
        }
        debug!("event=user_find_by_md5 module=sql.user status=start");
        self.db
            .with_conn(|s| {
                s.with_stmt(templates::GET_USER_BY_MD5, |stmt| {
                    stmt.query_row(params![hash], user_from_row)
                        .optional()
                        .context("executing user md5 lookup stmt")
                })
            })
            .context("getting user by md5 api hash")?
            .ok_or_else(|| StoreError::not_found("user with the given md5 api hash"))
    }
}
