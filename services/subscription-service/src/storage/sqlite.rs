use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::document::json_path;
use super::schema::init_database;
use super::{
    ConnectionConfig, Document, Filter, GatewayFactory, InsertResult, StoreError, StoreGateway,
    Update, UpdateResult,
};

/// How long a session waits on another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct Session {
    conn: Arc<Mutex<Connection>>,
    collection: String,
}

/// Stores each document as JSON text in one SQLite table, partitioned by
/// collection name.
#[derive(Default)]
pub struct SqliteGateway {
    session: Option<Session>,
}

impl SqliteGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Result<(Arc<Mutex<Connection>>, String), StoreError> {
        let session = self.session.as_ref().ok_or(StoreError::NotConnected)?;
        Ok((Arc::clone(&session.conn), session.collection.clone()))
    }
}

#[async_trait]
impl StoreGateway for SqliteGateway {
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), StoreError> {
        let data_dir = config.data_dir.clone();
        let db_path = config.database_path();

        let conn = run_blocking(move || {
            std::fs::create_dir_all(&data_dir).map_err(|err| {
                StoreError::Connection(format!(
                    "unable to create data directory {}: {err}",
                    data_dir.display()
                ))
            })?;
            let conn = Connection::open(&db_path).map_err(|err| {
                StoreError::Connection(format!("unable to open {}: {err}", db_path.display()))
            })?;
            conn.busy_timeout(BUSY_TIMEOUT)
                .map_err(|err| StoreError::Connection(err.to_string()))?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|err| StoreError::Connection(err.to_string()))?;
            init_database(&conn)?;
            Ok(conn)
        })
        .await?;

        debug!(
            database = %config.database,
            collection = %config.collection,
            "sqlite session opened"
        );
        self.session = Some(Session {
            conn: Arc::new(Mutex::new(conn)),
            collection: config.collection.clone(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), StoreError> {
        let session = self.session.take().ok_or(StoreError::NotConnected)?;

        // A cancelled call may still own a handle on its blocking thread; the
        // connection closes once that work finishes.
        let Ok(mutex) = Arc::try_unwrap(session.conn) else {
            debug!("sqlite session released while blocking work is in flight");
            return Ok(());
        };
        let conn = mutex
            .into_inner()
            .map_err(|_| StoreError::Connection("connection poisoned".into()))?;

        run_blocking(move || {
            conn.close()
                .map_err(|(_, err)| StoreError::Connection(err.to_string()))
        })
        .await?;
        debug!("sqlite session closed");
        Ok(())
    }

    async fn find_one(&mut self, filter: &Filter) -> Result<Document, StoreError> {
        let (conn, collection) = self.session()?;
        let filter = filter.clone();

        run_blocking(move || {
            let conn = lock(&conn)?;
            let found = select_first(&conn, &collection, &filter)?;
            let (_, body) = found.ok_or(StoreError::NotFound)?;
            Ok(serde_json::from_str(&body)?)
        })
        .await
    }

    async fn update_one(
        &mut self,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let (conn, collection) = self.session()?;
        let filter = filter.clone();
        let update = update.clone();

        run_blocking(move || {
            let mut conn = lock(&conn)?;
            // Take the write lock up front so the busy timeout covers it.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some((id, body)) = select_first(&tx, &collection, &filter)? else {
                return Ok(UpdateResult::default());
            };

            let mut document: Document = serde_json::from_str(&body)?;
            let modified = update.apply(&mut document);
            if modified {
                set_fields(&tx, id, &update)?;
            }
            tx.commit()?;

            Ok(UpdateResult {
                matched_count: 1,
                modified_count: u64::from(modified),
            })
        })
        .await
    }

    async fn insert_one(&mut self, document: Document) -> Result<InsertResult, StoreError> {
        let (conn, collection) = self.session()?;
        if !document.is_object() {
            return Err(StoreError::Query("document must be a JSON object".into()));
        }

        run_blocking(move || {
            let conn = lock(&conn)?;
            let doc_id = Uuid::new_v4().to_string();
            conn.execute(
                r#"
                INSERT INTO documents (doc_id, collection, body)
                VALUES (?1, ?2, ?3)
                "#,
                params![doc_id, collection, serde_json::to_string(&document)?],
            )?;
            Ok(InsertResult {
                inserted_id: doc_id,
            })
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGatewayFactory;

impl GatewayFactory for SqliteGatewayFactory {
    fn create(&self) -> Box<dyn StoreGateway> {
        Box::new(SqliteGateway::new())
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| StoreError::Query(format!("blocking store task failed: {err}")))?
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock()
        .map_err(|_| StoreError::Connection("connection poisoned".into()))
}

fn select_first(
    conn: &Connection,
    collection: &str,
    filter: &Filter,
) -> Result<Option<(i64, String)>, StoreError> {
    let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
    let mut values = vec![SqlValue::Text(collection.to_string())];

    for (path, expected) in filter.fields() {
        match expected {
            Value::Null => {
                sql.push_str(" AND json_type(body, ?) = 'null'");
                values.push(SqlValue::Text(json_path(path)?));
            }
            scalar => {
                sql.push_str(" AND json_extract(body, ?) = ?");
                values.push(SqlValue::Text(json_path(path)?));
                values.push(to_sql_value(path, scalar)?);
            }
        }
    }
    sql.push_str(" ORDER BY id LIMIT 1");

    let row = conn
        .query_row(&sql, params_from_iter(values), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })
        .optional()?;
    Ok(row)
}

/// Applies `$set` assignments in place with `json_set`.
fn set_fields(conn: &Connection, id: i64, update: &Update) -> Result<(), StoreError> {
    let assignments = update.assignments();
    let mut values = Vec::with_capacity(assignments.len() * 2 + 1);
    for (path, value) in assignments {
        values.push(SqlValue::Text(json_path(path)?));
        values.push(SqlValue::Text(serde_json::to_string(value)?));
    }
    values.push(SqlValue::Integer(id));

    let sql = format!(
        "UPDATE documents SET body = json_set(body{}) WHERE id = ?",
        ", ?, json(?)".repeat(assignments.len())
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

fn to_sql_value(path: &str, value: &Value) -> Result<SqlValue, StoreError> {
    match value {
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => Ok(SqlValue::Integer(int)),
            (None, Some(real)) => Ok(SqlValue::Real(real)),
            _ => Err(StoreError::Query(format!(
                "unsupported numeric filter value for {path}"
            ))),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => Err(StoreError::Query(format!(
            "filter on {path} must compare against a scalar"
        ))),
    }
}
