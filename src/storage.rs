use std::str::FromStr;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::Row;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::config::Config;
use crate::types::{
    AddressEntry, AllowlistEvent, BytecodeEntry, Capability, EntryKind, EntryRecord,
};

async fn init_db(config: &Config) -> SqlitePool {
    let expect_msg =
        "Failed to connect to DB. Ensure envar DATABASE_URL is set or ensure PERSIST_STATE=false.";

    if config.persist_state {
        let db_url = config.db_url.clone().expect(expect_msg);
        let opts = SqliteConnectOptions::from_str(&db_url)
            .expect("Failed to parse DB URL")
            .create_if_missing(true);

        SqlitePool::connect_with(opts).await.expect(expect_msg)
    } else {
        SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory DB. This should never happen.")
    }
}

/// Registry rows are soft-deleted only: removal clears the allowed flag and
/// the row stays for audit history.
#[derive(Clone)]
pub struct AllowlistStore {
    db: SqlitePool,
}

#[async_trait]
pub trait Reader: Sync + Send {
    async fn bytecode_entry(&self, code_hash: B256) -> eyre::Result<Option<BytecodeEntry>>;
    async fn address_entry(&self, address: Address) -> eyre::Result<Option<AddressEntry>>;
    async fn has_capability(
        &self,
        principal: Address,
        capability: Capability,
    ) -> eyre::Result<bool>;
}

#[async_trait]
pub trait Writer: Reader {
    async fn put_bytecode_entry(&self, entry: &BytecodeEntry) -> eyre::Result<()>;
    async fn put_address_entry(&self, entry: &AddressEntry) -> eyre::Result<()>;
    async fn put_capability(&self, principal: Address, capability: Capability)
        -> eyre::Result<()>;
    async fn delete_capability(
        &self,
        principal: Address,
        capability: Capability,
    ) -> eyre::Result<()>;
    async fn record_event(&self, event: &AllowlistEvent) -> eyre::Result<()>;
}

impl AllowlistStore {
    pub async fn new(config: &Config) -> Self {
        let db = init_db(config).await;
        Self::migrate(&db).await.expect("Failed to run migrations");
        Self { db }
    }

    async fn migrate(db: &SqlitePool) -> eyre::Result<()> {
        sqlx::migrate!("./migrations")
            .run(db)
            .await
            .wrap_err("Failed to run migrations")?;
        Ok(())
    }

    pub fn db(&self) -> SqlitePool {
        self.db.clone()
    }
}

#[async_trait]
impl Reader for AllowlistStore {
    async fn bytecode_entry(&self, code_hash: B256) -> eyre::Result<Option<BytecodeEntry>> {
        let row = sqlx::query(
            r#"
            SELECT implementation, allowed FROM bytecode_entries WHERE code_hash = ?
        "#,
        )
        .bind(code_hash.to_string())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to read bytecode entry: {}", e))?;

        match row {
            None => Ok(None),
            Some(row) => {
                let implementation: String = row.try_get("implementation")?;
                Ok(Some(BytecodeEntry {
                    code_hash,
                    implementation: Address::from_str(&implementation)
                        .wrap_err("Invalid implementation address in db")?,
                    allowed: row.try_get("allowed")?,
                }))
            }
        }
    }

    async fn address_entry(&self, address: Address) -> eyre::Result<Option<AddressEntry>> {
        let row = sqlx::query(
            r#"
            SELECT allowed FROM address_entries WHERE address = ?
        "#,
        )
        .bind(address.to_checksum(None))
        .fetch_optional(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to read address entry: {}", e))?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(AddressEntry {
                address,
                allowed: row.try_get("allowed")?,
            })),
        }
    }

    async fn has_capability(
        &self,
        principal: Address,
        capability: Capability,
    ) -> eyre::Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM capabilities WHERE principal = ? AND capability = ?
        "#,
        )
        .bind(principal.to_checksum(None))
        .bind(capability.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to read capability: {}", e))?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl Writer for AllowlistStore {
    async fn put_bytecode_entry(&self, entry: &BytecodeEntry) -> eyre::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bytecode_entries (code_hash, implementation, allowed)
            VALUES (?, ?, ?)
            ON CONFLICT (code_hash) DO UPDATE
            SET implementation = excluded.implementation,
                allowed = excluded.allowed,
                updated_at = CURRENT_TIMESTAMP
        "#,
        )
        .bind(entry.code_hash.to_string())
        .bind(entry.implementation.to_checksum(None))
        .bind(entry.allowed)
        .execute(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to store bytecode entry: {}", e))?;

        Ok(())
    }

    async fn put_address_entry(&self, entry: &AddressEntry) -> eyre::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO address_entries (address, allowed)
            VALUES (?, ?)
            ON CONFLICT (address) DO UPDATE
            SET allowed = excluded.allowed,
                updated_at = CURRENT_TIMESTAMP
        "#,
        )
        .bind(entry.address.to_checksum(None))
        .bind(entry.allowed)
        .execute(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to store address entry: {}", e))?;

        Ok(())
    }

    async fn put_capability(
        &self,
        principal: Address,
        capability: Capability,
    ) -> eyre::Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO capabilities (principal, capability) VALUES (?, ?)
        "#,
        )
        .bind(principal.to_checksum(None))
        .bind(capability.as_str())
        .execute(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to grant capability: {}", e))?;

        Ok(())
    }

    async fn delete_capability(
        &self,
        principal: Address,
        capability: Capability,
    ) -> eyre::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM capabilities WHERE principal = ? AND capability = ?
        "#,
        )
        .bind(principal.to_checksum(None))
        .bind(capability.as_str())
        .execute(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to revoke capability: {}", e))?;

        Ok(())
    }

    async fn record_event(&self, event: &AllowlistEvent) -> eyre::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (entry_kind, key, implementation, new_state, at)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(event.kind.as_str())
        .bind(&event.key)
        .bind(event.implementation.map(|a| a.to_checksum(None)))
        .bind(event.new_state)
        .bind(event.at)
        .execute(&self.db)
        .await
        .map_err(|e| eyre::eyre!("Failed to record event: {}", e))?;

        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct QueryOptions {
    pub kind: Option<EntryKind>,
    pub allowed: Option<bool>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn list_entries(
    db: &SqlitePool,
    options: &QueryOptions,
) -> eyre::Result<Vec<EntryRecord>> {
    let mut records = Vec::new();

    if options.kind != Some(EntryKind::Address) {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT code_hash, implementation, allowed FROM bytecode_entries WHERE 1 = 1",
        );
        push_allowed_filter(&mut query, options);
        let rows = query
            .build()
            .fetch_all(db)
            .await
            .map_err(|e| eyre::eyre!("Failed to list bytecode entries: {}", e))?;

        for row in rows.iter() {
            let implementation: String = row.try_get("implementation")?;
            records.push(EntryRecord {
                kind: EntryKind::Bytecode,
                key: row.try_get("code_hash")?,
                implementation: Some(
                    Address::from_str(&implementation)
                        .wrap_err("Invalid implementation address in db")?,
                ),
                allowed: row.try_get("allowed")?,
            });
        }
    }

    if options.kind != Some(EntryKind::Bytecode) {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT address, allowed FROM address_entries WHERE 1 = 1",
        );
        push_allowed_filter(&mut query, options);
        let rows = query
            .build()
            .fetch_all(db)
            .await
            .map_err(|e| eyre::eyre!("Failed to list address entries: {}", e))?;

        for row in rows.iter() {
            records.push(EntryRecord {
                kind: EntryKind::Address,
                key: row.try_get("address")?,
                implementation: None,
                allowed: row.try_get("allowed")?,
            });
        }
    }

    Ok(records)
}

pub async fn list_events(
    db: &SqlitePool,
    options: &QueryOptions,
) -> eyre::Result<Vec<AllowlistEvent>> {
    let mut query = build_events_query(options);

    let rows = query
        .build()
        .fetch_all(db)
        .await
        .map_err(|e| eyre::eyre!("Failed to list events: {}", e))?;

    let events = rows
        .iter()
        .map(|row| -> eyre::Result<AllowlistEvent> {
            let kind: String = row.try_get("entry_kind")?;
            let implementation: Option<String> = row.try_get("implementation")?;
            Ok(AllowlistEvent {
                kind: EntryKind::from_str(&kind)?,
                key: row.try_get("key")?,
                implementation: implementation
                    .map(|a| Address::from_str(&a))
                    .transpose()
                    .wrap_err("Invalid implementation address in db")?,
                new_state: row.try_get("new_state")?,
                at: row.try_get("at")?,
            })
        })
        .filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Failed to deserialize event in db: {}", e);
                None
            }
        })
        .collect();

    Ok(events)
}

fn push_allowed_filter(query: &mut QueryBuilder<Sqlite>, options: &QueryOptions) {
    if let Some(allowed) = options.allowed {
        query.push(" AND allowed = ");
        query.push_bind(allowed);
    }
}

fn build_events_query(options: &QueryOptions) -> QueryBuilder<Sqlite> {
    let mut query_build = QueryBuilder::<Sqlite>::new(
        "SELECT entry_kind, key, implementation, new_state, at FROM audit_log WHERE 1 = 1",
    );

    if let Some(kind) = options.kind {
        query_build.push(" AND entry_kind = ");
        query_build.push_bind(kind.as_str());
    }
    if let Some(allowed) = options.allowed {
        query_build.push(" AND new_state = ");
        query_build.push_bind(allowed);
    }
    if let Some(from) = options.from {
        query_build.push(" AND at >= ");
        query_build.push_bind(from);
    }
    if let Some(to) = options.to {
        query_build.push(" AND at <= ");
        query_build.push_bind(to);
    }
    query_build.push(" ORDER BY id ASC");

    query_build
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_bytecode_entry_round_trip() {
        let store = AllowlistStore::new(&Config::test_default()).await;

        let entry = BytecodeEntry {
            code_hash: B256::repeat_byte(0x11),
            implementation: Address::repeat_byte(0x22),
            allowed: true,
        };
        store.put_bytecode_entry(&entry).await.unwrap();

        let retrieved = store.bytecode_entry(entry.code_hash).await.unwrap();
        assert_eq!(retrieved, Some(entry.clone()));

        // soft delete keeps the row
        let disabled = BytecodeEntry {
            allowed: false,
            ..entry.clone()
        };
        store.put_bytecode_entry(&disabled).await.unwrap();
        let retrieved = store.bytecode_entry(entry.code_hash).await.unwrap();
        assert_eq!(retrieved, Some(disabled));
    }

    #[tokio::test]
    async fn test_address_entry_round_trip() {
        let store = AllowlistStore::new(&Config::test_default()).await;
        let address = Address::repeat_byte(0x33);

        assert_eq!(store.address_entry(address).await.unwrap(), None);

        store
            .put_address_entry(&AddressEntry {
                address,
                allowed: true,
            })
            .await
            .unwrap();
        assert!(store.address_entry(address).await.unwrap().unwrap().allowed);
    }

    #[tokio::test]
    async fn test_capabilities() {
        let store = AllowlistStore::new(&Config::test_default()).await;
        let principal = Address::repeat_byte(0x44);

        assert!(!store
            .has_capability(principal, Capability::Registrar)
            .await
            .unwrap());

        store
            .put_capability(principal, Capability::Registrar)
            .await
            .unwrap();
        // re-granting is a no-op
        store
            .put_capability(principal, Capability::Registrar)
            .await
            .unwrap();
        assert!(store
            .has_capability(principal, Capability::Registrar)
            .await
            .unwrap());
        assert!(!store
            .has_capability(principal, Capability::Admin)
            .await
            .unwrap());

        store
            .delete_capability(principal, Capability::Registrar)
            .await
            .unwrap();
        assert!(!store
            .has_capability(principal, Capability::Registrar)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_events_with_options() {
        let store = AllowlistStore::new(&Config::test_default()).await;

        let wallet_event =
            AllowlistEvent::bytecode(B256::repeat_byte(0x55), Address::repeat_byte(0x66), true);
        let address_event = AllowlistEvent::address(Address::repeat_byte(0x77), false);
        store.record_event(&wallet_event).await.unwrap();
        store.record_event(&address_event).await.unwrap();

        let all = list_events(&store.db(), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let bytecode_only = list_events(
            &store.db(),
            &QueryOptions {
                kind: Some(EntryKind::Bytecode),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(bytecode_only.len(), 1);
        assert_eq!(bytecode_only[0].key, wallet_event.key);

        let denials = list_events(
            &store.db(),
            &QueryOptions {
                allowed: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(denials.len(), 1);
        assert_eq!(denials[0].key, address_event.key);
    }

    #[tokio::test]
    async fn test_list_entries_by_kind() {
        let store = AllowlistStore::new(&Config::test_default()).await;

        store
            .put_bytecode_entry(&BytecodeEntry {
                code_hash: B256::repeat_byte(0x88),
                implementation: Address::repeat_byte(0x99),
                allowed: true,
            })
            .await
            .unwrap();
        store
            .put_address_entry(&AddressEntry {
                address: Address::repeat_byte(0xaa),
                allowed: false,
            })
            .await
            .unwrap();

        let all = list_entries(&store.db(), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let allowed = list_entries(
            &store.db(),
            &QueryOptions {
                allowed: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(allowed.len(), 1);
        assert_eq!(allowed[0].kind, EntryKind::Bytecode);

        let addresses = list_entries(
            &store.db(),
            &QueryOptions {
                kind: Some(EntryKind::Address),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].implementation, None);
    }
}
