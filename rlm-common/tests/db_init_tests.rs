//! Database initialization and persistence across reopen

use rlm_common::contract::{Contract, ContractTerms};
use rlm_common::db::{init_database, SqliteStore};
use rlm_common::store::ContractStore;
use rlm_common::{ControlStatus, PartyDraft, PartyType, RightType};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("ledger.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("ledger.db")).await.unwrap();

    for table in [
        "contracts",
        "interested_parties",
        "schedule_works",
        "work_writers",
        "registrations",
        "schema_version",
    ] {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_contract_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");

    let mut contract = Contract::new(
        "Acme Music",
        ContractTerms::Artist {
            royalty_rate_pct: 18.0,
            album_commitment: Some(2),
            exclusivity_months: None,
        },
    );
    let id = contract.ledger.add_party(PartyDraft::new("A", PartyType::Writer));
    contract.ledger.set_control(id, ControlStatus::Controlled).unwrap();
    contract.ledger.update_share(id, RightType::Mechanical, 100.0).unwrap();

    {
        let pool = init_database(&db_path).await.unwrap();
        SqliteStore::new(pool.clone()).save_contract(&contract).await.unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let loaded = SqliteStore::new(pool).load_contract(contract.id).await.unwrap();
    assert_eq!(loaded.terms, contract.terms);
    assert_eq!(loaded.ledger, contract.ledger);
}
