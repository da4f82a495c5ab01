//! SQLite-backed contract store
//!
//! Contract terms and territories are stored as JSON text; shares, flags and
//! overrides are plain columns. Writes that touch more than one table run in
//! a transaction.

use crate::contract::{Contract, ContractId, ContractStatus, ContractTerms, ContractType, FinancialTerms};
use crate::ledger::{ControlStatus, InterestedParty, PartyId, PartyLedger, PartyType};
use crate::registration::{RegistrationRecord, RegistrationStatus};
use crate::rights::ShareSet;
use crate::schedule::{
    ExternalIds, InheritanceFlags, ScheduleWork, WorkId, WorkOverrides, WorkSchedule, WorkWriter,
};
use crate::store::{ContractStore, ContractSummary};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

/// Contract store over a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose tables were created by [`crate::db::init_database`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ContractStore for SqliteStore {
    async fn load_contract(&self, id: ContractId) -> Result<Contract> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query(
            r#"
            SELECT guid, counterparty, status, terms, territories, start_date, end_date,
                   advance, rate_reduction, recouped, created_at, updated_at
            FROM contracts
            WHERE guid = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("contract {}", id)))?;

        let terms: ContractTerms = serde_json::from_str(&row.try_get::<String, _>("terms")?)?;
        let territories: BTreeSet<String> =
            serde_json::from_str(&row.try_get::<String, _>("territories")?)?;
        let status_str: String = row.try_get("status")?;

        let ledger = load_ledger(&mut conn, id).await?;
        let schedule = load_schedule(&mut conn, id).await?;

        Ok(Contract {
            id,
            counterparty: row.try_get("counterparty")?,
            status: ContractStatus::from_str(&status_str)
                .ok_or_else(|| corrupt("contract status", &status_str))?,
            territories,
            start_date: parse_date(row.try_get("start_date")?)?,
            end_date: parse_date(row.try_get("end_date")?)?,
            terms,
            financials: FinancialTerms {
                advance: row.try_get("advance")?,
                rate_reduction: row.try_get("rate_reduction")?,
                recouped: row.try_get("recouped")?,
            },
            ledger,
            schedule,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        })
    }

    async fn list_contracts(&self) -> Result<Vec<ContractSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.guid, c.counterparty, c.status, c.contract_type,
                   (SELECT COUNT(*) FROM interested_parties p WHERE p.contract_guid = c.guid) AS party_count,
                   (SELECT COUNT(*) FROM schedule_works w WHERE w.contract_guid = c.guid) AS work_count
            FROM contracts c
            ORDER BY c.counterparty, c.guid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ContractSummary> {
                let status_str: String = row.try_get("status")?;
                let type_str: String = row.try_get("contract_type")?;
                Ok(ContractSummary {
                    id: ContractId(parse_guid(row.try_get("guid")?)?),
                    counterparty: row.try_get("counterparty")?,
                    status: ContractStatus::from_str(&status_str)
                        .ok_or_else(|| corrupt("contract status", &status_str))?,
                    contract_type: ContractType::from_str(&type_str)
                        .ok_or_else(|| corrupt("contract type", &type_str))?,
                    party_count: row.try_get::<i64, _>("party_count")? as usize,
                    work_count: row.try_get::<i64, _>("work_count")? as usize,
                })
            })
            .collect()
    }

    async fn save_contract(&self, contract: &Contract) -> Result<()> {
        let now = Utc::now();
        let guid = contract.id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contracts (
                guid, counterparty, status, contract_type, terms, territories,
                start_date, end_date, advance, rate_reduction, recouped,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                counterparty = excluded.counterparty,
                status = excluded.status,
                contract_type = excluded.contract_type,
                terms = excluded.terms,
                territories = excluded.territories,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                advance = excluded.advance,
                rate_reduction = excluded.rate_reduction,
                recouped = excluded.recouped,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&guid)
        .bind(&contract.counterparty)
        .bind(contract.status.to_db_string())
        .bind(contract.contract_type().to_db_string())
        .bind(serde_json::to_string(&contract.terms)?)
        .bind(serde_json::to_string(&contract.territories)?)
        .bind(contract.start_date.map(|d| d.to_string()))
        .bind(contract.end_date.map(|d| d.to_string()))
        .bind(contract.financials.advance)
        .bind(contract.financials.rate_reduction)
        .bind(contract.financials.recouped)
        .bind(contract.created_at.unwrap_or(now).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // Full replace of the child rows; writers and registrations cascade
        sqlx::query("DELETE FROM interested_parties WHERE contract_guid = ?")
            .bind(&guid)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM schedule_works WHERE contract_guid = ?")
            .bind(&guid)
            .execute(&mut *tx)
            .await?;

        for (position, party) in contract.ledger.parties().iter().enumerate() {
            upsert_party(&mut tx, contract.id, party, position as i64).await?;
        }
        for (position, work) in contract.schedule.works().iter().enumerate() {
            upsert_work(&mut tx, contract.id, work, position as i64).await?;
        }

        tx.commit().await?;
        debug!(
            "Saved contract {} ({} parties, {} works)",
            contract.id,
            contract.ledger.len(),
            contract.schedule.len()
        );
        Ok(())
    }

    async fn save_party(&self, contract_id: ContractId, party: &InterestedParty) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        ensure_contract(&mut tx, contract_id).await?;

        let position = next_position(
            &mut tx,
            "SELECT position FROM interested_parties WHERE guid = ?",
            "SELECT COALESCE(MAX(position) + 1, 0) FROM interested_parties WHERE contract_guid = ?",
            &party.id.to_string(),
            contract_id,
        )
        .await?;
        upsert_party(&mut tx, contract_id, party, position).await?;
        touch_contract(&mut tx, contract_id).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_party(&self, party_id: PartyId) -> Result<()> {
        let result = sqlx::query("DELETE FROM interested_parties WHERE guid = ?")
            .bind(party_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("interested party {}", party_id)));
        }
        Ok(())
    }

    async fn save_schedule_work(&self, contract_id: ContractId, work: &ScheduleWork) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        ensure_contract(&mut tx, contract_id).await?;

        let position = next_position(
            &mut tx,
            "SELECT position FROM schedule_works WHERE guid = ?",
            "SELECT COALESCE(MAX(position) + 1, 0) FROM schedule_works WHERE contract_guid = ?",
            &work.id.to_string(),
            contract_id,
        )
        .await?;
        upsert_work(&mut tx, contract_id, work, position).await?;
        touch_contract(&mut tx, contract_id).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_schedule_work(&self, work_id: WorkId) -> Result<()> {
        let result = sqlx::query("DELETE FROM schedule_works WHERE guid = ?")
            .bind(work_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("schedule work {}", work_id)));
        }
        Ok(())
    }

    async fn save_registration(&self, work_id: WorkId, record: &RegistrationRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM schedule_works WHERE guid = ?")
            .bind(work_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("schedule work {}", work_id)));
        }

        upsert_registration(&mut conn, work_id, record).await
    }
}

async fn ensure_contract(conn: &mut SqliteConnection, contract_id: ContractId) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM contracts WHERE guid = ?")
        .bind(contract_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("contract {}", contract_id))),
    }
}

async fn touch_contract(conn: &mut SqliteConnection, contract_id: ContractId) -> Result<()> {
    sqlx::query("UPDATE contracts SET updated_at = ? WHERE guid = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(contract_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Keep an existing row's position, else append after the last one
async fn next_position(
    conn: &mut SqliteConnection,
    existing_sql: &str,
    append_sql: &str,
    guid: &str,
    contract_id: ContractId,
) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(existing_sql)
        .bind(guid)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(position) = existing {
        return Ok(position);
    }

    let position: i64 = sqlx::query_scalar(append_sql)
        .bind(contract_id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(position)
}

async fn upsert_party(
    conn: &mut SqliteConnection,
    contract_id: ContractId,
    party: &InterestedParty,
    position: i64,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO interested_parties (
            guid, contract_guid, position, name, alias, party_type, control,
            performance, mechanical, print, synch, grand_rights, karaoke
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET
            name = excluded.name,
            alias = excluded.alias,
            party_type = excluded.party_type,
            control = excluded.control,
            performance = excluded.performance,
            mechanical = excluded.mechanical,
            print = excluded.print,
            synch = excluded.synch,
            grand_rights = excluded.grand_rights,
            karaoke = excluded.karaoke
        WHERE interested_parties.contract_guid = excluded.contract_guid
        "#,
    )
    .bind(party.id.to_string())
    .bind(contract_id.to_string())
    .bind(position)
    .bind(&party.name)
    .bind(&party.alias)
    .bind(party.party_type.to_db_string())
    .bind(party.control.to_db_string())
    .bind(party.shares.performance)
    .bind(party.shares.mechanical)
    .bind(party.shares.print)
    .bind(party.shares.synch)
    .bind(party.shares.grand_rights)
    .bind(party.shares.karaoke)
    .execute(&mut *conn)
    .await?;

    // No row touched: the guid is owned by another contract
    if result.rows_affected() == 0 {
        return Err(Error::InvalidInput(format!(
            "interested party {} belongs to another contract",
            party.id
        )));
    }
    Ok(())
}

async fn upsert_work(
    conn: &mut SqliteConnection,
    contract_id: ContractId,
    work: &ScheduleWork,
    position: i64,
) -> Result<()> {
    let guid = work.id.to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO schedule_works (
            guid, contract_guid, position, title, artist, album, catalog_ref,
            external_work_id, isrc, iswc,
            inherits_royalty_splits, inherits_recoupment_status, inherits_controlled_status,
            advance_override, rate_reduction_override, recouped_override, finalized
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET
            title = excluded.title,
            artist = excluded.artist,
            album = excluded.album,
            catalog_ref = excluded.catalog_ref,
            external_work_id = excluded.external_work_id,
            isrc = excluded.isrc,
            iswc = excluded.iswc,
            inherits_royalty_splits = excluded.inherits_royalty_splits,
            inherits_recoupment_status = excluded.inherits_recoupment_status,
            inherits_controlled_status = excluded.inherits_controlled_status,
            advance_override = excluded.advance_override,
            rate_reduction_override = excluded.rate_reduction_override,
            recouped_override = excluded.recouped_override,
            finalized = excluded.finalized
        WHERE schedule_works.contract_guid = excluded.contract_guid
        "#,
    )
    .bind(&guid)
    .bind(contract_id.to_string())
    .bind(position)
    .bind(&work.title)
    .bind(&work.artist)
    .bind(&work.album)
    .bind(&work.catalog_ref)
    .bind(&work.external_ids.work_id)
    .bind(&work.external_ids.isrc)
    .bind(&work.external_ids.iswc)
    .bind(work.inheritance.royalty_splits)
    .bind(work.inheritance.recoupment_status)
    .bind(work.inheritance.controlled_status)
    .bind(work.overrides.advance)
    .bind(work.overrides.rate_reduction)
    .bind(work.overrides.recouped)
    .bind(work.finalized)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::InvalidInput(format!(
            "schedule work {} belongs to another contract",
            work.id
        )));
    }

    sqlx::query("DELETE FROM work_writers WHERE work_guid = ?")
        .bind(&guid)
        .execute(&mut *conn)
        .await?;
    for (position, writer) in work.writers.iter().enumerate() {
        sqlx::query(
            "INSERT INTO work_writers (work_guid, position, name, ipi, share) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&guid)
        .bind(position as i64)
        .bind(&writer.name)
        .bind(&writer.ipi)
        .bind(writer.share)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("DELETE FROM registrations WHERE work_guid = ?")
        .bind(&guid)
        .execute(&mut *conn)
        .await?;
    for record in &work.registrations {
        upsert_registration(conn, work.id, record).await?;
    }

    Ok(())
}

async fn upsert_registration(
    conn: &mut SqliteConnection,
    work_id: WorkId,
    record: &RegistrationRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO registrations (work_guid, body, territory, work_number, status, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(work_guid, body) DO UPDATE SET
            body = excluded.body,
            territory = excluded.territory,
            work_number = excluded.work_number,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(work_id.to_string())
    .bind(&record.body)
    .bind(&record.territory)
    .bind(&record.work_number)
    .bind(record.status.to_db_string())
    .bind(record.updated_at.map(|t| t.to_rfc3339()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn load_ledger(conn: &mut SqliteConnection, contract_id: ContractId) -> Result<PartyLedger> {
    let rows = sqlx::query(
        r#"
        SELECT guid, name, alias, party_type, control,
               performance, mechanical, print, synch, grand_rights, karaoke
        FROM interested_parties
        WHERE contract_guid = ?
        ORDER BY position
        "#,
    )
    .bind(contract_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let parties = rows.iter().map(party_from_row).collect::<Result<Vec<_>>>()?;
    Ok(PartyLedger::from_parties(parties))
}

fn party_from_row(row: &SqliteRow) -> Result<InterestedParty> {
    let type_str: String = row.try_get("party_type")?;
    let control_str: String = row.try_get("control")?;

    Ok(InterestedParty {
        id: PartyId(parse_guid(row.try_get("guid")?)?),
        name: row.try_get("name")?,
        alias: row.try_get("alias")?,
        party_type: PartyType::from_str(&type_str).ok_or_else(|| corrupt("party type", &type_str))?,
        control: ControlStatus::from_str(&control_str)
            .ok_or_else(|| corrupt("control status", &control_str))?,
        shares: ShareSet {
            performance: row.try_get("performance")?,
            mechanical: row.try_get("mechanical")?,
            print: row.try_get("print")?,
            synch: row.try_get("synch")?,
            grand_rights: row.try_get("grand_rights")?,
            karaoke: row.try_get("karaoke")?,
        },
    })
}

async fn load_schedule(conn: &mut SqliteConnection, contract_id: ContractId) -> Result<WorkSchedule> {
    let rows = sqlx::query(
        r#"
        SELECT guid, title, artist, album, catalog_ref, external_work_id, isrc, iswc,
               inherits_royalty_splits, inherits_recoupment_status, inherits_controlled_status,
               advance_override, rate_reduction_override, recouped_override, finalized
        FROM schedule_works
        WHERE contract_guid = ?
        ORDER BY position
        "#,
    )
    .bind(contract_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut works = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut work = work_from_row(row)?;
        work.writers = load_writers(conn, work.id).await?;
        work.registrations = load_registrations(conn, work.id).await?;
        works.push(work);
    }
    Ok(WorkSchedule::from_works(works))
}

fn work_from_row(row: &SqliteRow) -> Result<ScheduleWork> {
    Ok(ScheduleWork {
        id: WorkId(parse_guid(row.try_get("guid")?)?),
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        album: row.try_get("album")?,
        catalog_ref: row.try_get("catalog_ref")?,
        external_ids: ExternalIds {
            work_id: row.try_get("external_work_id")?,
            isrc: row.try_get("isrc")?,
            iswc: row.try_get("iswc")?,
        },
        inheritance: InheritanceFlags {
            royalty_splits: row.try_get("inherits_royalty_splits")?,
            recoupment_status: row.try_get("inherits_recoupment_status")?,
            controlled_status: row.try_get("inherits_controlled_status")?,
        },
        overrides: WorkOverrides {
            advance: row.try_get("advance_override")?,
            rate_reduction: row.try_get("rate_reduction_override")?,
            recouped: row.try_get("recouped_override")?,
        },
        writers: Vec::new(),
        registrations: Vec::new(),
        finalized: row.try_get("finalized")?,
    })
}

async fn load_writers(conn: &mut SqliteConnection, work_id: WorkId) -> Result<Vec<WorkWriter>> {
    let rows = sqlx::query(
        "SELECT name, ipi, share FROM work_writers WHERE work_guid = ? ORDER BY position",
    )
    .bind(work_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<WorkWriter> {
            Ok(WorkWriter {
                name: row.try_get("name")?,
                ipi: row.try_get("ipi")?,
                share: row.try_get("share")?,
            })
        })
        .collect()
}

async fn load_registrations(
    conn: &mut SqliteConnection,
    work_id: WorkId,
) -> Result<Vec<RegistrationRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT body, territory, work_number, status, updated_at
        FROM registrations
        WHERE work_guid = ?
        ORDER BY body
        "#,
    )
    .bind(work_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<RegistrationRecord> {
            let status_str: String = row.try_get("status")?;
            Ok(RegistrationRecord {
                body: row.try_get("body")?,
                territory: row.try_get("territory")?,
                work_number: row.try_get("work_number")?,
                status: RegistrationStatus::from_str(&status_str)
                    .ok_or_else(|| corrupt("registration status", &status_str))?,
                updated_at: parse_timestamp(row.try_get("updated_at")?)?,
            })
        })
        .collect()
}

fn parse_guid(guid: String) -> Result<Uuid> {
    Uuid::parse_str(&guid).map_err(|e| Error::Internal(format!("invalid guid {}: {}", guid, e)))
}

fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| Error::Internal(format!("invalid stored date {}: {}", s, e)))
        })
        .transpose()
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| Error::Internal(format!("invalid stored timestamp {}: {}", s, e)))
        })
        .transpose()
}

fn corrupt(what: &str, value: &str) -> Error {
    Error::Internal(format!("unknown {} in database: {}", what, value))
}
