//! Roster repository contract and SQLite implementation.
//!
//! # Invariants
//! - Result ordering is by row id so repeated runs see identical input.
//! - Only active rows with an address are returned for patients.
//! - Assignment writes run in one immediate transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::location::{GeoPoint, PostalCode};
use crate::model::roster::{Organization, Patient, PatientId, ProviderId};
use log::{error, info};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const ACTIVE_PATIENTS_SQL: &str = "SELECT
    p.patient_id AS id,
    a.latitude,
    a.longitude,
    a.zip
FROM patient p
JOIN address a ON p.address_id = a.address_id
WHERE p.active_ind = 'Y'
  AND p.address_id IS NOT NULL
ORDER BY p.patient_id ASC;";

const ORGANIZATIONS_SQL: &str = "SELECT
    o.org_id AS id,
    a.latitude,
    a.longitude,
    a.zip
FROM organization o
JOIN address a ON o.address_id = a.address_id
WHERE o.address_id IS NOT NULL
ORDER BY o.org_id ASC;";

const ACTIVE_PROVIDERS_SQL: &str = "SELECT provider_id
FROM provider
WHERE active_ind = 'Y'
ORDER BY provider_id ASC;";

const CURRENT_ASSIGNMENTS_SQL: &str = "SELECT p.patient_id, p.pcp_provider_id
FROM patient p
WHERE p.pcp_provider_id IS NOT NULL
  AND p.active_ind = 'Y'
ORDER BY p.patient_id ASC;";

const ASSIGN_PCP_SQL: &str = "UPDATE patient SET pcp_provider_id = ?1 WHERE patient_id = ?2;";

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection schema is not at the version this binary expects.
    SchemaNotReady { found: u32, expected: u32 },
    /// An assignment targeted a patient row that does not exist.
    MissingPatient(PatientId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SchemaNotReady { found, expected } => write!(
                f,
                "roster schema version {found} does not match expected {expected}"
            ),
            Self::MissingPatient(id) => write!(f, "patient not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid roster data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::SchemaNotReady { .. } | Self::MissingPatient(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read/write collaborator for assignment runs.
pub trait RosterRepository {
    /// Active patients that have an address, in stable order.
    fn fetch_patients(&self) -> RepoResult<Vec<Patient>>;
    /// Organizations that have an address, in stable order.
    fn fetch_organizations(&self) -> RepoResult<Vec<Organization>>;
    /// Active provider ids; this order is the round-robin cycle.
    fn fetch_active_provider_ids(&self) -> RepoResult<Vec<ProviderId>>;
    /// Persisted provider of every active patient that already has one.
    fn fetch_current_assignments(&self) -> RepoResult<BTreeMap<PatientId, ProviderId>>;
    /// Writes every mapping row atomically; returns the number of rows written.
    fn persist_assignments(
        &mut self,
        assignments: &BTreeMap<PatientId, ProviderId>,
    ) -> RepoResult<usize>;
}

/// SQLite-backed roster repository.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    /// Wraps a connection opened through `db::open_db*`.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        let found = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let expected = latest_version();
        if found != expected {
            return Err(RepoError::SchemaNotReady { found, expected });
        }
        Ok(Self { conn })
    }

    fn query_locations<T>(
        &self,
        sql: &str,
        build: impl Fn(i64, Option<GeoPoint>, Option<PostalCode>) -> T,
    ) -> RepoResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let (id, location, postal_code) = parse_location_row(row)?;
            records.push(build(id, location, postal_code));
        }

        Ok(records)
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    fn fetch_patients(&self) -> RepoResult<Vec<Patient>> {
        let patients = self.query_locations(ACTIVE_PATIENTS_SQL, |id, location, postal_code| {
            Patient {
                id,
                location,
                postal_code,
            }
        })?;
        info!(
            "event=roster_fetch module=repo status=ok dataset=patients rows={}",
            patients.len()
        );
        Ok(patients)
    }

    fn fetch_organizations(&self) -> RepoResult<Vec<Organization>> {
        let organizations =
            self.query_locations(ORGANIZATIONS_SQL, |id, location, postal_code| {
                Organization {
                    id,
                    location,
                    postal_code,
                }
            })?;
        info!(
            "event=roster_fetch module=repo status=ok dataset=organizations rows={}",
            organizations.len()
        );
        Ok(organizations)
    }

    fn fetch_active_provider_ids(&self) -> RepoResult<Vec<ProviderId>> {
        let mut stmt = self.conn.prepare(ACTIVE_PROVIDERS_SQL)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, ProviderId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "event=roster_fetch module=repo status=ok dataset=providers rows={}",
            ids.len()
        );
        Ok(ids)
    }

    fn fetch_current_assignments(&self) -> RepoResult<BTreeMap<PatientId, ProviderId>> {
        let mut stmt = self.conn.prepare(CURRENT_ASSIGNMENTS_SQL)?;
        let assignments = stmt
            .query_map([], |row| {
                Ok((row.get::<_, PatientId>(0)?, row.get::<_, ProviderId>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        info!(
            "event=roster_fetch module=repo status=ok dataset=current_assignments rows={}",
            assignments.len()
        );
        Ok(assignments)
    }

    fn persist_assignments(
        &mut self,
        assignments: &BTreeMap<PatientId, ProviderId>,
    ) -> RepoResult<usize> {
        let started_at = Instant::now();
        let attempted = assignments.len();
        info!("event=assign_persist module=repo status=start attempted={attempted}");

        let result = write_assignments(self.conn, assignments);
        match &result {
            Ok(written) => info!(
                "event=assign_persist module=repo status=ok attempted={attempted} written={written} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=assign_persist module=repo status=error attempted={attempted} written=0 duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn write_assignments(
    conn: &mut Connection,
    assignments: &BTreeMap<PatientId, ProviderId>,
) -> RepoResult<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    {
        let mut stmt = tx.prepare_cached(ASSIGN_PCP_SQL)?;
        for (patient, provider) in assignments {
            let changed = stmt.execute(params![provider, patient])?;
            if changed == 0 {
                // Dropping `tx` without commit rolls back every earlier row.
                return Err(RepoError::MissingPatient(*patient));
            }
        }
    }
    tx.commit()?;
    Ok(assignments.len())
}

fn parse_location_row(
    row: &Row<'_>,
) -> RepoResult<(i64, Option<GeoPoint>, Option<PostalCode>)> {
    let id: i64 = row.get("id")?;
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;
    let location = GeoPoint::from_parts(latitude, longitude).map_err(|err| {
        RepoError::InvalidData(format!("invalid coordinates for row {id}: {err}"))
    })?;
    let postal_code = row
        .get::<_, Option<String>>("zip")?
        .as_deref()
        .and_then(PostalCode::parse);
    Ok((id, location, postal_code))
}
