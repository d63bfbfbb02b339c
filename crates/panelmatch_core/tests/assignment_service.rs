use panelmatch_core::db::open_db_in_memory;
use panelmatch_core::{
    AssignmentConfig, AssignmentService, Dataset, GeoPoint, Organization, Patient, PatientId,
    PersistOutcome, ProviderId, RepoError, RepoResult, RosterRepository, ServiceError,
    SkipReason, SqliteRosterRepository,
};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

fn seed_roster(conn: &Connection, patients: i64, providers: &[i64]) {
    conn.execute(
        "INSERT INTO address (address_id, latitude, longitude, zip) VALUES (1, 39.95, -75.16, '19104');",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO address (address_id, latitude, longitude, zip) VALUES (2, NULL, NULL, '19104');",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO address (address_id, latitude, longitude, zip) VALUES (3, NULL, NULL, NULL);",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO organization (org_id, name, address_id) VALUES (1, 'Main Clinic', 1);",
        [],
    )
    .unwrap();
    for provider in providers {
        conn.execute(
            "INSERT INTO provider (provider_id, name, active_ind) VALUES (?1, 'Dr.', 'Y');",
            [provider],
        )
        .unwrap();
    }
    for patient in 1..=patients {
        // Every fifth patient has no location signal at all.
        let address = match patient % 5 {
            0 => 3,
            2 => 2,
            _ => 1,
        };
        conn.execute(
            "INSERT INTO patient (patient_id, address_id, active_ind) VALUES (?1, ?2, 'Y');",
            params![patient, address],
        )
        .unwrap();
    }
}

fn assigned_rows(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM patient WHERE pcp_provider_id IS NOT NULL;",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn run_assigns_and_persists_through_sqlite() {
    let mut conn = open_db_in_memory().unwrap();
    seed_roster(&conn, 20, &[100, 200, 300]);

    let report = {
        let repo = SqliteRosterRepository::try_new(&mut conn).unwrap();
        let mut service = AssignmentService::new(repo);
        service
            .run(&AssignmentConfig::with_capacity(5).unwrap())
            .unwrap()
    };

    assert_eq!(report.processed, 20);
    assert_eq!(report.ineligible, 4);
    assert_eq!(report.assigned, 15);
    assert_eq!(report.capacity_exhausted, 1);
    assert_eq!(report.match_counts.postal_code, 4);
    assert_eq!(
        report.persistence,
        PersistOutcome::Persisted {
            attempted: 15,
            succeeded: 15
        }
    );
    assert_eq!(report.providers_at_capacity, 3);
    assert_eq!(assigned_rows(&conn), 15);
}

#[test]
fn dry_run_computes_without_writing() {
    let mut conn = open_db_in_memory().unwrap();
    seed_roster(&conn, 6, &[100]);

    let report = {
        let repo = SqliteRosterRepository::try_new(&mut conn).unwrap();
        let mut service = AssignmentService::new(repo);
        let config = AssignmentConfig {
            dry_run: true,
            ..AssignmentConfig::default()
        };
        service.run(&config).unwrap()
    };

    assert_eq!(report.assigned, 5);
    assert_eq!(
        report.persistence,
        PersistOutcome::Skipped {
            reason: SkipReason::DryRun
        }
    );
    assert_eq!(assigned_rows(&conn), 0);
}

#[test]
fn empty_datasets_abort_before_assignment() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO provider (provider_id, name, active_ind) VALUES (1, 'Dr.', 'N');",
        [],
    )
    .unwrap();

    let repo = SqliteRosterRepository::try_new(&mut conn).unwrap();
    let mut service = AssignmentService::new(repo);
    let err = service.run(&AssignmentConfig::default()).unwrap_err();

    match err {
        ServiceError::DataUnavailable { missing } => assert_eq!(
            missing,
            vec![Dataset::Patients, Dataset::Organizations, Dataset::Providers]
        ),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn seeding_counts_only_panel_members_outside_the_run() {
    let mut conn = open_db_in_memory().unwrap();
    seed_roster(&conn, 4, &[100, 200]);
    // Patient 4 is re-placed by this run; patient 50 has no address, is never
    // fetched, and keeps holding one of provider 100's slots.
    conn.execute(
        "UPDATE patient SET pcp_provider_id = 100 WHERE patient_id = 4;",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO patient (patient_id, address_id, active_ind, pcp_provider_id) VALUES (50, NULL, 'Y', 100);",
        [],
    )
    .unwrap();

    let repo = SqliteRosterRepository::try_new(&mut conn).unwrap();
    let service = AssignmentService::new(repo);
    let config = AssignmentConfig {
        seed_existing_load: true,
        ..AssignmentConfig::with_capacity(2).unwrap()
    };
    let run = service.plan(&config).unwrap();

    let loads: BTreeMap<_, _> = run.provider_loads().iter().copied().collect();
    assert_eq!(loads, BTreeMap::from([(100, 2), (200, 2)]));
    assert_eq!(
        run.assignments(),
        &BTreeMap::from([(1, 100), (2, 200), (3, 200)])
    );
    assert_eq!(run.unassigned().len(), 1);
    assert_eq!(run.unassigned()[0].id, 4);
}

#[test]
fn seeding_frees_the_old_slot_of_a_reassigned_patient() {
    let mut conn = open_db_in_memory().unwrap();
    seed_roster(&conn, 2, &[100, 200]);
    conn.execute(
        "UPDATE patient SET pcp_provider_id = 100 WHERE patient_id = 1;",
        [],
    )
    .unwrap();

    let report = {
        let repo = SqliteRosterRepository::try_new(&mut conn).unwrap();
        let mut service = AssignmentService::new(repo);
        let config = AssignmentConfig {
            seed_existing_load: true,
            ..AssignmentConfig::with_capacity(1).unwrap()
        };
        service.run(&config).unwrap()
    };

    assert_eq!(report.assigned, 2);
    assert_eq!(report.capacity_exhausted, 0);
    assert_eq!(assigned_rows(&conn), 2);
}

#[test]
fn invalid_config_is_rejected_before_fetching() {
    let repo = FakeRoster::default();
    let service = AssignmentService::new(repo);
    let config = AssignmentConfig {
        unassigned_sample_limit: 0,
        ..AssignmentConfig::default()
    };

    assert!(matches!(
        service.plan(&config),
        Err(ServiceError::Config(_))
    ));
    assert_eq!(service.into_inner().fetches.get(), 0);
}

#[test]
fn persistence_failure_reports_zero_durable_rows() {
    let repo = FakeRoster {
        patients: (1..=4)
            .map(|id| Patient::new(id).with_location(GeoPoint::new(1.0, 1.0).unwrap()))
            .collect(),
        organizations: vec![Organization::new(1).with_location(GeoPoint::new(1.0, 1.1).unwrap())],
        providers: vec![10, 20],
        fail_persist: true,
        ..FakeRoster::default()
    };
    let mut service = AssignmentService::new(repo);

    let err = service.run(&AssignmentConfig::default()).unwrap_err();

    match &err {
        ServiceError::PersistenceFailed {
            attempted,
            succeeded,
            source,
            ..
        } => {
            assert_eq!(*attempted, 4);
            assert_eq!(*succeeded, 0);
            assert!(matches!(source, RepoError::InvalidData(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("attempted=4 success=0 errors=4"));
    assert!(service.into_inner().persisted.is_empty());
}

#[test]
fn nothing_to_write_skips_persistence() {
    let repo = FakeRoster {
        patients: vec![Patient::new(1)],
        organizations: vec![Organization::new(1).with_location(GeoPoint::new(1.0, 1.0).unwrap())],
        providers: vec![10],
        fail_persist: true,
        ..FakeRoster::default()
    };
    let mut service = AssignmentService::new(repo);

    let report = service.run(&AssignmentConfig::default()).unwrap();

    assert_eq!(report.unassigned_sample, vec![1]);
    assert_eq!(
        report.persistence,
        PersistOutcome::Skipped {
            reason: SkipReason::NothingToWrite
        }
    );
}

#[derive(Default)]
struct FakeRoster {
    patients: Vec<Patient>,
    organizations: Vec<Organization>,
    providers: Vec<ProviderId>,
    fail_persist: bool,
    fetches: std::cell::Cell<usize>,
    persisted: BTreeMap<PatientId, ProviderId>,
}

impl RosterRepository for FakeRoster {
    fn fetch_patients(&self) -> RepoResult<Vec<Patient>> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.patients.clone())
    }

    fn fetch_organizations(&self) -> RepoResult<Vec<Organization>> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.organizations.clone())
    }

    fn fetch_active_provider_ids(&self) -> RepoResult<Vec<ProviderId>> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.providers.clone())
    }

    fn fetch_current_assignments(&self) -> RepoResult<BTreeMap<PatientId, ProviderId>> {
        Ok(BTreeMap::new())
    }

    fn persist_assignments(
        &mut self,
        assignments: &BTreeMap<PatientId, ProviderId>,
    ) -> RepoResult<usize> {
        if self.fail_persist {
            return Err(RepoError::InvalidData("simulated write failure".to_string()));
        }
        self.persisted.extend(assignments);
        Ok(assignments.len())
    }
}
