use lifecycle_core::db::open_db_in_memory;
use lifecycle_core::model::account::{Account, AccountId, NewAccount};
use lifecycle_core::model::contact::{
    Aspect, AspectId, Contact, ContactId, ContactValidationError, NewContact,
};
use lifecycle_core::model::person::{NewPerson, Person, PersonId};
use lifecycle_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use lifecycle_core::repo::contact_repo::{ContactRepository, SqliteContactRepository};
use lifecycle_core::repo::person_repo::{PersonRepository, SqlitePersonRepository};
use lifecycle_core::repo::{RepoError, RepoResult};
use lifecycle_core::report::{MemoryReporter, ReportEntry};
use lifecycle_core::service::contact_import::{
    ArchivedContact, ContactImportError, ContactImporter, ImportOutcome, ImportStats,
};
use rusqlite::Connection;

fn destination(conn: &Connection) -> (Account, Person) {
    let account = SqliteAccountRepository::try_new(conn)
        .unwrap()
        .create_account(&NewAccount::new("dana", "dana@mail.example", "hash"))
        .unwrap();
    let person = SqlitePersonRepository::try_new(conn)
        .unwrap()
        .create_person(&NewPerson::local("dana@new.example", account.id))
        .unwrap();
    (account, person)
}

fn contact_count(conn: &Connection, account_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM contacts WHERE account_id = ?1;",
        [account_id],
        |row| row.get(0),
    )
    .unwrap()
}

fn remote(conn: &Connection, handle: &str) -> Person {
    SqlitePersonRepository::try_new(conn)
        .unwrap()
        .create_person(&NewPerson::remote(handle))
        .unwrap()
}

fn importer<'a>(
    conn: &'a Connection,
    reporter: &'a MemoryReporter,
    account: &Account,
) -> ContactImporter<SqlitePersonRepository<'a>, SqliteContactRepository<'a>, &'a MemoryReporter> {
    ContactImporter::new(
        SqlitePersonRepository::try_new(conn).unwrap(),
        SqliteContactRepository::try_new(conn).unwrap(),
        reporter,
        account.clone(),
    )
}

fn record(handle: &str, receiving: bool, groups: &[&str]) -> ArchivedContact {
    ArchivedContact {
        account_id: handle.to_string(),
        receiving,
        sharing: true,
        contact_groups_membership: groups.iter().map(|name| name.to_string()).collect(),
        person_name: None,
        person_guid: None,
    }
}

#[test]
fn receiving_contact_is_created_with_existing_aspects() {
    let conn = open_db_in_memory().unwrap();
    let (dana, _) = destination(&conn);
    let frank = remote(&conn, "frank@old.example");
    let contacts = SqliteContactRepository::try_new(&conn).unwrap();
    let family = contacts.create_aspect(dana.id, "Family").unwrap();
    let work = contacts.create_aspect(dana.id, "Work").unwrap();
    let reporter = MemoryReporter::new();

    let outcome = importer(&conn, &reporter, &dana)
        .import(&record("frank@old.example", true, &["Family", "Work"]))
        .unwrap();

    let ImportOutcome::Imported {
        contact_id,
        aspects_joined,
        aspects_missing,
        aspects_failed,
    } = outcome
    else {
        panic!("expected an import, got {outcome:?}");
    };
    assert_eq!(aspects_joined, 2);
    assert!(aspects_missing.is_empty());
    assert!(aspects_failed.is_empty());

    let contact = contacts.find_contact(dana.id, frank.id).unwrap().unwrap();
    assert_eq!(contact.id, contact_id);
    assert!(contact.receiving);
    assert!(!contact.sharing);
    let mut aspect_ids = contacts.aspect_ids_for_contact(contact_id).unwrap();
    aspect_ids.sort_unstable();
    assert_eq!(aspect_ids, vec![family.id, work.id]);
    assert!(reporter.warnings().is_empty());
}

#[test]
fn non_receiving_record_is_skipped() {
    let conn = open_db_in_memory().unwrap();
    let (dana, _) = destination(&conn);
    let frank = remote(&conn, "frank@old.example");
    let reporter = MemoryReporter::new();

    let outcome = importer(&conn, &reporter, &dana)
        .import(&record("frank@old.example", false, &["Family"]))
        .unwrap();

    assert_eq!(outcome, ImportOutcome::Skipped);
    let contacts = SqliteContactRepository::try_new(&conn).unwrap();
    assert!(contacts.find_contact(dana.id, frank.id).unwrap().is_none());
}

#[test]
fn unknown_handle_is_an_error_and_creates_nothing() {
    let conn = open_db_in_memory().unwrap();
    let (dana, _) = destination(&conn);
    let reporter = MemoryReporter::new();
    let importer = importer(&conn, &reporter, &dana);

    let err = importer
        .import(&record("ghost@nowhere.example", true, &[]))
        .unwrap_err();
    assert!(matches!(err, ContactImportError::PersonNotFound(ref handle) if handle == "ghost@nowhere.example"));

    let err = importer.import(&record("not a handle", true, &[])).unwrap_err();
    assert!(matches!(err, ContactImportError::PersonNotFound(_)));

    assert_eq!(contact_count(&conn, dana.id), 0);
}

#[test]
fn missing_aspect_is_warned_and_skipped() {
    let conn = open_db_in_memory().unwrap();
    let (dana, _) = destination(&conn);
    remote(&conn, "frank@old.example");
    let contacts = SqliteContactRepository::try_new(&conn).unwrap();
    contacts.create_aspect(dana.id, "Work").unwrap();
    let reporter = MemoryReporter::new();

    let outcome = importer(&conn, &reporter, &dana)
        .import(&record("frank@old.example", true, &["Hiking", "Work"]))
        .unwrap();

    match outcome {
        ImportOutcome::Imported {
            aspects_joined,
            aspects_missing,
            ..
        } => {
            assert_eq!(aspects_joined, 1);
            assert_eq!(aspects_missing, vec!["Hiking".to_string()]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("aspect \"Hiking\" is missing"));
}

/// Contact store whose membership writes fail for one aspect.
struct BrokenMembership<'conn> {
    inner: SqliteContactRepository<'conn>,
    broken_aspect: AspectId,
}

impl ContactRepository for BrokenMembership<'_> {
    fn create_contact(&self, contact: &NewContact) -> RepoResult<Contact> {
        self.inner.create_contact(contact)
    }

    fn find_contact(
        &self,
        account_id: AccountId,
        person_id: PersonId,
    ) -> RepoResult<Option<Contact>> {
        self.inner.find_contact(account_id, person_id)
    }

    fn create_aspect(&self, account_id: AccountId, name: &str) -> RepoResult<Aspect> {
        self.inner.create_aspect(account_id, name)
    }

    fn find_aspect_by_name(
        &self,
        account_id: AccountId,
        name: &str,
    ) -> RepoResult<Option<Aspect>> {
        self.inner.find_aspect_by_name(account_id, name)
    }

    fn add_to_aspect(&self, contact_id: ContactId, aspect_id: AspectId) -> RepoResult<()> {
        if aspect_id == self.broken_aspect {
            return Err(RepoError::NotFound {
                entity: "aspect_membership",
                key: aspect_id.to_string(),
            });
        }
        self.inner.add_to_aspect(contact_id, aspect_id)
    }

    fn aspect_ids_for_contact(&self, contact_id: ContactId) -> RepoResult<Vec<AspectId>> {
        self.inner.aspect_ids_for_contact(contact_id)
    }
}

#[test]
fn failed_membership_write_keeps_edge_and_other_aspects() {
    let conn = open_db_in_memory().unwrap();
    let (dana, _) = destination(&conn);
    let frank = remote(&conn, "frank@old.example");
    let contacts = SqliteContactRepository::try_new(&conn).unwrap();
    let family = contacts.create_aspect(dana.id, "Family").unwrap();
    let work = contacts.create_aspect(dana.id, "Work").unwrap();
    let reporter = MemoryReporter::new();
    let importer = ContactImporter::new(
        SqlitePersonRepository::try_new(&conn).unwrap(),
        BrokenMembership {
            inner: SqliteContactRepository::try_new(&conn).unwrap(),
            broken_aspect: family.id,
        },
        &reporter,
        dana.clone(),
    );

    let outcome = importer
        .import(&record("frank@old.example", true, &["Family", "Work"]))
        .unwrap();

    let ImportOutcome::Imported {
        contact_id,
        aspects_joined,
        aspects_missing,
        aspects_failed,
    } = outcome
    else {
        panic!("expected an import, got {outcome:?}");
    };
    assert_eq!(aspects_joined, 1);
    assert!(aspects_missing.is_empty());
    assert_eq!(aspects_failed, vec!["Family".to_string()]);

    let contact = contacts.find_contact(dana.id, frank.id).unwrap().unwrap();
    assert_eq!(contact.id, contact_id);
    assert_eq!(
        contacts.aspect_ids_for_contact(contact_id).unwrap(),
        vec![work.id]
    );
    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("aspect \"Family\" not joined"));
}

#[test]
fn duplicate_edge_is_rejected_without_error() {
    let conn = open_db_in_memory().unwrap();
    let (dana, _) = destination(&conn);
    let frank = remote(&conn, "frank@old.example");
    let contacts = SqliteContactRepository::try_new(&conn).unwrap();
    contacts
        .create_contact(&NewContact::receiving_only(dana.id, frank.id))
        .unwrap();
    let reporter = MemoryReporter::new();

    let outcome = importer(&conn, &reporter, &dana)
        .import(&record("frank@old.example", true, &[]))
        .unwrap();

    assert_eq!(
        outcome,
        ImportOutcome::Rejected(ContactValidationError::AlreadyExists {
            account_id: dana.id,
            person_id: frank.id,
        })
    );
    assert_eq!(reporter.warnings().len(), 1);
    assert_eq!(contact_count(&conn, dana.id), 1);
}

#[test]
fn self_contact_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let (dana, dana_person) = destination(&conn);
    let reporter = MemoryReporter::new();

    let outcome = importer(&conn, &reporter, &dana)
        .import(&record(&dana_person.diaspora_handle, true, &[]))
        .unwrap();

    assert!(matches!(
        outcome,
        ImportOutcome::Rejected(ContactValidationError::SelfContact { .. })
    ));
}

#[test]
fn import_all_counts_each_kind_of_result() {
    let conn = open_db_in_memory().unwrap();
    let (dana, _) = destination(&conn);
    remote(&conn, "frank@old.example");
    remote(&conn, "gina@old.example");
    let reporter = MemoryReporter::new();

    let archive: Vec<ArchivedContact> = serde_json::from_str(
        r#"[
            {"account_id": "frank@old.example", "receiving": true, "sharing": true,
             "contact_groups_membership": ["Friends"], "person_name": "Frank"},
            {"account_id": "gina@old.example", "receiving": false, "sharing": true},
            {"account_id": "ghost@nowhere.example", "receiving": true},
            {"account_id": "FRANK@old.example", "receiving": true}
        ]"#,
    )
    .unwrap();

    let stats = importer(&conn, &reporter, &dana).import_all(&archive);

    assert_eq!(
        stats,
        ImportStats {
            imported: 1,
            skipped: 1,
            rejected: 1,
            failed: 1,
        }
    );
    // Each problem record warns once.
    assert_eq!(reporter.warnings().len(), 3);
    assert!(reporter.entries().iter().any(|entry| matches!(
        entry,
        ReportEntry::Info { component: "contact_import", message } if message.contains("imported=1")
    )));
}
