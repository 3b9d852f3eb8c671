use lifecycle_core::db::migrations::latest_version;
use lifecycle_core::db::open_db_in_memory;
use lifecycle_core::model::account::NewAccount;
use lifecycle_core::model::contact::{ContactValidationError, NewContact};
use lifecycle_core::model::person::NewPerson;
use lifecycle_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use lifecycle_core::repo::contact_repo::{ContactRepository, SqliteContactRepository};
use lifecycle_core::repo::deletion_repo::SqliteDeletionStore;
use lifecycle_core::repo::person_repo::{PersonRepository, SqlitePersonRepository};
use lifecycle_core::repo::RepoError;
use rusqlite::Connection;

fn contact_count(conn: &Connection, account_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM contacts WHERE account_id = ?1;",
        [account_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteAccountRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }
    assert!(SqliteDeletionStore::try_new(&conn).is_err());
}

#[test]
fn account_usernames_are_normalized() {
    let conn = open_db_in_memory().unwrap();
    let accounts = SqliteAccountRepository::try_new(&conn).unwrap();

    let created = accounts
        .create_account(&NewAccount::new("  Hank ", "hank@mail.example", "hash"))
        .unwrap();

    assert_eq!(created.username, "hank");
    assert!(created.can_sign_in());
    assert!(!created.has_export());
    let found = accounts.find_by_username("HANK").unwrap().unwrap();
    assert_eq!(found, created);
    assert!(accounts.find_by_username("nobody").unwrap().is_none());
}

#[test]
fn attach_export_marks_account_exported() {
    let conn = open_db_in_memory().unwrap();
    let accounts = SqliteAccountRepository::try_new(&conn).unwrap();
    let hank = accounts
        .create_account(&NewAccount::new("hank", "hank@mail.example", "hash"))
        .unwrap();

    accounts.attach_export(hank.id, "exports/hank.json.gz").unwrap();

    let reloaded = accounts.get_account(hank.id).unwrap().unwrap();
    assert_eq!(reloaded.export_path.as_deref(), Some("exports/hank.json.gz"));
    assert!(reloaded.has_export());

    let err = accounts.attach_export(9999, "exports/none").unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
}

#[test]
fn invitation_code_is_created_once() {
    let conn = open_db_in_memory().unwrap();
    let accounts = SqliteAccountRepository::try_new(&conn).unwrap();
    let hank = accounts
        .create_account(&NewAccount::new("hank", "hank@mail.example", "hash"))
        .unwrap();

    let first = accounts.ensure_invitation_code(hank.id, "first-token").unwrap();
    let second = accounts.ensure_invitation_code(hank.id, "second-token").unwrap();

    assert_eq!(first, second);
    assert_eq!(second.token, "first-token");
}

#[test]
fn person_handles_are_normalized_and_validated() {
    let conn = open_db_in_memory().unwrap();
    let people = SqlitePersonRepository::try_new(&conn).unwrap();

    let ivy = people
        .create_person(&NewPerson::remote("Ivy@Remote.Example"))
        .unwrap();
    assert_eq!(ivy.diaspora_handle, "ivy@remote.example");
    assert!(!ivy.is_local());
    assert!(ivy.accepts_federation());
    assert_eq!(
        people.find_by_handle(" IVY@remote.example ").unwrap(),
        Some(ivy.clone())
    );

    let profile = people.get_profile(ivy.id).unwrap().unwrap();
    assert!(profile.searchable);
    assert!(profile.first_name.is_none());

    let err = people
        .create_person(&NewPerson::remote("no-at-sign"))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn local_person_is_found_by_owner() {
    let conn = open_db_in_memory().unwrap();
    let accounts = SqliteAccountRepository::try_new(&conn).unwrap();
    let people = SqlitePersonRepository::try_new(&conn).unwrap();
    let hank = accounts
        .create_account(&NewAccount::new("hank", "hank@mail.example", "hash"))
        .unwrap();

    let person = people
        .create_person(&NewPerson::local("hank@pod.example", hank.id))
        .unwrap();

    assert!(person.is_local());
    assert_eq!(person.owner_id, Some(hank.id));
    assert_eq!(people.get_person(person.id).unwrap(), Some(person));
}

#[test]
fn aspects_are_ordered_and_memberships_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let accounts = SqliteAccountRepository::try_new(&conn).unwrap();
    let people = SqlitePersonRepository::try_new(&conn).unwrap();
    let contacts = SqliteContactRepository::try_new(&conn).unwrap();
    let hank = accounts
        .create_account(&NewAccount::new("hank", "hank@mail.example", "hash"))
        .unwrap();
    let ivy = people
        .create_person(&NewPerson::remote("ivy@remote.example"))
        .unwrap();

    let family = contacts.create_aspect(hank.id, "Family").unwrap();
    let work = contacts.create_aspect(hank.id, " Work ").unwrap();
    assert_eq!(family.order_id, Some(0));
    assert_eq!(work.order_id, Some(1));
    assert_eq!(work.name, "Work");
    assert_eq!(
        contacts.find_aspect_by_name(hank.id, "Work").unwrap(),
        Some(work.clone())
    );
    assert!(contacts.find_aspect_by_name(hank.id, "work").unwrap().is_none());

    let contact = contacts
        .create_contact(&NewContact::receiving_only(hank.id, ivy.id))
        .unwrap();
    contacts.add_to_aspect(contact.id, work.id).unwrap();
    contacts.add_to_aspect(contact.id, work.id).unwrap();
    assert_eq!(contacts.aspect_ids_for_contact(contact.id).unwrap(), vec![work.id]);
}

#[test]
fn contact_edges_are_unique_and_never_self_referential() {
    let conn = open_db_in_memory().unwrap();
    let accounts = SqliteAccountRepository::try_new(&conn).unwrap();
    let people = SqlitePersonRepository::try_new(&conn).unwrap();
    let contacts = SqliteContactRepository::try_new(&conn).unwrap();
    let hank = accounts
        .create_account(&NewAccount::new("hank", "hank@mail.example", "hash"))
        .unwrap();
    let hank_person = people
        .create_person(&NewPerson::local("hank@pod.example", hank.id))
        .unwrap();
    let ivy = people
        .create_person(&NewPerson::remote("ivy@remote.example"))
        .unwrap();

    contacts
        .create_contact(&NewContact::receiving_only(hank.id, ivy.id))
        .unwrap();
    let duplicate = contacts
        .create_contact(&NewContact::receiving_only(hank.id, ivy.id))
        .unwrap_err();
    assert!(matches!(
        duplicate,
        RepoError::Validation(ContactValidationError::AlreadyExists { .. })
    ));

    let own = contacts
        .create_contact(&NewContact::receiving_only(hank.id, hank_person.id))
        .unwrap_err();
    assert!(matches!(
        own,
        RepoError::Validation(ContactValidationError::SelfContact { .. })
    ));
    assert_eq!(contact_count(&conn, hank.id), 1);
}
