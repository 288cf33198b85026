use newsreader_core::db::open_db_in_memory;
use newsreader_core::{
    NewsDefinition, NewsSetService, NewsSetServiceError, NewsStore, PredefinedNewsDefinition,
    RoleSet, SqliteNewsStore, UserDefinedNewsDefinition,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn roles(values: &[&str]) -> RoleSet {
    values.iter().map(|value| value.to_string()).collect()
}

type Service<'conn> = NewsSetService<SqliteNewsStore<'conn>>;

fn seed(service: &Service<'_>) -> (PredefinedNewsDefinition, PredefinedNewsDefinition) {
    let campus = PredefinedNewsDefinition::new("Campus", "rss").with_roles(["student"]);
    let payroll = PredefinedNewsDefinition::new("Payroll", "rss").with_roles(["staff"]);
    for def in [&campus, &payroll] {
        service
            .store()
            .store_definition(&NewsDefinition::from(def.clone()))
            .unwrap();
    }
    (campus, payroll)
}

#[test]
fn resolve_set_creates_and_initializes_on_first_use() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());
    let (campus, _) = seed(&service);

    let set = service
        .resolve_set("alice", "  default ", &roles(&["student"]))
        .unwrap();

    assert_eq!(set.name, "default");
    assert_eq!(set.configurations.len(), 1);
    assert_eq!(set.configurations[0].definition_id(), campus.id);

    let stored = service
        .store()
        .get_set_by_name("alice", "default")
        .unwrap()
        .unwrap();
    assert_eq!(stored, set);
}

#[test]
fn resolve_set_reuses_existing_set_and_adds_newly_granted_feeds() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());
    seed(&service);

    let first = service
        .resolve_set("alice", "default", &roles(&["student"]))
        .unwrap();
    let second = service
        .resolve_set("alice", "default", &roles(&["student", "staff"]))
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.configurations.len(), 2);
    assert_eq!(service.store().get_sets_for_user("alice").unwrap().len(), 1);
}

#[test]
fn resolve_set_rejects_blank_names() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());

    let err = service
        .resolve_set("alice", "   ", &roles(&["student"]))
        .unwrap_err();
    assert!(matches!(err, NewsSetServiceError::InvalidSetName));
}

#[test]
fn subscribe_predefined_opts_into_hidden_feed() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());
    let (_, payroll) = seed(&service);
    let student = roles(&["student"]);

    let set = service.resolve_set("alice", "default", &student).unwrap();
    let hidden = service
        .store()
        .get_hidden_predefined_definitions(set.id, &student)
        .unwrap();
    assert_eq!(hidden, vec![payroll.clone()]);

    let config = service.subscribe_predefined(set.id, payroll.id).unwrap();
    assert_eq!(config.set_id, set.id);

    let hidden = service
        .store()
        .get_hidden_predefined_definitions(set.id, &student)
        .unwrap();
    assert!(hidden.is_empty());

    let err = service
        .subscribe_predefined(set.id, payroll.id)
        .unwrap_err();
    assert!(matches!(err, NewsSetServiceError::AlreadySubscribed(id) if id == payroll.id));
}

#[test]
fn subscribe_predefined_reports_missing_entities() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());
    let (campus, _) = seed(&service);
    let set = service
        .resolve_set("alice", "default", &RoleSet::new())
        .unwrap();

    let missing_set = Uuid::new_v4();
    let err = service
        .subscribe_predefined(missing_set, campus.id)
        .unwrap_err();
    assert!(matches!(err, NewsSetServiceError::SetNotFound(id) if id == missing_set));

    let missing_def = Uuid::new_v4();
    let err = service.subscribe_predefined(set.id, missing_def).unwrap_err();
    assert!(matches!(err, NewsSetServiceError::DefinitionNotFound(id) if id == missing_def));
}

#[test]
fn add_user_feed_stores_definition_and_configuration() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());
    let set = service
        .resolve_set("alice", "default", &RoleSet::new())
        .unwrap();

    let blog = UserDefinedNewsDefinition::new("Blog", "rss")
        .with_parameter("url", "https://example.org/feed.xml");
    let config = service.add_user_feed(set.id, blog.clone()).unwrap();

    let listed = service
        .store()
        .list_user_defined_configurations(set.id, false)
        .unwrap();
    assert_eq!(listed, vec![config]);
    assert_eq!(
        service.store().get_definition(blog.id).unwrap(),
        Some(NewsDefinition::from(blog))
    );
}

#[test]
fn add_user_feed_to_missing_set_stores_nothing() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());
    let blog = UserDefinedNewsDefinition::new("Blog", "rss");

    let err = service.add_user_feed(Uuid::new_v4(), blog.clone()).unwrap_err();
    assert!(matches!(err, NewsSetServiceError::SetNotFound(_)));
    assert!(service.store().get_definition(blog.id).unwrap().is_none());
}

#[test]
fn set_displayed_toggles_and_persists() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());
    seed(&service);
    let set = service
        .resolve_set("alice", "default", &roles(&["student"]))
        .unwrap();
    let config_id = set.configurations[0].id();

    let updated = service.set_displayed(config_id, false).unwrap();
    assert!(!updated.displayed());

    let reloaded = service
        .store()
        .find_configuration(config_id)
        .unwrap()
        .unwrap();
    assert!(!reloaded.displayed());
    assert_eq!(reloaded, updated);
}

#[test]
fn set_displayed_on_missing_configuration_is_not_found() {
    let conn = setup();
    let service = NewsSetService::new(SqliteNewsStore::try_new(&conn).unwrap());

    let missing = Uuid::new_v4();
    let err = service.set_displayed(missing, true).unwrap_err();
    assert!(matches!(err, NewsSetServiceError::ConfigurationNotFound(id) if id == missing));
}
