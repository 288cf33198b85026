use newsreader_core::db::open_db_in_memory;
use newsreader_core::{
    Configuration, EntityKind, NewsConfiguration, NewsDefinition, NewsSet, NewsStore,
    PredefinedNewsDefinition, SqliteNewsStore, StoreError, UserDefinedNewsDefinition,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn stored_set(store: &SqliteNewsStore<'_>, user: &str) -> NewsSet {
    let set = NewsSet::new(user, "default");
    store.store_set(&set).unwrap();
    set
}

fn stored_predefined(store: &SqliteNewsStore<'_>, name: &str) -> PredefinedNewsDefinition {
    let def = PredefinedNewsDefinition::new(name, "rss");
    store
        .store_definition(&NewsDefinition::from(def.clone()))
        .unwrap();
    def
}

fn stored_user_defined(store: &SqliteNewsStore<'_>, name: &str) -> UserDefinedNewsDefinition {
    let def = UserDefinedNewsDefinition::new(name, "rss");
    store
        .store_definition(&NewsDefinition::from(def.clone()))
        .unwrap();
    def
}

#[test]
fn configuration_roundtrip_preserves_flags_and_preferences() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let def = stored_user_defined(&store, "Blog");

    let mut config = Configuration::new(set.id, def);
    config.subscribe_id = Some("alice-blog".to_string());
    config.displayed = false;
    config.visible_only = false;
    config.preferences.insert("max_items".to_string(), "5".to_string());
    let config = NewsConfiguration::from(config);

    let id = store.store_configuration(&config).unwrap();
    assert_eq!(id, config.id());

    let loaded = store.find_configuration(id).unwrap().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn store_configuration_updates_existing_row() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let def = stored_predefined(&store, "Campus");

    let mut config = Configuration::new(set.id, def);
    config
        .preferences
        .insert("layout".to_string(), "compact".to_string());
    store
        .store_configuration(&NewsConfiguration::from(config.clone()))
        .unwrap();

    config.displayed = false;
    config.preferences.clear();
    store
        .store_configuration(&NewsConfiguration::from(config.clone()))
        .unwrap();

    let loaded = store.find_configuration(config.id).unwrap().unwrap();
    assert_eq!(loaded, NewsConfiguration::Predefined(config));
}

#[test]
fn subscriber_listing_returns_only_displayed_configurations() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let alice = stored_set(&store, "alice");
    let bob = stored_set(&store, "bob");
    let campus = stored_predefined(&store, "Campus");
    let sports = stored_predefined(&store, "Sports");

    let mut shown = Configuration::new(alice.id, campus.clone());
    shown.subscribe_id = Some("sub-1".to_string());
    let mut hidden = Configuration::new(alice.id, sports);
    hidden.subscribe_id = Some("sub-1".to_string());
    hidden.displayed = false;
    let mut other_set = Configuration::new(bob.id, campus);
    other_set.subscribe_id = Some("sub-1".to_string());
    for config in [shown.clone(), hidden, other_set.clone()] {
        store
            .store_configuration(&NewsConfiguration::from(config))
            .unwrap();
    }

    let mut listed: Vec<_> = store
        .list_configurations_by_subscriber("sub-1")
        .unwrap()
        .into_iter()
        .map(|config| config.id())
        .collect();
    listed.sort();
    let mut expected = vec![shown.id, other_set.id];
    expected.sort();
    assert_eq!(listed, expected);

    assert!(store
        .list_configurations_by_subscriber("nobody")
        .unwrap()
        .is_empty());
}

#[test]
fn predefined_listing_honours_visible_only_filter() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let visible_def = stored_predefined(&store, "Visible");
    let invisible_def = stored_predefined(&store, "Invisible");

    let visible = Configuration::new(set.id, visible_def);
    let mut invisible = Configuration::new(set.id, invisible_def);
    invisible.visible_only = false;
    for config in [visible.clone(), invisible.clone()] {
        store
            .store_configuration(&NewsConfiguration::from(config))
            .unwrap();
    }

    let restricted = store.list_predefined_configurations(set.id, true).unwrap();
    assert_eq!(restricted, vec![visible.clone()]);

    let all = store.list_predefined_configurations(set.id, false).unwrap();
    assert_eq!(all, vec![invisible, visible]);
}

#[test]
fn variant_listings_are_split_and_sorted_by_definition_name() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");

    for name in ["Zoo", "Apple"] {
        let def = stored_predefined(&store, name);
        store
            .store_configuration(&NewsConfiguration::from(Configuration::new(set.id, def)))
            .unwrap();
    }
    for name in ["Yak", "Bee"] {
        let def = stored_user_defined(&store, name);
        store
            .store_configuration(&NewsConfiguration::from(Configuration::new(set.id, def)))
            .unwrap();
    }

    let predefined: Vec<_> = store
        .list_predefined_configurations(set.id, false)
        .unwrap()
        .into_iter()
        .map(|config| config.definition.name)
        .collect();
    let user_defined: Vec<_> = store
        .list_user_defined_configurations(set.id, false)
        .unwrap()
        .into_iter()
        .map(|config| config.definition.name)
        .collect();

    assert_eq!(predefined, vec!["Apple", "Zoo"]);
    assert_eq!(user_defined, vec!["Bee", "Yak"]);
    assert!(store
        .list_user_defined_configurations(Uuid::new_v4(), true)
        .unwrap()
        .is_empty());
}

#[test]
fn configuration_variant_must_match_persisted_definition() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let predefined = stored_predefined(&store, "Campus");

    // Same id, wrong variant: the type system cannot see the persisted row.
    let mut disguised = UserDefinedNewsDefinition::new("Campus", "rss");
    disguised.id = predefined.id;
    let config = NewsConfiguration::from(Configuration::new(set.id, disguised));

    let err = store.store_configuration(&config).unwrap_err();
    match err {
        StoreError::ConstraintViolation { entity, field } => {
            assert_eq!(entity, EntityKind::Configuration);
            assert_eq!(field, "definition_id");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn configuration_for_missing_definition_is_referential_violation() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let unsaved = PredefinedNewsDefinition::new("Unsaved", "rss");

    let err = store
        .store_configuration(&NewsConfiguration::from(Configuration::new(
            set.id, unsaved,
        )))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::ReferentialViolation {
            entity: EntityKind::Configuration,
            ..
        }
    ));
}

#[test]
fn configuration_for_missing_set_is_referential_violation() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let def = stored_predefined(&store, "Campus");

    let err = store
        .store_configuration(&NewsConfiguration::from(Configuration::new(
            Uuid::new_v4(),
            def,
        )))
        .unwrap_err();
    assert!(matches!(err, StoreError::ReferentialViolation { .. }));
}

#[test]
fn duplicate_definition_in_one_set_is_a_constraint_violation() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let def = stored_predefined(&store, "Campus");

    store
        .store_configuration(&NewsConfiguration::from(Configuration::new(
            set.id,
            def.clone(),
        )))
        .unwrap();
    let err = store
        .store_configuration(&NewsConfiguration::from(Configuration::new(set.id, def)))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::ConstraintViolation {
            entity: EntityKind::Configuration,
            ..
        }
    ));
}

#[test]
fn get_configuration_defers_not_found_until_load() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    let reference = store.get_configuration(missing);
    assert_eq!(reference.id(), missing);

    let err = reference.load(&store).unwrap_err();
    assert!(matches!(
        err,
        StoreError::NotFound {
            entity: EntityKind::Configuration,
            ..
        }
    ));
    assert!(store.find_configuration(missing).unwrap().is_none());
}

#[test]
fn get_configuration_loads_existing_row() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let def = stored_user_defined(&store, "Blog");
    let config = NewsConfiguration::from(Configuration::new(set.id, def));
    store.store_configuration(&config).unwrap();

    let loaded = store.get_configuration(config.id()).load(&store).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn delete_configuration_removes_exactly_one_row() {
    let conn = setup();
    let store = SqliteNewsStore::try_new(&conn).unwrap();
    let set = stored_set(&store, "alice");
    let first = NewsConfiguration::from(Configuration::new(
        set.id,
        stored_predefined(&store, "First"),
    ));
    let second = NewsConfiguration::from(Configuration::new(
        set.id,
        stored_predefined(&store, "Second"),
    ));
    store.store_configuration(&first).unwrap();
    store.store_configuration(&second).unwrap();

    store.delete_configuration(&first).unwrap();

    assert!(store.find_configuration(first.id()).unwrap().is_none());
    assert!(store.find_configuration(second.id()).unwrap().is_some());
    assert!(store.get_set(set.id).unwrap().is_some());

    let err = store.delete_configuration(&first).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}
