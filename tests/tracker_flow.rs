use shoptrack::auth::{AuthProvider, LocalAuth};
use shoptrack::models::{NewItem, ScannedItem};
use shoptrack::{Config, JsonFileStore, Tracker, TrackerError};

fn config(dir: &std::path::Path) -> Config {
    Config {
        data_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

#[test]
fn duplicate_add_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let auth = LocalAuth::in_memory();
    let user = auth.sign_up("shopper@example.com", "secret").unwrap();
    let cfg = config(dir.path());
    let mut tracker = Tracker::open(user, JsonFileStore::new(&cfg.data_dir), cfg).unwrap();

    tracker.add_item(NewItem::named("Eggs")).unwrap();
    let err = tracker.add_item(NewItem::named("eggs ")).unwrap_err();
    assert!(matches!(err, TrackerError::Duplicate(_)));
    assert_eq!(err.to_string(), "\"eggs\" is already on your list.");
    assert_eq!(tracker.list().len(), 1);
}

#[test]
fn buy_scan_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let auth = LocalAuth::open(dir.path().join("auth.json")).unwrap();
    let user = auth.sign_up("shopper@example.com", "secret").unwrap();
    let cfg = config(dir.path());

    {
        let mut t = Tracker::open(user.clone(), JsonFileStore::new(dir.path()), cfg.clone()).unwrap();
        let milk = t.add_item(NewItem::named("Milk")).unwrap();
        t.add_item(NewItem::named("Bread")).unwrap();
        t.confirm_purchase_at(&milk.id, 5.0, "Giant", None, "2024-01-01T08:00:00Z".parse().unwrap())
            .unwrap();
        t.confirm_receipt_at(
            &[
                ScannedItem { name: "milk ".into(), quantity: 1.0, price: 6.0 },
                ScannedItem { name: "Bread".into(), quantity: 2.0, price: 3.0 },
            ],
            "FairPrice",
            "2024-01-10T08:00:00Z".parse().unwrap(),
        )
        .unwrap();
        t.save_list().unwrap();
    }

    let t = Tracker::open(user, JsonFileStore::new(dir.path()), cfg).unwrap();
    assert_eq!(t.list().items()[0].name, "Bread");
    assert_eq!(t.history().len(), 3);

    let view = t.grouped_history();
    let keys: Vec<&str> = view.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys.len(), 2);
    let milk = view.entries.iter().find(|e| e.key.as_str() == "milk").unwrap();
    assert_eq!(milk.count, 2);
    assert_eq!(milk.most_recent.price, 6.0);

    let h = t.item_history("MILK").unwrap();
    assert_eq!(h.display_name, "milk");
    assert_eq!(h.records.len(), 2);
    assert!(h.records[0].date < h.records[1].date);
}

#[test]
fn other_users_have_separate_data() {
    let dir = tempfile::tempdir().unwrap();
    let auth = LocalAuth::in_memory();
    let a = auth.sign_up("a@example.com", "pw").unwrap();
    let b = auth.sign_up("b@example.com", "pw").unwrap();
    assert_ne!(a.id, b.id);

    let cfg = config(dir.path());
    let mut ta = Tracker::open(a, JsonFileStore::new(dir.path()), cfg.clone()).unwrap();
    let item = ta.add_item(NewItem::named("Tofu")).unwrap();
    ta.confirm_purchase(&item.id, 1.8, "Sheng Siong", None).unwrap();

    let tb = Tracker::open(b, JsonFileStore::new(dir.path()), cfg).unwrap();
    assert!(tb.history().is_empty());
    assert!(tb.list().is_empty());
}
