mod common;

use common::{ids, Fixture};
use crmsearch_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use crmsearch_core::{default_registry, Backend, CacheMode, CoreError, HybridQuery};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

fn accounts(fixture: &Fixture) -> HybridQuery {
    HybridQuery::for_entity(&default_registry().unwrap(), "account", fixture.backends()).unwrap()
}

#[test]
fn structural_count_never_touches_the_engine() {
    let fixture = Fixture::seeded().indexed();
    let query = accounts(&fixture)
        .filter([("name__startswith", json!("Acme"))])
        .unwrap();

    assert_eq!(query.backend(), Backend::Relational);
    assert_eq!(query.count().unwrap(), 2);
    assert_eq!(fixture.store.counts.load(Ordering::SeqCst), 1);
    assert!(fixture.engine.searches().is_empty());
}

#[test]
fn full_text_count_never_touches_the_relational_store() {
    let fixture = Fixture::seeded().indexed();
    let query = accounts(&fixture).match_text("name", "acme").unwrap();

    assert_eq!(query.backend(), Backend::SearchEngine);
    assert_eq!(query.count().unwrap(), 2);
    assert_eq!(fixture.engine.searches(), vec![CacheMode::Default]);
    assert_eq!(fixture.store.calls(), 0);
}

#[test]
fn full_text_fetch_hydrates_in_relevance_order() {
    let fixture = Fixture::seeded().indexed();
    let query = accounts(&fixture)
        .match_text("name", "acme trading")
        .unwrap();

    assert_eq!(ids(&query.fetch().unwrap()), vec![3, 2]);
    assert_eq!(fixture.engine.searches(), vec![CacheMode::Default]);
    assert_eq!(fixture.store.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.store.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.store.counts.load(Ordering::SeqCst), 0);
}

#[test]
fn full_text_first_bypasses_the_request_cache() {
    let fixture = Fixture::seeded().indexed();
    let query = accounts(&fixture)
        .match_text("name", "acme trading")
        .unwrap();

    let first = query.first().unwrap().unwrap();
    assert_eq!(ids(&[first]), vec![3]);
    assert!(query.exists().unwrap());
    assert!(!accounts(&fixture)
        .match_text("name", "initech")
        .unwrap()
        .exists()
        .unwrap());
    assert_eq!(
        fixture.engine.searches(),
        vec![CacheMode::Bypass, CacheMode::Bypass, CacheMode::Bypass]
    );
}

#[test]
fn engine_filters_sorting_and_windows_apply_together() {
    let fixture = Fixture::seeded().indexed();
    let query = accounts(&fixture)
        .match_text("name", "acme")
        .unwrap()
        .order_by(&["-id"])
        .unwrap();

    assert_eq!(ids(&query.fetch().unwrap()), vec![3, 2]);
    assert_eq!(ids(&query.slice(1..2).fetch().unwrap()), vec![2]);
    assert_eq!(query.slice(..1).count().unwrap(), 1);
    assert_eq!(ids(&query.get(0).unwrap().into_iter().collect::<Vec<_>>()), vec![3]);

    let assigned = accounts(&fixture)
        .match_text("name", "acme")
        .unwrap()
        .filter([("assigned_to", json!(9))])
        .unwrap();
    assert_eq!(ids(&assigned.fetch().unwrap()), vec![2]);
}

#[test]
fn structural_reads_use_sql_ordering_and_windows() {
    let fixture = Fixture::seeded().indexed();
    let query = accounts(&fixture)
        .filter([("name__startswith", json!("Acme"))])
        .unwrap()
        .order_by(&["-id"])
        .unwrap();

    assert_eq!(ids(&query.fetch().unwrap()), vec![3, 2]);
    assert_eq!(ids(&query.slice(1..).fetch().unwrap()), vec![2]);
    assert_eq!(query.slice(1..).count().unwrap(), 1);
    assert_eq!(ids(&query.first().unwrap().into_iter().collect::<Vec<_>>()), vec![3]);
    assert!(!accounts(&fixture)
        .filter([("id", json!(42))])
        .unwrap()
        .exists()
        .unwrap());
    assert!(fixture.engine.searches().is_empty());
}

#[test]
fn structural_open_tail_returns_every_remaining_row() {
    let fixture = Fixture::seeded();
    fixture
        .store
        .inner
        .with_connection(|conn| {
            conn.execute(
                "INSERT INTO accounts (id, tenant_id, name, created, modified)
                 WITH RECURSIVE seq(n) AS (SELECT 4 UNION ALL SELECT n + 1 FROM seq WHERE n < 10100)
                 SELECT n, 1, 'Filler ' || n, '2018-01-01T00:00:00', '2018-01-01T00:00:00' FROM seq;",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    let query = accounts(&fixture);
    assert_eq!(query.count().unwrap(), 10_100);
    assert_eq!(query.slice(50..).count().unwrap(), 10_050);
    assert_eq!(query.slice(50..).slice(10..).count().unwrap(), 10_040);

    let tail = query.slice(10_090..).fetch().unwrap();
    assert_eq!(ids(&tail), (10_091..=10_100).collect::<Vec<i64>>());
    assert!(fixture.engine.searches().is_empty());
}

#[test]
fn exclude_agrees_across_backends() {
    let fixture = Fixture::seeded().indexed();
    let relational = accounts(&fixture)
        .exclude([("name__regex", json!("Acme.*"))])
        .unwrap();
    assert_eq!(ids(&relational.fetch().unwrap()), vec![1]);

    let engine = accounts(&fixture)
        .match_text("name", "acme globex")
        .unwrap()
        .exclude([("name__regex", json!("Acme.*"))])
        .unwrap();
    assert_eq!(ids(&engine.fetch().unwrap()), vec![1]);
}

#[test]
fn exact_none_agrees_across_backends() {
    let fixture = Fixture::seeded();
    fixture
        .store
        .inner
        .with_connection(|conn| {
            conn.execute("UPDATE accounts SET description = 'Trading' WHERE id = 3;", [])?;
            Ok(())
        })
        .unwrap();
    let fixture = fixture.indexed();

    let relational = accounts(&fixture)
        .filter([("description", Value::Null)])
        .unwrap();
    assert_eq!(ids(&relational.fetch().unwrap()), vec![1, 2]);

    let engine = accounts(&fixture)
        .match_text("name", "acme globex")
        .unwrap()
        .filter([("description", Value::Null)])
        .unwrap()
        .order_by(&["id"])
        .unwrap();
    assert_eq!(ids(&engine.fetch().unwrap()), vec![1, 2]);
}

#[test]
fn stale_hits_are_skipped_during_hydration() {
    let fixture = Fixture::seeded().indexed();
    fixture
        .store
        .inner
        .with_connection(|conn| SqliteAccountRepository::new(conn).delete_account(3))
        .unwrap();

    let query = accounts(&fixture).match_text("name", "acme").unwrap();
    assert_eq!(query.count().unwrap(), 2);
    assert_eq!(ids(&query.fetch().unwrap()), vec![2]);
}

#[test]
fn last_fails_without_contacting_either_backend() {
    let fixture = Fixture::seeded().indexed();
    for query in [
        accounts(&fixture),
        accounts(&fixture).match_text("name", "acme").unwrap(),
    ] {
        assert!(matches!(
            query.last(),
            Err(CoreError::NotSupportedOperation(_))
        ));
    }
    assert_eq!(fixture.store.calls(), 0);
    assert!(fixture.engine.searches().is_empty());
}

#[test]
fn queries_can_be_shared_across_threads() {
    let fixture = Fixture::seeded().indexed();
    let base = accounts(&fixture).match_text("name", "acme").unwrap();

    let handles = (0..4)
        .map(|offset| {
            let query = base.slice(offset..);
            std::thread::spawn(move || query.count().unwrap())
        })
        .collect::<Vec<_>>();
    let counts = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(counts, vec![2, 1, 0, 0]);
}
