use std::sync::Arc;

use proptest::prelude::*;
use xrepo::{error::Error, filter, Connection, Entity, Repository, Value};
use xrepo_test::{mock::RecordingDriver, run_test};

#[derive(Debug, Clone, PartialEq, Eq, Entity)]
#[xrepo(table_name = "item")]
struct Item {
    #[xrepo(primary_key, auto_increment)]
    pub id: u64,
    pub seq: u32,
    #[xrepo(length = 64, unique)]
    pub code: String,
}

fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| Item {
            id: 0,
            seq: i as u32,
            code: format!("code-{}", i),
        })
        .collect()
}

fn mock_repo(driver: &RecordingDriver) -> Repository<Item> {
    Repository::new(Connection::new(Arc::new(driver.clone())))
}

/// `seq` of every submitted row, in submission order
fn submitted_seqs(driver: &RecordingDriver) -> Vec<u32> {
    driver
        .executes()
        .into_iter()
        .flat_map(|pairs| pairs.into_iter())
        .flat_map(|(_, params_list)| params_list.into_iter())
        .map(|params| match &params[0] {
            Value::U32(seq) => *seq,
            v => panic!("Unexpected seq value {:?}", v),
        })
        .collect()
}

#[tokio::test]
async fn test_explicit_batch_size() {
    let driver = RecordingDriver::new();
    let repo = mock_repo(&driver);
    let mut list = items(2500);

    repo.create_batch(&mut list, Some(250)).await.unwrap();

    assert_eq!(driver.rows_per_call(), vec![250; 10]);
    assert_eq!(submitted_seqs(&driver), (0..2500).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_out_of_range_batch_size() {
    for batch_size in [None, Some(0), Some(1001), Some(5000)] {
        let driver = RecordingDriver::new();
        let repo = mock_repo(&driver);
        let mut list = items(2500);

        repo.create_batch(&mut list, batch_size).await.unwrap();

        assert_eq!(
            driver.rows_per_call(),
            vec![1000, 1000, 500],
            "batch size {:?}",
            batch_size
        );
    }
}

#[tokio::test]
async fn test_boundary_batch_sizes() {
    let driver = RecordingDriver::new();
    let repo = mock_repo(&driver);
    repo.create_batch(&mut items(3), Some(1)).await.unwrap();
    assert_eq!(driver.rows_per_call(), vec![1, 1, 1]);

    let driver = RecordingDriver::new();
    let repo = mock_repo(&driver);
    repo.create_batch(&mut items(1000), Some(1000)).await.unwrap();
    assert_eq!(driver.rows_per_call(), vec![1000]);
}

#[tokio::test]
async fn test_one_statement_per_chunk() {
    let driver = RecordingDriver::new();
    let repo = mock_repo(&driver);

    repo.create_batch(&mut items(5), Some(2)).await.unwrap();

    for pairs in driver.executes() {
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "INSERT INTO item (seq, code) VALUES (?, ?)");
    }
}

#[tokio::test]
async fn test_ids_written_back() {
    let driver = RecordingDriver::new();
    let repo = mock_repo(&driver);
    let mut list = items(7);

    repo.create_batch(&mut list, Some(3)).await.unwrap();

    assert_eq!(
        list.iter().map(|item| item.id).collect::<Vec<_>>(),
        (1..=7).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_stops_on_first_failure() {
    let driver = RecordingDriver::failing_on(3);
    let repo = mock_repo(&driver);
    let mut list = items(2500);

    let err = repo.create_batch(&mut list, Some(250)).await.unwrap_err();

    assert!(matches!(&err, Error::Database(msg) if *msg == RecordingDriver::failure_message(3)));
    assert_eq!(driver.executes().len(), 3);
    // Earlier chunks got their ids, the failed one and later ones did not
    assert!(list[..500].iter().all(|item| item.id != 0));
    assert!(list[500..].iter().all(|item| item.id == 0));
}

#[tokio::test]
async fn test_empty_input() {
    let driver = RecordingDriver::new();
    let repo = mock_repo(&driver);

    repo.create_batch(&mut items(0), Some(10)).await.unwrap();
    repo.create_batch(&mut items(0), None).await.unwrap();

    assert!(driver.executes().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_chunking(n in 0usize..2500, batch_size in 1usize..=1000) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let driver = RecordingDriver::new();
        let repo = mock_repo(&driver);
        let mut list = items(n);

        runtime
            .block_on(repo.create_batch(&mut list, Some(batch_size)))
            .unwrap();

        let sizes = driver.rows_per_call();
        prop_assert_eq!(sizes.len(), (n + batch_size - 1) / batch_size);
        if let Some((last, full)) = sizes.split_last() {
            prop_assert!(full.iter().all(|size| *size == batch_size));
            prop_assert!(*last >= 1 && *last <= batch_size);
        }
        prop_assert_eq!(sizes.iter().sum::<usize>(), n);
        prop_assert_eq!(submitted_seqs(&driver), (0..n as u32).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_sqlite_batch() {
    run_test(|repo: Repository<Item>| async move {
        let mut list = items(2500);

        repo.create_batch(&mut list, Some(250)).await.unwrap();

        assert_eq!(repo.count_by_condition(filter!("1 = 1")).await.unwrap(), 2500);
        assert_eq!(
            list.iter().map(|item| item.id).collect::<Vec<_>>(),
            (1..=2500).collect::<Vec<_>>()
        );

        let found = repo.find_by_id(list[1234].id).await.unwrap();
        assert_eq!(found.as_ref(), Some(&list[1234]));
    })
    .await;
}

#[tokio::test]
async fn test_sqlite_failure_keeps_earlier_chunks() {
    run_test(|repo: Repository<Item>| async move {
        let mut list = items(750);
        // Duplicate code inside the second chunk
        list[300].code = list[260].code.clone();

        let res = repo.create_batch(&mut list, Some(250)).await;

        assert!(matches!(res, Err(Error::Database(_))));
        // First chunk stays, second is rolled back as a whole, third never ran
        assert_eq!(repo.count_by_condition(filter!("1 = 1")).await.unwrap(), 250);
        assert_eq!(
            repo.count_by_condition(filter!("seq >= ?", 250u32))
                .await
                .unwrap(),
            0
        );
    })
    .await;
}
