use std::{future::Future, sync::Arc};

use xrepo::{error::Error, filter, Connection, Entity, Repository};
use xrepo_test::{mock::RecordingDriver, run_test};

#[derive(Debug, Clone, PartialEq, Eq, Entity)]
#[xrepo(table_name = "user")]
struct User {
    #[xrepo(primary_key, auto_increment)]
    pub id: u32,
    #[xrepo(length = 20, default = "NONAME", unique)]
    pub name: String,
}

fn user(name: &str) -> User {
    User {
        id: 0,
        name: name.into(),
    }
}

fn names(mut users: Vec<User>) -> Vec<String> {
    users.sort_by_key(|u| u.id);
    users.into_iter().map(|u| u.name).collect()
}

#[derive(Debug)]
enum AppError {
    Db(Error),
    Rejected(String),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::Db(e)
    }
}

#[tokio::test]
async fn test_commit() {
    run_test(|repo: Repository<User>| async move {
        let id = repo
            .transaction(|tx_repo| async move {
                let mut bob = user("bob");
                let mut alice = user("alice");
                tx_repo.create(&mut bob).await?;
                tx_repo.create(&mut alice).await?;
                tx_repo.delete(bob.id).await?;

                alice.name = "frank".into();
                tx_repo.update(&mut alice).await?;

                Ok::<_, Error>(alice.id)
            })
            .await
            .unwrap();

        assert_eq!(
            repo.find_all().await.unwrap(),
            vec![User {
                id,
                name: "frank".into(),
            }]
        );
    })
    .await;
}

#[tokio::test]
async fn test_rollback_on_error() {
    run_test(|repo: Repository<User>| async move {
        repo.create(&mut user("existing")).await.unwrap();

        let res = repo
            .transaction(|tx_repo| async move {
                tx_repo.create(&mut user("bob")).await?;
                // Unique violation
                tx_repo.create(&mut user("existing")).await?;

                Ok::<_, Error>(())
            })
            .await;

        assert!(matches!(res, Err(Error::Database(_))));
        assert_eq!(names(repo.find_all().await.unwrap()), vec!["existing"]);
    })
    .await;
}

#[tokio::test]
async fn test_custom_error() {
    run_test(|repo: Repository<User>| async move {
        let res = repo
            .transaction(|tx_repo| async move {
                let mut bob = user("bob");
                tx_repo.create(&mut bob).await?;

                if tx_repo.find_by_id(bob.id).await?.is_some() {
                    return Err(AppError::Rejected("bob is not welcome".into()));
                }

                Ok::<_, AppError>(())
            })
            .await;

        assert!(matches!(res, Err(AppError::Rejected(msg)) if msg == "bob is not welcome"));
        assert!(repo.find_all().await.unwrap().is_empty());

        // Session errors convert into the caller's error type
        let res = repo
            .transaction(|tx_repo| async move {
                tx_repo.create(&mut user("alice")).await?;
                tx_repo.create(&mut user("alice")).await?;

                Ok::<_, AppError>(())
            })
            .await;

        assert!(matches!(res, Err(AppError::Db(Error::Database(_)))));
        assert!(repo.find_all().await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_nested_rollback() {
    run_test(|repo: Repository<User>| async move {
        repo.transaction(|tx_repo| async move {
            tx_repo.create(&mut user("bob")).await?;

            let inner = tx_repo
                .transaction(|inner_repo| async move {
                    inner_repo.create(&mut user("alice")).await?;
                    Err::<(), _>(AppError::Rejected("inner".into()))
                })
                .await;
            assert!(matches!(inner, Err(AppError::Rejected(_))));

            // Outer scope still usable after the inner rollback
            tx_repo.create(&mut user("frank")).await?;

            Ok::<_, AppError>(())
        })
        .await
        .unwrap();

        assert_eq!(names(repo.find_all().await.unwrap()), vec!["bob", "frank"]);
    })
    .await;
}

#[tokio::test]
async fn test_nested_commit() {
    run_test(|repo: Repository<User>| async move {
        repo.transaction(|tx_repo| async move {
            tx_repo
                .transaction(|inner_repo| async move {
                    inner_repo.create(&mut user("alice")).await?;
                    Ok::<_, Error>(())
                })
                .await?;

            tx_repo.create(&mut user("bob")).await?;

            Ok::<_, Error>(())
        })
        .await
        .unwrap();

        assert_eq!(names(repo.find_all().await.unwrap()), vec!["alice", "bob"]);
    })
    .await;
}

#[tokio::test]
async fn test_finished_transaction() {
    run_test(|repo: Repository<User>| async move {
        let leaked = repo
            .transaction(|tx_repo| async move { Ok::<_, Error>(tx_repo) })
            .await
            .unwrap();

        assert!(matches!(
            leaked.create(&mut user("bob")).await,
            Err(Error::Connection(_))
        ));
        assert!(matches!(leaked.find_all().await, Err(Error::Connection(_))));

        // Parent session is free again
        repo.create(&mut user("alice")).await.unwrap();
        assert_eq!(names(repo.find_all().await.unwrap()), vec!["alice"]);
    })
    .await;
}

/// Poll `fut` a few times, then drop it unless it already finished
async fn poll_then_drop<F: Future>(fut: F, rounds: usize) {
    tokio::pin!(fut);

    for _ in 0..rounds {
        tokio::select! {
            biased;
            _ = &mut fut => return,
            _ = tokio::task::yield_now() => {}
        }
    }
}

#[tokio::test]
async fn test_cancelled_transaction_rolls_back() {
    run_test(|repo: Repository<User>| async move {
        for rounds in 1..=30 {
            let tx_fut = repo.transaction(|tx_repo| async move {
                let mut list = (0..10)
                    .map(|i| user(&format!("user {}", i)))
                    .collect::<Vec<_>>();
                tx_repo.create_batch(&mut list, None).await?;

                Err::<(), _>(AppError::Rejected("never commits".into()))
            });
            // Early rounds drop it during BEGIN, later ones during the insert
            poll_then_drop(tx_fut, rounds).await;

            // Waits until the dropped scope is rolled back
            assert_eq!(
                repo.count_by_condition(filter!("1 = 1")).await.unwrap(),
                0,
                "dropped after {} rounds",
                rounds
            );

            repo.transaction(|tx_repo| async move {
                let mut bob = user("bob");
                tx_repo.create(&mut bob).await?;
                tx_repo.delete(bob.id).await?;

                Ok::<_, Error>(())
            })
            .await
            .unwrap();
        }
    })
    .await;
}

#[tokio::test]
async fn test_cancelled_nested_transaction() {
    run_test(|repo: Repository<User>| async move {
        repo.transaction(|tx_repo| async move {
            tx_repo.create(&mut user("bob")).await?;

            for rounds in 1..10 {
                let inner = tx_repo.transaction(|inner_repo| async move {
                    inner_repo.create(&mut user("alice")).await?;
                    Err::<(), _>(AppError::Rejected("never commits".into()))
                });
                poll_then_drop(inner, rounds).await;
            }

            tx_repo.create(&mut user("frank")).await?;

            Ok::<_, AppError>(())
        })
        .await
        .unwrap();

        assert_eq!(names(repo.find_all().await.unwrap()), vec!["bob", "frank"]);
    })
    .await;
}

#[tokio::test]
async fn test_session_events() {
    let driver = RecordingDriver::new();
    let repo = Repository::<User>::new(Connection::new(Arc::new(driver.clone())));

    repo.transaction(|tx_repo| async move {
        tx_repo.create(&mut user("bob")).await?;
        Ok::<_, Error>(())
    })
    .await
    .unwrap();
    assert_eq!(driver.events(), vec!["begin", "commit"]);
    assert_eq!(driver.rows_per_call(), vec![1]);

    let driver = RecordingDriver::new();
    let repo = Repository::<User>::new(Connection::new(Arc::new(driver.clone())));

    let res = repo
        .transaction(|_| async move { Err::<(), _>(AppError::Rejected("no".into())) })
        .await;
    assert!(res.is_err());
    assert_eq!(driver.events(), vec!["begin", "rollback"]);
    assert!(driver.executes().is_empty());
}
