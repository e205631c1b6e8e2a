pub mod mock;

use std::future::Future;

use xrepo::{Connection, Entity, Repository};

/// Run `f` against a fresh in-memory database with the table of `E` created
pub async fn run_test<E, Fn, Fut>(f: Fn)
where
    E: Entity,
    Fn: FnOnce(Repository<E>) -> Fut,
    Fut: Future<Output = ()>,
{
    env_logger::try_init().ok();

    let conn = Connection::connect("sqlite://memory").await.unwrap();
    let repo = Repository::<E>::new(conn);

    repo.init().await.unwrap();

    f(repo).await;
}
