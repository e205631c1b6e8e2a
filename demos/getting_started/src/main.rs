use xrepo::{filter, Connection, Entity, Repository};

#[derive(Debug, Clone, PartialEq, Eq, Entity)]
#[xrepo(table_name = "user")]
struct User {
    #[xrepo(primary_key, auto_increment)]
    pub id: u32,
    #[xrepo(length = 255)]
    pub name: String,
    #[xrepo(length = 255, unique)]
    pub email: String,
    #[xrepo(length = 255)]
    pub password: String,
}

fn new_user(name: &str, email: &str, password: &str) -> User {
    User {
        id: 0,
        name: name.into(),
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // `XREPO_URL=sqlite://demo.db` keeps the data around
    let url = std::env::var("XREPO_URL").unwrap_or_else(|_| "sqlite://memory".into());
    let conn = Connection::connect(&url).await?;

    let user_repo = Repository::<User>::new(conn);
    user_repo.init().await?;

    // Create
    let mut user = new_user("John Doe", "john@example.com", "securepassword");
    user_repo.create(&mut user).await?;
    println!("New user: {:?}", user);

    // Find by id
    let mut found = user_repo
        .find_by_id(user.id)
        .await?
        .ok_or("user just created is missing")?;
    println!("Found user: {:?}", found);

    // Update
    found.name = "John Updated".into();
    user_repo.update(&mut found).await?;
    println!("Updated user: {:?}", found);

    // Batch insert
    let mut guests = (1..=5)
        .map(|i| new_user(&format!("Guest {}", i), &format!("guest{}@example.com", i), "guest"))
        .collect::<Vec<_>>();
    user_repo.create_batch(&mut guests, Some(2)).await?;
    println!("Inserted {} guests", guests.len());

    // Conditional query
    let users = user_repo
        .find_by_condition(filter!("name LIKE ?", "%John%"))
        .await?;
    println!("Users with name containing 'John':");
    for u in &users {
        println!("  {:?}", u);
    }

    let guest_count = user_repo
        .count_by_condition(filter!("password = ?", "guest"))
        .await?;
    println!("Guest count: {}", guest_count);

    // Transaction
    user_repo
        .transaction(|tx_repo| async move {
            let mut tx_user = new_user("Transaction User", "transaction@example.com", "password");
            tx_repo.create(&mut tx_user).await?;
            println!("Tx new user: {:?}", tx_user);

            found.name = "Updated in transaction".into();
            tx_repo.update(&mut found).await?;

            Ok::<_, xrepo::error::Error>(())
        })
        .await?;

    println!("All users:");
    for u in user_repo.find_all().await? {
        println!("  {:?}", u);
    }

    println!("xrepo {}", xrepo::version());

    Ok(())
}
