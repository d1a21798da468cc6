use super::*;
use pricewatch_bot::bot::{Command, CommandService};
use pricewatch_bot::database::ItemStore;
use pricewatch_bot::messages;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> anyhow::Result<(MockServer, Arc<SqliteItemStore>, CommandService)> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("250,00")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/product/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("99.90")))
        .mount(&server)
        .await;

    let store = create_test_store().await?;
    let service = CommandService::new(
        store.clone(),
        create_test_fetcher()?,
        "Price Watch Test",
        vec![format!("{}/product/", server.uri())],
    );
    Ok((server, store, service))
}

#[tokio::test]
async fn test_add_list_remove_workflow() -> anyhow::Result<()> {
    let (server, store, service) = setup().await?;
    let first = format!("{}/product/1", server.uri());
    let second = format!("{}/product/2", server.uri());

    println!("Adding items...");
    let reply = service.handle(9, Command::Add(Some(first.clone()))).await;
    assert_eq!(reply, messages::ADDED_SUCCESSFULLY);
    let reply = service.handle(9, Command::Add(Some(second.clone()))).await;
    assert_eq!(reply, messages::ADDED_SUCCESSFULLY);

    let items = store.get_for_user(9).await?;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].last_known_price, 250.0);
    assert_eq!(items[1].last_known_price, 99.9);

    println!("Listing items...");
    let list = service.handle(9, Command::List).await;
    assert!(list.starts_with(messages::LIST_HEADER));
    assert!(list.contains(&format!("1. {}", first.trim_start_matches("http://"))));
    assert!(list.contains(&format!("2. {}", second.trim_start_matches("http://"))));

    println!("Removing item 1...");
    let reply = service.handle(9, Command::Remove(Some("1".to_string()))).await;
    assert_eq!(reply, messages::REMOVED);

    let items = store.get_for_user(9).await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item_url, second);

    println!("✓ Add/list/remove workflow completed");
    Ok(())
}

#[tokio::test]
async fn test_add_rejects_bad_links() -> anyhow::Result<()> {
    let (server, store, service) = setup().await?;

    for url in [
        None,
        Some("not a link".to_string()),
        Some("ftp://example.com/product/1".to_string()),
        Some("https://elsewhere.example/product/1".to_string()),
        Some(format!("{}/product/404", server.uri())),
    ] {
        let reply = service.handle(1, Command::Add(url)).await;
        assert_eq!(reply, messages::NEED_CORRECT_LINK);
    }

    assert!(store.get_for_user(1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_add_twice_reports_already_tracked() -> anyhow::Result<()> {
    let (server, store, service) = setup().await?;
    let url = format!("{}/product/1", server.uri());

    service.handle(1, Command::Add(Some(url.clone()))).await;
    let reply = service.handle(1, Command::Add(Some(url))).await;

    assert_eq!(reply, messages::ALREADY_TRACKED);
    assert_eq!(store.get_for_user(1).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_adds_store_one_row() -> anyhow::Result<()> {
    let (server, store, service) = setup().await?;
    let url = format!("{}/product/2", server.uri());

    let replies = futures::future::join_all(
        (0..5).map(|_| service.handle(4, Command::Add(Some(url.clone())))),
    )
    .await;

    let added = replies
        .iter()
        .filter(|reply| reply.as_str() == messages::ADDED_SUCCESSFULLY)
        .count();
    assert_eq!(added, 1);
    assert!(replies
        .iter()
        .all(|reply| reply == messages::ADDED_SUCCESSFULLY || reply == messages::ALREADY_TRACKED));
    assert_eq!(store.get_for_user(4).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_list_is_per_user() -> anyhow::Result<()> {
    let (server, _store, service) = setup().await?;

    service
        .handle(1, Command::Add(Some(format!("{}/product/1", server.uri()))))
        .await;

    assert_eq!(service.handle(2, Command::List).await, messages::EMPTY_LIST);
    Ok(())
}

#[tokio::test]
async fn test_remove_rejects_out_of_range() -> anyhow::Result<()> {
    let (server, store, service) = setup().await?;
    service
        .handle(1, Command::Add(Some(format!("{}/product/1", server.uri()))))
        .await;

    for arg in [None, Some("0"), Some("2"), Some("-1"), Some("one")] {
        let reply = service.handle(1, Command::Remove(arg.map(str::to_string))).await;
        assert_eq!(reply, messages::REMOVE_ERROR);
    }

    assert_eq!(store.get_for_user(1).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_help_mentions_bot_name() -> anyhow::Result<()> {
    let (_server, _store, service) = setup().await?;

    let help = service.handle(1, Command::Start).await;
    assert!(help.contains("Price Watch Test"));
    assert_eq!(help, service.handle(1, Command::Help).await);
    Ok(())
}
