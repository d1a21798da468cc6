use super::*;
use pricewatch_bot::{price_fetcher::PriceFetcher, AppError};
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_uses_fallback_selector() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("19.99")))
        .mount(&server)
        .await;

    let price = create_test_fetcher()?
        .fetch(&format!("{}/item", server.uri()))
        .await?;

    assert_eq!(price, 19.99);
    Ok(())
}

#[tokio::test]
async fn test_fetch_rejects_non_200_status() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(product_page("1.00")))
        .mount(&server)
        .await;

    let result = create_test_fetcher()?
        .fetch(&format!("{}/missing", server.uri()))
        .await;

    assert!(matches!(
        result,
        Err(AppError::UnexpectedStatus {
            expected: 200,
            actual: 404
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_fetch_treats_other_success_codes_as_errors() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(203).set_body_string(product_page("1.00")))
        .mount(&server)
        .await;

    let result = create_test_fetcher()?.fetch(&server.uri()).await;

    assert!(matches!(result, Err(AppError::UnexpectedStatus { actual: 203, .. })));
    Ok(())
}

#[tokio::test]
async fn test_fetch_without_price_element() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Sold out</body></html>"))
        .mount(&server)
        .await;

    let url = format!("{}/sold-out", server.uri());
    let result = create_test_fetcher()?.fetch(&url).await;

    assert!(matches!(result, Err(AppError::PriceNotFound { url: ref u }) if *u == url));
    Ok(())
}

#[tokio::test]
async fn test_fetch_times_out() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("5.00"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    // fetch_timeout is 2 seconds in the test config
    let result = create_test_fetcher()?.fetch(&server.uri()).await;

    match result {
        Err(AppError::Network(e)) => assert!(e.is_timeout()),
        other => panic!("expected a timeout, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_cookies_do_not_leak_between_fetches() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc; Path=/")
                .set_body_string(product_page("3.00")),
        )
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher()?;
    fetcher.fetch(&server.uri()).await?;
    fetcher.fetch(&server.uri()).await?;

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert!(request
            .headers
            .keys()
            .all(|name| !name.as_str().eq_ignore_ascii_case("cookie")));
    }
    Ok(())
}
