use super::*;
use repack_watcher::dispatcher::DeliveredDrop;
use repack_watcher::models::NotificationEvent;
use repack_watcher::plugins::TelegramChannel;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_PATH: &str = "/botTEST:TOKEN/sendMessage";

fn sent(message_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": { "message_id": message_id }
    }))
}

#[tokio::test]
async fn test_dispatch_through_telegram_api() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    // Recipient 1 is throttled once, then accepted
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({ "chat_id": 1 })))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 0",
            "parameters": { "retry_after": 0 }
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({ "chat_id": 1, "parse_mode": "HTML" })))
        .respond_with(sent(10))
        .expect(1)
        .mount(&server)
        .await;

    // Recipient 2 blocked the bot: never retried
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({ "chat_id": 2 })))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = TelegramChannel::with_client(reqwest::Client::new(), &server.uri(), "TEST:TOKEN");
    let dispatcher = Dispatcher::new(
        Arc::new(channel),
        MessageFormatter::default(),
        DispatchSettings {
            batch_size: 10,
            batch_delay: Duration::ZERO,
            max_concurrent: 5,
            retry: RetryPolicy::new(3, Duration::ZERO),
        },
    );

    let events = vec![
        NotificationEvent::price_drop(&tracked_item(1, 1, "B08N5WRWNW", "59.90", None), dec("53.00"), dec("6.90")),
        NotificationEvent::price_drop(&tracked_item(2, 2, "B07XJ8C8F5", "30.00", None), dec("25.00"), dec("5.00")),
    ];
    let report = dispatcher.dispatch(&events).await;

    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.delivered_drops,
        vec![DeliveredDrop {
            tracking_id: 1,
            price: dec("53.00"),
            savings: dec("6.90"),
        }]
    );

    Ok(())
}
