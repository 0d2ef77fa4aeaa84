//! Integration tests: the consumer loop.

mod common;

use std::time::Duration;

use common::{Broker, config, connected};
use warren_core::{FieldValue, MethodKind, SubscribeOptions, SubscriptionEnd};

const TAG: &str = "amq.ctag-1";

/// Answer Basic.Consume with `TAG`; returns the consume method's `no_ack`.
async fn accept_consume(broker: &mut Broker) -> bool {
    let (channel, consume) = broker.expect(MethodKind::BasicConsume).await;
    assert_eq!(channel, 1);
    assert_eq!(consume.short_str("queue").unwrap(), "jobs");
    broker
        .send(
            1,
            MethodKind::BasicConsumeOk,
            [("consumer_tag", FieldValue::from(TAG))],
        )
        .await;
    consume.bool("no_ack").unwrap()
}

async fn accept_cancel(broker: &mut Broker) {
    let (_, cancel) = broker.expect(MethodKind::BasicCancel).await;
    assert_eq!(cancel.short_str("consumer_tag").unwrap(), TAG);
    broker
        .send(
            1,
            MethodKind::BasicCancelOk,
            [("consumer_tag", FieldValue::from(TAG))],
        )
        .await;
}

async fn expect_ack(broker: &mut Broker, delivery_tag: u64) {
    let (_, ack) = broker.expect(MethodKind::BasicAck).await;
    assert_eq!(ack.u64("delivery_tag").unwrap(), delivery_tag);
    assert!(!ack.bool("multiple").unwrap());
}

#[tokio::test]
async fn test_message_limit_cancels_before_last_ack() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;
    let mut seen = Vec::new();

    let opts = SubscribeOptions {
        ack: true,
        message_max: Some(3),
        ..Default::default()
    };
    let mut sub = conn.subscribe("jobs", opts);
    let (end, ()) = tokio::join!(
        sub.start(|delivery| {
            seen.push(delivery.delivery_tag);
            Ok(())
        }),
        async {
            assert!(!accept_consume(&mut broker).await);
            for tag in 1..=4 {
                broker.deliver(1, TAG, tag, b"payload").await;
            }
            expect_ack(&mut broker, 1).await;
            expect_ack(&mut broker, 2).await;
            accept_cancel(&mut broker).await;
            expect_ack(&mut broker, 3).await;
        }
    );

    assert_eq!(end.unwrap(), SubscriptionEnd::LimitReached { messages: 3 });
    assert_eq!(sub.message_count(), 3);
    assert_eq!(sub.delivery_tag(), Some(3));
    assert_eq!(sub.consumer_tag(), Some(TAG));
    drop(sub);
    assert_eq!(seen, vec![1, 2, 3]);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn test_zero_message_max_never_subscribes() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;

    let opts = SubscribeOptions {
        message_max: Some(0),
        ..Default::default()
    };
    let end = conn
        .subscribe("jobs", opts)
        .start(|_| panic!("handler must not run"))
        .await
        .unwrap();
    assert_eq!(end, SubscriptionEnd::Skipped);

    // the next thing the broker hears is the shutdown, not a Consume
    let (closed, ()) = tokio::join!(conn.close(), broker.accept_close(&[1]));
    closed.unwrap();
}

#[tokio::test]
async fn test_body_is_rebuilt_from_frames() {
    let (mut conn, mut broker) = connected(config(), (0, 4096, 0)).await;
    assert_eq!(conn.tuning().frame_max, 4096);
    let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut received = Vec::new();

    let opts = SubscribeOptions {
        message_max: Some(1),
        ..Default::default()
    };
    let mut sub = conn.subscribe("jobs", opts);
    let (end, ()) = tokio::join!(
        sub.start(|delivery| {
            received.extend_from_slice(&delivery.body);
            Ok(())
        }),
        async {
            assert!(accept_consume(&mut broker).await);
            broker
                .send(
                    1,
                    MethodKind::BasicDeliver,
                    [
                        ("consumer_tag", FieldValue::from(TAG)),
                        ("delivery_tag", FieldValue::from(1u64)),
                    ],
                )
                .await;
            broker.send_content(1, &body, 4096).await;
            accept_cancel(&mut broker).await;
        }
    );

    assert_eq!(end.unwrap(), SubscriptionEnd::LimitReached { messages: 1 });
    drop(sub);
    assert_eq!(received, body);
}

#[tokio::test]
async fn test_idle_subscription_times_out() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;

    let opts = SubscribeOptions {
        timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let mut sub = conn.subscribe("jobs", opts);
    let (end, ()) = tokio::join!(sub.start(|_| Ok(())), async {
        accept_consume(&mut broker).await;
        broker.deliver(1, TAG, 1, b"only one").await;
        accept_cancel(&mut broker).await;
    });

    assert_eq!(end.unwrap(), SubscriptionEnd::TimedOut { messages: 1 });
    assert_eq!(sub.delivery_tag(), None);
}

#[tokio::test]
async fn test_handler_error_goes_to_hook_and_loop_continues() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;
    let mut failures = Vec::new();
    let mut handled = 0;

    {
        let opts = SubscribeOptions {
            ack: true,
            message_max: Some(2),
            consumer_tag: Some(TAG.to_string()),
            ..Default::default()
        };
        let mut sub = conn
            .subscribe("jobs", opts)
            .on_error(|queue, delivery, err| {
                failures.push((queue.to_string(), delivery.delivery_tag, err.to_string()));
            });
        let (end, ()) = tokio::join!(
            sub.start(|delivery| {
                handled += 1;
                if delivery.delivery_tag == 1 {
                    return Err("bad payload".into());
                }
                Ok(())
            }),
            async {
                let (_, consume) = broker.expect(MethodKind::BasicConsume).await;
                assert_eq!(consume.short_str("consumer_tag").unwrap(), TAG);
                broker
                    .send(
                        1,
                        MethodKind::BasicConsumeOk,
                        [("consumer_tag", FieldValue::from(TAG))],
                    )
                    .await;
                broker.deliver(1, TAG, 1, b"first").await;
                broker.deliver(1, TAG, 2, b"second").await;
                expect_ack(&mut broker, 1).await;
                accept_cancel(&mut broker).await;
                expect_ack(&mut broker, 2).await;
            }
        );
        assert_eq!(end.unwrap(), SubscriptionEnd::LimitReached { messages: 2 });
    }

    assert_eq!(handled, 2);
    assert_eq!(
        failures,
        vec![("jobs".to_string(), 1, "bad payload".to_string())]
    );
}

#[tokio::test]
async fn test_unexpected_method_ends_subscription() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;

    let mut sub = conn.subscribe("jobs", SubscribeOptions::default());
    let (end, ()) = tokio::join!(sub.start(|_| Ok(())), async {
        accept_consume(&mut broker).await;
        broker.send(1, MethodKind::BasicQosOk, []).await;
    });

    assert!(matches!(end, Err(warren_core::AmqpError::Protocol(_))));
}
