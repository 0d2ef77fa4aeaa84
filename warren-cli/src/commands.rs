//! Subcommands of the `warren` binary.
//!
//! Each command runs on the connection's first channel and prints its
//! result to stdout.

use std::time::Duration;

use clap::Subcommand;
use tracing::{info, warn};

use warren_core::{
    BasicProperties, Connection, Connector, PublishOptions, Qos, QueueOptions, Result, Returned,
    SubscribeOptions, SubscriptionEnd,
};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Declare a queue; an empty name lets the broker pick one
    DeclareQueue {
        #[arg(default_value = "")]
        name: String,

        #[arg(long)]
        durable: bool,

        #[arg(long)]
        exclusive: bool,

        #[arg(long)]
        auto_delete: bool,
    },

    /// Publish one message
    Publish {
        routing_key: String,

        /// Message body
        body: String,

        /// Exchange to publish to (default exchange when empty)
        #[arg(short, long, default_value = "")]
        exchange: String,

        /// Ask the broker to return the message if it cannot be routed
        #[arg(long)]
        mandatory: bool,

        #[arg(long)]
        persistent: bool,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Fetch a single message
    Get {
        queue: String,

        /// Acknowledge the message after printing it
        #[arg(long)]
        ack: bool,
    },

    /// Consume messages until a limit or timeout is hit
    Consume {
        queue: String,

        /// Acknowledge each message after printing it
        #[arg(long)]
        ack: bool,

        #[arg(long)]
        exclusive: bool,

        /// Stop after this many seconds without a message
        #[arg(long)]
        timeout: Option<u64>,

        /// Stop after this many messages
        #[arg(long)]
        message_max: Option<u64>,

        /// Unacknowledged messages the broker may have in flight
        #[arg(long)]
        prefetch: Option<u16>,
    },
}

impl Command {
    /// Subscription settings for `consume`; `None` for other commands.
    pub fn subscribe_options(&self) -> Option<SubscribeOptions> {
        match self {
            Command::Consume {
                ack,
                exclusive,
                timeout,
                message_max,
                ..
            } => Some(SubscribeOptions {
                ack: *ack,
                exclusive: *exclusive,
                timeout: timeout.map(Duration::from_secs),
                message_max: *message_max,
                ..Default::default()
            }),
            _ => None,
        }
    }
}

/// Run `command` on an established connection.
pub async fn run<C: Connector>(conn: &mut Connection<C>, command: Command) -> Result<()> {
    let subscribe = command.subscribe_options();
    match command {
        Command::DeclareQueue {
            name,
            durable,
            exclusive,
            auto_delete,
        } => {
            let opts = QueueOptions {
                durable,
                exclusive,
                auto_delete,
                ..Default::default()
            };
            let declared = conn.queue_declare(&name, &opts).await?;
            println!(
                "{} (messages: {}, consumers: {})",
                declared.name, declared.message_count, declared.consumer_count
            );
        }

        Command::Publish {
            routing_key,
            body,
            exchange,
            mandatory,
            persistent,
            content_type,
        } => {
            let mut properties = BasicProperties::default();
            if persistent {
                properties = properties.persistent();
            }
            if let Some(content_type) = content_type {
                properties = properties.with_content_type(content_type);
            }
            let opts = PublishOptions {
                mandatory,
                properties,
                ..Default::default()
            };
            conn.publish(&exchange, &routing_key, body.into_bytes(), &opts)
                .await?;
            if mandatory {
                if let Returned::Message(ret) = conn.returned_message(None).await? {
                    println!("returned: {} {}", ret.reply_code, ret.reply_text);
                    return Ok(());
                }
            }
            println!("published to {exchange:?} with key {routing_key:?}");
        }

        Command::Get { queue, ack } => match conn.get(&queue, ack).await? {
            Some(message) => {
                println!(
                    "[{}] {}",
                    message.delivery_tag,
                    String::from_utf8_lossy(&message.body)
                );
                if ack {
                    conn.ack(message.delivery_tag, false).await?;
                }
                info!(remaining = message.message_count, "message fetched");
            }
            None => println!("{queue} is empty"),
        },

        Command::Consume {
            queue, prefetch, ..
        } => {
            if let Some(prefetch_count) = prefetch {
                conn.qos(Qos {
                    prefetch_count,
                    ..Default::default()
                })
                .await?;
            }
            let opts = subscribe.unwrap_or_default();
            let end = conn
                .subscribe(&queue, opts)
                .start(|delivery| {
                    println!(
                        "[{}] {}",
                        delivery.delivery_tag,
                        String::from_utf8_lossy(&delivery.body)
                    );
                    Ok(())
                })
                .await?;
            match end {
                SubscriptionEnd::Skipped => warn!("message limit is zero; nothing consumed"),
                SubscriptionEnd::TimedOut { messages } => {
                    println!("timed out after {messages} message(s)")
                }
                SubscriptionEnd::LimitReached { messages } => {
                    println!("stopped after {messages} message(s)")
                }
            }
        }
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["warren"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn consume_flags_become_subscribe_options() {
        let cmd = parse(&[
            "consume",
            "jobs",
            "--ack",
            "--timeout",
            "3",
            "--message-max",
            "10",
            "--prefetch",
            "5",
        ]);
        let opts = cmd.subscribe_options().unwrap();
        assert!(opts.ack);
        assert!(!opts.exclusive);
        assert_eq!(opts.timeout, Some(Duration::from_secs(3)));
        assert_eq!(opts.message_max, Some(10));
        assert!(opts.consumer_tag.is_none());
    }

    #[test]
    fn declare_queue_name_is_optional() {
        assert_eq!(
            parse(&["declare-queue", "--durable"]),
            Command::DeclareQueue {
                name: String::new(),
                durable: true,
                exclusive: false,
                auto_delete: false,
            }
        );
    }

    #[test]
    fn publish_takes_key_and_body() {
        let cmd = parse(&["publish", "jobs", "hello", "-e", "events", "--mandatory"]);
        match cmd {
            Command::Publish {
                routing_key,
                body,
                exchange,
                mandatory,
                ..
            } => {
                assert_eq!(routing_key, "jobs");
                assert_eq!(body, "hello");
                assert_eq!(exchange, "events");
                assert!(mandatory);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(parse(&["get", "jobs"]).subscribe_options().is_none());
    }
}
