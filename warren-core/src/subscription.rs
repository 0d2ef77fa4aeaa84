//! Consumer loop.
//!
//! A [`Subscription`] borrows the connection for as long as it runs. It
//! sends Basic.Consume, then reads one delivery at a time on the active
//! channel, rebuilds the body from its content frames and hands the
//! message to the caller's handler.
//!
//! Acknowledgement happens after the handler and after the message-limit
//! check. Acking first would let the broker release more prefetched
//! messages before the cancel takes effect.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::codec::value::FieldValue;
use crate::error::{AmqpError, Result};
use crate::message::Delivery;
use crate::network::connection::Connection;
use crate::network::connector::Connector;
use crate::protocol::method::MethodKind;

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type ErrorHook<'a> = Box<dyn FnMut(&str, &Delivery, &HandlerError) + Send + 'a>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Client-chosen tag; the broker assigns one when `None`.
    pub consumer_tag: Option<String>,
    /// Acknowledge each message after it has been handled.
    pub ack: bool,
    /// Ask for exclusive access to the queue.
    pub exclusive: bool,
    /// Stop when no message arrives within this window.
    pub timeout: Option<Duration>,
    /// Stop after this many messages. `Some(0)` never contacts the broker.
    pub message_max: Option<u64>,
    /// Ignored: the client always waits for Consume-Ok.
    pub nowait: bool,
}

/// Why [`Subscription::start`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEnd {
    /// `message_max` was zero.
    Skipped,
    /// No delivery arrived within the timeout.
    TimedOut { messages: u64 },
    /// `message_max` messages were handled.
    LimitReached { messages: u64 },
}

pub struct Subscription<'a, C: Connector> {
    conn: &'a mut Connection<C>,
    queue: String,
    opts: SubscribeOptions,
    consumer_tag: Option<String>,
    delivery_tag: Option<u64>,
    message_count: u64,
    on_error: ErrorHook<'a>,
}

impl<'a, C: Connector> Subscription<'a, C> {
    pub(crate) fn new(conn: &'a mut Connection<C>, queue: &str, opts: SubscribeOptions) -> Self {
        Self {
            conn,
            queue: queue.to_string(),
            consumer_tag: opts.consumer_tag.clone(),
            opts,
            delivery_tag: None,
            message_count: 0,
            on_error: Box::new(|queue: &str, delivery: &Delivery, err: &HandlerError| {
                error!(
                    queue,
                    delivery_tag = delivery.delivery_tag,
                    error = %err,
                    "message handler failed"
                );
            }),
        }
    }

    /// Replace what happens when the handler returns an error.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str, &Delivery, &HandlerError) + Send + 'a,
    {
        self.on_error = Box::new(hook);
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Tag confirmed by Consume-Ok, or the requested one before that.
    pub fn consumer_tag(&self) -> Option<&str> {
        self.consumer_tag.as_deref()
    }

    /// Delivery tag of the last message received in ack mode.
    pub fn delivery_tag(&self) -> Option<u64> {
        self.delivery_tag
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Consume until the timeout or message limit ends the loop.
    pub async fn start<F>(&mut self, mut handler: F) -> Result<SubscriptionEnd>
    where
        F: FnMut(&Delivery) -> std::result::Result<(), HandlerError>,
    {
        if self.opts.message_max == Some(0) {
            return Ok(SubscriptionEnd::Skipped);
        }
        self.setup_consumer().await?;

        loop {
            let method = match self.conn.next_method(self.opts.timeout).await {
                Ok(method) => method,
                Err(e) if e.is_timeout() => {
                    debug!(queue = %self.queue, messages = self.message_count, "subscription timed out");
                    self.unsubscribe_best_effort().await?;
                    return Ok(SubscriptionEnd::TimedOut {
                        messages: self.message_count,
                    });
                }
                Err(e) => return Err(e),
            };
            let deliver = self
                .conn
                .check_response(
                    method,
                    MethodKind::BasicDeliver,
                    &format!("error consuming from {}", self.queue),
                )
                .await?;

            self.message_count += 1;
            if self.opts.ack {
                self.delivery_tag = Some(deliver.u64("delivery_tag")?);
            }

            let (header, body) = self.conn.read_content().await?;
            let delivery = Delivery::new(&deliver, header, body)?;
            debug!(
                queue = %self.queue,
                delivery_tag = delivery.delivery_tag,
                bytes = delivery.body.len(),
                "message received"
            );
            if let Err(err) = handler(&delivery) {
                (self.on_error)(&self.queue, &delivery, &err);
            }

            if self.opts.message_max == Some(self.message_count) {
                self.unsubscribe().await?;
                self.ack_last().await?;
                info!(queue = %self.queue, messages = self.message_count, "message limit reached");
                return Ok(SubscriptionEnd::LimitReached {
                    messages: self.message_count,
                });
            }
            self.ack_last().await?;
        }
    }

    async fn setup_consumer(&mut self) -> Result<()> {
        let tag = self.consumer_tag.clone().unwrap_or_default();
        let consume = self.conn.method(
            MethodKind::BasicConsume,
            [
                ("queue", FieldValue::from(self.queue.as_str())),
                ("consumer_tag", FieldValue::from(tag)),
                ("no_ack", FieldValue::from(!self.opts.ack)),
                ("exclusive", FieldValue::from(self.opts.exclusive)),
                ("nowait", FieldValue::from(false)),
            ],
        )?;
        let ok = self
            .conn
            .call(
                consume,
                MethodKind::BasicConsumeOk,
                &format!("error subscribing to queue {}", self.queue),
            )
            .await?;
        let tag = ok.short_str("consumer_tag")?.to_string();
        info!(queue = %self.queue, consumer_tag = %tag, "subscribed");
        self.consumer_tag = Some(tag);
        Ok(())
    }

    /// Send Basic.Cancel and wait for Cancel-Ok.
    pub async fn unsubscribe(&mut self) -> Result<()> {
        let Some(tag) = self.consumer_tag.clone() else {
            return Err(AmqpError::Usage("subscription was never started".into()));
        };
        self.conn.cancel(&tag).await
    }

    async fn unsubscribe_best_effort(&mut self) -> Result<()> {
        match self.unsubscribe().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_fatal() => Err(e),
            Err(e) => {
                warn!(queue = %self.queue, error = %e, "unsubscribe failed");
                Ok(())
            }
        }
    }

    async fn ack_last(&mut self) -> Result<()> {
        match (self.opts.ack, self.delivery_tag) {
            (true, Some(tag)) => self.conn.ack(tag, false).await,
            _ => Ok(()),
        }
    }
}
