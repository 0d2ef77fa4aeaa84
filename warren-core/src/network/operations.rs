//! Exchange, queue, basic and tx operations on the active channel.
//!
//! Every request waits for its reply: `nowait` is accepted in the option
//! structs but always sent as `false`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::value::{FieldTable, FieldValue};
use crate::content::{BasicProperties, ContentHeader};
use crate::error::{AmqpError, Result};
use crate::frame::Frame;
use crate::message::{GetMessage, Returned, ReturnedMessage};
use crate::network::connection::Connection;
use crate::network::connector::Connector;
use crate::protocol::method::MethodKind;
use crate::subscription::{SubscribeOptions, Subscription};

/// Default wait for [`Connection::returned_message`].
pub const RETURN_TIMEOUT: Duration = Duration::from_millis(100);

// ── Options ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = AmqpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(ExchangeKind::Direct),
            "fanout" => Ok(ExchangeKind::Fanout),
            "topic" => Ok(ExchangeKind::Topic),
            "headers" => Ok(ExchangeKind::Headers),
            other => Err(AmqpError::Usage(format!("unknown exchange type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeOptions {
    pub kind: ExchangeKind,
    /// Only check that the exchange exists.
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    /// Ignored: the client always waits for Declare-Ok.
    pub nowait: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueOptions {
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    /// Ignored: the client always waits for Declare-Ok.
    pub nowait: bool,
    pub arguments: FieldTable,
}

/// Broker's answer to a queue declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDeclared {
    /// Server-generated when the declared name was empty.
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishOptions {
    /// Return the message if it cannot be routed.
    pub mandatory: bool,
    /// Return the message if it cannot be delivered right away.
    pub immediate: bool,
    pub properties: BasicProperties,
}

/// Prefetch limits for Basic.Qos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qos {
    pub prefetch_size: u32,
    pub prefetch_count: u16,
    /// Apply to the whole connection instead of the channel.
    pub global: bool,
}

impl Default for Qos {
    fn default() -> Self {
        Self {
            prefetch_size: 0,
            prefetch_count: 1,
            global: false,
        }
    }
}

// ── Operations ───────────────────────────────────────────────────

impl<C: Connector> Connection<C> {
    pub async fn exchange_declare(&mut self, name: &str, opts: &ExchangeOptions) -> Result<()> {
        let declare = self.method(
            MethodKind::ExchangeDeclare,
            [
                ("exchange", FieldValue::from(name)),
                ("type", FieldValue::from(opts.kind.as_str())),
                ("passive", FieldValue::from(opts.passive)),
                ("durable", FieldValue::from(opts.durable)),
                ("auto_delete", FieldValue::from(opts.auto_delete)),
                ("internal", FieldValue::from(opts.internal)),
                ("nowait", FieldValue::from(false)),
                ("arguments", FieldValue::from(opts.arguments.clone())),
            ],
        )?;
        self.call(
            declare,
            MethodKind::ExchangeDeclareOk,
            &format!("error declaring exchange {name}"),
        )
        .await?;
        debug!(exchange = name, kind = %opts.kind, "exchange declared");
        Ok(())
    }

    pub async fn exchange_delete(&mut self, name: &str, if_unused: bool) -> Result<()> {
        let delete = self.method(
            MethodKind::ExchangeDelete,
            [
                ("exchange", FieldValue::from(name)),
                ("if_unused", FieldValue::from(if_unused)),
                ("nowait", FieldValue::from(false)),
            ],
        )?;
        self.call(
            delete,
            MethodKind::ExchangeDeleteOk,
            &format!("error deleting exchange {name}"),
        )
        .await?;
        Ok(())
    }

    /// Declare a queue. An empty `name` asks the broker to pick one.
    pub async fn queue_declare(&mut self, name: &str, opts: &QueueOptions) -> Result<QueueDeclared> {
        let declare = self.method(
            MethodKind::QueueDeclare,
            [
                ("queue", FieldValue::from(name)),
                ("passive", FieldValue::from(opts.passive)),
                ("durable", FieldValue::from(opts.durable)),
                ("exclusive", FieldValue::from(opts.exclusive)),
                ("auto_delete", FieldValue::from(opts.auto_delete)),
                ("nowait", FieldValue::from(false)),
                ("arguments", FieldValue::from(opts.arguments.clone())),
            ],
        )?;
        let ok = self
            .call(
                declare,
                MethodKind::QueueDeclareOk,
                &format!("error declaring queue {name}"),
            )
            .await?;
        let declared = QueueDeclared {
            name: ok.short_str("queue")?.to_string(),
            message_count: ok.u32("message_count")?,
            consumer_count: ok.u32("consumer_count")?,
        };
        debug!(queue = %declared.name, "queue declared");
        Ok(declared)
    }

    pub async fn queue_bind(
        &mut self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<()> {
        let bind = self.method(
            MethodKind::QueueBind,
            [
                ("queue", FieldValue::from(queue)),
                ("exchange", FieldValue::from(exchange)),
                ("routing_key", FieldValue::from(routing_key)),
                ("nowait", FieldValue::from(false)),
                ("arguments", FieldValue::from(arguments)),
            ],
        )?;
        self.call(
            bind,
            MethodKind::QueueBindOk,
            &format!("error binding queue {queue} to {exchange}"),
        )
        .await?;
        Ok(())
    }

    /// Remove a binding. AMQP 0-8 has no Queue.Unbind.
    pub async fn queue_unbind(
        &mut self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<()> {
        let unbind = self.method(
            MethodKind::QueueUnbind,
            [
                ("queue", FieldValue::from(queue)),
                ("exchange", FieldValue::from(exchange)),
                ("routing_key", FieldValue::from(routing_key)),
                ("arguments", FieldValue::from(arguments)),
            ],
        )?;
        self.call(
            unbind,
            MethodKind::QueueUnbindOk,
            &format!("error unbinding queue {queue} from {exchange}"),
        )
        .await?;
        Ok(())
    }

    /// Drop all ready messages; returns how many were purged.
    pub async fn queue_purge(&mut self, queue: &str) -> Result<u32> {
        let purge = self.method(
            MethodKind::QueuePurge,
            [
                ("queue", FieldValue::from(queue)),
                ("nowait", FieldValue::from(false)),
            ],
        )?;
        let ok = self
            .call(
                purge,
                MethodKind::QueuePurgeOk,
                &format!("error purging queue {queue}"),
            )
            .await?;
        ok.u32("message_count")
    }

    /// Delete a queue; returns how many messages it held.
    pub async fn queue_delete(&mut self, queue: &str, if_unused: bool, if_empty: bool) -> Result<u32> {
        let delete = self.method(
            MethodKind::QueueDelete,
            [
                ("queue", FieldValue::from(queue)),
                ("if_unused", FieldValue::from(if_unused)),
                ("if_empty", FieldValue::from(if_empty)),
                ("nowait", FieldValue::from(false)),
            ],
        )?;
        let ok = self
            .call(
                delete,
                MethodKind::QueueDeleteOk,
                &format!("error deleting queue {queue}"),
            )
            .await?;
        ok.u32("message_count")
    }

    // ── Basic ────────────────────────────────────────────────────

    /// Publish a message on the active channel.
    ///
    /// The body is split into frames no larger than the negotiated
    /// frame-max; all frames go out under one write lock.
    pub async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: impl Into<Bytes>,
        opts: &PublishOptions,
    ) -> Result<()> {
        let body = body.into();
        let publish = self.method(
            MethodKind::BasicPublish,
            [
                ("exchange", FieldValue::from(exchange)),
                ("routing_key", FieldValue::from(routing_key)),
                ("mandatory", FieldValue::from(opts.mandatory)),
                ("immediate", FieldValue::from(opts.immediate)),
            ],
        )?;
        let channel = self.active_channel();
        let header = ContentHeader::new(body.len() as u64, opts.properties.clone());

        let mut frames = vec![publish.to_frame(channel), Frame::header(channel, header)];
        frames.extend(Frame::body_frames(channel, &body, self.tuning().frame_max));
        self.write_frames(frames).await
    }

    /// Wait for a Basic.Return after a mandatory or immediate publish.
    ///
    /// `None` uses [`RETURN_TIMEOUT`]. Nothing arriving in time is the
    /// normal case and yields [`Returned::NoReturn`].
    pub async fn returned_message(&mut self, timeout: Option<Duration>) -> Result<Returned> {
        let method = match self.next_method(Some(timeout.unwrap_or(RETURN_TIMEOUT))).await {
            Ok(method) => method,
            Err(e) if e.is_timeout() => return Ok(Returned::NoReturn),
            Err(e) => return Err(e),
        };
        let ret = self
            .check_response(method, MethodKind::BasicReturn, "error reading returned message")
            .await?;
        let (header, body) = self.read_content().await?;
        let message = ReturnedMessage::new(&ret, header, body)?;
        warn!(
            reply_code = message.reply_code,
            reply_text = %message.reply_text,
            exchange = %message.exchange,
            "message returned by broker"
        );
        Ok(Returned::Message(message))
    }

    /// Fetch one message. `ack == false` lets the broker forget it at once.
    pub async fn get(&mut self, queue: &str, ack: bool) -> Result<Option<GetMessage>> {
        let get = self.method(
            MethodKind::BasicGet,
            [
                ("queue", FieldValue::from(queue)),
                ("no_ack", FieldValue::from(!ack)),
            ],
        )?;
        self.send(get).await?;
        let reply = self.next_method(None).await?;
        if reply.is(MethodKind::BasicGetEmpty) {
            return Ok(None);
        }
        let get_ok = self
            .check_response(reply, MethodKind::BasicGetOk, &format!("error getting from {queue}"))
            .await?;
        let (header, body) = self.read_content().await?;
        Ok(Some(GetMessage::new(&get_ok, header, body)?))
    }

    pub async fn ack(&mut self, delivery_tag: u64, multiple: bool) -> Result<()> {
        let ack = self.method(
            MethodKind::BasicAck,
            [
                ("delivery_tag", FieldValue::from(delivery_tag)),
                ("multiple", FieldValue::from(multiple)),
            ],
        )?;
        self.send(ack).await
    }

    pub async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let reject = self.method(
            MethodKind::BasicReject,
            [
                ("delivery_tag", FieldValue::from(delivery_tag)),
                ("requeue", FieldValue::from(requeue)),
            ],
        )?;
        self.send(reject).await
    }

    /// Ask for redelivery of unacknowledged messages on this channel.
    ///
    /// Waits for Recover-Ok where the revision defines one.
    pub async fn recover(&mut self, requeue: bool) -> Result<()> {
        let recover = self.method(
            MethodKind::BasicRecover,
            [("requeue", FieldValue::from(requeue))],
        )?;
        if self.spec().supports(MethodKind::BasicRecoverOk) {
            self.call(recover, MethodKind::BasicRecoverOk, "error recovering")
                .await?;
            Ok(())
        } else {
            self.send(recover).await
        }
    }

    /// Cancel a consumer. Deliveries still in flight are discarded.
    pub async fn cancel(&mut self, consumer_tag: &str) -> Result<()> {
        let cancel = self.method(
            MethodKind::BasicCancel,
            [
                ("consumer_tag", FieldValue::from(consumer_tag)),
                ("nowait", FieldValue::from(false)),
            ],
        )?;
        self.send(cancel).await?;
        loop {
            let reply = self.next_method(None).await?;
            if reply.is(MethodKind::BasicDeliver) {
                let (_, body) = self.read_content().await?;
                debug!(consumer_tag, bytes = body.len(), "discarding in-flight delivery");
                continue;
            }
            self.check_response(
                reply,
                MethodKind::BasicCancelOk,
                &format!("error unsubscribing {consumer_tag}"),
            )
            .await?;
            return Ok(());
        }
    }

    pub async fn qos(&mut self, qos: Qos) -> Result<()> {
        let request = self.method(
            MethodKind::BasicQos,
            [
                ("prefetch_size", FieldValue::from(qos.prefetch_size)),
                ("prefetch_count", FieldValue::from(qos.prefetch_count)),
                ("global", FieldValue::from(qos.global)),
            ],
        )?;
        self.call(
            request,
            MethodKind::BasicQosOk,
            "error specifying quality of service",
        )
        .await?;
        Ok(())
    }

    /// Start a consumer on `queue`; nothing is sent until
    /// [`Subscription::start`].
    pub fn subscribe(&mut self, queue: &str, opts: SubscribeOptions) -> Subscription<'_, C> {
        Subscription::new(self, queue, opts)
    }

    // ── Tx ───────────────────────────────────────────────────────

    pub async fn tx_select(&mut self) -> Result<()> {
        let select = self.method(MethodKind::TxSelect, [])?;
        self.call(
            select,
            MethodKind::TxSelectOk,
            "error initiating transactions for current channel",
        )
        .await?;
        Ok(())
    }

    pub async fn tx_commit(&mut self) -> Result<()> {
        let commit = self.method(MethodKind::TxCommit, [])?;
        self.call(commit, MethodKind::TxCommitOk, "error committing transaction")
            .await?;
        Ok(())
    }

    pub async fn tx_rollback(&mut self) -> Result<()> {
        let rollback = self.method(MethodKind::TxRollback, [])?;
        self.call(
            rollback,
            MethodKind::TxRollbackOk,
            "error rolling back transaction",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_defaults_to_one_message() {
        let qos = Qos::default();
        assert_eq!(qos.prefetch_count, 1);
        assert_eq!(qos.prefetch_size, 0);
        assert!(!qos.global);
    }

    #[test]
    fn exchange_kind_parses() {
        assert_eq!("topic".parse::<ExchangeKind>().unwrap(), ExchangeKind::Topic);
        assert!("bogus".parse::<ExchangeKind>().is_err());
        assert_eq!(ExchangeKind::default().to_string(), "direct");
    }
}
