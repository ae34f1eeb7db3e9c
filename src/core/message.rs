use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::core::delivery_mode::DeliveryMode;
use crate::core::queue::Queue;

pub const DEFAULT_PRIORITY: u8 = 4;
pub const MAX_PRIORITY: u8 = 9;

/// Typed value of a message property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Long(_) => "long",
            PropertyValue::Double(_) => "double",
            PropertyValue::String(_) => "string",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Long(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Long(v as i64)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Long(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MessageBody {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
}

/// Producer-side header defaults applied when a message is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub priority: u8,
    pub delivery_mode: DeliveryMode,
    /// 0 = never expire.
    pub time_to_live_ms: u64,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            delivery_mode: DeliveryMode::Persistent,
            time_to_live_ms: 0,
        }
    }
}

/// A queue message: immutable body and properties plus the delivery
/// metadata the engine maintains.
#[derive(Debug, Clone, Default)]
pub struct Message {
    message_id: Option<String>,
    body: MessageBody,
    properties: HashMap<String, PropertyValue>,
    correlation_id: Option<String>,
    message_type: Option<String>,
    priority: u8,
    delivery_mode: DeliveryMode,
    timestamp: u64,
    expiration: u64,
    destination: Option<Queue>,
    redelivered: bool,
    delivery_count: u32,
}

impl Message {
    pub fn new() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: MessageBody::Text(text.into()),
            ..Self::new()
        }
    }

    pub fn bytes(payload: impl Into<Bytes>) -> Self {
        Self {
            body: MessageBody::Bytes(payload.into()),
            ..Self::new()
        }
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Text body, if this is a text message.
    pub fn text_body(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn with_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = Some(message_type.into());
        self
    }

    pub fn message_type(&self) -> Option<&str> {
        self.message_type.as_deref()
    }

    /// `ID:<uuid>`, assigned when the message is sent.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    /// Absolute expiry in ms since epoch; 0 = never.
    pub fn expiration(&self) -> u64 {
        self.expiration
    }

    pub fn destination(&self) -> Option<&Queue> {
        self.destination.as_ref()
    }

    pub fn is_redelivered(&self) -> bool {
        self.redelivered
    }

    /// Number of times this message was returned to its queue by rollback
    /// or recover.
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    /// Assigns send-time headers. Any delivery state left over from a
    /// previous receive is reset.
    pub(crate) fn stamp(&mut self, destination: &Queue, options: &SendOptions) {
        let now = current_timestamp();
        self.message_id = Some(format!("ID:{}", Uuid::new_v4()));
        self.timestamp = now;
        self.priority = options.priority.min(MAX_PRIORITY);
        self.delivery_mode = options.delivery_mode;
        self.expiration = if options.time_to_live_ms == 0 {
            0
        } else {
            now.saturating_add(options.time_to_live_ms)
        };
        self.destination = Some(destination.clone());
        self.redelivered = false;
        self.delivery_count = 0;
    }

    /// Stamps with default send options unless the message already carries
    /// an id from an earlier send.
    pub(crate) fn stamp_if_unsent(&mut self, destination: &Queue) {
        if self.message_id.is_none() {
            self.stamp(destination, &SendOptions::default());
        }
    }

    pub(crate) fn mark_redelivered(&mut self) {
        self.redelivered = true;
        self.delivery_count = self.delivery_count.saturating_add(1);
    }

    #[inline]
    pub(crate) fn is_expired(&self, now_ms: u64) -> bool {
        self.expiration != 0 && now_ms >= self.expiration
    }
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Monotonically increasing send sequence (fast, lock-free).
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_sequence() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}
