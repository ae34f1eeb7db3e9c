/// Delivery mode header carried by every message.
///
/// The engine keeps everything in memory either way; the mode is exposed to
/// selectors (`JMSDeliveryMode`) and to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Default mode.
    #[default]
    Persistent,
    /// Producer tolerates loss on provider failure.
    NonPersistent,
}

impl DeliveryMode {
    /// Selector-facing name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Persistent => "PERSISTENT",
            DeliveryMode::NonPersistent => "NON_PERSISTENT",
        }
    }
}
