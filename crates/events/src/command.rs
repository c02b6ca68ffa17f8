use std::any::Any;

use serde::de::DeserializeOwned;

/// Type-erased command (an *intent* to change state).
///
/// Commands are transient: built per inbound request, handed to a
/// [`CommandHandler`](crate::CommandHandler), then dropped. The ingress
/// obtains an empty instance from the registry and decodes the request body
/// into it, so the concrete shape stays opaque to the transport.
///
/// Implement [`CommandPayload`] instead of this trait directly.
pub trait Command: Any + core::fmt::Debug + Send + Sync {
    fn command_type(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// Decode a JSON document into this instance, replacing its contents.
    fn decode_json(&mut self, body: &[u8]) -> serde_json::Result<()>;
}

/// A concrete command shape, registered under `COMMAND_TYPE`.
///
/// Field names are the JSON keys accepted by the ingress; unknown keys and
/// missing keys follow serde's usual rules for the type.
///
/// Decoding replaces the registry's instance with a freshly deserialized
/// value: values preset by a `register_with` factory do not survive, and a
/// body missing a required field is an error. Put `#[serde(default)]` on the
/// container to fill absent fields from `Default` instead.
pub trait CommandPayload: DeserializeOwned + Default + core::fmt::Debug + Send + Sync + 'static {
    const COMMAND_TYPE: &'static str;
}

impl<T: CommandPayload> Command for T {
    fn command_type(&self) -> &str {
        T::COMMAND_TYPE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn decode_json(&mut self, body: &[u8]) -> serde_json::Result<()> {
        *self = serde_json::from_slice(body)?;
        Ok(())
    }
}

impl dyn Command {
    pub fn is<T: Command>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Command>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership of the concrete command, if it is a `T`.
    pub fn downcast<T: Command>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}
