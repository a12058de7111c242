use cdpchan_frame::Message;

use crate::error::HandlerError;

/// Application-level capability that processes messages delivered on a
/// channel.
///
/// `handle` is called synchronously from the session's receive path. Handlers
/// that need to do slow work should hand it off themselves; the channel does
/// not queue or offload.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        self(message)
    }
}
