use log::info;
use std::fmt;

use crate::database::models::DeliveryMethod;

/// Failure to hand a code to the delivery channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Delivery channel unavailable: {0}")]
    Unavailable(String),

    #[error("Destination rejected by delivery channel: {0}")]
    Rejected(String),
}

/// Transmits verification codes to users (SMS gateway, e-mail sender)
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryChannel: Send + Sync {
    fn send(&self, method: DeliveryMethod, destination: &str, code: &str) -> Result<(), DeliveryError>;
}

impl<T: DeliveryChannel + ?Sized> DeliveryChannel for std::sync::Arc<T> {
    fn send(&self, method: DeliveryMethod, destination: &str, code: &str) -> Result<(), DeliveryError> {
        (**self).send(method, destination, code)
    }
}

/// Channel that only records the dispatch in the log. The code itself is
/// never written out.
#[derive(Debug, Default, Clone)]
pub struct LoggingDeliveryChannel;

impl DeliveryChannel for LoggingDeliveryChannel {
    fn send(&self, method: DeliveryMethod, destination: &str, _code: &str) -> Result<(), DeliveryError> {
        info!("[{}] verification code sent to {}", method.as_str(), MaskedDestination(destination));
        Ok(())
    }
}

/// Display wrapper that hides most of a phone number or mailbox
pub struct MaskedDestination<'a>(pub &'a str);

impl fmt::Display for MaskedDestination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if let Some((local, domain)) = value.split_once('@') {
            let first: String = local.chars().take(1).collect();
            return write!(f, "{}***@{}", first, domain);
        }

        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= 4 {
            return write!(f, "****");
        }
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        write!(f, "{}***{}", head, tail)
    }
}
