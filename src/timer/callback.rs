//! User callbacks and the boundary they are invoked behind

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tracing::error;

use crate::error::{CallbackError, TimerError};

/// Work performed on every fire
pub type Callback = Box<dyn FnMut() -> anyhow::Result<()> + Send + 'static>;

/// Receives callback failures; fires happen on scheduler deliveries, so
/// failures cannot be returned to the owner directly.
pub type ErrorReporter = Arc<dyn Fn(TimerError) + Send + Sync + 'static>;

/// Default reporter: log and keep going
pub fn log_error() -> ErrorReporter {
    Arc::new(|err| error!("{}", err))
}

/// Runs `callback`, turning both returned errors and panics into
/// [`TimerError::CallbackFailure`].
pub(crate) fn invoke(callback: &mut Callback) -> Result<(), TimerError> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TimerError::CallbackFailure(err.into())),
        Err(payload) => Err(TimerError::CallbackFailure(panic_error(payload))),
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> CallbackError {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };
    format!("callback panicked: {}", message).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_passes_through() {
        let mut callback: Callback = Box::new(|| -> anyhow::Result<()> { Ok(()) });
        assert!(invoke(&mut callback).is_ok());
    }

    #[test]
    fn returned_error_becomes_callback_failure() {
        let mut callback: Callback = Box::new(|| -> anyhow::Result<()> { anyhow::bail!("upstream refused") });
        let err = invoke(&mut callback).unwrap_err();
        assert_eq!(err.to_string(), "timer callback failed: upstream refused");
    }

    #[test]
    fn panic_is_contained() {
        let mut callback: Callback = Box::new(|| -> anyhow::Result<()> { panic!("boom") });
        let err = invoke(&mut callback).unwrap_err();
        assert_eq!(err.to_string(), "timer callback failed: callback panicked: boom");
    }
}
