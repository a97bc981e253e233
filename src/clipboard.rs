//! Copying short links to the system clipboard.

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("clipboard unavailable")]
pub struct ClipboardError(#[source] arboard::Error);

pub trait Clipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The desktop clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(ClipboardError)?;
        clipboard.set_text(text).map_err(ClipboardError)
    }
}

/// Copy `text`, downgrading a failure to a warning. Returns whether the
/// text reached the clipboard.
pub fn copy_or_warn(clipboard: &dyn Clipboard, text: &str) -> bool {
    match clipboard.copy(text) {
        Ok(()) => {
            info!("short link copied to clipboard");
            true
        }
        Err(e) => {
            warn!(error = %e, "failed to copy short link to clipboard");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl Clipboard for Recording {
        fn copy(&self, text: &str) -> Result<(), ClipboardError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Unsupported;

    impl Clipboard for Unsupported {
        fn copy(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError(arboard::Error::ClipboardNotSupported))
        }
    }

    #[test]
    fn copies_text() {
        let clipboard = Recording::default();
        assert!(copy_or_warn(&clipboard, "https://sho.rt/abc"));
        assert_eq!(*clipboard.0.lock().unwrap(), vec!["https://sho.rt/abc"]);
    }

    #[test]
    fn failure_is_not_fatal() {
        assert!(!copy_or_warn(&Unsupported, "https://sho.rt/abc"));
    }
}
