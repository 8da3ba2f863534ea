use anyhow::{Context, Result};
use arboard::Clipboard;
use std::sync::Mutex;
use tracing::debug;

/// Whole-blob access to a text clipboard.
pub trait ClipboardAccess: Send + Sync {
    /// Current clipboard text. Empty when the clipboard holds no text.
    fn read_text(&self) -> String;
    fn write_text(&self, text: &str) -> Result<()>;
}

/// OS clipboard backed by `arboard`.
///
/// On Wayland, and on X11 without a clipboard manager, this process owns the
/// copied text, so it disappears when the program exits.
pub struct SystemClipboard {
    clipboard: Mutex<Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let clipboard = Clipboard::new().context("Failed to initialize clipboard")?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read_text(&self) -> String {
        let mut clipboard = self.clipboard.lock().expect("clipboard lock poisoned");
        match clipboard.get_text() {
            Ok(text) => text,
            Err(err) => {
                debug!("Clipboard has no text content: {}", err);
                String::new()
            }
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard = self.clipboard.lock().expect("clipboard lock poisoned");
        clipboard
            .set_text(text)
            .context("Failed to copy to clipboard")?;
        debug!("Text copied to clipboard");
        Ok(())
    }
}

/// In-process clipboard for headless sessions and tests.
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(initial.into()),
        }
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn read_text(&self) -> String {
        self.contents
            .lock()
            .expect("clipboard lock poisoned")
            .clone()
    }

    fn write_text(&self, text: &str) -> Result<()> {
        *self.contents.lock().expect("clipboard lock poisoned") = text.to_string();
        Ok(())
    }
}
