//! The seam between the engine and the input-device collaborator.
//!
//! The engine owns pacing (click delays, key intervals, typing speed)
//! and graph traversal; a backend only performs the raw gestures. The
//! crate ships [`NullBackend`], which performs nothing — useful for
//! dry runs and as the test double's shape.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tapflow_schema::{KeyCombination, MouseButton, MoveTarget, ScrollDirection};
use tracing::debug;

#[async_trait]
pub trait InputBackend: Send + Sync {
    async fn mouse_down(&self, button: MouseButton) -> Result<()>;

    async fn mouse_up(&self, button: MouseButton) -> Result<()>;

    /// A full press-and-release in one gesture.
    async fn click(&self, button: MouseButton) -> Result<()>;

    async fn move_mouse(&self, target: MoveTarget, duration: Duration, smooth: bool)
    -> Result<()>;

    async fn scroll(&self, direction: ScrollDirection, lines: u32) -> Result<()>;

    /// Tap a key combination, honoring its modifiers and optional hold
    /// duration.
    async fn key_tap(&self, combo: &KeyCombination) -> Result<()>;

    /// Type `text`, pausing `per_key` between keystrokes.
    async fn type_text(&self, text: &str, per_key: Duration) -> Result<()>;

    /// Clear the focused input field before typing into it.
    async fn clear_text(&self) -> Result<()>;

    async fn press_enter(&self) -> Result<()>;
}

/// Backend that logs each gesture and performs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

#[async_trait]
impl InputBackend for NullBackend {
    async fn mouse_down(&self, button: MouseButton) -> Result<()> {
        debug!(?button, "mouse down");
        Ok(())
    }

    async fn mouse_up(&self, button: MouseButton) -> Result<()> {
        debug!(?button, "mouse up");
        Ok(())
    }

    async fn click(&self, button: MouseButton) -> Result<()> {
        debug!(?button, "click");
        Ok(())
    }

    async fn move_mouse(
        &self,
        target: MoveTarget,
        duration: Duration,
        smooth: bool,
    ) -> Result<()> {
        debug!(?target, ?duration, smooth, "move mouse");
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, lines: u32) -> Result<()> {
        debug!(?direction, lines, "scroll");
        Ok(())
    }

    async fn key_tap(&self, combo: &KeyCombination) -> Result<()> {
        debug!(key = combo.key(), modifiers = ?combo.modifiers(), "key tap");
        Ok(())
    }

    async fn type_text(&self, text: &str, per_key: Duration) -> Result<()> {
        debug!(len = text.len(), ?per_key, "type text");
        Ok(())
    }

    async fn clear_text(&self) -> Result<()> {
        debug!("clear text");
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        debug!("press enter");
        Ok(())
    }
}
