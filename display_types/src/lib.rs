#![no_std]

//! # Display Types
//!
//! This crate defines the pixel-buffer data model shared between the
//! compositor and its hosts.
//!
//! ## Philosophy
//!
//! - **Buffers, not surfaces**: a display is a plain byte buffer with
//!   explicit geometry, not a GPU surface or toolkit widget
//! - **Recreate, don't resize**: buffer geometry is fixed at creation
//! - **Opaque handles**: the embedded runtime sees ids, never buffers
//! - **Testable**: ids and events are serializable
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A rendering API (no drawing primitives, no fonts)
//! - A windowing system (no chrome, no z-order, no focus)
//! - A color management layer

extern crate alloc;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an onscreen window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(Uuid);

impl WindowId {
    /// Creates a new random window ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a window ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window:{}", self.0)
    }
}

/// Unique identifier for an offscreen texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(Uuid);

impl TextureId {
    /// Creates a new random texture ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a texture ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TextureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture:{}", self.0)
    }
}

/// Unique identifier for one run of the embedded runtime
///
/// A fresh session ID is issued each time the runtime starts, so hosts can
/// tell output of the current run apart from output of prior runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a session ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Pixel encoding of a window surface
///
/// The embedded runtime requests an encoding at window creation. Only
/// [`PixelEncoding::Rgba`] is accepted by the compositor today; the other
/// variants exist so a request for them can be rejected with a typed error
/// instead of undefined behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelEncoding {
    /// 8-bit grayscale, one byte per pixel
    Gray,
    /// 16-bit RGB (5-6-5), two bytes per pixel
    Rgb565,
    /// 32-bit RGBA, four bytes per pixel
    Rgba,
}

impl PixelEncoding {
    /// Wire code for grayscale encoding
    pub const GRAY_CODE: i32 = 1;
    /// Wire code for RGB 5-6-5 encoding
    pub const RGB565_CODE: i32 = 2;
    /// Wire code for RGBA encoding
    pub const RGBA_CODE: i32 = 3;

    /// Returns the number of bytes per pixel
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelEncoding::Gray => 1,
            PixelEncoding::Rgb565 => 2,
            PixelEncoding::Rgba => 4,
        }
    }

    /// Returns the encoding's wire code in the engine protocol
    pub const fn code(&self) -> i32 {
        match self {
            PixelEncoding::Gray => Self::GRAY_CODE,
            PixelEncoding::Rgb565 => Self::RGB565_CODE,
            PixelEncoding::Rgba => Self::RGBA_CODE,
        }
    }

    /// Decodes an encoding from its wire code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::GRAY_CODE => Some(PixelEncoding::Gray),
            Self::RGB565_CODE => Some(PixelEncoding::Rgb565),
            Self::RGBA_CODE => Some(PixelEncoding::Rgba),
            _ => None,
        }
    }
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelEncoding::Gray => write!(f, "Gray"),
            PixelEncoding::Rgb565 => write!(f, "Rgb565"),
            PixelEncoding::Rgba => write!(f, "Rgba"),
        }
    }
}

/// Fixed-geometry pixel buffer
///
/// Invariant: `data.len() == width * height * bytes_per_pixel` from creation
/// until drop. Buffers are never resized; callers that need a different
/// geometry create a new buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a zero-filled buffer with the given geometry
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        let size = (width as usize) * (height as usize) * (bytes_per_pixel as usize);
        Self {
            width,
            height,
            bytes_per_pixel,
            data: vec![0; size],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        self.bytes_per_pixel
    }

    /// Total buffer size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Bytes per row
    pub fn stride_bytes(&self) -> usize {
        (self.width as usize) * (self.bytes_per_pixel as usize)
    }

    /// Byte offset of the pixel at (x, y)
    pub fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * (self.bytes_per_pixel as usize)
    }

    /// Read access to the pixel bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Write access to the pixel bytes
    ///
    /// The slice length is fixed; writers copy into it, never grow it.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Display event bus
///
/// One flat event type for every window-lifecycle and draw notification,
/// tagged with the window it concerns. Hosts subscribe once and filter by
/// window ID instead of juggling nested per-window streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayEvent {
    /// A window was created with the given geometry
    WindowCreated {
        window: WindowId,
        width: u32,
        height: u32,
    },
    /// A window was destroyed; its ID is never reused
    WindowDestroyed { window: WindowId },
    /// A window's title changed
    TitleChanged { window: WindowId, title: String },
    /// A blit completed into the window's buffer
    Drawn { window: WindowId },
}

impl DisplayEvent {
    /// Returns the window this event concerns
    pub fn window(&self) -> WindowId {
        match self {
            DisplayEvent::WindowCreated { window, .. }
            | DisplayEvent::WindowDestroyed { window }
            | DisplayEvent::TitleChanged { window, .. }
            | DisplayEvent::Drawn { window } => *window,
        }
    }
}
