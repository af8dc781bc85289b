//! # Compositor
//!
//! This crate implements the display service the embedded runtime drives:
//! onscreen windows, offscreen textures, and the clipped blit between them.
//!
//! ## Philosophy
//!
//! - **Handles, not pointers**: the runtime holds opaque ids; every operation
//!   looks them up in a table, so a stale handle is a typed error instead of
//!   undefined behavior
//! - **Displays are best-effort**: invalid handles and bad rectangles fail
//!   locally and never take the session down
//! - **One event bus**: window lifecycle and draw notifications share a
//!   single flat [`DisplayEvent`] stream, tagged by window ID
//! - **Clipping is protocol**: the blit clip order is fixed; see [`blit`]
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A renderer (no drawing primitives; the runtime computes every pixel)
//! - A window manager (no z-order, placement, or focus)
//! - A GPU abstraction

pub mod blit;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use broadcast::{Broadcast, Subscriber};
use display_types::{DisplayEvent, PixelBuffer, PixelEncoding, TextureId, WindowId};
use thiserror::Error;

use blit::clip_blit;

/// Compositor error types
///
/// All of these are local failures: the caller logs them and carries on.
/// The one exception is [`CompositorError::UnsupportedEncoding`], which the
/// driver layer treats as a contract violation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositorError {
    #[error("Invalid window handle: {0}")]
    InvalidWindow(WindowId),

    #[error("Invalid texture handle: {0}")]
    InvalidTexture(TextureId),

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Unsupported pixel encoding: {0}")]
    UnsupportedEncoding(PixelEncoding),
}

/// An onscreen window: identity, title, encoding, and its pixel buffer
#[derive(Debug)]
struct Window {
    encoding: PixelEncoding,
    title: Option<String>,
    buffer: PixelBuffer,
}

/// An offscreen texture: pure pixel storage with an identity
///
/// Textures carry no back-reference to the window they were created for;
/// they are associated at blit time by caller-supplied handles.
#[derive(Debug)]
struct Texture {
    buffer: PixelBuffer,
}

#[derive(Debug, Default)]
struct State {
    windows: HashMap<WindowId, Window>,
    textures: HashMap<TextureId, Texture>,
}

/// The display service
///
/// All operations take `&self`; the compositor is shared between the runtime
/// thread (which mutates) and host observers (which snapshot via
/// [`Compositor::frame`] and watch [`Compositor::subscribe_events`]).
pub struct Compositor {
    state: RwLock<State>,
    events: Broadcast<DisplayEvent>,
}

impl Compositor {
    /// Creates an empty compositor
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            events: Broadcast::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a window with a zero-filled buffer
    ///
    /// Only [`PixelEncoding::Rgba`] windows are supported; requesting any
    /// other encoding is rejected with
    /// [`CompositorError::UnsupportedEncoding`].
    pub fn create_window(
        &self,
        encoding: PixelEncoding,
        width: u32,
        height: u32,
    ) -> Result<WindowId, CompositorError> {
        if encoding != PixelEncoding::Rgba {
            return Err(CompositorError::UnsupportedEncoding(encoding));
        }

        let id = WindowId::new();
        let window = Window {
            encoding,
            title: None,
            buffer: PixelBuffer::new(width, height, encoding.bytes_per_pixel()),
        };
        self.write().windows.insert(id, window);
        self.events.publish(DisplayEvent::WindowCreated {
            window: id,
            width,
            height,
        });
        Ok(id)
    }

    /// Destroys a window and releases its buffer
    ///
    /// The id is never reused. Destroying an unknown or already-destroyed
    /// window is an error, not a crash.
    pub fn destroy_window(&self, window: WindowId) -> Result<(), CompositorError> {
        self.write()
            .windows
            .remove(&window)
            .ok_or(CompositorError::InvalidWindow(window))?;
        self.events.publish(DisplayEvent::WindowDestroyed { window });
        Ok(())
    }

    /// Sets a window's title
    pub fn set_title(&self, window: WindowId, title: &str) -> Result<(), CompositorError> {
        {
            let mut state = self.write();
            let entry = state
                .windows
                .get_mut(&window)
                .ok_or(CompositorError::InvalidWindow(window))?;
            entry.title = Some(title.to_string());
        }
        self.events.publish(DisplayEvent::TitleChanged {
            window,
            title: title.to_string(),
        });
        Ok(())
    }

    /// Returns a window's current title
    pub fn window_title(&self, window: WindowId) -> Result<Option<String>, CompositorError> {
        let state = self.read();
        let entry = state
            .windows
            .get(&window)
            .ok_or(CompositorError::InvalidWindow(window))?;
        Ok(entry.title.clone())
    }

    /// Returns a window's geometry as (width, height)
    pub fn window_size(&self, window: WindowId) -> Result<(u32, u32), CompositorError> {
        let state = self.read();
        let entry = state
            .windows
            .get(&window)
            .ok_or(CompositorError::InvalidWindow(window))?;
        Ok((entry.buffer.width(), entry.buffer.height()))
    }

    /// Creates a zero-filled texture bound to a window's pixel size
    ///
    /// The texture inherits the window's bytes-per-pixel and nothing else;
    /// it outlives the window freely.
    pub fn create_texture(
        &self,
        window: WindowId,
        width: u32,
        height: u32,
    ) -> Result<TextureId, CompositorError> {
        let mut state = self.write();
        let bytes_per_pixel = state
            .windows
            .get(&window)
            .ok_or(CompositorError::InvalidWindow(window))?
            .encoding
            .bytes_per_pixel();

        let id = TextureId::new();
        state.textures.insert(
            id,
            Texture {
                buffer: PixelBuffer::new(width, height, bytes_per_pixel),
            },
        );
        Ok(id)
    }

    /// Destroys a texture
    ///
    /// Destroying an unknown or already-destroyed texture is a defined no-op
    /// success, tolerating redundant frees from the runtime.
    pub fn destroy_texture(&self, texture: TextureId) -> Result<(), CompositorError> {
        self.write().textures.remove(&texture);
        Ok(())
    }

    /// Replaces a texture's entire buffer
    pub fn update_texture(
        &self,
        texture: TextureId,
        source: &[u8],
    ) -> Result<(), CompositorError> {
        let mut state = self.write();
        let entry = state
            .textures
            .get_mut(&texture)
            .ok_or(CompositorError::InvalidTexture(texture))?;
        if source.len() != entry.buffer.size_bytes() {
            return Err(CompositorError::InvalidArgument {
                reason: format!(
                    "texture update length {} != buffer size {}",
                    source.len(),
                    entry.buffer.size_bytes()
                ),
            });
        }
        entry.buffer.data_mut().copy_from_slice(source);
        Ok(())
    }

    /// Copies a `width`×`height` rectangle into a texture at (`x`, `y`)
    ///
    /// `source` is laid out with the destination texture's stride and is read
    /// at the same offsets the destination is written at. No clipping is
    /// performed: the rectangle must lie inside the texture and `source` must
    /// cover every row it touches.
    pub fn update_texture_region(
        &self,
        texture: TextureId,
        source: &[u8],
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), CompositorError> {
        let mut state = self.write();
        let entry = state
            .textures
            .get_mut(&texture)
            .ok_or(CompositorError::InvalidTexture(texture))?;

        let tex_w = entry.buffer.width() as i64;
        let tex_h = entry.buffer.height() as i64;
        let (x, y, w, h) = (x as i64, y as i64, width as i64, height as i64);
        if x < 0 || y < 0 || w < 0 || h < 0 || x + w > tex_w || y + h > tex_h {
            return Err(CompositorError::InvalidArgument {
                reason: format!(
                    "region {}x{} at ({}, {}) outside {}x{} texture",
                    width, height, x, y, tex_w, tex_h
                ),
            });
        }
        if w == 0 || h == 0 {
            return Ok(());
        }

        let bytes_per_pixel = entry.buffer.bytes_per_pixel() as usize;
        let stride = entry.buffer.stride_bytes();
        let row_len = w as usize * bytes_per_pixel;
        let last_row_end = entry.buffer.offset(x as u32, (y + h - 1) as u32) + row_len;
        if source.len() < last_row_end {
            return Err(CompositorError::InvalidArgument {
                reason: format!(
                    "region source length {} shorter than required {}",
                    source.len(),
                    last_row_end
                ),
            });
        }

        let mut offset = entry.buffer.offset(x as u32, y as u32);
        let data = entry.buffer.data_mut();
        for _ in 0..h {
            data[offset..offset + row_len].copy_from_slice(&source[offset..offset + row_len]);
            offset += stride;
        }
        Ok(())
    }

    /// Blits a texture rectangle into a window with clipping
    ///
    /// The destination rectangle is clipped against the window (see
    /// [`blit::clip_blit`] for the fixed order); a fully clipped call is a
    /// silent no-op that emits no event. The surviving source rectangle must
    /// lie inside the texture. Successful copies emit
    /// [`DisplayEvent::Drawn`].
    #[allow(clippy::too_many_arguments)]
    pub fn blit(
        &self,
        window: WindowId,
        texture: TextureId,
        src_x: i32,
        src_y: i32,
        width: i32,
        height: i32,
        dst_x: i32,
        dst_y: i32,
    ) -> Result<(), CompositorError> {
        {
            let mut state = self.write();
            let state = &mut *state;
            let win = state
                .windows
                .get_mut(&window)
                .ok_or(CompositorError::InvalidWindow(window))?;
            let tex = state
                .textures
                .get(&texture)
                .ok_or(CompositorError::InvalidTexture(texture))?;

            let clip = match clip_blit(
                src_x,
                src_y,
                width,
                height,
                dst_x,
                dst_y,
                win.buffer.width(),
                win.buffer.height(),
            ) {
                Some(clip) => clip,
                None => return Ok(()),
            };

            let tex_w = tex.buffer.width() as i64;
            let tex_h = tex.buffer.height() as i64;
            if clip.src_x < 0
                || clip.src_y < 0
                || clip.src_x + clip.width > tex_w
                || clip.src_y + clip.height > tex_h
            {
                return Err(CompositorError::InvalidArgument {
                    reason: format!(
                        "source rectangle {}x{} at ({}, {}) outside {}x{} texture",
                        clip.width, clip.height, clip.src_x, clip.src_y, tex_w, tex_h
                    ),
                });
            }

            let bytes_per_pixel = win.buffer.bytes_per_pixel() as usize;
            let row_len = clip.width as usize * bytes_per_pixel;
            let win_stride = win.buffer.stride_bytes();
            let tex_stride = tex.buffer.stride_bytes();
            let mut dst_offset = win.buffer.offset(clip.dst_x as u32, clip.dst_y as u32);
            let mut src_offset = tex.buffer.offset(clip.src_x as u32, clip.src_y as u32);
            let src = tex.buffer.data();
            let dst = win.buffer.data_mut();
            for _ in 0..clip.height {
                dst[dst_offset..dst_offset + row_len]
                    .copy_from_slice(&src[src_offset..src_offset + row_len]);
                dst_offset += win_stride;
                src_offset += tex_stride;
            }
        }
        self.events.publish(DisplayEvent::Drawn { window });
        Ok(())
    }

    /// Blits a texture's full surface to the window origin
    pub fn draw_texture(
        &self,
        window: WindowId,
        texture: TextureId,
    ) -> Result<(), CompositorError> {
        let (width, height) = {
            let state = self.read();
            let tex = state
                .textures
                .get(&texture)
                .ok_or(CompositorError::InvalidTexture(texture))?;
            (tex.buffer.width(), tex.buffer.height())
        };
        self.blit(window, texture, 0, 0, width as i32, height as i32, 0, 0)
    }

    /// Returns a copy of a window's current pixels
    ///
    /// The copy is taken under the compositor lock, so a presented frame is
    /// never torn by a concurrent blit.
    pub fn frame(&self, window: WindowId) -> Result<PixelBuffer, CompositorError> {
        let state = self.read();
        let entry = state
            .windows
            .get(&window)
            .ok_or(CompositorError::InvalidWindow(window))?;
        Ok(entry.buffer.clone())
    }

    /// Subscribes to window lifecycle and draw events from now on
    pub fn subscribe_events(&self) -> Subscriber<DisplayEvent> {
        self.events.subscribe()
    }

    /// Ends the event stream for every subscriber
    pub fn close_events(&self) {
        self.events.close();
    }

    /// Number of live windows
    pub fn window_count(&self) -> usize {
        self.read().windows.len()
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.read().textures.len()
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn rgba_window(compositor: &Compositor, width: u32, height: u32) -> WindowId {
        compositor
            .create_window(PixelEncoding::Rgba, width, height)
            .unwrap()
    }

    #[test]
    fn test_create_window_emits_event() {
        let compositor = Compositor::new();
        let mut events = compositor.subscribe_events();

        let id = rgba_window(&compositor, 320, 200);

        assert_eq!(compositor.window_count(), 1);
        assert_eq!(
            events.try_next(),
            Some(DisplayEvent::WindowCreated {
                window: id,
                width: 320,
                height: 200,
            })
        );
    }

    #[test]
    fn test_create_window_rejects_non_rgba() {
        let compositor = Compositor::new();
        for encoding in [PixelEncoding::Gray, PixelEncoding::Rgb565] {
            assert_eq!(
                compositor.create_window(encoding, 100, 100),
                Err(CompositorError::UnsupportedEncoding(encoding))
            );
        }
        assert_eq!(compositor.window_count(), 0);
    }

    #[test]
    fn test_destroy_window() {
        let compositor = Compositor::new();
        let id = rgba_window(&compositor, 64, 64);
        let mut events = compositor.subscribe_events();

        compositor.destroy_window(id).unwrap();
        assert_eq!(compositor.window_count(), 0);
        assert_eq!(
            events.try_next(),
            Some(DisplayEvent::WindowDestroyed { window: id })
        );
    }

    #[test]
    fn test_double_destroy_window_is_error_not_crash() {
        let compositor = Compositor::new();
        let id = rgba_window(&compositor, 64, 64);
        compositor.destroy_window(id).unwrap();
        assert_eq!(
            compositor.destroy_window(id),
            Err(CompositorError::InvalidWindow(id))
        );
    }

    #[test]
    fn test_set_title() {
        let compositor = Compositor::new();
        let id = rgba_window(&compositor, 64, 64);
        let mut events = compositor.subscribe_events();

        assert_eq!(compositor.window_title(id).unwrap(), None);
        compositor.set_title(id, "Launcher").unwrap();
        assert_eq!(
            compositor.window_title(id).unwrap(),
            Some("Launcher".to_string())
        );
        assert_eq!(
            events.try_next(),
            Some(DisplayEvent::TitleChanged {
                window: id,
                title: "Launcher".to_string(),
            })
        );
    }

    #[test]
    fn test_set_title_unknown_window() {
        let compositor = Compositor::new();
        let id = WindowId::new();
        assert_eq!(
            compositor.set_title(id, "x"),
            Err(CompositorError::InvalidWindow(id))
        );
    }

    #[test]
    fn test_create_texture_inherits_pixel_size() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 64, 64);
        let texture = compositor.create_texture(window, 16, 8).unwrap();

        // A full update of 16*8*4 bytes fits exactly.
        compositor
            .update_texture(texture, &pattern(16 * 8 * 4))
            .unwrap();
    }

    #[test]
    fn test_create_texture_unknown_window() {
        let compositor = Compositor::new();
        let id = WindowId::new();
        assert_eq!(
            compositor.create_texture(id, 16, 16),
            Err(CompositorError::InvalidWindow(id))
        );
    }

    #[test]
    fn test_destroy_texture_is_idempotent() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 64, 64);
        let texture = compositor.create_texture(window, 16, 16).unwrap();

        assert_eq!(compositor.destroy_texture(texture), Ok(()));
        assert_eq!(compositor.destroy_texture(texture), Ok(()));
        assert_eq!(compositor.destroy_texture(TextureId::new()), Ok(()));
    }

    #[test]
    fn test_update_texture_length_mismatch() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 64, 64);
        let texture = compositor.create_texture(window, 16, 16).unwrap();

        let result = compositor.update_texture(texture, &pattern(10));
        assert!(matches!(
            result,
            Err(CompositorError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_update_texture_unknown_handle() {
        let compositor = Compositor::new();
        let id = TextureId::new();
        assert_eq!(
            compositor.update_texture(id, &[]),
            Err(CompositorError::InvalidTexture(id))
        );
    }

    #[test]
    fn test_update_texture_region_copies_rows() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 64, 64);
        let texture = compositor.create_texture(window, 8, 4).unwrap();

        // Source uses the texture's own stride (8 px * 4 bpp = 32 bytes/row).
        let source = pattern(8 * 4 * 4);
        compositor
            .update_texture_region(texture, &source, 2, 1, 4, 2)
            .unwrap();

        compositor.draw_texture(window, texture).unwrap();
        let frame = compositor.frame(window).unwrap();
        // Inside the region the window mirrors the source bytes.
        let inside = frame.offset(2, 1);
        assert_eq!(frame.data()[inside..inside + 4 * 4], source[32 + 8..32 + 24]);
        // Outside the region the texture stayed zero.
        let outside = frame.offset(0, 0);
        assert_eq!(&frame.data()[outside..outside + 8], &[0; 8]);
    }

    #[test]
    fn test_update_texture_region_out_of_bounds() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 64, 64);
        let texture = compositor.create_texture(window, 8, 4).unwrap();
        let source = pattern(8 * 4 * 4);

        for (x, y, w, h) in [(6, 0, 4, 2), (0, 3, 2, 2), (-1, 0, 4, 2), (0, -2, 2, 2)] {
            let result = compositor.update_texture_region(texture, &source, x, y, w, h);
            assert!(
                matches!(result, Err(CompositorError::InvalidArgument { .. })),
                "expected rejection for region {:?}",
                (x, y, w, h)
            );
        }
    }

    #[test]
    fn test_update_texture_region_short_source() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 64, 64);
        let texture = compositor.create_texture(window, 8, 4).unwrap();

        let result = compositor.update_texture_region(texture, &pattern(16), 2, 1, 4, 2);
        assert!(matches!(
            result,
            Err(CompositorError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_blit_clips_left_edge() {
        // The canonical case: 100x100 window, 50x50 texture, blit at
        // (-10, 0) copies a 40x50 region from texture (10, 0) to window
        // (0, 0).
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 100, 100);
        let texture = compositor.create_texture(window, 50, 50).unwrap();
        let source = pattern(50 * 50 * 4);
        compositor.update_texture(texture, &source).unwrap();
        let mut events = compositor.subscribe_events();

        compositor
            .blit(window, texture, 0, 0, 50, 50, -10, 0)
            .unwrap();

        let frame = compositor.frame(window).unwrap();
        // Window (0, 0) holds texture (10, 0); window (39, 49) holds
        // texture (49, 49).
        let tex_stride = 50 * 4;
        assert_eq!(
            frame.data()[frame.offset(0, 0)..frame.offset(0, 0) + 4],
            source[10 * 4..10 * 4 + 4]
        );
        assert_eq!(
            frame.data()[frame.offset(39, 49)..frame.offset(39, 49) + 4],
            source[49 * tex_stride + 49 * 4..49 * tex_stride + 49 * 4 + 4]
        );
        // Column 40 onward was never written.
        assert_eq!(
            &frame.data()[frame.offset(40, 0)..frame.offset(40, 0) + 4],
            &[0; 4]
        );
        assert_eq!(events.try_next(), Some(DisplayEvent::Drawn { window }));
    }

    #[test]
    fn test_blit_fully_offscreen_is_silent_noop() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 100, 100);
        let texture = compositor.create_texture(window, 50, 50).unwrap();
        compositor
            .update_texture(texture, &pattern(50 * 50 * 4))
            .unwrap();
        let mut events = compositor.subscribe_events();

        compositor
            .blit(window, texture, 0, 0, 50, 50, 200, 200)
            .unwrap();

        let frame = compositor.frame(window).unwrap();
        assert!(frame.data().iter().all(|&b| b == 0));
        assert_eq!(events.try_next(), None);
    }

    #[test]
    fn test_blit_unknown_handles() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 100, 100);
        let texture = compositor.create_texture(window, 50, 50).unwrap();

        let stale_window = WindowId::new();
        assert_eq!(
            compositor.blit(stale_window, texture, 0, 0, 10, 10, 0, 0),
            Err(CompositorError::InvalidWindow(stale_window))
        );

        let stale_texture = TextureId::new();
        assert_eq!(
            compositor.blit(window, stale_texture, 0, 0, 10, 10, 0, 0),
            Err(CompositorError::InvalidTexture(stale_texture))
        );
    }

    #[test]
    fn test_blit_source_outside_texture() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 100, 100);
        let texture = compositor.create_texture(window, 50, 50).unwrap();

        let result = compositor.blit(window, texture, 40, 0, 20, 10, 0, 0);
        assert!(matches!(
            result,
            Err(CompositorError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_draw_texture_is_full_blit_at_origin() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 100, 100);
        let texture = compositor.create_texture(window, 50, 50).unwrap();
        let source = pattern(50 * 50 * 4);
        compositor.update_texture(texture, &source).unwrap();

        compositor.draw_texture(window, texture).unwrap();

        let frame = compositor.frame(window).unwrap();
        for y in [0u32, 25, 49] {
            let win_off = frame.offset(0, y);
            let tex_off = y as usize * 50 * 4;
            assert_eq!(
                frame.data()[win_off..win_off + 50 * 4],
                source[tex_off..tex_off + 50 * 4]
            );
        }
    }

    #[test]
    fn test_frame_unknown_window() {
        let compositor = Compositor::new();
        let id = WindowId::new();
        assert_eq!(
            compositor.frame(id).err(),
            Some(CompositorError::InvalidWindow(id))
        );
    }

    #[test]
    fn test_texture_survives_window_destruction() {
        let compositor = Compositor::new();
        let window = rgba_window(&compositor, 64, 64);
        let texture = compositor.create_texture(window, 16, 16).unwrap();
        compositor.destroy_window(window).unwrap();

        assert_eq!(compositor.texture_count(), 1);
        compositor
            .update_texture(texture, &pattern(16 * 16 * 4))
            .unwrap();
    }

    #[test]
    fn test_close_events_ends_subscribers() {
        let compositor = Compositor::new();
        let mut events = compositor.subscribe_events();
        compositor.close_events();
        assert_eq!(events.next(), None);
    }
}
