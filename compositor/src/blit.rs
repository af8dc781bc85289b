//! Blit rectangle clipping.
//!
//! The clip order is protocol: shift-then-clamp on the left/top edges first,
//! then shrink against the right/bottom edges. Reordering these steps moves
//! pixels by one at window edges.

/// A blit rectangle after clipping against the destination
///
/// Source coordinates are kept signed: the caller still has to check them
/// against the source buffer's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedBlit {
    pub src_x: i64,
    pub src_y: i64,
    pub width: i64,
    pub height: i64,
    pub dst_x: i64,
    pub dst_y: i64,
}

/// Clips a `width`×`height` copy targeted at (`dst_x`, `dst_y`) against a
/// destination of `dst_width`×`dst_height`
///
/// A negative destination origin shifts the source origin by the same amount
/// and clamps the destination to the edge; the rectangle is then shrunk
/// against the far edges. Returns `None` when nothing remains to copy,
/// which is a valid no-op, not an error.
pub fn clip_blit(
    src_x: i32,
    src_y: i32,
    width: i32,
    height: i32,
    dst_x: i32,
    dst_y: i32,
    dst_width: u32,
    dst_height: u32,
) -> Option<ClippedBlit> {
    let mut sx = src_x as i64;
    let mut sy = src_y as i64;
    let mut w = width as i64;
    let mut h = height as i64;
    let mut dx = dst_x as i64;
    let mut dy = dst_y as i64;
    let dw = dst_width as i64;
    let dh = dst_height as i64;

    if dx < 0 {
        let diff = -dx;
        sx += diff;
        w -= diff;
        dx = 0;
    }
    if dy < 0 {
        let diff = -dy;
        sy += diff;
        h -= diff;
        dy = 0;
    }
    if dx + w > dw {
        w = dw - dx;
    }
    if dy + h > dh {
        h = dh - dy;
    }
    if w <= 0 || h <= 0 || dx >= dw || dy >= dh {
        return None;
    }

    Some(ClippedBlit {
        src_x: sx,
        src_y: sy,
        width: w,
        height: h,
        dst_x: dx,
        dst_y: dy,
    })
}
