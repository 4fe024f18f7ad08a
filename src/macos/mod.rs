mod window;

pub use window::MacosWindow;

use crate::Frame;
use core_graphics::display::{CGDisplayBounds, CGMainDisplayID};

/// Bounds of the main display, top-left origin.
pub fn main_screen_frame() -> Frame {
    let bounds = unsafe { CGDisplayBounds(CGMainDisplayID()) };
    Frame::new(
        bounds.origin.x as i32,
        bounds.origin.y as i32,
        bounds.size.width as u32,
        bounds.size.height as u32,
    )
}

pub(crate) fn main_screen_height() -> f64 {
    let bounds = unsafe { CGDisplayBounds(CGMainDisplayID()) };
    bounds.size.height
}
