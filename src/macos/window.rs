use super::main_screen_height;
use crate::backend::WindowHandle;
use crate::events::{FrameCallback, FrameEventAdapter, Subscription, WindowNotification};
use crate::{Frame, Result};
use cocoa::base::{id, nil, BOOL, YES};
use cocoa::foundation::{NSPoint, NSRect, NSSize, NSString};
use objc::declare::ClassDecl;
use objc::runtime::{Class, Object, Sel};
use objc::{class, msg_send, sel, sel_impl};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

// Floating panels sit at NSFloatingWindowLevel; 0 is NSNormalWindowLevel.
const FLOATING_WINDOW_LEVEL: i64 = 3;
const NORMAL_WINDOW_LEVEL: i64 = 0;

/// An NSWindow exposed through the crate's `WindowHandle` seam.
///
/// All calls must happen on the main thread, which owns the AppKit event
/// loop; the Send/Sync impls exist only to satisfy the trait bounds of the
/// single-threaded cooperative model.
pub struct MacosWindow {
    window: id,
}

unsafe impl Send for MacosWindow {}
unsafe impl Sync for MacosWindow {}

impl MacosWindow {
    /// Wrap an NSWindow owned by the toolkit. The handle never releases it.
    ///
    /// # Safety
    /// `window` must point to a live NSWindow and outlive this handle.
    pub unsafe fn from_nswindow(window: id) -> Self {
        Self { window }
    }

    fn read_frame(window: id) -> Option<Frame> {
        if window == nil {
            return None;
        }
        unsafe {
            let frame: NSRect = msg_send![window, frame];
            Some(flip_to_top_left(frame))
        }
    }
}

/// Cocoa frames are bottom-left origin; the cache stores top-left.
fn flip_to_top_left(frame: NSRect) -> Frame {
    let screen_height = main_screen_height();
    let y = screen_height - frame.origin.y - frame.size.height;
    Frame::new(
        frame.origin.x as i32,
        y as i32,
        frame.size.width as u32,
        frame.size.height as u32,
    )
}

fn flip_to_bottom_left(frame: Frame) -> NSRect {
    let screen_height = main_screen_height();
    let y = screen_height - frame.y as f64 - frame.height as f64;
    NSRect::new(
        NSPoint::new(frame.x as f64, y),
        NSSize::new(frame.width as f64, frame.height as f64),
    )
}

impl WindowHandle for MacosWindow {
    fn frame(&self) -> Option<Frame> {
        if !self.is_open() {
            return None;
        }
        Self::read_frame(self.window)
    }

    fn apply_frame(&self, frame: Frame) -> Result<()> {
        if self.window == nil {
            anyhow::bail!("window handle is nil");
        }
        let rect = flip_to_bottom_left(frame);
        unsafe {
            let _: () = msg_send![self.window, setFrame: rect display: YES];
        }
        Ok(())
    }

    fn set_floating(&self, floating: bool) -> Result<()> {
        if self.window == nil {
            anyhow::bail!("window handle is nil");
        }
        let level = if floating {
            FLOATING_WINDOW_LEVEL
        } else {
            NORMAL_WINDOW_LEVEL
        };
        unsafe {
            let _: () = msg_send![self.window, setLevel: level];
        }
        Ok(())
    }

    fn raise(&self) {
        if self.window == nil {
            return;
        }
        unsafe {
            let _: () = msg_send![self.window, makeKeyAndOrderFront: nil];
        }
    }

    fn is_open(&self) -> bool {
        if self.window == nil {
            return false;
        }
        let visible: BOOL = unsafe { msg_send![self.window, isVisible] };
        visible == YES
    }

    fn subscribe_frame_end(&self, callback: FrameCallback) -> Option<Subscription> {
        if self.window == nil {
            return None;
        }

        let adapter = Arc::new(Mutex::new(FrameEventAdapter::new(callback)));

        unsafe {
            let observer: id = msg_send![observer_class(), new];
            (*observer).set_ivar(
                ADAPTER_IVAR,
                Box::into_raw(Box::new(Arc::clone(&adapter))) as *const std::ffi::c_void,
            );

            let center: id = msg_send![class!(NSNotificationCenter), defaultCenter];
            for (name, selector) in [
                ("NSWindowWillMoveNotification", sel!(windowWillMove:)),
                ("NSWindowDidMoveNotification", sel!(windowDidMove:)),
                (
                    "NSWindowWillStartLiveResizeNotification",
                    sel!(windowWillStartLiveResize:),
                ),
                (
                    "NSWindowDidEndLiveResizeNotification",
                    sel!(windowDidEndLiveResize:),
                ),
                ("NSWindowWillCloseNotification", sel!(windowWillClose:)),
            ] {
                let name = NSString::alloc(nil).init_str(name);
                let _: () = msg_send![center,
                    addObserver: observer
                    selector: selector
                    name: name
                    object: self.window
                ];
            }

            log::debug!("Subscribed to frame notifications for NSWindow");

            let observer_addr = observer as usize;
            Some(Subscription::new(move || unsafe {
                let observer = observer_addr as id;
                let center: id = msg_send![class!(NSNotificationCenter), defaultCenter];
                let _: () = msg_send![center, removeObserver: observer];

                // Reclaim the adapter smuggled through the ivar.
                let ptr: *const std::ffi::c_void = *(*observer).get_ivar(ADAPTER_IVAR);
                if !ptr.is_null() {
                    drop(Box::from_raw(
                        ptr as *mut Arc<Mutex<FrameEventAdapter>>,
                    ));
                }
                let _: () = msg_send![observer, release];
            }))
        }
    }
}

const ADAPTER_IVAR: &str = "wintrack_adapter";

/// Register the observer class once per process; NSNotificationCenter
/// callbacks land on its methods and feed the adapter.
fn observer_class() -> &'static Class {
    static CLASS: Lazy<usize> = Lazy::new(|| {
        let superclass = class!(NSObject);
        let mut decl = ClassDecl::new("WintrackFrameObserver", superclass)
            .expect("observer class already registered");

        decl.add_ivar::<*const std::ffi::c_void>(ADAPTER_IVAR);

        unsafe {
            decl.add_method(
                sel!(windowWillMove:),
                window_will_move as extern "C" fn(&Object, Sel, id),
            );
            decl.add_method(
                sel!(windowDidMove:),
                window_did_move as extern "C" fn(&Object, Sel, id),
            );
            decl.add_method(
                sel!(windowWillStartLiveResize:),
                window_will_start_live_resize as extern "C" fn(&Object, Sel, id),
            );
            decl.add_method(
                sel!(windowDidEndLiveResize:),
                window_did_end_live_resize as extern "C" fn(&Object, Sel, id),
            );
            decl.add_method(
                sel!(windowWillClose:),
                window_will_close as extern "C" fn(&Object, Sel, id),
            );
        }

        decl.register() as *const Class as usize
    });

    unsafe { &*(*CLASS as *const Class) }
}

fn notify(observer: &Object, notification: WindowNotification) {
    let adapter = unsafe {
        let ptr: *const std::ffi::c_void = *observer.get_ivar(ADAPTER_IVAR);
        if ptr.is_null() {
            return;
        }
        let boxed = &*(ptr as *const Arc<Mutex<FrameEventAdapter>>);
        Arc::clone(boxed)
    };
    adapter.lock().unwrap().notify(notification);
}

fn notification_frame(notification: id) -> Option<Frame> {
    unsafe {
        let window: id = msg_send![notification, object];
        MacosWindow::read_frame(window)
    }
}

extern "C" fn window_will_move(observer: &Object, _cmd: Sel, _notification: id) {
    notify(observer, WindowNotification::MoveStarted);
}

extern "C" fn window_did_move(observer: &Object, _cmd: Sel, notification: id) {
    if let Some(frame) = notification_frame(notification) {
        notify(observer, WindowNotification::MoveEnded(frame));
    }
}

extern "C" fn window_will_start_live_resize(observer: &Object, _cmd: Sel, _notification: id) {
    notify(observer, WindowNotification::ResizeStarted);
}

extern "C" fn window_did_end_live_resize(observer: &Object, _cmd: Sel, notification: id) {
    if let Some(frame) = notification_frame(notification) {
        notify(observer, WindowNotification::ResizeEnded(frame));
    }
}

extern "C" fn window_will_close(observer: &Object, _cmd: Sel, _notification: id) {
    notify(observer, WindowNotification::Closed);
}
