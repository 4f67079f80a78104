#![allow(dead_code)]
use std::{cell::RefCell, rc::Rc};
use xforms::{
    core::{
        event::{Event, EventKind, Outcome},
        keys::{KeySym, ModMask},
        object::{KeyInterest, ObjFlags, ObjectState, Widget},
    },
    pure::geometry::Point,
    x::{mock::ScriptedPlatform, KeyEvent, MouseButton, PointerEvent, XEvent},
    Config, Dispatcher, ObjectId, Xid,
};

/// The window id handed out for the first form shown on a fresh [ScriptedPlatform].
pub fn win() -> Xid {
    Xid::from(100)
}

pub type D = Dispatcher<ScriptedPlatform>;

pub fn dispatcher() -> D {
    dispatcher_with(Config::default())
}

pub fn dispatcher_with(config: Config) -> D {
    Dispatcher::new(config, ScriptedPlatform::new()).expect("valid config")
}

fn pointer(pos: (i32, i32), button: Option<MouseButton>, time: u32) -> PointerEvent {
    PointerEvent {
        id: win(),
        pos: Point::from(pos),
        button,
        state: ModMask::empty(),
        time,
    }
}

pub fn press(pos: (i32, i32)) -> XEvent {
    press_at(pos, 0)
}

pub fn press_at(pos: (i32, i32), time: u32) -> XEvent {
    XEvent::ButtonPress(pointer(pos, Some(MouseButton::Left), time))
}

pub fn release(pos: (i32, i32)) -> XEvent {
    XEvent::ButtonRelease(pointer(pos, Some(MouseButton::Left), 0))
}

pub fn motion(pos: (i32, i32)) -> XEvent {
    XEvent::Motion(pointer(pos, None, 0))
}

pub fn key(sym: KeySym) -> XEvent {
    key_with(sym, ModMask::empty())
}

pub fn key_with(sym: KeySym, state: ModMask) -> XEvent {
    XEvent::KeyPress(KeyEvent {
        id: win(),
        sym,
        pos: Point::default(),
        state,
        time: 0,
    })
}

/// Run non-blocking passes until every scripted event has been handled, returning everything
/// that was reported along the way.
pub fn drain(d: &mut D) -> Vec<ObjectId> {
    let mut reported = vec![];

    loop {
        if let Some(id) = d.check_forms().expect("check_forms") {
            reported.push(id);
            continue;
        }

        if d.platform().queued() == 0 && !d.has_pending_events() {
            return reported;
        }
    }
}

/// A widget that records every event it is sent and every draw.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub seen: Rc<RefCell<Vec<EventKind>>>,
    pub draws: Rc<RefCell<usize>>,
    pub frees: Rc<RefCell<usize>>,
    pub flags: ObjFlags,
    pub keys: KeyInterest,
}

impl Recorder {
    pub fn with_flags(flags: ObjFlags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    pub fn with_keys(keys: KeyInterest) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.seen.borrow().iter().filter(|&&k| k == kind).count()
    }
}

impl Widget for Recorder {
    fn handle(&mut self, _: &mut ObjectState, e: &Event) -> Outcome {
        self.seen.borrow_mut().push(e.kind);
        Outcome::NONE
    }

    fn init(&mut self, obj: &mut ObjectState) {
        obj.set_flags(self.flags, true);
        obj.set_key_interest(self.keys);
    }

    fn draw(&mut self, _: &ObjectState) {
        *self.draws.borrow_mut() += 1;
    }

    fn on_free(&mut self, _: &mut ObjectState) {
        *self.frees.borrow_mut() += 1;
    }
}
