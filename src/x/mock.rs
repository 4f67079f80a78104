//! A mock implementation of [Platform] that is easier to implement for use in tests.
use crate::{
    pure::geometry::Rect,
    x::{Platform, PointerState, XEvent},
    Result, Xid,
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    os::unix::io::RawFd,
};

/// All methods on this trait are no-ops by default unless an implementation is provided.
/// `mock_poll_event` returns `None`, `mock_query_pointer` a default [PointerState] and
/// `mock_create_window` always returns id 1.
///
/// Any implementation of `MockPlatform` will automatically implement [Platform] by forwarding
/// on calls to `$method` to `mock_$method`.
#[allow(unused_variables)]
pub trait MockPlatform {
    /// Mocked version of [Platform::connection_fd]
    fn mock_connection_fd(&self) -> Option<RawFd> {
        None
    }

    /// Mocked version of [Platform::poll_event]
    fn mock_poll_event(&self) -> Result<Option<XEvent>> {
        Ok(None)
    }

    /// Mocked version of [Platform::query_pointer]
    fn mock_query_pointer(&self, id: Xid) -> Result<PointerState> {
        Ok(PointerState::default())
    }

    /// Mocked version of [Platform::create_window]
    fn mock_create_window(&self, r: Rect, title: &str) -> Result<Xid> {
        Ok(Xid(1))
    }

    /// Mocked version of [Platform::destroy_window]
    fn mock_destroy_window(&self, id: Xid) -> Result<()> {
        Ok(())
    }

    /// Mocked version of [Platform::map]
    fn mock_map(&self, id: Xid) -> Result<()> {
        Ok(())
    }

    /// Mocked version of [Platform::unmap]
    fn mock_unmap(&self, id: Xid) -> Result<()> {
        Ok(())
    }

    /// Mocked version of [Platform::configure]
    fn mock_configure(&self, id: Xid, r: Rect) -> Result<()> {
        Ok(())
    }

    /// Mocked version of [Platform::set_title]
    fn mock_set_title(&self, id: Xid, title: &str) -> Result<()> {
        Ok(())
    }

    /// Mocked version of [Platform::set_auto_repeat]
    fn mock_set_auto_repeat(&self, on: bool) -> Result<()> {
        Ok(())
    }

    /// Mocked version of [Platform::flush]
    fn mock_flush(&self) {}
}

impl<T> Platform for T
where
    T: MockPlatform,
{
    fn connection_fd(&self) -> Option<RawFd> {
        self.mock_connection_fd()
    }

    fn poll_event(&self) -> Result<Option<XEvent>> {
        self.mock_poll_event()
    }

    fn query_pointer(&self, id: Xid) -> Result<PointerState> {
        self.mock_query_pointer(id)
    }

    fn create_window(&self, r: Rect, title: &str) -> Result<Xid> {
        self.mock_create_window(r, title)
    }

    fn destroy_window(&self, id: Xid) -> Result<()> {
        self.mock_destroy_window(id)
    }

    fn map(&self, id: Xid) -> Result<()> {
        self.mock_map(id)
    }

    fn unmap(&self, id: Xid) -> Result<()> {
        self.mock_unmap(id)
    }

    fn configure(&self, id: Xid, r: Rect) -> Result<()> {
        self.mock_configure(id, r)
    }

    fn set_title(&self, id: Xid, title: &str) -> Result<()> {
        self.mock_set_title(id, title)
    }

    fn set_auto_repeat(&self, on: bool) -> Result<()> {
        self.mock_set_auto_repeat(on)
    }

    fn flush(&self) {
        self.mock_flush()
    }
}

/// A window system request recorded by [ScriptedPlatform].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A window was created
    Create(Xid, Rect),
    /// A window was destroyed
    Destroy(Xid),
    /// A window was mapped
    Map(Xid),
    /// A window was unmapped
    Unmap(Xid),
    /// A window was moved / resized
    Configure(Xid, Rect),
    /// A window title was set
    Title(Xid, String),
    /// Keyboard auto-repeat was toggled
    AutoRepeat(bool),
}

/// A [MockPlatform] that replays a scripted queue of events and records every request made of
/// it. Window ids are handed out sequentially starting from 100.
#[derive(Debug)]
pub struct ScriptedPlatform {
    events: RefCell<VecDeque<XEvent>>,
    ops: RefCell<Vec<Op>>,
    pointer: Cell<PointerState>,
    next_id: Cell<u32>,
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self {
            events: RefCell::new(VecDeque::new()),
            ops: RefCell::new(Vec::new()),
            pointer: Cell::new(PointerState::default()),
            next_id: Cell::new(100),
        }
    }
}

impl ScriptedPlatform {
    /// Create a new ScriptedPlatform with an empty event queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the back of the queue.
    pub fn push_event(&self, e: XEvent) {
        self.events.borrow_mut().push_back(e);
    }

    /// Append several events to the back of the queue.
    pub fn push_events(&self, es: impl IntoIterator<Item = XEvent>) {
        self.events.borrow_mut().extend(es);
    }

    /// The number of events still waiting to be read.
    pub fn queued(&self) -> usize {
        self.events.borrow().len()
    }

    /// Set the state returned by `query_pointer`.
    pub fn set_pointer(&self, p: PointerState) {
        self.pointer.set(p);
    }

    /// Every request made so far, in order.
    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    /// Forget all recorded requests.
    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    fn record(&self, op: Op) {
        self.ops.borrow_mut().push(op);
    }
}

impl MockPlatform for ScriptedPlatform {
    fn mock_poll_event(&self) -> Result<Option<XEvent>> {
        Ok(self.events.borrow_mut().pop_front())
    }

    fn mock_query_pointer(&self, _: Xid) -> Result<PointerState> {
        Ok(self.pointer.get())
    }

    fn mock_create_window(&self, r: Rect, title: &str) -> Result<Xid> {
        let id = Xid(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.record(Op::Create(id, r));
        self.record(Op::Title(id, title.to_string()));

        Ok(id)
    }

    fn mock_destroy_window(&self, id: Xid) -> Result<()> {
        self.record(Op::Destroy(id));
        Ok(())
    }

    fn mock_map(&self, id: Xid) -> Result<()> {
        self.record(Op::Map(id));
        Ok(())
    }

    fn mock_unmap(&self, id: Xid) -> Result<()> {
        self.record(Op::Unmap(id));
        Ok(())
    }

    fn mock_configure(&self, id: Xid, r: Rect) -> Result<()> {
        self.record(Op::Configure(id, r));
        Ok(())
    }

    fn mock_set_title(&self, id: Xid, title: &str) -> Result<()> {
        self.record(Op::Title(id, title.to_string()));
        Ok(())
    }

    fn mock_set_auto_repeat(&self, on: bool) -> Result<()> {
        self.record(Op::AutoRepeat(on));
        Ok(())
    }
}
