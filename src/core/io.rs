//! Watching file descriptors alongside the window system connection
//!
//! Records are kept in registration order (newest first) and a snapshot of the aggregate
//! interest per descriptor is rebuilt whenever the set of records changes. A wait works from a
//! copy of that snapshot so callbacks that register or unregister descriptors while a pass is
//! in progress never disturb the pass itself.
//!
//! A callback is allowed to unregister its own record while it is running. Records whose mask
//! becomes empty are moved to a free list rather than being dropped so that the callback being
//! run still has somewhere to be returned to: the free list is only drained before and after a
//! full wait and dispatch pass.
use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags},
};
use std::{fmt, os::unix::io::RawFd, time::Duration};
use tracing::{debug, error, trace, warn};

bitflags::bitflags! {
    /// The conditions a file descriptor can be watched for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IoMask: u8 {
        /// Readable (including end of file and hang up)
        const READ = 1 << 0;
        /// Writable
        const WRITE = 1 << 1;
        /// Exceptional condition (out of band data)
        const EXCEPT = 1 << 2;
    }
}

impl IoMask {
    const DIRECTIONS: [IoMask; 3] = [IoMask::READ, IoMask::WRITE, IoMask::EXCEPT];

    fn poll_flags(&self) -> PollFlags {
        let mut flags = PollFlags::empty();
        if self.contains(Self::READ) {
            flags |= PollFlags::POLLIN;
        }
        if self.contains(Self::WRITE) {
            flags |= PollFlags::POLLOUT;
        }
        if self.contains(Self::EXCEPT) {
            flags |= PollFlags::POLLPRI;
        }

        flags
    }

    fn from_revents(revents: PollFlags) -> Self {
        let mut mask = IoMask::empty();
        if revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR) {
            mask |= Self::READ;
        }
        if revents.contains(PollFlags::POLLOUT) {
            mask |= Self::WRITE;
        }
        if revents.contains(PollFlags::POLLPRI) {
            mask |= Self::EXCEPT;
        }

        mask
    }
}

/// A handle identifying a registered I/O callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoId(u64);

/// A callback run when a watched descriptor becomes ready. It is called once per ready
/// direction with the descriptor and the direction that fired.
pub type IoCallback<C> = Box<dyn FnMut(&mut C, RawFd, IoMask)>;

struct IoRecord<C> {
    id: IoId,
    fd: RawFd,
    mask: IoMask,
    callback: Option<IoCallback<C>>,
}

impl<C> fmt::Debug for IoRecord<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoRecord")
            .field("id", &self.id)
            .field("fd", &self.fd)
            .field("mask", &self.mask)
            .field("running", &self.callback.is_none())
            .finish()
    }
}

/// Anything that owns an [IoWatches] registry whose callbacks expect to be given it.
pub trait HasIoWatches: Sized {
    /// The registry of watched descriptors
    fn io_watches(&mut self) -> &mut IoWatches<Self>;
}

/// The set of file descriptors being watched and the callbacks to run when they are ready.
pub struct IoWatches<C> {
    active: Vec<IoRecord<C>>,
    free_list: Vec<IoRecord<C>>,
    snapshot: Vec<(RawFd, IoMask)>,
    next_id: u64,
}

impl<C> fmt::Debug for IoWatches<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoWatches")
            .field("active", &self.active)
            .field("free_list", &self.free_list.len())
            .finish()
    }
}

impl<C> Default for IoWatches<C> {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            free_list: Vec::new(),
            snapshot: Vec::new(),
            next_id: 0,
        }
    }
}

impl<C> IoWatches<C> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether or not any descriptors are being watched.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// The number of records waiting on the free list.
    pub fn pending_free(&self) -> usize {
        self.free_list.len()
    }

    /// The aggregate interest for each watched descriptor.
    pub fn snapshot(&self) -> &[(RawFd, IoMask)] {
        &self.snapshot
    }

    /// Start watching `fd` for the conditions in `mask`. Negative descriptors are logged and
    /// ignored, returning `None`.
    pub fn register(&mut self, fd: RawFd, mask: IoMask, callback: IoCallback<C>) -> Option<IoId> {
        if fd < 0 {
            error!(fd, "refusing to watch an invalid file descriptor");
            return None;
        }

        let id = IoId(self.next_id);
        self.next_id += 1;
        trace!(fd, ?mask, ?id, "registering io callback");

        self.active.insert(
            0,
            IoRecord {
                id,
                fd,
                mask,
                callback: Some(callback),
            },
        );
        self.rebuild_snapshot();

        Some(id)
    }

    /// Stop watching `fd` for the conditions in `mask` on behalf of the callback identified by
    /// `id`. Returns `false` if no matching record was found.
    pub fn unregister(&mut self, fd: RawFd, mask: IoMask, id: IoId) -> bool {
        self.clear_matching(fd, mask, Some(id))
    }

    /// Stop watching `fd` for the conditions in `mask` for every registered callback.
    pub fn unregister_fd(&mut self, fd: RawFd, mask: IoMask) -> bool {
        self.clear_matching(fd, mask, None)
    }

    fn clear_matching(&mut self, fd: RawFd, mask: IoMask, id: Option<IoId>) -> bool {
        let mut found = false;
        let mut ix = 0;

        while ix < self.active.len() {
            let r = &mut self.active[ix];
            if r.fd == fd && r.mask.intersects(mask) && id.map(|id| id == r.id).unwrap_or(true) {
                found = true;
                r.mask.remove(mask);
                if r.mask.is_empty() {
                    trace!(fd, id = ?r.id, "io record emptied: deferring free");
                    let rec = self.active.remove(ix);
                    self.free_list.push(rec);
                    continue;
                }
            }
            ix += 1;
        }

        if !found {
            debug!(fd, ?mask, ?id, "no matching io record to unregister");
        }
        self.rebuild_snapshot();

        found
    }

    fn rebuild_snapshot(&mut self) {
        self.snapshot.clear();
        for r in self.active.iter() {
            match self.snapshot.iter_mut().find(|(fd, _)| *fd == r.fd) {
                Some((_, m)) => *m |= r.mask,
                None => self.snapshot.push((r.fd, r.mask)),
            }
        }
    }

    fn drain_free_list(&mut self) {
        if !self.free_list.is_empty() {
            trace!(n = self.free_list.len(), "draining io free list");
            self.free_list.clear();
        }
    }

    fn take_callback(&mut self, id: IoId, dir: IoMask) -> Option<IoCallback<C>> {
        self.active
            .iter_mut()
            .find(|r| r.id == id && r.mask.contains(dir))
            .and_then(|r| r.callback.take())
    }

    fn restore_callback(&mut self, id: IoId, cb: IoCallback<C>) {
        let rec = self
            .active
            .iter_mut()
            .chain(self.free_list.iter_mut())
            .find(|r| r.id == id);

        if let Some(r) = rec {
            r.callback = Some(cb);
        }
    }
}

impl<C> IoWatches<C>
where
    C: HasIoWatches,
{
    /// Block for up to `timeout` waiting for any watched descriptor (or `extra`, typically the
    /// window system connection) to become ready, then run the callback of every ready record
    /// once per ready direction.
    ///
    /// Returns whether `extra` became readable. Interrupted or failed waits are logged and
    /// treated as a wait in which nothing became ready.
    pub fn wait(ctx: &mut C, timeout: Duration, extra: Option<RawFd>) -> bool {
        let io = ctx.io_watches();
        io.drain_free_list();
        let snapshot = io.snapshot.clone();

        let mut fds: Vec<PollFd> = snapshot
            .iter()
            .map(|(fd, mask)| PollFd::new(*fd, mask.poll_flags()))
            .collect();
        if let Some(fd) = extra {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }

        let ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        match poll(&mut fds, ms) {
            Ok(_) => (),
            Err(Errno::EINTR) => {
                warn!("wait for io interrupted by a signal");
                ctx.io_watches().drain_free_list();
                return false;
            }
            Err(e) => {
                error!(%e, "wait for io failed");
                ctx.io_watches().drain_free_list();
                return false;
            }
        }

        let revents = |pfd: &PollFd| pfd.revents().unwrap_or_else(PollFlags::empty);
        let extra_ready = extra.is_some()
            && fds
                .last()
                .map(|pfd| !revents(pfd).is_empty())
                .unwrap_or(false);

        let ready: Vec<(RawFd, IoMask)> = snapshot
            .iter()
            .zip(fds.iter())
            .map(|((fd, wanted), pfd)| {
                if revents(pfd).contains(PollFlags::POLLNVAL) {
                    warn!(fd, "watched file descriptor is not open");
                }
                (*fd, IoMask::from_revents(revents(pfd)) & *wanted)
            })
            .filter(|(_, m)| !m.is_empty())
            .collect();

        for (fd, mask) in ready {
            let ids: Vec<IoId> = ctx
                .io_watches()
                .active
                .iter()
                .filter(|r| r.fd == fd)
                .map(|r| r.id)
                .collect();

            for id in ids {
                for dir in IoMask::DIRECTIONS.iter().filter(|d| mask.contains(**d)) {
                    if let Some(mut cb) = ctx.io_watches().take_callback(id, *dir) {
                        trace!(fd, ?dir, ?id, "running io callback");
                        cb(ctx, fd, *dir);
                        ctx.io_watches().restore_callback(id, cb);
                    }
                }
            }
        }

        ctx.io_watches().drain_free_list();

        extra_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, os::unix::io::AsRawFd, os::unix::net::UnixStream};

    #[derive(Debug, Default)]
    struct Ctx {
        io: IoWatches<Ctx>,
        calls: Vec<(RawFd, IoMask)>,
        own_id: Option<IoId>,
    }

    impl HasIoWatches for Ctx {
        fn io_watches(&mut self) -> &mut IoWatches<Self> {
            &mut self.io
        }
    }

    fn record() -> IoCallback<Ctx> {
        Box::new(|c: &mut Ctx, fd, dir| c.calls.push((fd, dir)))
    }

    fn readable_pair() -> (UnixStream, UnixStream) {
        let (a, mut b) = UnixStream::pair().unwrap();
        b.write_all(b"x").unwrap();

        (a, b)
    }

    #[test]
    fn negative_fds_are_rejected() {
        let mut io: IoWatches<Ctx> = IoWatches::new();

        assert!(io.register(-1, IoMask::READ, record()).is_none());
        assert!(io.is_empty());
    }

    #[test]
    fn readable_fd_fires_once_then_not_after_unregister() {
        let (a, _b) = readable_pair();
        let fd = a.as_raw_fd();
        let mut ctx = Ctx::default();
        let id = ctx.io.register(fd, IoMask::READ, record()).unwrap();

        IoWatches::wait(&mut ctx, Duration::from_millis(100), None);
        assert_eq!(ctx.calls, vec![(fd, IoMask::READ)]);

        assert!(ctx.io.unregister(fd, IoMask::READ, id));
        IoWatches::wait(&mut ctx, Duration::from_millis(10), None);
        assert_eq!(ctx.calls.len(), 1);
    }

    #[test]
    fn each_ready_direction_fires_separately() {
        let (a, _b) = readable_pair();
        let fd = a.as_raw_fd();
        let mut ctx = Ctx::default();
        ctx.io
            .register(fd, IoMask::READ | IoMask::WRITE, record())
            .unwrap();

        IoWatches::wait(&mut ctx, Duration::from_millis(100), None);

        assert_eq!(ctx.calls, vec![(fd, IoMask::READ), (fd, IoMask::WRITE)]);
    }

    #[test]
    fn partial_unregister_keeps_the_record() {
        let (a, _b) = readable_pair();
        let fd = a.as_raw_fd();
        let mut ctx = Ctx::default();
        let id = ctx
            .io
            .register(fd, IoMask::READ | IoMask::WRITE, record())
            .unwrap();

        ctx.io.unregister(fd, IoMask::WRITE, id);

        assert_eq!(ctx.io.snapshot(), &[(fd, IoMask::READ)]);
        assert_eq!(ctx.io.pending_free(), 0);
    }

    #[test]
    fn callback_can_unregister_itself() {
        let (a, _b) = readable_pair();
        let fd = a.as_raw_fd();
        let mut ctx = Ctx::default();
        let id = ctx
            .io
            .register(
                fd,
                IoMask::READ,
                Box::new(|c: &mut Ctx, fd, dir| {
                    c.calls.push((fd, dir));
                    if let Some(id) = c.own_id {
                        c.io.unregister(fd, IoMask::READ, id);
                    }
                }),
            )
            .unwrap();
        ctx.own_id = Some(id);

        IoWatches::wait(&mut ctx, Duration::from_millis(100), None);
        assert_eq!(ctx.calls.len(), 1);
        assert!(ctx.io.is_empty());
        assert_eq!(ctx.io.pending_free(), 0);

        IoWatches::wait(&mut ctx, Duration::from_millis(10), None);
        assert_eq!(ctx.calls.len(), 1);
    }

    #[test]
    fn extra_fd_readiness_is_reported() {
        let (a, _b) = readable_pair();
        let mut ctx = Ctx::default();

        assert!(IoWatches::wait(&mut ctx, Duration::from_millis(100), Some(a.as_raw_fd())));
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn snapshot_aggregates_per_fd() {
        let mut ctx = Ctx::default();
        ctx.io.register(3, IoMask::READ, record()).unwrap();
        ctx.io.register(3, IoMask::EXCEPT, record()).unwrap();
        ctx.io.register(4, IoMask::WRITE, record()).unwrap();

        let mut snap = ctx.io.snapshot().to_vec();
        snap.sort_by_key(|(fd, _)| *fd);

        assert_eq!(snap, vec![(3, IoMask::READ | IoMask::EXCEPT), (4, IoMask::WRITE)]);
    }
}
