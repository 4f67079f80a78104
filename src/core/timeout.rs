//! One shot timeouts and the single idle callback slot
use std::{
    fmt,
    time::{Duration, Instant},
};
use tracing::trace;

/// A handle on a pending timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutId(u64);

/// A callback run once when its timeout expires.
pub type TimeoutCallback<C> = Box<dyn FnMut(&mut C, TimeoutId)>;

/// The callback run once per idle pass.
pub type IdleCallback<C> = Box<dyn FnMut(&mut C)>;

/// Anything that owns a timeout queue and idle slot whose callbacks expect to be given it.
pub trait HasTimers: Sized {
    /// The pending timeouts
    fn timeouts(&mut self) -> &mut Timeouts<Self>;
    /// The idle callback slot
    fn idle(&mut self) -> &mut IdleSlot<Self>;
}

struct Pending<C> {
    id: TimeoutId,
    deadline: Instant,
    callback: TimeoutCallback<C>,
}

/// A queue of one shot timeouts.
pub struct Timeouts<C> {
    pending: Vec<Pending<C>>,
    next_id: u64,
}

impl<C> fmt::Debug for Timeouts<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeouts")
            .field("pending", &self.pending.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

impl<C> Default for Timeouts<C> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 0,
        }
    }
}

impl<C> Timeouts<C> {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of timeouts yet to fire.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether there are any timeouts yet to fire.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedule `callback` to run once `delay` has elapsed from `now`.
    pub fn add(&mut self, now: Instant, delay: Duration, callback: TimeoutCallback<C>) -> TimeoutId {
        let id = TimeoutId(self.next_id);
        self.next_id += 1;
        trace!(?id, ?delay, "adding timeout");

        self.pending.push(Pending {
            id,
            deadline: now + delay,
            callback,
        });

        id
    }

    /// Cancel a pending timeout. Returns `false` if it has already fired or never existed.
    pub fn remove(&mut self, id: TimeoutId) -> bool {
        match self.pending.iter().position(|p| p.id == id) {
            Some(ix) => {
                self.pending.swap_remove(ix);
                true
            }
            None => false,
        }
    }

    /// The earliest deadline of any pending timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.deadline).min()
    }
}

impl<C> Timeouts<C>
where
    C: HasTimers,
{
    /// Run every timeout whose deadline is at or before `now` in deadline order.
    ///
    /// Only timeouts that had expired when the pass started are considered: anything added by
    /// a callback waits for the next pass. Returns the number of callbacks run.
    pub fn fire_expired(ctx: &mut C, now: Instant) -> usize {
        let mut due: Vec<(Instant, TimeoutId)> = ctx
            .timeouts()
            .pending
            .iter()
            .filter(|p| p.deadline <= now)
            .map(|p| (p.deadline, p.id))
            .collect();
        due.sort_by_key(|(deadline, _)| *deadline);

        let mut fired = 0;
        for (_, id) in due {
            let t = ctx.timeouts();
            let p = match t.pending.iter().position(|p| p.id == id) {
                Some(ix) => t.pending.remove(ix),
                None => continue, // removed by an earlier callback
            };

            trace!(?id, "firing timeout");
            let mut cb = p.callback;
            cb(ctx, id);
            fired += 1;
        }

        fired
    }
}

/// A single slot holding the idle callback: the last registration wins.
///
/// The callback has its own cadence: it is run on an idle pass only once at least `cadence` has
/// passed since it last ran. A zero cadence runs it on every idle pass.
pub struct IdleSlot<C> {
    callback: Option<IdleCallback<C>>,
    cadence: Duration,
    last_run: Option<Instant>,
    generation: u64,
    within: bool,
}

impl<C> fmt::Debug for IdleSlot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleSlot")
            .field("set", &self.is_set())
            .field("cadence", &self.cadence)
            .field("within", &self.within)
            .finish()
    }
}

impl<C> Default for IdleSlot<C> {
    fn default() -> Self {
        Self {
            callback: None,
            cadence: Duration::ZERO,
            last_run: None,
            generation: 0,
            within: false,
        }
    }
}

impl<C> IdleSlot<C> {
    /// Replace the current idle callback (if any).
    pub fn set(&mut self, callback: Option<IdleCallback<C>>) {
        self.generation += 1;
        self.callback = callback;
        self.last_run = None;
    }

    /// Set how often the idle callback wants to be run.
    pub fn set_cadence(&mut self, cadence: Duration) {
        self.cadence = cadence;
    }

    /// How often the idle callback wants to be run.
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// How long until the idle callback is next due, if there is one waiting to run.
    pub fn due_in(&self, now: Instant) -> Option<Duration> {
        if self.callback.is_none() || self.within {
            return None;
        }

        match self.last_run {
            Some(t) => Some(self.cadence.saturating_sub(now.saturating_duration_since(t))),
            None => Some(Duration::ZERO),
        }
    }

    /// Whether an idle callback is registered (including one that is currently running).
    pub fn is_set(&self) -> bool {
        self.callback.is_some() || self.within
    }

    /// Whether the idle callback is currently running.
    pub fn is_running(&self) -> bool {
        self.within
    }
}

impl<C> IdleSlot<C>
where
    C: HasTimers,
{
    /// Run the idle callback if one is set, it is due and it is not already running. Returns
    /// whether the callback was run.
    pub fn run(ctx: &mut C, now: Instant) -> bool {
        let slot = ctx.idle();
        if slot.within {
            trace!("idle callback already running: skipping");
            return false;
        }
        if slot.due_in(now).map(|d| !d.is_zero()).unwrap_or(false) {
            return false;
        }

        let mut cb = match slot.callback.take() {
            Some(cb) => cb,
            None => return false,
        };
        let generation = slot.generation;
        slot.within = true;
        slot.last_run = Some(now);

        cb(ctx);

        let slot = ctx.idle();
        slot.within = false;
        if slot.generation == generation {
            slot.callback = Some(cb);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Ctx {
        timeouts: Timeouts<Ctx>,
        idle: IdleSlot<Ctx>,
        fired: Vec<&'static str>,
        cancel: Option<TimeoutId>,
    }

    impl HasTimers for Ctx {
        fn timeouts(&mut self) -> &mut Timeouts<Self> {
            &mut self.timeouts
        }

        fn idle(&mut self) -> &mut IdleSlot<Self> {
            &mut self.idle
        }
    }

    fn push(tag: &'static str) -> TimeoutCallback<Ctx> {
        Box::new(move |c: &mut Ctx, _| c.fired.push(tag))
    }

    #[test]
    fn timeouts_fire_in_deadline_order() {
        let now = Instant::now();
        let mut ctx = Ctx::default();
        ctx.timeouts.add(now, Duration::from_millis(30), push("c"));
        ctx.timeouts.add(now, Duration::from_millis(10), push("a"));
        ctx.timeouts.add(now, Duration::from_millis(20), push("b"));
        ctx.timeouts.add(now, Duration::from_secs(10), push("later"));

        let n = Timeouts::fire_expired(&mut ctx, now + Duration::from_millis(50));

        assert_eq!(n, 3);
        assert_eq!(ctx.fired, vec!["a", "b", "c"]);
        assert_eq!(ctx.timeouts.len(), 1);
    }

    #[test]
    fn removed_timeouts_do_not_fire() {
        let now = Instant::now();
        let mut ctx = Ctx::default();
        let id = ctx.timeouts.add(now, Duration::ZERO, push("a"));

        assert!(ctx.timeouts.remove(id));
        assert!(!ctx.timeouts.remove(id));
        assert_eq!(Timeouts::fire_expired(&mut ctx, now), 0);
    }

    #[test]
    fn a_timeout_can_cancel_a_later_one_in_the_same_pass() {
        let now = Instant::now();
        let mut ctx = Ctx::default();
        ctx.timeouts.add(
            now,
            Duration::from_millis(1),
            Box::new(|c: &mut Ctx, _| {
                if let Some(id) = c.cancel {
                    c.timeouts.remove(id);
                }
                c.fired.push("first");
            }),
        );
        ctx.cancel = Some(ctx.timeouts.add(now, Duration::from_millis(2), push("second")));

        Timeouts::fire_expired(&mut ctx, now + Duration::from_millis(5));

        assert_eq!(ctx.fired, vec!["first"]);
    }

    #[test]
    fn timeouts_added_while_firing_wait_for_the_next_pass() {
        let now = Instant::now();
        let mut ctx = Ctx::default();
        ctx.timeouts.add(
            now,
            Duration::ZERO,
            Box::new(move |c: &mut Ctx, _| {
                c.timeouts.add(now, Duration::ZERO, push("again"));
            }),
        );

        assert_eq!(Timeouts::fire_expired(&mut ctx, now), 1);
        assert_eq!(ctx.timeouts.len(), 1);
        assert_eq!(Timeouts::fire_expired(&mut ctx, now), 1);
        assert_eq!(ctx.fired, vec!["again"]);
    }

    #[test]
    fn idle_callback_is_not_reentrant() {
        let mut ctx = Ctx::default();
        ctx.idle.set(Some(Box::new(|c: &mut Ctx| {
            c.fired.push("idle");
            assert!(!IdleSlot::run(c, Instant::now()));
        })));

        assert!(IdleSlot::run(&mut ctx, Instant::now()));
        assert!(IdleSlot::run(&mut ctx, Instant::now()));
        assert_eq!(ctx.fired, vec!["idle", "idle"]);
    }

    #[test]
    fn idle_callback_can_replace_itself() {
        let mut ctx = Ctx::default();
        ctx.idle.set(Some(Box::new(|c: &mut Ctx| {
            c.fired.push("first");
            c.idle.set(Some(Box::new(|c: &mut Ctx| c.fired.push("second"))));
        })));

        IdleSlot::run(&mut ctx, Instant::now());
        IdleSlot::run(&mut ctx, Instant::now());

        assert_eq!(ctx.fired, vec!["first", "second"]);
    }

    #[test]
    fn idle_callback_can_clear_itself() {
        let mut ctx = Ctx::default();
        ctx.idle.set(Some(Box::new(|c: &mut Ctx| c.idle.set(None))));

        assert!(IdleSlot::run(&mut ctx, Instant::now()));
        assert!(!ctx.idle.is_set());
        assert!(!IdleSlot::run(&mut ctx, Instant::now()));
    }

    #[test]
    fn idle_callback_waits_for_its_cadence() {
        let now = Instant::now();
        let mut ctx = Ctx::default();
        ctx.idle.set_cadence(Duration::from_millis(100));
        ctx.idle.set(Some(Box::new(|c: &mut Ctx| c.fired.push("idle"))));

        assert_eq!(ctx.idle.due_in(now), Some(Duration::ZERO));
        assert!(IdleSlot::run(&mut ctx, now));
        assert_eq!(ctx.idle.due_in(now), Some(Duration::from_millis(100)));

        let later = now + Duration::from_millis(40);
        assert!(!IdleSlot::run(&mut ctx, later));
        assert_eq!(ctx.idle.due_in(later), Some(Duration::from_millis(60)));

        assert!(IdleSlot::run(&mut ctx, now + Duration::from_millis(100)));
        assert_eq!(ctx.fired, vec!["idle", "idle"]);
    }
}
