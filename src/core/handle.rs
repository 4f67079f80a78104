//! Routing of platform events to the objects that should see them
use crate::{
    core::{
        event::{Event, EventKind, Outcome},
        keys::{is_special, KeySym, ModMask, SpecialKey},
        object::{KeyInterest, ObjFlags},
        timeout::{IdleSlot, Timeouts},
        Dispatcher,
    },
    pure::geometry::{Point, Size},
    x::{KeyEvent, Platform, PointerEvent, XEvent},
    FormId, ObjectId, Result,
};
use std::{mem::take, time::Instant};
use tracing::{error, trace, warn};

fn event<P: Platform>(d: &Dispatcher<P>, kind: EventKind) -> Event {
    Event::new(kind, d.ix.pointer.pos).with_state(d.ix.pointer.state)
}

fn pointer_event(raw: XEvent, kind: EventKind, p: &PointerEvent) -> Event {
    let button = p.button.map(u8::from).unwrap_or(0) as KeySym;

    Event::new(kind, p.pos)
        .with_key(button)
        .with_state(p.state)
        .with_raw(raw)
}

fn has_flags<P: Platform>(d: &Dispatcher<P>, id: ObjectId, flags: ObjFlags) -> bool {
    d.object(id).map(|o| o.state.wants(flags)).unwrap_or(false)
}

fn key_interest<P: Platform>(d: &Dispatcher<P>, id: ObjectId) -> KeyInterest {
    d.object(id)
        .map(|o| o.state.keys)
        .unwrap_or_else(KeyInterest::empty)
}

/// Deliver an event to a single object and act on the outcome.
pub(crate) fn send<P: Platform>(d: &mut Dispatcher<P>, id: ObjectId, e: Event) -> Outcome {
    if d.pending_free.contains(&id) {
        return Outcome::NONE;
    }

    let obj = match d.objects.get_mut(&id) {
        Some(o) if !o.state.class.is_group_marker() => o,
        _ => return Outcome::NONE,
    };

    trace!(%id, kind = %e.kind, "sending event to object");
    let outcome = obj.dispatch(&e);
    if obj.state.redraw || outcome.contains(Outcome::CHANGED) {
        d.draw_object(id);
    }
    handle_outcome(d, id, outcome);

    outcome
}

fn handle_outcome<P: Platform>(d: &mut Dispatcher<P>, id: ObjectId, outcome: Outcome) {
    let obj = match d.objects.get_mut(&id) {
        Some(o) => o,
        None => return,
    };

    if outcome.contains(Outcome::CHANGED) {
        obj.state.changed_during = true;
    }
    let report = obj.state.how_return.should_report(outcome, obj.state.changed_during);
    if outcome.contains(Outcome::END) {
        obj.state.changed_during = false;
    }

    if report {
        d.report(id);
    }
}

/// Take the pointer, capture and keyboard focus away from an object, sending it the events it
/// would otherwise never see.
pub(crate) fn withdraw<P: Platform>(d: &mut Dispatcher<P>, id: ObjectId) {
    if d.ix.mouseobj == Some(id) {
        leave(d, id);
    }
    if d.ix.pushobj == Some(id) {
        release_capture(d, id);
    }

    let form = match d.form_of(id) {
        Some(f) => f,
        None => return,
    };
    if d.forms.get(form).and_then(|f| f.focusobj) == Some(id) {
        unfocus(d, form, id);
        if let Some(o) = d.objects.get_mut(&id) {
            o.state.keep_focus = false;
        }
    }
}

pub(crate) fn leave<P: Platform>(d: &mut Dispatcher<P>, id: ObjectId) {
    d.ix.mouseobj = None;
    if let Some(o) = d.objects.get_mut(&id) {
        o.state.belowmouse = false;
    }

    let e = event(d, EventKind::Leave);
    send(d, id, e);
}

pub(crate) fn release_capture<P: Platform>(d: &mut Dispatcher<P>, id: ObjectId) {
    d.ix.pushobj = None;

    let e = event(d, EventKind::Release);
    send(d, id, e);
}

fn focus<P: Platform>(d: &mut Dispatcher<P>, form: FormId, id: ObjectId) {
    if let Some(f) = d.forms.get_mut(form) {
        f.focusobj = Some(id);
    }
    if let Some(o) = d.objects.get_mut(&id) {
        o.state.focused = true;
    }

    trace!(%id, %form, "focusing object");
    let e = event(d, EventKind::Focus);
    send(d, id, e);
}

fn unfocus<P: Platform>(d: &mut Dispatcher<P>, form: FormId, id: ObjectId) {
    if let Some(f) = d.forms.get_mut(form) {
        f.focusobj = None;
    }
    if let Some(o) = d.objects.get_mut(&id) {
        o.state.focused = false;
    }

    let e = event(d, EventKind::Unfocus);
    send(d, id, e);
}

/// Move keyboard focus within a form.
pub(crate) fn set_focus<P: Platform>(d: &mut Dispatcher<P>, form: FormId, id: ObjectId) {
    let current = d.forms.get(form).and_then(|f| f.focusobj);
    if current == Some(id) {
        return;
    }

    if let Some(old) = current {
        unfocus(d, form, old);
        if let Some(o) = d.objects.get_mut(&old) {
            o.state.keep_focus = false;
        }
    }
    focus(d, form, id);
}

fn radio_siblings<P: Platform>(d: &Dispatcher<P>, id: ObjectId) -> Vec<ObjectId> {
    let (form, group) = match d.object(id) {
        Some(o) => (o.state.form, o.state.group),
        None => return vec![],
    };

    let f = match form.and_then(|f| d.forms.get(f)) {
        Some(f) => f,
        None => return vec![],
    };

    f.objects
        .iter()
        .copied()
        .filter(|&o| o != id)
        .filter(|o| {
            d.object(*o)
                .map(|o| o.state.wants(ObjFlags::RADIO) && o.state.group == group)
                .unwrap_or(false)
        })
        .collect()
}

/// Release every other pushed radio object in the same group as `id`.
pub(crate) fn release_radio_siblings<P: Platform>(d: &mut Dispatcher<P>, id: ObjectId) {
    for sib in radio_siblings(d, id) {
        let was_pushed = d
            .objects
            .get_mut(&sib)
            .map(|o| take(&mut o.state.pushed))
            .unwrap_or(false);

        if was_pushed {
            trace!(%sib, pushed = %id, "releasing radio sibling");
            let e = event(d, EventKind::Release);
            send(d, sib, e);
            d.draw_object(sib);
        }
    }
}

fn radio_push<P: Platform>(d: &mut Dispatcher<P>, id: ObjectId, e: Event) {
    release_radio_siblings(d, id);
    send(d, id, e);
}

/// The topmost interactive object in a form containing `pos`.
fn object_at<P: Platform>(d: &Dispatcher<P>, form: FormId, pos: Point) -> Option<ObjectId> {
    let f = d.forms.get(form)?;

    f.objects.iter().rev().copied().find(|id| {
        d.object(*id)
            .map(|o| o.state.is_interactive() && o.state.rect.contains_point(pos))
            .unwrap_or(false)
    })
}

fn update_below_mouse<P: Platform>(d: &mut Dispatcher<P>, form: FormId, pos: Point) {
    let target = object_at(d, form, pos);
    if target == d.ix.mouseobj {
        return;
    }

    if let Some(old) = d.ix.mouseobj {
        leave(d, old);
    }

    if let Some(new) = target {
        d.ix.mouseobj = Some(new);
        if let Some(o) = d.objects.get_mut(&new) {
            o.state.belowmouse = true;
        }
        send(d, new, Event::new(EventKind::Enter, pos));
    }
}

/// Route a single platform event.
pub(crate) fn platform_event<P: Platform>(d: &mut Dispatcher<P>, e: XEvent) -> Result<()> {
    let win = e.id();
    let form = match d.forms.find_visible(|f| f.win == Some(win)) {
        Some(f) => f.id,
        None => return foreign(d, e),
    };

    if let Some(f) = d.forms.get_mut(form) {
        if f.intercept(&e) {
            return Ok(());
        }
    }

    match e {
        XEvent::ButtonPress(p) => {
            let state = p.button.map(|b| p.state | b.mask()).unwrap_or(p.state);
            d.ix.pointer.update(win, p.pos, state);
        }
        XEvent::ButtonRelease(p) => {
            let state = p.button.map(|b| p.state - b.mask()).unwrap_or(p.state);
            d.ix.pointer.update(win, p.pos, state);
        }
        XEvent::Motion(p) | XEvent::Enter(p) | XEvent::Leave(p) => {
            d.ix.pointer.update(win, p.pos, p.state)
        }
        XEvent::KeyPress(k) | XEvent::KeyRelease(k) => d.ix.pointer.update(win, k.pos, k.state),
        _ => (),
    }

    let active = d.forms.get(form).map(|f| f.is_active()).unwrap_or(false);

    match e {
        XEvent::ButtonPress(_)
        | XEvent::ButtonRelease(_)
        | XEvent::Motion(_)
        | XEvent::KeyPress(_)
        | XEvent::KeyRelease(_)
            if !active =>
        {
            trace!(%form, ?e, "dropping input event for deactivated form");
            Ok(())
        }

        XEvent::ButtonPress(p) => on_push(d, form, p, e),
        XEvent::ButtonRelease(p) => on_release(d, form, p, e),
        XEvent::Motion(p) => on_motion(d, form, p, e),

        XEvent::Enter(p) => {
            d.ix.mouse_form = Some(form);
            if active && d.ix.pushobj.is_none() {
                update_below_mouse(d, form, p.pos);
            }
            Ok(())
        }

        XEvent::Leave(_) => {
            if d.ix.pushobj.is_none() {
                if let Some(obj) = d.ix.mouseobj {
                    leave(d, obj);
                }
            }
            if d.ix.mouse_form == Some(form) {
                d.ix.mouse_form = None;
            }
            Ok(())
        }

        XEvent::KeyPress(k) => on_key(d, form, k, true, e),
        XEvent::KeyRelease(k) => on_key(d, form, k, false, e),

        XEvent::Expose { count, .. } => {
            if count == 0 {
                d.draw_form(form);
            }
            Ok(())
        }

        XEvent::Configure { r, .. } => {
            let f = d.form_mut(form)?;
            f.pos = Point::new(r.x, r.y);
            if f.size.rounded() != (r.w, r.h) {
                trace!(%form, ?r, "form resized by the window system");
                d.resize_form(form, Size::new(r.w as f64, r.h as f64), false)?;
            }
            Ok(())
        }

        XEvent::FocusIn(_) => {
            d.ix.keyboard_form = Some(form);
            Ok(())
        }

        XEvent::FocusOut(_) => {
            if d.ix.keyboard_form == Some(form) {
                d.ix.keyboard_form = None;
            }
            Ok(())
        }

        XEvent::WmClose(_) => close_form(d, form),

        XEvent::Map(_) | XEvent::Unmap(_) | XEvent::Destroy(_) => {
            trace!(%form, ?e, "structure event");
            Ok(())
        }
    }
}

fn foreign<P: Platform>(d: &mut Dispatcher<P>, e: XEvent) -> Result<()> {
    let win = e.id();

    match d.event_callbacks.get_mut(&win).and_then(Option::take) {
        Some(mut cb) => {
            trace!(%win, "running event callback");
            if let Err(error) = cb.call(d, &e) {
                error!(%error, %win, "error running event callback");
            }
            if let Some(slot @ None) = d.event_callbacks.get_mut(&win) {
                *slot = Some(cb);
            }
        }

        None => {
            trace!(%win, "queueing event for unknown window");
            d.queue_foreign(e);
        }
    }

    Ok(())
}

fn close_form<P: Platform>(d: &mut Dispatcher<P>, form: FormId) -> Result<()> {
    let hide = match d.close_callbacks.get_mut(&form).and_then(Option::take) {
        Some(mut cb) => {
            let res = cb.call(d, form);
            if let Some(slot @ None) = d.close_callbacks.get_mut(&form) {
                *slot = Some(cb);
            }

            match res {
                Ok(hide) => hide,
                Err(error) => {
                    error!(%error, %form, "error running close callback");
                    false
                }
            }
        }

        None => true,
    };

    if hide && d.forms.is_visible(form) {
        d.hide_form(form)?;
    }

    Ok(())
}

fn on_push<P: Platform>(d: &mut Dispatcher<P>, form: FormId, p: PointerEvent, raw: XEvent) -> Result<()> {
    if let Some(held) = d.ix.pushobj {
        trace!(%held, "pointer already captured: ignoring push");
        return Ok(());
    }

    update_below_mouse(d, form, p.pos);
    let target = match object_at(d, form, p.pos) {
        Some(id) => id,
        None => return Ok(()),
    };

    let current = d.forms.get(form).and_then(|f| f.focusobj);
    if has_flags(d, target, ObjFlags::INPUT) && current != Some(target) {
        match current {
            Some(old) => {
                unfocus(d, form, old);
                let kept = d
                    .objects
                    .get_mut(&old)
                    .map(|o| take(&mut o.state.keep_focus))
                    .unwrap_or(false);

                if kept {
                    trace!(%old, "object refused to give up focus");
                    focus(d, form, old);
                } else {
                    focus(d, form, target);
                }
            }
            None => focus(d, form, target),
        }
    }

    d.ix.pushobj = Some(target);
    let e = pointer_event(raw, EventKind::Push, &p);
    if has_flags(d, target, ObjFlags::RADIO) {
        radio_push(d, target, e);
    } else {
        send(d, target, e);
    }

    if d.object(target).is_none() {
        return Ok(());
    }

    match d.ix.clicks.register(target, p.time, d.config.click_timeout) {
        2 => {
            send(d, target, e.as_kind(EventKind::DblClick));
        }
        3 => {
            send(d, target, e.as_kind(EventKind::TripleClick));
        }
        _ => (),
    }

    Ok(())
}

fn on_release<P: Platform>(
    d: &mut Dispatcher<P>,
    form: FormId,
    p: PointerEvent,
    raw: XEvent,
) -> Result<()> {
    if let Some(held) = d.ix.pushobj.take() {
        send(d, held, pointer_event(raw, EventKind::Release, &p));
    }
    update_below_mouse(d, form, p.pos);

    Ok(())
}

fn on_motion<P: Platform>(
    d: &mut Dispatcher<P>,
    form: FormId,
    p: PointerEvent,
    raw: XEvent,
) -> Result<()> {
    let e = pointer_event(raw, EventKind::Motion, &p);

    if let Some(held) = d.ix.pushobj {
        send(d, held, e);
        return Ok(());
    }

    update_below_mouse(d, form, p.pos);
    if let Some(obj) = d.ix.mouseobj {
        if has_flags(d, obj, ObjFlags::WANT_MOTION) {
            send(d, obj, e);
        }
    }

    Ok(())
}

fn on_key<P: Platform>(
    d: &mut Dispatcher<P>,
    form: FormId,
    k: KeyEvent,
    press: bool,
    raw: XEvent,
) -> Result<()> {
    d.ix.keyboard_form = Some(form);
    let kind = if press {
        EventKind::KeyPress
    } else {
        EventKind::KeyRelease
    };
    let e = Event::new(kind, k.pos)
        .with_key(k.sym)
        .with_state(k.state)
        .with_raw(raw);

    let objects = match d.forms.get(form) {
        Some(f) => f.objects.clone(),
        None => return Ok(()),
    };

    if press {
        let hit = objects.iter().copied().find(|id| {
            d.object(*id)
                .map(|o| {
                    o.state.is_interactive()
                        && o.state.shortcuts.iter().any(|s| s.matches(k.sym, k.state))
                })
                .unwrap_or(false)
        });

        if let Some(id) = hit {
            fire_shortcut(d, form, id, e);
            return Ok(());
        }
    }

    if let Some(focused) = d.forms.get(form).and_then(|f| f.focusobj) {
        let keys = key_interest(d, focused);

        match SpecialKey::from_keysym(k.sym) {
            Some(key @ (SpecialKey::Tab | SpecialKey::LeftTab)) if !keys.contains(KeyInterest::TAB) => {
                if press {
                    let back = key == SpecialKey::LeftTab || k.state.contains(ModMask::SHIFT);
                    move_focus(d, form, focused, back);
                }
            }

            Some(key @ (SpecialKey::Up | SpecialKey::Down)) if !keys.contains(KeyInterest::SPECIAL) => {
                if press {
                    move_focus(d, form, focused, key == SpecialKey::Up);
                }
            }

            _ if is_special(k.sym) && !keys.contains(KeyInterest::SPECIAL) => {
                trace!(%focused, sym = k.sym, "discarding navigation key");
            }

            _ => {
                send(d, focused, e);
            }
        }

        return Ok(());
    }

    let candidates: Vec<ObjectId> = objects
        .into_iter()
        .filter(|id| {
            d.object(*id)
                .map(|o| {
                    o.state.is_interactive()
                        && o.state.keys.contains(KeyInterest::SPECIAL)
                        && !o.state.wants(ObjFlags::INPUT)
                })
                .unwrap_or(false)
        })
        .collect();

    match candidates.as_slice() {
        [] => trace!(%form, sym = k.sym, "no object wants this key"),
        [only] => {
            send(d, *only, e);
        }
        _ => match d.ix.mouseobj.filter(|m| candidates.contains(m)) {
            Some(m) => {
                send(d, m, e);
            }
            None => trace!(%form, sym = k.sym, "key is ambiguous between objects: discarding"),
        },
    }

    Ok(())
}

fn fire_shortcut<P: Platform>(d: &mut Dispatcher<P>, form: FormId, id: ObjectId, e: Event) {
    trace!(%id, sym = e.key, "firing shortcut");
    if let Err(error) = d.platform.set_auto_repeat(false) {
        warn!(%error, "unable to disable keyboard auto-repeat");
    }

    if let Some(o) = d.objects.get_mut(&id) {
        o.state.flashing = true;
    }
    d.draw_object(id);

    if has_flags(d, id, ObjFlags::INPUT) {
        set_focus(d, form, id);
    } else if has_flags(d, id, ObjFlags::RADIO) {
        radio_push(d, id, e.as_kind(EventKind::Push));
    } else {
        send(d, id, e.as_kind(EventKind::Shortcut));
    }

    if let Some(o) = d.objects.get_mut(&id) {
        o.state.flashing = false;
    }
    d.draw_object(id);

    if let Err(error) = d.platform.set_auto_repeat(true) {
        warn!(%error, "unable to enable keyboard auto-repeat");
    }
}

fn move_focus<P: Platform>(d: &mut Dispatcher<P>, form: FormId, current: ObjectId, back: bool) {
    let inputs: Vec<ObjectId> = match d.forms.get(form) {
        Some(f) => f
            .objects
            .iter()
            .copied()
            .filter(|id| {
                d.object(*id)
                    .map(|o| o.state.is_interactive() && o.state.wants(ObjFlags::INPUT))
                    .unwrap_or(false)
            })
            .collect(),
        None => return,
    };

    let n = inputs.len();
    if n == 0 {
        return;
    }

    let next = match inputs.iter().position(|&id| id == current) {
        Some(ix) if back => (ix + n - 1) % n,
        Some(ix) => (ix + 1) % n,
        None => 0,
    };

    if inputs[next] != current {
        set_focus(d, form, inputs[next]);
    }
}

/// A single idle pass: UPDATE for a capturing object with a button held, STEP for automatic
/// objects, expired timeouts and then the idle callback.
pub(crate) fn idle_pass<P: Platform>(d: &mut Dispatcher<P>) {
    d.ix.pointer.tick();

    if let Some(held) = d.ix.pushobj {
        let win = d
            .form_of(held)
            .and_then(|f| d.forms.get(f))
            .and_then(|f| f.win);

        if let (true, Some(win)) = (d.ix.pointer.is_stale(d.config.pointer_query_age), win) {
            match d.platform.query_pointer(win) {
                Ok(p) => d.ix.pointer.update(win, p.pos, p.state),
                Err(error) => warn!(%error, %win, "unable to query pointer state"),
            }
        }

        if has_flags(d, held, ObjFlags::WANT_UPDATE) && d.ix.pointer.state.any_button() {
            let e = event(d, EventKind::Update);
            send(d, held, e);
        }
    }

    if d.forms.auto_count() > 0 {
        let automatic: Vec<ObjectId> = d
            .forms
            .iter_visible()
            .filter(|f| f.n_automatic > 0)
            .flat_map(|f| f.objects.iter().copied())
            .filter(|id| {
                d.object(*id)
                    .map(|o| o.state.wants(ObjFlags::AUTOMATIC) && o.state.visible)
                    .unwrap_or(false)
            })
            .collect();

        for id in automatic {
            let e = event(d, EventKind::Step);
            send(d, id, e);
        }
    }

    let now = Instant::now();
    Timeouts::fire_expired(d, now);
    IdleSlot::run(d, now);
}
