//! xforms :: buttons
//!
//! A single form with a text input, a radio group and a quit button. Activated objects are
//! reported back to `main` and logged, apart from the quit button which has its own callback.
use xforms::{
    core::widgets::{Button, Input},
    pure::geometry::{Gravity, Rect},
    x11rb::X11rbPlatform,
    Config, Dispatcher, ObjectId, Result,
};
use x11rb::rust_connection::RustConnection;

use tracing_subscriber::{self, prelude::*};

type D = Dispatcher<X11rbPlatform<RustConnection>>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .finish()
        .init();

    let mut d: D = Dispatcher::new(Config::default(), X11rbPlatform::new()?)?;

    let form = d.begin_form(320, 200)?;
    let name = Input::new();
    let text = name.text();
    let input = d.add_widget(Rect::new(10, 10, 300, 30), "Name", name)?;

    d.begin_group()?;
    let sizes = [
        d.add_widget(Rect::new(10, 60, 90, 30), "Small", Button::radio())?,
        d.add_widget(Rect::new(115, 60, 90, 30), "Medium", Button::radio())?,
        d.add_widget(Rect::new(220, 60, 90, 30), "Large", Button::radio())?,
    ];
    d.end_group()?;

    let ok = d.add_widget(Rect::new(10, 160, 90, 30), "Ok", Button::return_button())?;
    let quit = d.add_widget(Rect::new(220, 160, 90, 30), "Quit", Button::normal())?;
    d.end_form()?;

    for id in [ok, quit] {
        d.set_object_gravity(id, Gravity::SouthWest, Gravity::SouthWest)?;
    }
    d.set_object_shortcut(quit, "^q")?;
    d.set_object_callback(quit, move |d: &mut D, _: ObjectId| -> Result<()> {
        d.hide_form(form)
    })?;
    d.set_object_pushed(sizes[1], true)?;
    d.show_form(form, "xforms buttons")?;
    d.set_focus_object(input)?;

    while let Some(id) = d.do_forms()? {
        if id == ok {
            let size = sizes
                .iter()
                .position(|&s| d.object(s).map(|o| o.state().pushed).unwrap_or(false));
            tracing::info!(name = %text.borrow(), ?size, "ok pressed");
        } else {
            tracing::info!(%id, "object activated");
        }
    }

    Ok(())
}
