//! Keysyms, modifier masks and object shortcuts
use crate::{Error, Result};
use std::str::FromStr;
use strum::{EnumIter, IntoEnumIterator};

/// An X keysym value
pub type KeySym = u32;

bitflags::bitflags! {
    /// The X11 key and button state mask carried by input events
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModMask: u16 {
        /// Shift
        const SHIFT = 1 << 0;
        /// Caps lock
        const LOCK = 1 << 1;
        /// Control
        const CONTROL = 1 << 2;
        /// Mod1: normally Alt
        const ALT = 1 << 3;
        /// Mod2: normally Num lock
        const NUM_LOCK = 1 << 4;
        /// Mod3
        const MOD3 = 1 << 5;
        /// Mod4: normally Super / Meta
        const SUPER = 1 << 6;
        /// Mod5
        const MOD5 = 1 << 7;
        /// Left mouse button held
        const BUTTON1 = 1 << 8;
        /// Middle mouse button held
        const BUTTON2 = 1 << 9;
        /// Right mouse button held
        const BUTTON3 = 1 << 10;
        /// Scroll up "button" held
        const BUTTON4 = 1 << 11;
        /// Scroll down "button" held
        const BUTTON5 = 1 << 12;
    }
}

impl ModMask {
    /// All of the mouse button bits
    pub const BUTTONS: ModMask = ModMask::BUTTON1
        .union(ModMask::BUTTON2)
        .union(ModMask::BUTTON3)
        .union(ModMask::BUTTON4)
        .union(ModMask::BUTTON5);

    /// The modifiers that take part in shortcut matching
    pub const SHORTCUT: ModMask = ModMask::CONTROL.union(ModMask::ALT);

    /// Whether any mouse button is currently held.
    pub fn any_button(&self) -> bool {
        self.intersects(Self::BUTTONS)
    }
}

/// Non-printing keys that the dispatcher routes specially.
///
/// Values are the X keysyms from `X11/keysymdef.h`.
#[allow(missing_docs)]
#[derive(EnumIter, Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[repr(u32)]
pub enum SpecialKey {
    BackSpace = 0xff08,
    Tab = 0xff09,
    Return = 0xff0d,
    Escape = 0xff1b,
    Home = 0xff50,
    Left = 0xff51,
    Up = 0xff52,
    Right = 0xff53,
    Down = 0xff54,
    PageUp = 0xff55,
    PageDown = 0xff56,
    End = 0xff57,
    LeftTab = 0xfe20,
    Delete = 0xffff,
}

impl SpecialKey {
    /// Look up the SpecialKey for a raw keysym if there is one.
    pub fn from_keysym(sym: KeySym) -> Option<Self> {
        Self::iter().find(|k| *k as u32 == sym)
    }

    /// The keysym for this key.
    pub fn keysym(&self) -> KeySym {
        *self as u32
    }

    /// Cursor movement keys: the arrows plus Home, End, Page Up and Page Down.
    pub fn is_navigation(&self) -> bool {
        use SpecialKey::*;

        matches!(
            self,
            Home | Left | Up | Right | Down | PageUp | PageDown | End
        )
    }
}

/// Keysym of the first function key: F(n) is `XK_F1 + n - 1`.
const XK_F1: KeySym = 0xffbe;

/// Whether the given keysym is one that only objects opting into special keys receive.
pub fn is_special(sym: KeySym) -> bool {
    SpecialKey::from_keysym(sym)
        .map(|k| k.is_navigation())
        .unwrap_or(false)
}

/// A key plus held modifiers that triggers an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shortcut {
    /// The keysym that must be pressed
    pub sym: KeySym,
    /// Modifiers that must be held (only Control and Alt are considered)
    pub mods: ModMask,
}

impl Shortcut {
    /// Create a new shortcut, keeping only the modifiers relevant for matching.
    pub fn new(sym: KeySym, mods: ModMask) -> Self {
        Self {
            sym,
            mods: mods & ModMask::SHORTCUT,
        }
    }

    /// Check a key press against this shortcut.
    ///
    /// With Alt held, single byte keysyms are compared ignoring case so that `#a` fires for
    /// both Alt-a and Alt-Shift-a.
    pub fn matches(&self, sym: KeySym, mods: ModMask) -> bool {
        let mods = mods & ModMask::SHORTCUT;
        if mods != self.mods {
            return false;
        }

        if mods.contains(ModMask::ALT) && sym < 0x100 && self.sym < 0x100 {
            fold_case(sym) == fold_case(self.sym)
        } else {
            sym == self.sym
        }
    }
}

fn fold_case(sym: KeySym) -> KeySym {
    match char::from_u32(sym) {
        Some(c) => c.to_ascii_lowercase() as KeySym,
        None => sym,
    }
}

impl FromStr for Shortcut {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut v = parse_shortcuts(s)?;
        if v.len() != 1 {
            return Err(Error::InvalidShortcut(s.to_string()));
        }

        Ok(v.remove(0))
    }
}

/// Parse a shortcut specification into the individual [Shortcut]s it describes.
///
/// Every character is a separate shortcut, with the following prefixes:
///   - `^x`: Control + x
///   - `#x`: Alt + x
///   - `&n`: function key Fn (`n` is one or two digits)
///
/// ```
/// # use xforms::core::keys::{parse_shortcuts, ModMask, Shortcut};
/// let shortcuts = parse_shortcuts("q^c&2").unwrap();
///
/// assert_eq!(shortcuts, vec![
///     Shortcut::new('q' as u32, ModMask::empty()),
///     Shortcut::new('c' as u32, ModMask::CONTROL),
///     Shortcut::new(0xffbf, ModMask::empty()),
/// ]);
/// ```
pub fn parse_shortcuts(s: &str) -> Result<Vec<Shortcut>> {
    let invalid = || Error::InvalidShortcut(s.to_string());
    let mut shortcuts = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        let shortcut = match c {
            '^' => {
                let c = chars.next().ok_or_else(invalid)?;
                Shortcut::new(c.to_ascii_lowercase() as KeySym, ModMask::CONTROL)
            }
            '#' => {
                let c = chars.next().ok_or_else(invalid)?;
                Shortcut::new(c as KeySym, ModMask::ALT)
            }
            '&' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    if digits.len() == 2 {
                        break;
                    }
                    digits.push(*d);
                    chars.next();
                }
                let n: u32 = digits.parse().map_err(|_| invalid())?;
                if !(1..=35).contains(&n) {
                    return Err(invalid());
                }
                Shortcut::new(XK_F1 + n - 1, ModMask::empty())
            }
            c => Shortcut::new(c as KeySym, ModMask::empty()),
        };

        shortcuts.push(shortcut);
    }

    Ok(shortcuts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("a", vec![Shortcut::new('a' as u32, ModMask::empty())]; "plain")]
    #[test_case("Aa", vec![Shortcut::new('A' as u32, ModMask::empty()), Shortcut::new('a' as u32, ModMask::empty())]; "both cases")]
    #[test_case("^X", vec![Shortcut::new('x' as u32, ModMask::CONTROL)]; "control")]
    #[test_case("#q", vec![Shortcut::new('q' as u32, ModMask::ALT)]; "alt")]
    #[test_case("&12", vec![Shortcut::new(0xffc9, ModMask::empty())]; "function key")]
    #[test]
    fn parse_valid(s: &str, expected: Vec<Shortcut>) {
        assert_eq!(parse_shortcuts(s).unwrap(), expected);
    }

    #[test_case("^"; "dangling control")]
    #[test_case("#"; "dangling alt")]
    #[test_case("&"; "function key without number")]
    #[test_case("&0"; "function key zero")]
    #[test]
    fn parse_invalid(s: &str) {
        assert!(parse_shortcuts(s).is_err());
    }

    #[test_case('a', ModMask::ALT, true; "exact")]
    #[test_case('A', ModMask::ALT | ModMask::SHIFT, true; "alt folds case")]
    #[test_case('a', ModMask::empty(), false; "alt missing")]
    #[test_case('a', ModMask::ALT | ModMask::CONTROL, false; "extra control")]
    #[test]
    fn alt_shortcut_matching(c: char, mods: ModMask, expected: bool) {
        let s = Shortcut::new('a' as u32, ModMask::ALT);

        assert_eq!(s.matches(c as u32, mods), expected);
    }

    #[test]
    fn case_is_significant_without_alt() {
        let s = Shortcut::new('a' as u32, ModMask::empty());

        assert!(s.matches('a' as u32, ModMask::NUM_LOCK));
        assert!(!s.matches('A' as u32, ModMask::SHIFT));
    }

    #[test_case(0xff52, true; "up")]
    #[test_case(0xff57, true; "end")]
    #[test_case(0xff09, false; "tab")]
    #[test_case('x' as u32, false; "printable")]
    #[test]
    fn special_keys(sym: KeySym, expected: bool) {
        assert_eq!(is_special(sym), expected);
    }
}
