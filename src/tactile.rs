use embedded_hal::digital::v2::InputPin;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    #[default]
    None,
    ShortPress,
    LongPress,
}

/// Turns a sampled pressed/released level into short and long presses.
///
/// A press only starts if the previous event is more than the debounce
/// interval old. A long press fires once, as soon as the hold time is
/// reached, and swallows the release. Anything shorter is a short press,
/// reported on release.
#[derive(Debug, Clone)]
pub struct PressDetector {
    debounce_ms: u64,
    long_press_ms: u64,
    was_pressed: bool,
    press_start: Option<u64>,
    long_fired: bool,
    last_event: Option<u64>,
    ignore_until_release: bool,
}

impl PressDetector {
    pub const fn new(debounce_ms: u64, long_press_ms: u64) -> Self {
        Self {
            debounce_ms,
            long_press_ms,
            was_pressed: false,
            press_start: None,
            long_fired: false,
            last_event: None,
            ignore_until_release: false,
        }
    }

    pub fn update(&mut self, pressed: bool, now_ms: u64) -> ButtonEvent {
        let was_pressed = core::mem::replace(&mut self.was_pressed, pressed);

        if self.ignore_until_release {
            if !pressed {
                self.ignore_until_release = false;
                self.press_start = None;
            }
            return ButtonEvent::None;
        }

        if pressed && !was_pressed {
            let settled = self
                .last_event
                .map_or(true, |at| now_ms.saturating_sub(at) > self.debounce_ms);
            if settled {
                self.press_start = Some(now_ms);
                self.long_fired = false;
            }
        }

        let Some(start) = self.press_start else {
            return ButtonEvent::None;
        };
        let held = now_ms.saturating_sub(start);

        if pressed {
            if !self.long_fired && held >= self.long_press_ms {
                self.long_fired = true;
                self.last_event = Some(now_ms);
                return ButtonEvent::LongPress;
            }
            return ButtonEvent::None;
        }

        // Released
        self.press_start = None;
        if self.long_fired {
            ButtonEvent::None
        } else {
            self.last_event = Some(now_ms);
            if held >= self.long_press_ms {
                // Hold outlived a gap between samples
                ButtonEvent::LongPress
            } else {
                ButtonEvent::ShortPress
            }
        }
    }

    /// Ignores the current hold entirely, e.g. the press that woke the device.
    pub fn suppress_until_release(&mut self) {
        self.ignore_until_release = true;
        self.was_pressed = true;
    }
}

/// Level of the active-low user button. A failed read counts as released.
pub fn is_pressed<P: InputPin>(pin: &P) -> bool {
    pin.is_low().unwrap_or(false)
}
