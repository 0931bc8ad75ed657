use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InputEvent {
    Key { key: KeyCode, mods: KeyModifiers },
    Click { col: u16, row: u16 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Generate,
    Clear,
    Reset,
    Explode,
    ToggleGravity,
    Shake,
    CountUp,
    CountDown,
    CycleSpeed,
    CloseModal,
    ModalClick { col: u16, row: u16 },
    Quit,
}

pub(crate) const COUNT_STEP: i32 = 5;

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        match event::read()? {
            Event::Key(k) if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat => {
                out.push(InputEvent::Key {
                    key: k.code,
                    mods: k.modifiers,
                });
            }
            Event::Mouse(m) if m.kind == MouseEventKind::Down(MouseButton::Left) => {
                out.push(InputEvent::Click {
                    col: m.column,
                    row: m.row,
                });
            }
            _ => {}
        }
        if out.len() >= 32 {
            break;
        }
    }
    Ok(out)
}

pub(crate) fn map_event_to_action(modal_visible: bool, ev: InputEvent) -> Option<Action> {
    let (key, mods) = match ev {
        InputEvent::Click { col, row } => {
            return modal_visible.then_some(Action::ModalClick { col, row });
        }
        InputEvent::Key { key, mods } => (key, mods),
    };

    if key == KeyCode::Char('c') && mods.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    match key {
        KeyCode::Esc if modal_visible => Some(Action::CloseModal),
        KeyCode::Esc => Some(Action::Quit),
        KeyCode::Enter => modal_visible.then_some(Action::CloseModal),
        KeyCode::Char(ch) => match ch.to_ascii_lowercase() {
            'q' => Some(Action::Quit),
            'n' => Some(Action::Generate),
            'c' => Some(Action::Clear),
            'r' => Some(Action::Reset),
            'e' => Some(Action::Explode),
            'g' => Some(Action::ToggleGravity),
            's' => Some(Action::Shake),
            'a' => Some(Action::CycleSpeed),
            '+' | '=' => Some(Action::CountUp),
            '-' | '_' => Some(Action::CountDown),
            _ => None,
        },
        KeyCode::Up => Some(Action::CountUp),
        KeyCode::Down => Some(Action::CountDown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> InputEvent {
        InputEvent::Key {
            key: KeyCode::Char(c),
            mods: KeyModifiers::NONE,
        }
    }

    #[test]
    fn letters_map_case_insensitively() {
        assert_eq!(map_event_to_action(false, key('e')), Some(Action::Explode));
        assert_eq!(map_event_to_action(false, key('G')), Some(Action::ToggleGravity));
        assert_eq!(map_event_to_action(true, key('r')), Some(Action::Reset));
        assert_eq!(map_event_to_action(false, key('+')), Some(Action::CountUp));
        assert_eq!(map_event_to_action(false, key('-')), Some(Action::CountDown));
        assert_eq!(map_event_to_action(false, key('x')), None);
    }

    #[test]
    fn escape_closes_modal_before_quitting() {
        let esc = InputEvent::Key {
            key: KeyCode::Esc,
            mods: KeyModifiers::NONE,
        };
        assert_eq!(map_event_to_action(true, esc.clone()), Some(Action::CloseModal));
        assert_eq!(map_event_to_action(false, esc), Some(Action::Quit));
    }

    #[test]
    fn enter_only_matters_with_modal() {
        let enter = InputEvent::Key {
            key: KeyCode::Enter,
            mods: KeyModifiers::NONE,
        };
        assert_eq!(map_event_to_action(true, enter.clone()), Some(Action::CloseModal));
        assert_eq!(map_event_to_action(false, enter), None);
    }

    #[test]
    fn ctrl_c_quits_plain_c_clears() {
        let ctrl_c = InputEvent::Key {
            key: KeyCode::Char('c'),
            mods: KeyModifiers::CONTROL,
        };
        assert_eq!(map_event_to_action(true, ctrl_c), Some(Action::Quit));
        assert_eq!(map_event_to_action(false, key('c')), Some(Action::Clear));
    }

    #[test]
    fn clicks_ignored_without_modal() {
        let click = InputEvent::Click { col: 3, row: 4 };
        assert_eq!(map_event_to_action(false, click.clone()), None);
        assert_eq!(
            map_event_to_action(true, click),
            Some(Action::ModalClick { col: 3, row: 4 })
        );
    }
}
