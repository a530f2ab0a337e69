//! Presenter view state: a grid of ranked messages, a fullscreen view of one
//! message, and an orthogonal overlay that reveals the join code.
//!
//! The list re-ranks on every poll, so the fullscreen cursor follows a message
//! id rather than a position. Its index is recomputed after each refresh.

use shared::{MessageInfo, MessageList, SessionStatus};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Grid,
    Fullscreen { message_id: Uuid },
    /// Session ended; the controller accepts no further transitions
    Terminal,
}

impl View {
    fn name(&self) -> &'static str {
        match self {
            View::Grid => "grid",
            View::Fullscreen { .. } => "fullscreen",
            View::Terminal => "terminal",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} from the {view} view")]
    NotAllowed {
        action: &'static str,
        view: &'static str,
    },

    #[error("message {0} is not in the current list")]
    UnknownMessage(Uuid),

    #[error("no message at position {0}")]
    NoSuchPosition(usize),
}

pub struct PresentationController {
    session_id: Uuid,
    code: String,
    view: View,
    code_modal: bool,
    messages: Vec<MessageInfo>,
    /// Where the focused message was last seen, for clamping if it vanishes
    last_index: usize,
}

impl PresentationController {
    pub fn new(session_id: Uuid, code: impl Into<String>) -> Self {
        Self {
            session_id,
            code: code.into(),
            view: View::Grid,
            code_modal: false,
            messages: Vec::new(),
            last_index: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn is_terminal(&self) -> bool {
        self.view == View::Terminal
    }

    pub fn code_modal(&self) -> bool {
        self.code_modal
    }

    pub fn messages(&self) -> &[MessageInfo] {
        &self.messages
    }

    /// Replace the local list with a freshly polled one and re-anchor the cursor
    pub fn refresh(&mut self, list: &MessageList) {
        if self.is_terminal() {
            return;
        }
        self.messages = list.messages.clone();
        if list.session.status == SessionStatus::Ended {
            self.end();
            return;
        }
        self.reanchor();
    }

    /// Apply a single message returned by a moderation call until the next poll
    pub fn apply(&mut self, updated: MessageInfo) {
        if let Some(slot) = self.messages.iter_mut().find(|m| m.id == updated.id) {
            *slot = updated;
        }
    }

    fn reanchor(&mut self) {
        let View::Fullscreen { message_id } = self.view else {
            return;
        };
        if let Some(index) = self.position_of(message_id) {
            self.last_index = index;
            return;
        }
        // Messages are append-only so this should not happen; clamp anyway
        match self.messages.len() {
            0 => {
                self.view = View::Grid;
                self.last_index = 0;
            }
            len => {
                self.last_index = self.last_index.min(len - 1);
                self.view = View::Fullscreen {
                    message_id: self.messages[self.last_index].id,
                };
            }
        }
    }

    fn position_of(&self, message_id: Uuid) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    /// Index of the focused message in the current ranking
    pub fn current_index(&self) -> Option<usize> {
        match self.view {
            View::Fullscreen { message_id } => self.position_of(message_id),
            _ => None,
        }
    }

    pub fn current_message(&self) -> Option<&MessageInfo> {
        self.current_index().map(|i| &self.messages[i])
    }

    fn require(&self, action: &'static str, fullscreen: bool) -> Result<(), TransitionError> {
        let ok = match self.view {
            View::Grid => !fullscreen,
            View::Fullscreen { .. } => fullscreen,
            View::Terminal => false,
        };
        if ok {
            Ok(())
        } else {
            Err(TransitionError::NotAllowed {
                action,
                view: self.view.name(),
            })
        }
    }

    /// Grid -> Fullscreen on the given message
    pub fn select(&mut self, message_id: Uuid) -> Result<(), TransitionError> {
        self.require("select", false)?;
        let index = self
            .position_of(message_id)
            .ok_or(TransitionError::UnknownMessage(message_id))?;
        self.last_index = index;
        self.view = View::Fullscreen { message_id };
        Ok(())
    }

    /// Select by 1-based grid position, as shown on screen
    pub fn select_position(&mut self, position: usize) -> Result<(), TransitionError> {
        let message_id = position
            .checked_sub(1)
            .and_then(|i| self.messages.get(i))
            .map(|m| m.id)
            .ok_or(TransitionError::NoSuchPosition(position))?;
        self.select(message_id)
    }

    /// Move one message down the ranking. Stops at the last message.
    pub fn next(&mut self) -> Result<bool, TransitionError> {
        self.step("go to next", 1)
    }

    /// Move one message up the ranking. Stops at the first message.
    pub fn prev(&mut self) -> Result<bool, TransitionError> {
        self.step("go to previous", -1)
    }

    fn step(&mut self, action: &'static str, delta: isize) -> Result<bool, TransitionError> {
        self.require(action, true)?;
        let Some(index) = self.current_index() else {
            return Ok(false);
        };
        let Some(target) = index.checked_add_signed(delta) else {
            return Ok(false);
        };
        match self.messages.get(target) {
            Some(message) => {
                self.view = View::Fullscreen {
                    message_id: message.id,
                };
                self.last_index = target;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fullscreen -> Grid
    pub fn exit(&mut self) -> Result<(), TransitionError> {
        self.require("exit", true)?;
        self.view = View::Grid;
        Ok(())
    }

    pub fn show_code(&mut self) {
        if !self.is_terminal() {
            self.code_modal = true;
        }
    }

    pub fn hide_code(&mut self) {
        self.code_modal = false;
    }

    pub fn toggle_code(&mut self) {
        if self.code_modal {
            self.hide_code();
        } else {
            self.show_code();
        }
    }

    /// Leave the controller; reached from any view once the session ends
    pub fn end(&mut self) {
        self.view = View::Terminal;
        self.code_modal = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::test_support::session_list;
    use chrono::{Duration, TimeZone, Utc};
    use shared::{ranking, AuthorMode};

    fn message(session_id: Uuid, text: &str, likes: u64, offset_secs: i64) -> MessageInfo {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        MessageInfo {
            id: Uuid::new_v4(),
            session_id,
            text: text.to_string(),
            author: AuthorMode::Anonymous,
            likes,
            is_highlighted: false,
            is_answered: false,
            created_at: base + Duration::seconds(offset_secs),
        }
    }

    fn list_of(session_id: Uuid, mut messages: Vec<MessageInfo>) -> MessageList {
        ranking::rank(&mut messages);
        let mut list = session_list(session_id, SessionStatus::Active);
        list.messages = messages;
        list
    }

    fn setup() -> (PresentationController, Vec<MessageInfo>) {
        let session_id = Uuid::new_v4();
        let messages = vec![
            message(session_id, "a", 0, 0),
            message(session_id, "b", 0, 1),
            message(session_id, "c", 0, 2),
        ];
        let mut controller = PresentationController::new(session_id, "AB12XZ");
        controller.refresh(&list_of(session_id, messages.clone()));
        (controller, messages)
    }

    #[test]
    fn test_starts_in_grid() {
        let controller = PresentationController::new(Uuid::new_v4(), "AB12XZ");
        assert_eq!(controller.view(), View::Grid);
        assert!(!controller.code_modal());
        assert!(controller.current_message().is_none());
    }

    #[test]
    fn test_navigation_is_bounded_without_wraparound() {
        let (mut controller, messages) = setup();
        controller.select_position(1).unwrap();
        assert_eq!(controller.current_message().unwrap().id, messages[0].id);

        assert_eq!(controller.prev(), Ok(false));
        assert_eq!(controller.current_index(), Some(0));

        assert_eq!(controller.next(), Ok(true));
        assert_eq!(controller.next(), Ok(true));
        assert_eq!(controller.next(), Ok(false));
        assert_eq!(controller.current_message().unwrap().id, messages[2].id);

        controller.exit().unwrap();
        assert_eq!(controller.view(), View::Grid);
    }

    #[test]
    fn test_cursor_follows_message_across_rerank() {
        let (mut controller, mut messages) = setup();
        let session_id = controller.session_id();

        // Focus "b" at index 1
        controller.select(messages[1].id).unwrap();
        assert_eq!(controller.current_index(), Some(1));

        // "c" overtakes everything, pushing "b" to index 2
        messages[2].likes = 5;
        controller.refresh(&list_of(session_id, messages.clone()));

        assert_eq!(controller.current_message().unwrap().text, "b");
        assert_eq!(controller.current_index(), Some(2));

        // Next is bounded from the new position, prev walks the new ranking
        assert_eq!(controller.next(), Ok(false));
        assert_eq!(controller.prev(), Ok(true));
        assert_eq!(controller.current_message().unwrap().text, "a");
    }

    #[test]
    fn test_vanished_message_clamps_to_list_end() {
        let (mut controller, messages) = setup();
        let session_id = controller.session_id();
        controller.select(messages[2].id).unwrap();

        controller.refresh(&list_of(session_id, messages[..2].to_vec()));
        assert_eq!(controller.current_index(), Some(1));
        assert_eq!(controller.current_message().unwrap().id, messages[1].id);

        controller.refresh(&list_of(session_id, Vec::new()));
        assert_eq!(controller.view(), View::Grid);
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let (mut controller, _) = setup();
        assert!(matches!(controller.next(), Err(TransitionError::NotAllowed { .. })));
        assert!(matches!(controller.exit(), Err(TransitionError::NotAllowed { .. })));
        assert_eq!(
            controller.select_position(9),
            Err(TransitionError::NoSuchPosition(9))
        );
        let stranger = Uuid::new_v4();
        assert_eq!(
            controller.select(stranger),
            Err(TransitionError::UnknownMessage(stranger))
        );

        controller.select_position(2).unwrap();
        assert!(matches!(
            controller.select_position(1),
            Err(TransitionError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_code_modal_is_orthogonal_to_view() {
        let (mut controller, _) = setup();
        controller.toggle_code();
        assert!(controller.code_modal());

        controller.select_position(1).unwrap();
        assert!(controller.code_modal());
        controller.next().unwrap();
        controller.toggle_code();
        assert!(!controller.code_modal());
        assert!(matches!(controller.view(), View::Fullscreen { .. }));
    }

    #[test]
    fn test_end_is_terminal_from_any_view() {
        let (mut controller, messages) = setup();
        controller.select_position(1).unwrap();
        controller.show_code();
        controller.end();
        assert!(controller.is_terminal());
        assert!(!controller.code_modal());

        let session_id = controller.session_id();
        controller.refresh(&list_of(session_id, messages));
        assert!(controller.is_terminal());
        assert!(matches!(controller.select_position(1), Err(TransitionError::NotAllowed { .. })));
    }

    #[test]
    fn test_polled_end_moves_to_terminal() {
        let (mut controller, messages) = setup();
        let session_id = controller.session_id();
        let mut ended = list_of(session_id, messages);
        ended.session.status = SessionStatus::Ended;

        controller.refresh(&ended);
        assert!(controller.is_terminal());
        assert_eq!(controller.messages().len(), 3);
    }

    #[test]
    fn test_apply_updates_message_in_place() {
        let (mut controller, messages) = setup();
        let mut highlighted = messages[1].clone();
        highlighted.is_highlighted = true;
        controller.apply(highlighted);
        assert!(controller.messages()[1].is_highlighted);
    }
}
