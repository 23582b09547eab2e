//! Wiring a [`QuadEditor`] to the host event bus
//!
//! The session holds the editor behind `Rc<RefCell<..>>` so bus listeners
//! can reach it, and keeps one [`Subscription`] per enabled input stream.
//! Disabling a stream, or dropping the session, releases its subscription.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::editor::QuadEditor;
use crate::input::{Channel, EventBus, InputEvent, Subscription};

pub struct EditorSession {
    editor: Rc<RefCell<QuadEditor>>,
    mouse: Option<Subscription>,
    keyboard: Option<Subscription>,
}

impl EditorSession {
    pub fn new(editor: QuadEditor) -> Self {
        Self {
            editor: Rc::new(RefCell::new(editor)),
            mouse: None,
            keyboard: None,
        }
    }

    /// Enable mouse and keyboard input and show the editor
    pub fn setup(&mut self, bus: &EventBus) {
        self.enable_mouse_controls(bus);
        self.enable_keyboard_shortcuts(bus);
        self.editor.borrow_mut().show();
    }

    pub fn editor(&self) -> Ref<'_, QuadEditor> {
        self.editor.borrow()
    }

    pub fn editor_mut(&self) -> RefMut<'_, QuadEditor> {
        self.editor.borrow_mut()
    }

    /// Returns `false` if mouse controls were already enabled
    pub fn enable_mouse_controls(&mut self, bus: &EventBus) -> bool {
        if self.mouse.is_some() {
            return false;
        }
        self.mouse = Some(self.listen(bus, Channel::Pointer));
        true
    }

    /// Returns `false` if mouse controls were not enabled
    pub fn disable_mouse_controls(&mut self) -> bool {
        self.mouse.take().is_some()
    }

    pub fn enable_keyboard_shortcuts(&mut self, bus: &EventBus) -> bool {
        if self.keyboard.is_some() {
            return false;
        }
        self.keyboard = Some(self.listen(bus, Channel::Keyboard));
        true
    }

    pub fn disable_keyboard_shortcuts(&mut self) -> bool {
        self.keyboard.take().is_some()
    }

    pub fn mouse_enabled(&self) -> bool {
        self.mouse.is_some()
    }

    pub fn keyboard_enabled(&self) -> bool {
        self.keyboard.is_some()
    }

    /// Release both subscriptions and hand back the editor
    pub fn into_editor(self) -> QuadEditor {
        let Self {
            editor,
            mouse,
            keyboard,
        } = self;
        drop(mouse);
        drop(keyboard);

        match Rc::try_unwrap(editor) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => {
                // bound so the `Ref` guard drops before `shared`
                let editor = shared.borrow().clone();
                editor
            }
        }
    }

    fn listen(&self, bus: &EventBus, channel: Channel) -> Subscription {
        let editor: Weak<RefCell<QuadEditor>> = Rc::downgrade(&self.editor);
        bus.subscribe(channel, move |event: &InputEvent| {
            if let Some(editor) = editor.upgrade() {
                editor.borrow_mut().handle_event(event);
            }
        })
    }
}
