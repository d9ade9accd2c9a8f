use crossterm::event::{KeyCode, KeyEvent};
use lazyview::prefetch::Prefetcher;
use lazyview::reader::ReadError;
use lazyview::tree::JsonTree;
use lazyview::window::SlidingWindow;
use ratatui::widgets::ListState;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

/// Interactive actor state.
///
/// Everything here runs on the input thread. It never touches the
/// reader: focus moves go through `SlidingWindow::set_focus` (which
/// evicts) followed by a prefetcher wake, and resume checkpoints stay
/// the prefetcher's business.
pub struct App {
    /// Shared record window; the prefetcher mutates both ends.
    pub window: Arc<Mutex<SlidingWindow<JsonTree>>>,
    prefetcher: Prefetcher,
    error_rx: Receiver<ReadError>,
    pub file_name: String,
    pub last_error: Option<String>,
    pub show_help: bool,
    pub should_quit: bool,
    /// Scroll state for the record list widget.
    pub list_state: ListState,
}

impl App {
    pub fn new(
        window: Arc<Mutex<SlidingWindow<JsonTree>>>,
        prefetcher: Prefetcher,
        error_rx: Receiver<ReadError>,
        file_name: String,
    ) -> Self {
        Self {
            window,
            prefetcher,
            error_rx,
            file_name,
            last_error: None,
            show_help: false,
            should_quit: false,
            list_state: ListState::default(),
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, page_size: usize) {
        if self.show_help {
            // Any key dismisses the overlay.
            self.show_help = false;
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::F(8) | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('h') | KeyCode::F(1) => self.show_help = true,
            KeyCode::Up | KeyCode::Char('k') => self.move_focus(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_focus(1),
            KeyCode::PageUp => self.move_focus(-(page_size as i64)),
            KeyCode::PageDown => self.move_focus(page_size as i64),
            KeyCode::Home | KeyCode::Char('g') => self.jump_to_first_loaded(),
            KeyCode::End | KeyCode::Char('G') => self.jump_to_last_loaded(),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_expanded(),
            KeyCode::Right => self.set_expanded(true),
            KeyCode::Left => self.set_expanded(false),
            _ => {}
        }
    }

    /// Move the focus by `delta` records within the loaded window and
    /// wake the prefetcher to backfill whatever the move evicted.
    pub fn move_focus(&mut self, delta: i64) {
        {
            let mut w = self.window.lock().unwrap();
            let target = (w.focus() as i64 + delta).max(0) as usize;
            w.set_focus(target);
        }
        self.prefetcher.wake();
    }

    pub fn jump_to_first_loaded(&mut self) {
        self.window.lock().unwrap().set_focus(0);
        self.prefetcher.wake();
    }

    pub fn jump_to_last_loaded(&mut self) {
        self.window.lock().unwrap().set_focus(usize::MAX);
        self.prefetcher.wake();
    }

    pub fn toggle_expanded(&mut self) {
        let mut w = self.window.lock().unwrap();
        let focus = w.focus();
        if let Some((rec, tree)) = w.get_mut(focus) {
            tree.toggle(&rec.value);
        }
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        let mut w = self.window.lock().unwrap();
        let focus = w.focus();
        if let Some((rec, tree)) = w.get_mut(focus) {
            tree.set_expanded(expanded, &rec.value);
        }
    }

    /// Pull pending prefetcher errors. Anything on this channel is a
    /// fatal I/O failure; the session ends and main reports it after
    /// the terminal is restored.
    pub fn drain_errors(&mut self) {
        while let Ok(err) = self.error_rx.try_recv() {
            self.last_error = Some(err.to_string());
            self.should_quit = true;
        }
    }

    /// Stop the prefetcher and wait for its in-flight tick.
    pub fn shutdown(&mut self) {
        self.prefetcher.shutdown();
    }
}
