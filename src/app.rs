use crate::actions::{self, Outcome};
use crate::api::ApiClient;
use crate::board::Board;
use crate::config::Config;
use crate::drag::{send_status_update, DragController, PendingMove};
use crate::error::ApiError;
use crate::models::{Board as BoardSummary, NewTask, Status, Task, TaskId, TaskUpdate};
use crate::notify::{Level, Notifier, Toasts};
use crate::parser::parse_task_input;
use crossterm::event::KeyCode;
use std::io;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A settled status update on its way back to the UI loop.
pub type StatusUpdate = (PendingMove, Result<Task, ApiError>);

#[derive(Debug, PartialEq)]
pub enum InputMode {
    Normal,
    Dragging,
    Editing,
    Insert,
    Confirm(ConfirmTarget),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConfirmTarget {
    Task(TaskId),
    Board,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FormKind {
    NewTask,
    EditTask(TaskId),
    NewBoard,
    RenameBoard,
}

#[derive(Debug, PartialEq)]
pub enum ActiveInput {
    Title,
    Description,
}

pub struct App {
    pub api: ApiClient,
    pub statuses: Vec<Status>,
    pub boards: Vec<BoardSummary>,
    pub board_index: usize,
    pub board: Option<Board>,
    pub drag: DragController,
    pub toasts: Toasts,
    pub cursor_column: usize,
    pub cursor_row: usize,
    pub input_mode: InputMode,
    pub form: FormKind,
    pub active_input: ActiveInput,
    pub form_title: String,
    pub form_description: String,
    pub form_column: usize,
    updates_tx: mpsc::UnboundedSender<StatusUpdate>,
    updates_rx: mpsc::UnboundedReceiver<StatusUpdate>,
}

impl App {
    pub fn new(api: ApiClient, config: &Config) -> App {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        App {
            api,
            statuses: config.columns.clone(),
            boards: Vec::new(),
            board_index: 0,
            board: None,
            drag: DragController::new(config.on_failure),
            toasts: Toasts::new(),
            cursor_column: 0,
            cursor_row: 0,
            input_mode: InputMode::Normal,
            form: FormKind::NewTask,
            active_input: ActiveInput::Title,
            form_title: String::new(),
            form_description: String::new(),
            form_column: 0,
            updates_tx,
            updates_rx,
        }
    }

    pub async fn load_boards(&mut self, preferred: Option<u64>) {
        match self.api.list_boards().await {
            Ok(boards) => {
                self.boards = boards;
                if let Some(id) = preferred {
                    if let Some(index) = self.boards.iter().position(|b| b.id == id) {
                        self.board_index = index;
                    }
                }
                if self.board_index >= self.boards.len() {
                    self.board_index = 0;
                }
            }
            Err(err) => {
                self.toasts
                    .notify(format!("Failed to load boards: {}", err), Level::Danger);
            }
        }
        self.reload_board().await;
    }

    /// Fetches the current board again. Anything still in flight for the old
    /// copy is discarded when it lands.
    pub async fn reload_board(&mut self) {
        if self.drag.is_dragging() {
            self.input_mode = InputMode::Normal;
        }
        self.drag.reset();
        let Some(summary) = self.boards.get(self.board_index) else {
            self.board = None;
            return;
        };
        match self.api.get_board(summary.id).await {
            Ok(loaded) => {
                self.board = Some(Board::from_tasks(
                    loaded.id,
                    loaded.name,
                    &self.statuses,
                    loaded.tasks,
                ));
                self.clamp_cursor();
            }
            Err(err) => {
                self.toasts
                    .notify(format!("Failed to load board: {}", err), Level::Danger);
            }
        }
    }

    /// Re-reads the tasks of the current board, keeping its name and the
    /// board list as they are.
    pub async fn refresh_tasks(&mut self) {
        let Some((board_id, name)) = self.board.as_ref().map(|b| (b.id, b.name.clone())) else {
            self.reload_board().await;
            return;
        };
        match self.api.list_tasks(Some(board_id), None).await {
            Ok(tasks) => {
                self.drag.reset();
                self.board = Some(Board::from_tasks(board_id, name, &self.statuses, tasks));
                self.clamp_cursor();
            }
            Err(err) => {
                self.toasts
                    .notify(format!("Failed to load tasks: {}", err), Level::Danger);
            }
        }
    }

    fn column_count(&self) -> usize {
        self.board.as_ref().map_or(0, |b| b.columns.len())
    }

    fn cards_in_cursor_column(&self) -> usize {
        self.board
            .as_ref()
            .and_then(|b| b.columns.get(self.cursor_column))
            .map_or(0, |c| c.cards.len())
    }

    fn clamp_cursor(&mut self) {
        let columns = self.column_count();
        if columns == 0 {
            self.cursor_column = 0;
            self.cursor_row = 0;
            return;
        }
        if self.cursor_column >= columns {
            self.cursor_column = columns - 1;
        }
        let cards = self.cards_in_cursor_column();
        if self.cursor_row >= cards {
            self.cursor_row = cards.saturating_sub(1);
        }
    }

    pub fn selected_task_id(&self) -> Option<TaskId> {
        self.board
            .as_ref()?
            .columns
            .get(self.cursor_column)?
            .cards
            .get(self.cursor_row)
            .map(|card| card.task.id)
    }

    fn cursor_status(&self) -> Option<Status> {
        self.board
            .as_ref()?
            .columns
            .get(self.cursor_column)
            .map(|c| c.status.clone())
    }

    pub fn next(&mut self) {
        let cards = self.cards_in_cursor_column();
        if cards == 0 {
            return;
        }
        self.cursor_row = if self.cursor_row >= cards - 1 {
            0
        } else {
            self.cursor_row + 1
        };
    }

    pub fn previous(&mut self) {
        let cards = self.cards_in_cursor_column();
        if cards == 0 {
            return;
        }
        self.cursor_row = if self.cursor_row == 0 {
            cards - 1
        } else {
            self.cursor_row - 1
        };
    }

    fn shift_column(&mut self, forward: bool) {
        let columns = self.column_count();
        if columns == 0 {
            return;
        }
        self.cursor_column = if forward {
            (self.cursor_column + 1) % columns
        } else {
            (self.cursor_column + columns - 1) % columns
        };
    }

    pub fn move_column(&mut self, forward: bool) {
        self.shift_column(forward);
        self.clamp_cursor();
    }

    pub fn start_drag(&mut self) {
        let (Some(task_id), Some(status)) = (self.selected_task_id(), self.cursor_status()) else {
            return;
        };
        let Some(board) = self.board.as_mut() else {
            return;
        };
        if self.drag.on_drag_start(board, task_id) {
            self.drag.on_column_enter(board, &status);
            self.input_mode = InputMode::Dragging;
        }
    }

    /// Moves the hover highlight to the neighbouring column while dragging.
    pub fn hover(&mut self, forward: bool) {
        let Some(previous) = self.cursor_status() else {
            return;
        };
        self.shift_column(forward);
        let Some(next) = self.cursor_status() else {
            return;
        };
        if let Some(board) = self.board.as_mut() {
            self.drag.on_column_leave(board, &previous);
            self.drag.on_column_enter(board, &next);
        }
    }

    pub fn drop_card(&mut self) {
        self.input_mode = InputMode::Normal;
        let Some(status) = self.cursor_status() else {
            return;
        };
        let Some(board) = self.board.as_mut() else {
            return;
        };
        if let Some(pending) = self.drag.on_drop(board, &status) {
            if let Some(column) = board.column_index(&pending.target) {
                self.cursor_column = column;
                self.cursor_row = board.columns[column]
                    .cards
                    .iter()
                    .position(|c| c.task.id == pending.task_id)
                    .unwrap_or(0);
            }
            self.spawn_status_update(pending);
        }
        self.clamp_cursor();
    }

    pub fn cancel_drag(&mut self) {
        if let Some(board) = self.board.as_mut() {
            self.drag.on_drag_end(board);
        }
        self.input_mode = InputMode::Normal;
    }

    fn spawn_status_update(&self, pending: PendingMove) {
        let api = self.api.clone();
        let tx = self.updates_tx.clone();
        tokio::spawn(async move {
            let result = send_status_update(&api, &pending).await;
            if tx.send((pending, result)).is_err() {
                debug!("status update finished after the UI closed");
            }
        });
    }

    /// Applies every status update that has settled since the last tick, in
    /// the order they arrived.
    pub fn drain_status_updates(&mut self) {
        while let Ok((pending, result)) = self.updates_rx.try_recv() {
            match self.board.as_mut() {
                Some(board) => {
                    self.drag
                        .resolve(board, &mut self.toasts, &pending, result);
                }
                None => warn!(task_id = pending.task_id, "status update arrived without a board"),
            }
        }
        self.clamp_cursor();
    }

    fn open_form(&mut self, form: FormKind) {
        self.form = form;
        self.form_title.clear();
        self.form_description.clear();
        self.form_column = self.cursor_column;
        self.active_input = ActiveInput::Title;
        self.input_mode = InputMode::Editing;
    }

    async fn open_edit_form(&mut self) {
        let Some(task_id) = self.selected_task_id() else {
            return;
        };
        let Some(task) = actions::open_task_for_edit(&self.api, &mut self.toasts, task_id).await
        else {
            return;
        };
        self.open_form(FormKind::EditTask(task.id));
        self.form_title = task.title;
        self.form_description = task.description.unwrap_or_default();
        if let Some(column) = self
            .board
            .as_ref()
            .and_then(|b| b.column_index(&task.status))
        {
            self.form_column = column;
        }
    }

    fn close_form(&mut self) {
        self.form_title.clear();
        self.form_description.clear();
        self.input_mode = InputMode::Normal;
    }

    fn form_status(&self, column: usize) -> Option<Status> {
        self.board
            .as_ref()?
            .columns
            .get(column)
            .map(|c| c.status.clone())
    }

    async fn submit_form(&mut self) {
        if self.form_title.trim().is_empty() {
            self.toasts
                .notify("Title cannot be empty".to_string(), Level::Warning);
            return;
        }
        let description = if self.form_description.trim().is_empty() {
            None
        } else {
            Some(self.form_description.trim().to_string())
        };

        let outcome = match self.form {
            FormKind::NewTask => {
                let parsed = parse_task_input(&self.form_title);
                let column = parsed.column.map(|n| n - 1).unwrap_or(self.form_column);
                let (Some(board_id), Some(status)) =
                    (self.board.as_ref().map(|b| b.id), self.form_status(column))
                else {
                    self.toasts
                        .notify("No column for the new task".to_string(), Level::Warning);
                    return;
                };
                let task = NewTask {
                    title: parsed.title.clone(),
                    description,
                    board_id,
                    status,
                    due_date: parsed.due_date_param(),
                };
                actions::create_task(&self.api, &mut self.toasts, &task).await
            }
            FormKind::EditTask(task_id) => {
                let Some(status) = self.form_status(self.form_column) else {
                    return;
                };
                let update = TaskUpdate {
                    title: self.form_title.trim().to_string(),
                    description,
                    status,
                };
                match self.board.as_mut() {
                    Some(board) => {
                        actions::update_task(&self.api, board, &mut self.toasts, task_id, &update)
                            .await
                    }
                    None => Outcome::Failed,
                }
            }
            FormKind::NewBoard => {
                match actions::create_board(&self.api, &mut self.toasts, self.form_title.trim()).await {
                    Some(created) => {
                        self.close_form();
                        self.load_boards(Some(created.id)).await;
                        return;
                    }
                    None => Outcome::Failed,
                }
            }
            FormKind::RenameBoard => {
                let Some(board_id) = self.board.as_ref().map(|b| b.id) else {
                    return;
                };
                match actions::rename_board(&self.api, &mut self.toasts, board_id, self.form_title.trim()).await {
                    Outcome::Reload => {
                        self.close_form();
                        self.load_boards(Some(board_id)).await;
                        return;
                    }
                    other => other,
                }
            }
        };

        if outcome != Outcome::Failed {
            self.close_form();
        }
        if outcome == Outcome::Reload {
            self.refresh_tasks().await;
        }
    }

    async fn confirm(&mut self, target: ConfirmTarget) {
        match target {
            ConfirmTarget::Task(task_id) => {
                if let Some(board) = self.board.as_mut() {
                    actions::delete_task(&self.api, board, &mut self.drag, &mut self.toasts, task_id)
                        .await;
                }
                self.clamp_cursor();
            }
            ConfirmTarget::Board => {
                let Some(board_id) = self.board.as_ref().map(|b| b.id) else {
                    return;
                };
                if actions::delete_board(&self.api, &mut self.toasts, board_id).await == Outcome::Reload {
                    self.board_index = 0;
                    self.load_boards(None).await;
                }
            }
        }
    }

    async fn switch_board(&mut self, forward: bool) {
        let count = self.boards.len();
        if count < 2 {
            return;
        }
        self.board_index = if forward {
            (self.board_index + 1) % count
        } else {
            (self.board_index + count - 1) % count
        };
        self.cursor_column = 0;
        self.cursor_row = 0;
        self.reload_board().await;
    }

    pub async fn handle_input(&mut self, key: crossterm::event::KeyEvent) -> io::Result<bool> {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Char('h') | KeyCode::Left => self.move_column(false),
                KeyCode::Char('l') | KeyCode::Right => self.move_column(true),
                KeyCode::Char(' ') => self.start_drag(),
                KeyCode::Char('a') => {
                    if self.board.is_some() {
                        self.open_form(FormKind::NewTask);
                    }
                }
                KeyCode::Char('e') | KeyCode::Enter => self.open_edit_form().await,
                KeyCode::Char('d') => {
                    if let Some(task_id) = self.selected_task_id() {
                        self.input_mode = InputMode::Confirm(ConfirmTarget::Task(task_id));
                    }
                }
                KeyCode::Char('r') => self.reload_board().await,
                KeyCode::Char('b') => self.switch_board(true).await,
                KeyCode::Char('B') => self.switch_board(false).await,
                KeyCode::Char('N') => self.open_form(FormKind::NewBoard),
                KeyCode::Char('R') => {
                    if let Some(name) = self.board.as_ref().map(|b| b.name.clone()) {
                        self.open_form(FormKind::RenameBoard);
                        self.form_title = name;
                    }
                }
                KeyCode::Char('X') => {
                    if self.board.is_some() {
                        self.input_mode = InputMode::Confirm(ConfirmTarget::Board);
                    }
                }
                _ => {}
            },

            InputMode::Dragging => match key.code {
                KeyCode::Char('h') | KeyCode::Left => self.hover(false),
                KeyCode::Char('l') | KeyCode::Right => self.hover(true),
                KeyCode::Char(' ') | KeyCode::Enter => self.drop_card(),
                KeyCode::Esc | KeyCode::Char('q') => self.cancel_drag(),
                _ => {}
            },

            InputMode::Editing => match key.code {
                KeyCode::Char('i') => {
                    self.input_mode = InputMode::Insert;
                }
                KeyCode::Tab => {
                    self.active_input = match self.active_input {
                        ActiveInput::Title => ActiveInput::Description,
                        ActiveInput::Description => ActiveInput::Title,
                    };
                }
                KeyCode::Left | KeyCode::Char('h') => {
                    let columns = self.column_count();
                    if columns > 0 {
                        self.form_column = (self.form_column + columns - 1) % columns;
                    }
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    let columns = self.column_count();
                    if columns > 0 {
                        self.form_column = (self.form_column + 1) % columns;
                    }
                }
                KeyCode::Enter => self.submit_form().await,
                KeyCode::Esc => self.close_form(),
                _ => {}
            },

            InputMode::Insert => match key.code {
                KeyCode::Char(c) => match self.active_input {
                    ActiveInput::Title => self.form_title.push(c),
                    ActiveInput::Description => self.form_description.push(c),
                },
                KeyCode::Backspace => match self.active_input {
                    ActiveInput::Title => {
                        self.form_title.pop();
                    }
                    ActiveInput::Description => {
                        self.form_description.pop();
                    }
                },
                KeyCode::Esc => {
                    self.input_mode = InputMode::Editing;
                }
                _ => {}
            },

            InputMode::Confirm(target) => {
                self.input_mode = InputMode::Normal;
                if key.code == KeyCode::Char('y') {
                    self.confirm(target).await;
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::sample_board;
    use crate::board::BoardView;
    use crate::config::FailurePolicy;
    use crossterm::event::{KeyEvent, KeyModifiers};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_for(server: &MockServer, policy: FailurePolicy) -> App {
        let config = Config {
            base_url: server.uri(),
            columns: vec!["planned".into(), "in-progress".into(), "done".into()],
            on_failure: policy,
            ..Config::default()
        };
        let api = ApiClient::new(&config).unwrap();
        let mut app = App::new(api, &config);
        app.board = Some(sample_board());
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn wait_for_update(app: &mut App) {
        for _ in 0..100 {
            app.drain_status_updates();
            if !app.toasts.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_keyboard_drag_to_done() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tasks/1/status"))
            .and(body_json(json!({"status": "done"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1, "task_name": "Task 1", "status": "done", "board_id": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = app_for(&server, FailurePolicy::Rollback);
        app.handle_input(key(KeyCode::Char(' '))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Dragging);
        app.handle_input(key(KeyCode::Char('l'))).await.unwrap();
        app.handle_input(key(KeyCode::Char('l'))).await.unwrap();
        assert!(app.board.as_ref().unwrap().columns[2].highlighted);
        app.handle_input(key(KeyCode::Enter)).await.unwrap();

        let board = app.board.as_ref().unwrap();
        assert_eq!(board.column_of(1), Some(Status::from("done")));
        assert_eq!(app.selected_task_id(), Some(1));

        wait_for_update(&mut app).await;
        let toast = app.toasts.iter().last().unwrap();
        assert_eq!(toast.level, Level::Success);
    }

    #[tokio::test]
    async fn test_keyboard_drag_failure_rolls_back() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tasks/1/status"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "forbidden"})))
            .mount(&server)
            .await;

        let mut app = app_for(&server, FailurePolicy::Rollback);
        app.start_drag();
        app.hover(true);
        app.hover(true);
        app.drop_card();
        assert_eq!(
            app.board.as_ref().unwrap().column_of(1),
            Some(Status::from("done"))
        );

        wait_for_update(&mut app).await;
        assert_eq!(
            app.board.as_ref().unwrap().column_of(1),
            Some(Status::from("planned"))
        );
        let toast = app.toasts.iter().last().unwrap();
        assert_eq!(toast.level, Level::Danger);
        assert!(toast.message.contains("forbidden"));
    }

    #[tokio::test]
    async fn test_escape_cancels_drag() {
        let server = MockServer::start().await;
        let mut app = app_for(&server, FailurePolicy::Rollback);

        app.handle_input(key(KeyCode::Char(' '))).await.unwrap();
        app.handle_input(key(KeyCode::Char('l'))).await.unwrap();
        app.handle_input(key(KeyCode::Esc)).await.unwrap();

        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.board.as_ref().unwrap(), &sample_board());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = app_for(&server, FailurePolicy::Rollback);
        app.handle_input(key(KeyCode::Char('d'))).await.unwrap();
        app.handle_input(key(KeyCode::Char('n'))).await.unwrap();
        assert!(app.board.as_ref().unwrap().card(1).is_some());

        app.handle_input(key(KeyCode::Char('d'))).await.unwrap();
        app.handle_input(key(KeyCode::Char('y'))).await.unwrap();
        assert!(app.board.as_ref().unwrap().card(1).is_none());
        assert_eq!(app.selected_task_id(), Some(2));
    }

    #[tokio::test]
    async fn test_created_task_appears_after_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks/"))
            .and(body_json(json!({
                "task_name": "Write docs",
                "board_id": 1,
                "status": "in-progress"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4, "task_name": "Write docs", "status": "in-progress", "board_id": 1
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/"))
            .and(query_param("board_id", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "task_name": "Task 1", "status": "planned", "board_id": 1},
                {"id": 4, "task_name": "Write docs", "status": "in-progress", "board_id": 1}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = app_for(&server, FailurePolicy::Rollback);
        app.move_column(true);
        app.handle_input(key(KeyCode::Char('a'))).await.unwrap();
        app.handle_input(key(KeyCode::Char('i'))).await.unwrap();
        for c in "Write docs".chars() {
            app.handle_input(key(KeyCode::Char(c))).await.unwrap();
        }
        app.handle_input(key(KeyCode::Esc)).await.unwrap();
        app.handle_input(key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.input_mode, InputMode::Normal);
        let board = app.board.as_ref().unwrap();
        assert_eq!(board.name, "Sprint");
        assert_eq!(board.card_count(), 2);
        assert_eq!(board.column_of(4), Some(Status::from("in-progress")));
    }

    #[test]
    fn test_cursor_wraps_within_column() {
        let config = Config::default();
        let mut app = App::new(ApiClient::new(&config).unwrap(), &config);
        app.board = Some(sample_board());

        app.next();
        assert_eq!(app.selected_task_id(), Some(2));
        app.next();
        assert_eq!(app.selected_task_id(), Some(1));
        app.previous();
        assert_eq!(app.selected_task_id(), Some(2));

        app.move_column(true);
        assert_eq!(app.selected_task_id(), None);
        app.move_column(true);
        assert_eq!(app.selected_task_id(), Some(3));
    }
}
