//! Handlers behind the task and board forms. Most of them end in a reload of
//! the board; task deletes and in-place edits update the board directly.

use crate::api::{ApiClient, TaskApi};
use crate::board::{Board, BoardView};
use crate::drag::DragController;
use crate::models::{Board as BoardSummary, BoardId, Credentials, NewTask, Task, TaskId, TaskUpdate};
use crate::notify::{Level, Notifier};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The board (or board list) must be fetched again.
    Reload,
    /// The board was updated in place.
    Updated,
    /// Nothing changed; the user has been told why.
    Failed,
}

pub async fn create_task<N: Notifier>(api: &ApiClient, notifier: &mut N, task: &NewTask) -> Outcome {
    match api.create_task(task).await {
        Ok(created) => {
            info!(task_id = created.id, "task created");
            Outcome::Reload
        }
        Err(err) => {
            notifier.notify(format!("Failed to create task: {}", err), Level::Danger);
            Outcome::Failed
        }
    }
}

/// Fetches the latest copy of a task to fill the edit form.
pub async fn open_task_for_edit<A, N>(api: &A, notifier: &mut N, task_id: TaskId) -> Option<Task>
where
    A: TaskApi + ?Sized,
    N: Notifier,
{
    match api.get_task(task_id).await {
        Ok(task) => Some(task),
        Err(err) => {
            notifier.notify(format!("Failed to load task: {}", err), Level::Danger);
            None
        }
    }
}

/// Saves an edited task. A status change means the card belongs in another
/// column, so the board is reloaded; otherwise the card is patched in place.
pub async fn update_task<N: Notifier>(
    api: &ApiClient,
    board: &mut Board,
    notifier: &mut N,
    task_id: TaskId,
    update: &TaskUpdate,
) -> Outcome {
    let updated = match api.replace_task(task_id, update).await {
        Ok(task) => task,
        Err(err) => {
            notifier.notify(format!("Failed to update task: {}", err), Level::Danger);
            return Outcome::Failed;
        }
    };

    let outcome = if board.column_of(task_id).as_ref() != Some(&update.status) {
        Outcome::Reload
    } else {
        if let Some(card) = board.card_mut(task_id) {
            card.task.title = updated.title;
            card.task.description = updated.description;
            card.task.due_date = updated.due_date;
        }
        Outcome::Updated
    };
    notifier.notify("Task updated".to_string(), Level::Success);
    outcome
}

/// Deletes a task. The card only disappears once the server agreed.
pub async fn delete_task<A, N>(
    api: &A,
    board: &mut Board,
    drag: &mut DragController,
    notifier: &mut N,
    task_id: TaskId,
) -> Outcome
where
    A: TaskApi + ?Sized,
    N: Notifier,
{
    match api.delete_task(task_id).await {
        Ok(()) => {
            board.remove_card(task_id);
            drag.forget(task_id);
            notifier.notify("Task deleted".to_string(), Level::Success);
            Outcome::Updated
        }
        Err(err) => {
            notifier.notify(format!("Failed to delete task: {}", err), Level::Danger);
            Outcome::Failed
        }
    }
}

pub async fn create_board<N: Notifier>(api: &ApiClient, notifier: &mut N, name: &str) -> Option<BoardSummary> {
    match api.create_board(name).await {
        Ok(board) => {
            notifier.notify(format!("Board '{}' created", board.name), Level::Success);
            Some(board)
        }
        Err(err) => {
            notifier.notify(format!("Failed to create board: {}", err), Level::Danger);
            None
        }
    }
}

pub async fn rename_board<N: Notifier>(
    api: &ApiClient,
    notifier: &mut N,
    board_id: BoardId,
    name: &str,
) -> Outcome {
    match api.replace_board(board_id, name).await {
        Ok(_) => Outcome::Reload,
        Err(err) => {
            notifier.notify(format!("Failed to rename board: {}", err), Level::Danger);
            Outcome::Failed
        }
    }
}

pub async fn delete_board<N: Notifier>(api: &ApiClient, notifier: &mut N, board_id: BoardId) -> Outcome {
    match api.delete_board(board_id).await {
        Ok(()) => {
            notifier.notify("Board deleted".to_string(), Level::Success);
            Outcome::Reload
        }
        Err(err) => {
            notifier.notify(format!("Failed to delete board: {}", err), Level::Danger);
            Outcome::Failed
        }
    }
}

pub async fn register<N: Notifier>(api: &ApiClient, notifier: &mut N, credentials: &Credentials) -> bool {
    match api.register(credentials).await {
        Ok(_) => {
            info!(email = %credentials.email, "registered");
            notifier.notify("Registered, you can now log in".to_string(), Level::Success);
            true
        }
        Err(err) => {
            notifier.notify(format!("Failed to register: {}", err), Level::Danger);
            false
        }
    }
}

pub async fn login<N: Notifier>(api: &ApiClient, notifier: &mut N, credentials: &Credentials) -> bool {
    match api.login(credentials).await {
        Ok(_) => {
            info!(email = %credentials.email, "logged in");
            true
        }
        Err(err) => {
            notifier.notify(format!("Failed to log in: {}", err), Level::Danger);
            false
        }
    }
}

pub async fn logout<N: Notifier>(api: &ApiClient, notifier: &mut N) -> bool {
    match api.logout().await {
        Ok(()) => true,
        Err(err) => {
            notifier.notify(format!("Failed to log out: {}", err), Level::Danger);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::{sample_board, task};
    use crate::config::{Config, FailurePolicy};
    use crate::models::Status;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(String, Level)>,
    }

    impl Notifier for Recorder {
        fn notify(&mut self, message: String, level: Level) {
            self.seen.push((message, level));
        }
    }

    fn client_for(server: &MockServer) -> ApiClient {
        let config = Config {
            base_url: server.uri(),
            ..Config::default()
        };
        ApiClient::new(&config).unwrap()
    }

    fn server_task(id: u64, title: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "task_name": title,
            "task_description": "edited",
            "status": status,
            "board_id": 1,
            "created_at": "2025-01-01T00:00:00"
        })
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_card() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut board = sample_board();
        let mut drag = DragController::new(FailurePolicy::Rollback);
        let mut notes = Recorder::default();

        let outcome = delete_task(&api, &mut board, &mut drag, &mut notes, 2).await;

        assert_eq!(outcome, Outcome::Updated);
        assert!(board.card(2).is_none());
        assert_eq!(board.card_count(), 2);
        assert_eq!(notes.seen, vec![("Task deleted".to_string(), Level::Success)]);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_card() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/2"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "not found"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut board = sample_board();
        let mut drag = DragController::new(FailurePolicy::Rollback);
        let mut notes = Recorder::default();

        let outcome = delete_task(&api, &mut board, &mut drag, &mut notes, 2).await;

        assert_eq!(outcome, Outcome::Failed);
        assert!(board.card(2).is_some());
        assert_eq!(notes.seen[0].1, Level::Danger);
        assert!(notes.seen[0].0.contains("not found"));
    }

    #[tokio::test]
    async fn test_update_in_same_column_patches_card() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/tasks/1"))
            .and(body_json(json!({
                "task_name": "Renamed",
                "task_description": "edited",
                "status": "planned"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_task(1, "Renamed", "planned")))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut board = sample_board();
        let mut notes = Recorder::default();
        let update = TaskUpdate {
            title: "Renamed".into(),
            description: Some("edited".into()),
            status: Status::from("planned"),
        };

        let outcome = update_task(&api, &mut board, &mut notes, 1, &update).await;

        assert_eq!(outcome, Outcome::Updated);
        let card = board.card(1).unwrap();
        assert_eq!(card.task.title, "Renamed");
        assert_eq!(card.task.description.as_deref(), Some("edited"));
    }

    #[tokio::test]
    async fn test_update_with_new_status_requests_reload() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_task(1, "Task 1", "done")))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut board = sample_board();
        let mut notes = Recorder::default();
        let update = TaskUpdate {
            title: "Task 1".into(),
            description: None,
            status: Status::from("done"),
        };

        let outcome = update_task(&api, &mut board, &mut notes, 1, &update).await;
        assert_eq!(outcome, Outcome::Reload);
    }

    #[tokio::test]
    async fn test_create_task_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "board missing"})))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut notes = Recorder::default();
        let new_task = NewTask {
            title: "x".into(),
            description: None,
            board_id: 1,
            status: Status::from("planned"),
            due_date: None,
        };

        assert_eq!(create_task(&api, &mut notes, &new_task).await, Outcome::Failed);
        assert!(notes.seen[0].0.ends_with("board missing"));
    }

    #[tokio::test]
    async fn test_open_task_for_edit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_task(3, "Task 3", "done")))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut notes = Recorder::default();
        let loaded = open_task_for_edit(&api, &mut notes, 3).await.unwrap();
        assert_eq!(loaded.id, task(3, "done").id);
        assert!(notes.seen.is_empty());
    }

    #[tokio::test]
    async fn test_delete_board_reloads() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/boards/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut notes = Recorder::default();
        assert_eq!(delete_board(&api, &mut notes, 1).await, Outcome::Reload);
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "new@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_announces_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .and(body_json(json!({"email": "new@example.com", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut notes = Recorder::default();

        assert!(register(&api, &mut notes, &credentials()).await);
        assert_eq!(
            notes.seen,
            vec![("Registered, you can now log in".to_string(), Level::Success)]
        );
    }

    #[tokio::test]
    async fn test_register_existing_user_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"detail": "User already exists"})),
            )
            .mount(&server)
            .await;

        let api = client_for(&server);
        let mut notes = Recorder::default();

        assert!(!register(&api, &mut notes, &credentials()).await);
        assert_eq!(notes.seen[0].1, Level::Danger);
        assert_eq!(notes.seen[0].0, "Failed to register: User already exists");
    }
}
