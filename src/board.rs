//! Client-side board model: status columns holding task cards.
//!
//! This is the surface the drag controller mutates and the UI renders. Columns
//! are a purely visual grouping; each one claims exactly one status label.

use crate::models::{BoardId, Status, Task, TaskId};

#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub task: Task,
    pub dragging: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub status: Status,
    pub cards: Vec<Card>,
    pub highlighted: bool,
}

impl Column {
    fn new(status: Status) -> Column {
        Column {
            status,
            cards: Vec::new(),
            highlighted: false,
        }
    }
}

/// What the drag controller is allowed to do to the board.
pub trait BoardView {
    /// Status of the column currently holding the card, if the card is present.
    fn column_of(&self, task_id: TaskId) -> Option<Status>;
    fn has_column(&self, status: &Status) -> bool;
    /// Moves the card to the end of the column for `status`. Returns false when
    /// nothing changed (card missing, column missing, or already there).
    fn move_card(&mut self, task_id: TaskId, status: &Status) -> bool;
    fn set_dragging(&mut self, task_id: TaskId, dragging: bool);
    fn set_highlight(&mut self, status: &Status, highlighted: bool);
}

#[derive(Clone, Debug, PartialEq)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub columns: Vec<Column>,
}

impl Board {
    /// Lays tasks out under the configured columns. A task whose status has no
    /// configured column gets a column of its own appended at the end.
    pub fn from_tasks(id: BoardId, name: String, statuses: &[Status], tasks: Vec<Task>) -> Board {
        let mut columns: Vec<Column> = Vec::new();
        for status in statuses {
            if !columns.iter().any(|c| &c.status == status) {
                columns.push(Column::new(status.clone()));
            }
        }

        for task in tasks {
            let index = match columns.iter().position(|c| c.status == task.status) {
                Some(index) => index,
                None => {
                    columns.push(Column::new(task.status.clone()));
                    columns.len() - 1
                }
            };
            columns[index].cards.push(Card {
                task,
                dragging: false,
            });
        }

        Board { id, name, columns }
    }

    pub fn column_index(&self, status: &Status) -> Option<usize> {
        self.columns.iter().position(|c| &c.status == status)
    }

    fn locate(&self, task_id: TaskId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, column)| {
            column
                .cards
                .iter()
                .position(|card| card.task.id == task_id)
                .map(|ri| (ci, ri))
        })
    }

    pub fn card(&self, task_id: TaskId) -> Option<&Card> {
        self.locate(task_id)
            .map(|(ci, ri)| &self.columns[ci].cards[ri])
    }

    pub fn card_mut(&mut self, task_id: TaskId) -> Option<&mut Card> {
        let (ci, ri) = self.locate(task_id)?;
        Some(&mut self.columns[ci].cards[ri])
    }

    pub fn remove_card(&mut self, task_id: TaskId) -> Option<Card> {
        let (ci, ri) = self.locate(task_id)?;
        Some(self.columns[ci].cards.remove(ri))
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }
}

impl BoardView for Board {
    fn column_of(&self, task_id: TaskId) -> Option<Status> {
        self.locate(task_id)
            .map(|(ci, _)| self.columns[ci].status.clone())
    }

    fn has_column(&self, status: &Status) -> bool {
        self.column_index(status).is_some()
    }

    fn move_card(&mut self, task_id: TaskId, status: &Status) -> bool {
        let Some(target) = self.column_index(status) else {
            return false;
        };
        let Some((ci, ri)) = self.locate(task_id) else {
            return false;
        };
        if ci == target {
            return false;
        }
        let mut card = self.columns[ci].cards.remove(ri);
        card.task.status = status.clone();
        self.columns[target].cards.push(card);
        true
    }

    fn set_dragging(&mut self, task_id: TaskId, dragging: bool) {
        if let Some(card) = self.card_mut(task_id) {
            card.dragging = dragging;
        }
    }

    fn set_highlight(&mut self, status: &Status, highlighted: bool) {
        if let Some(index) = self.column_index(status) {
            self.columns[index].highlighted = highlighted;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn task(id: TaskId, status: &str) -> Task {
        Task {
            id,
            title: format!("Task {}", id),
            description: None,
            board_id: 1,
            status: Status::from(status),
            due_date: None,
            created_at: None,
        }
    }

    pub(crate) fn sample_board() -> Board {
        let statuses: Vec<Status> = vec!["planned".into(), "in-progress".into(), "done".into()];
        Board::from_tasks(
            1,
            "Sprint".into(),
            &statuses,
            vec![task(1, "planned"), task(2, "planned"), task(3, "done")],
        )
    }

    #[test]
    fn test_tasks_are_grouped_by_status() {
        let board = sample_board();
        assert_eq!(board.columns.len(), 3);
        assert_eq!(board.columns[0].cards.len(), 2);
        assert!(board.columns[1].cards.is_empty());
        assert_eq!(board.column_of(3), Some(Status::from("done")));
    }

    #[test]
    fn test_unknown_status_gets_its_own_column() {
        let statuses: Vec<Status> = vec!["planned".into()];
        let board = Board::from_tasks(1, "B".into(), &statuses, vec![task(1, "blocked")]);
        assert_eq!(board.columns.len(), 2);
        assert_eq!(board.columns[1].status, Status::from("blocked"));
    }

    #[test]
    fn test_move_card_appends_to_target() {
        let mut board = sample_board();
        assert!(board.move_card(1, &Status::from("done")));
        let done = &board.columns[2];
        assert_eq!(done.cards.last().unwrap().task.id, 1);
        assert_eq!(done.cards.last().unwrap().task.status, Status::from("done"));
        assert_eq!(board.columns[0].cards.len(), 1);
    }

    #[test]
    fn test_move_card_noops() {
        let mut board = sample_board();
        assert!(!board.move_card(3, &Status::from("done")));
        assert!(!board.move_card(99, &Status::from("done")));
        assert!(!board.move_card(1, &Status::from("archived")));
        assert_eq!(board, sample_board());
    }

    #[test]
    fn test_remove_card() {
        let mut board = sample_board();
        let removed = board.remove_card(2).unwrap();
        assert_eq!(removed.task.id, 2);
        assert_eq!(board.card_count(), 2);
        assert!(board.remove_card(2).is_none());
    }
}
