use chrono::NaiveDate;
use regex::Regex;

/// Quick-entry form of a new task: `Fix login #2 due:2025-03-01`.
#[derive(Debug, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    /// 1-based column number picked with `#n`.
    pub column: Option<usize>,
    pub due_date: Option<NaiveDate>,
}

impl ParsedTask {
    /// Due date in the form the API expects for a datetime field.
    pub fn due_date_param(&self) -> Option<String> {
        self.due_date
            .map(|date| format!("{}T00:00:00", date.format("%Y-%m-%d")))
    }
}

pub fn parse_task_input(input: &str) -> ParsedTask {
    let column_re = Regex::new(r"(?:^|\s)#(\d+)\b").unwrap();
    let due_re = Regex::new(r"(?:^|\s)due:(\S+)").unwrap();

    let column = column_re
        .captures(input)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .filter(|n| *n > 0);

    // An unparseable date stays in the title so nothing typed is lost.
    let mut due_date = None;
    let mut remaining = column_re.replace_all(input, " ").to_string();
    if let Some(caps) = due_re.captures(&remaining) {
        if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
            due_date = Some(date);
            remaining = due_re.replace(&remaining, " ").to_string();
        }
    }

    let title = Regex::new(r"\s+")
        .unwrap()
        .replace_all(&remaining, " ")
        .trim()
        .to_string();

    ParsedTask {
        title,
        column,
        due_date,
    }
}
