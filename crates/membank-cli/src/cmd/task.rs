//! `membank task ...`

use super::parse_arg;
use crate::cli::TaskCommands;
use crate::table::Table;
use crate::ui;
use membank_kernel::Membank;
use membank_types::error::{MembankError, MembankResult};
use membank_types::task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};

pub fn run(membank: &Membank, command: TaskCommands) -> MembankResult<()> {
    let tasks = membank.tasks();
    match command {
        TaskCommands::Add {
            title,
            description,
            priority,
            depends,
            details,
            test_strategy,
        } => {
            let new = NewTask {
                title,
                description,
                status: None,
                priority: priority.as_deref().map(parse_arg::<TaskPriority>).transpose()?,
                dependencies: depends,
                details,
                test_strategy,
            };
            let task = tasks.create_task(new)?;
            ui::success(&format!("Created task {}: {}", task.id, task.title));
        }
        TaskCommands::List { status, json } => {
            let filter = status.as_deref().map(parse_arg::<TaskStatus>).transpose()?;
            let all: Vec<Task> = tasks
                .get_all_tasks()?
                .into_iter()
                .filter(|t| filter.map_or(true, |s| t.status == s))
                .collect();
            if json {
                ui::print_json(&all);
            } else if all.is_empty() {
                ui::hint("No tasks. Add one with `membank task add <title>`");
            } else {
                print_tasks(&all);
            }
        }
        TaskCommands::Show { id, json } => {
            let task = tasks
                .get_task(id)?
                .ok_or_else(|| MembankError::NotFound(format!("task {id}")))?;
            if json {
                ui::print_json(&task);
            } else {
                print_task(&task);
            }
        }
        TaskCommands::Update {
            id,
            title,
            description,
            priority,
            details,
            test_strategy,
        } => {
            let patch = TaskPatch {
                title,
                description,
                priority: priority.as_deref().map(parse_arg::<TaskPriority>).transpose()?,
                details,
                test_strategy,
                ..Default::default()
            };
            match tasks.update_task(id, patch)? {
                Some(task) => ui::success(&format!("Updated task {}", task.id)),
                None => return Err(MembankError::NotFound(format!("task {id}"))),
            }
        }
        TaskCommands::Status { id, status } => {
            let status = parse_arg::<TaskStatus>(&status)?;
            match tasks.set_status(id, status)? {
                Some(task) => ui::success(&format!("Task {} is now {}", task.id, task.status)),
                None => return Err(MembankError::NotFound(format!("task {id}"))),
            }
        }
        TaskCommands::Delete { id } => {
            if tasks.delete_task(id)? {
                ui::success(&format!("Deleted task {id}"));
            } else {
                return Err(MembankError::NotFound(format!("task {id}")));
            }
        }
        TaskCommands::Next { json } => match tasks.next_task()? {
            Some(task) if json => ui::print_json(&task),
            Some(task) => print_task(&task),
            None if json => ui::print_json(&serde_json::Value::Null),
            None => ui::hint("No pending task has all of its dependencies done"),
        },
    }
    Ok(())
}

fn print_tasks(tasks: &[Task]) {
    let mut table = Table::new(&["ID", "Status", "Priority", "Title", "Depends"])
        .right(0)
        .limit(3, 60);
    for task in tasks {
        let deps: Vec<String> = task.dependencies.iter().map(|d| d.to_string()).collect();
        table.add_row(&[
            task.id.to_string(),
            task.status.to_string(),
            task.priority.to_string(),
            task.title.clone(),
            deps.join(","),
        ]);
    }
    table.print();
}

fn print_task(task: &Task) {
    ui::section(&format!("Task {}: {}", task.id, task.title));
    ui::kv("Status", &task.status.to_string());
    ui::kv("Priority", &task.priority.to_string());
    if !task.description.is_empty() {
        ui::kv("Description", &task.description);
    }
    if !task.dependencies.is_empty() {
        let deps: Vec<String> = task.dependencies.iter().map(|d| d.to_string()).collect();
        ui::kv("Depends on", &deps.join(", "));
    }
    if let Some(details) = &task.details {
        ui::kv("Details", details);
    }
    if let Some(strategy) = &task.test_strategy {
        ui::kv("Test strategy", strategy);
    }
}
