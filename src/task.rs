// src/task.rs

use std::collections::HashMap;

use actix_web::{http::Method, HttpResponse};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::db::FileDb;
use crate::router::{Request, Route};

pub const TASKS_TABLE: &str = "tasks";

/// The Task record as persisted in the store and served to clients.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Null while the task is open; the completion toggle is the only thing
    /// that flips this.
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request payload for creating a task
#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Request payload for updating a task
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// The route table for the task endpoints, in match order.
pub fn task_routes() -> Vec<Route> {
    vec![
        Route::new(Method::GET, "/tasks", list_tasks),
        Route::new(Method::POST, "/tasks", create_task),
        Route::new(Method::PUT, "/tasks/:id", update_task),
        Route::new(Method::DELETE, "/tasks/:id", delete_task),
        Route::new(Method::PATCH, "/tasks/:id/complete", toggle_task_completion),
    ]
}

fn id_filter(id: &str) -> HashMap<String, String> {
    HashMap::from([("id".to_string(), id.to_string())])
}

fn persistence_error(action: &str, err: std::io::Error) -> HttpResponse {
    error!("error {} task: {}", action, err);
    HttpResponse::InternalServerError().json(json!({ "error": "failed to persist the store" }))
}

/// LIST tasks, optionally narrowed by `?search=` over title and description
pub fn list_tasks(db: &FileDb, req: &Request) -> HttpResponse {
    let filter = req
        .query
        .get("search")
        .filter(|search| !search.is_empty())
        .map(|search| {
            HashMap::from([
                ("title".to_string(), search.clone()),
                ("description".to_string(), search.clone()),
            ])
        });

    let tasks = db.select(TASKS_TABLE, filter.as_ref());
    if tasks.is_empty() {
        return HttpResponse::NotFound().json(json!({
            "error": "no tasks found matching the given filter"
        }));
    }
    HttpResponse::Ok().json(tasks)
}

/// CREATE a new task
pub fn create_task(db: &FileDb, req: &Request) -> HttpResponse {
    let payload: CreateTaskRequest =
        serde_json::from_value(req.body.clone()).unwrap_or_default();

    let (title, description) = match (payload.title, payload.description) {
        (Some(title), Some(description)) if !title.is_empty() && !description.is_empty() => {
            (title, description)
        }
        _ => {
            return HttpResponse::BadRequest().json(json!({
                "error": "title and description are required"
            }))
        }
    };

    let task = Task {
        id: Uuid::new_v4(),
        title,
        description,
        completed_at: None,
        created_at: Utc::now(),
        updated_at: None,
    };

    let record = match serde_json::to_value(&task) {
        Ok(record) => record,
        Err(err) => {
            error!("error serializing task: {}", err);
            return HttpResponse::InternalServerError()
                .json(json!({ "error": "failed to serialize task" }));
        }
    };
    if let Err(err) = db.insert(TASKS_TABLE, record) {
        return persistence_error("inserting", err);
    }

    info!("task created: {}", task.id);
    HttpResponse::Created().finish()
}

/// UPDATE a task's title and/or description
pub fn update_task(db: &FileDb, req: &Request) -> HttpResponse {
    let Some(id) = req.params.get("id") else {
        return HttpResponse::NotFound().finish();
    };

    let payload: UpdateTaskRequest =
        serde_json::from_value(req.body.clone()).unwrap_or_default();
    let title = payload.title.filter(|title| !title.is_empty());
    let description = payload.description.filter(|description| !description.is_empty());

    if title.is_none() && description.is_none() {
        return HttpResponse::BadRequest().json(json!({
            "error": "either title or description must be provided"
        }));
    }

    if db.select(TASKS_TABLE, Some(&id_filter(id))).is_empty() {
        return HttpResponse::NotFound().finish();
    }

    let mut fields = Map::new();
    if let Some(title) = title {
        fields.insert("title".to_string(), Value::String(title));
    }
    if let Some(description) = description {
        fields.insert("description".to_string(), Value::String(description));
    }
    fields.insert("updatedAt".to_string(), json!(Utc::now()));

    if let Err(err) = db.update(TASKS_TABLE, id, Value::Object(fields)) {
        return persistence_error("updating", err);
    }
    HttpResponse::NoContent().finish()
}

/// DELETE a task
pub fn delete_task(db: &FileDb, req: &Request) -> HttpResponse {
    let Some(id) = req.params.get("id") else {
        return HttpResponse::NotFound().finish();
    };

    if db.select(TASKS_TABLE, Some(&id_filter(id))).is_empty() {
        return HttpResponse::NotFound().finish();
    }

    if let Err(err) = db.delete(TASKS_TABLE, id) {
        return persistence_error("deleting", err);
    }
    HttpResponse::NoContent().finish()
}

/// TOGGLE a task between complete and incomplete
pub fn toggle_task_completion(db: &FileDb, req: &Request) -> HttpResponse {
    let Some(id) = req.params.get("id") else {
        return HttpResponse::NotFound().finish();
    };

    let tasks = db.select(TASKS_TABLE, Some(&id_filter(id)));
    let Some(task) = tasks.first() else {
        return HttpResponse::NotFound().finish();
    };

    let already_completed = task
        .get("completedAt")
        .is_some_and(|value| !value.is_null());
    let completed_at = if already_completed {
        Value::Null
    } else {
        json!(Utc::now())
    };

    let fields = Map::from_iter([("completedAt".to_string(), completed_at)]);
    if let Err(err) = db.update(TASKS_TABLE, id, Value::Object(fields)) {
        return persistence_error("toggling", err);
    }
    HttpResponse::NoContent().finish()
}
