//! Minimal dozy example: a small in-memory note store.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/notes
//!   curl -X POST http://localhost:3000/notes -d 'title=groceries'
//!   curl -X DELETE http://localhost:3000/notes?title=groceries
//!   curl http://localhost:3000/notes.txt
//!   curl -X PUT http://localhost:3000/notes          → 405

use std::sync::Mutex;

use dozy::{Api, Delete, Form, Get, PostRequest, Reply, Request, resource, with_marshaler};
use http::{HeaderMap, StatusCode};
use serde_json::{Value, json};

#[derive(Default)]
struct Notes {
    titles: Mutex<Vec<String>>,
}

impl Notes {
    fn snapshot(&self) -> Vec<String> {
        self.titles.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Get for Notes {
    fn get(&self, _form: &Form, _headers: &HeaderMap) -> Reply {
        Reply::ok(json!({ "notes": self.snapshot() }))
    }
}

// POST takes the whole request so it can look at the peer address as well.
impl PostRequest for Notes {
    fn post(&self, request: &Request) -> Reply {
        let Some(title) = request.form().get("title") else {
            return Reply::new(StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": "title is required" }));
        };
        if let Ok(mut titles) = self.titles.lock() {
            titles.push(title.to_owned());
        }
        tracing::info!(peer = ?request.remote_addr(), title, "note added");
        Reply::new(StatusCode::CREATED, json!({ "title": title })).header("location", "/notes")
    }
}

impl Delete for Notes {
    fn delete(&self, form: &Form, _headers: &HeaderMap) -> Reply {
        let Some(title) = form.get("title") else {
            return Reply::status(StatusCode::BAD_REQUEST);
        };
        let removed = match self.titles.lock() {
            Ok(mut titles) => {
                let before = titles.len();
                titles.retain(|t| t != title);
                before - titles.len()
            }
            Err(_) => 0,
        };
        Reply::ok(json!({ "removed": removed }))
    }
}

resource!(Notes: Get, PostRequest, Delete);

/// The same notes as plain text, one per line.
struct NotesText;

impl Get for NotesText {
    fn get(&self, _form: &Form, _headers: &HeaderMap) -> Reply {
        Reply::ok(json!(["first note", "second note"])).content_type("text/plain; charset=utf-8")
    }
}

resource!(NotesText: Get);

fn plain_lines(value: &Value, prefix: &str, _indent: &str) -> Result<Vec<u8>, dozy::MarshalError> {
    let lines = value.as_array().ok_or("text/plain needs an array")?;
    let text: Vec<String> = lines
        .iter()
        .map(|line| format!("{prefix}{}", line.as_str().unwrap_or_default()))
        .collect();
    Ok(text.join("\n").into_bytes())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let api = Api::new();
    api.add_resource(Notes::default(), &["/notes"]);
    api.add_resource(NotesText, &["/notes.txt"]);

    api.start(3000, [with_marshaler("text/plain", plain_lines)])
        .await
        .expect("server error");
}
