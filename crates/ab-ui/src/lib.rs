//! # ab-ui
//!
//! Server-rendered page shells. They carry the board name and thread id;
//! `public/board.js` fills them in from the JSON API.

use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub title: &'a str,
}

#[derive(Template)]
#[template(path = "board.html")]
pub struct BoardTemplate<'a> {
    pub board: &'a str,
    pub title: String,
}

#[derive(Template)]
#[template(path = "thread.html")]
pub struct ThreadTemplate<'a> {
    pub board: &'a str,
    pub thread_id: &'a str,
    pub title: String,
}

impl<'a> BoardTemplate<'a> {
    pub fn new(board: &'a str) -> Self {
        Self {
            board,
            title: format!("/{board}/ - anonboard"),
        }
    }
}

impl<'a> ThreadTemplate<'a> {
    pub fn new(board: &'a str, thread_id: &'a str) -> Self {
        Self {
            board,
            thread_id,
            title: format!("/{board}/ thread - anonboard"),
        }
    }
}
