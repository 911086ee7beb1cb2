//! Interface-only collaborator records.
//!
//! Projects, workflow definitions, and users are owned by the excluded web
//! and persistence layers; the dispatcher only reads the fields below.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub owner: Option<String>,
}

/// A published workflow definition within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFlow {
    pub id: i32,
    pub name: String,
    pub project_id: i32,
    pub proxy_user: Option<String>,
    pub queue: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub name: String,
}

impl User {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
