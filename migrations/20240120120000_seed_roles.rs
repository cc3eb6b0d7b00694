//! Migration: seed roles
//!
//! Seeds the built-in roles.

use docshift::executor::{Database, DocError, Document, Filter};
use docshift::migration::Migration;
use serde_json::json;

pub const BUILTIN_ROLES: &[&str] = &["admin", "editor", "viewer"];

pub fn role_document(name: &str) -> Document {
    json!({ "name": name, "builtin": true })
        .as_object()
        .cloned()
        .unwrap_or_default()
}

#[derive(Default)]
pub struct SeedRoles20240120120000;

impl Migration for SeedRoles20240120120000 {
    fn up(&self, db: &Database) -> Result<(), DocError> {
        db.collection("roles")
            .insert_many(BUILTIN_ROLES.iter().map(|name| role_document(name)))?;
        Ok(())
    }

    fn down(&self, db: &Database) -> Result<(), DocError> {
        db.collection("roles")
            .delete_many(&Filter::eq("builtin", true))?;
        Ok(())
    }
}
