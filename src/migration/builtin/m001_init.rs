//! 001: initial schema with the contact messages table.

use crate::migration::{Action, Migration};

pub const IDENTITY: &str = "001_init";

pub fn migration() -> Migration {
    Migration::new(
        IDENTITY,
        "Initial schema with contact messages table",
        Action::sql(
            "CREATE TABLE contact_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(100) NOT NULL,
                subject VARCHAR(200) NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                ip_address VARCHAR(50),
                user_agent TEXT,
                is_processed BOOLEAN NOT NULL DEFAULT 0
            );",
        ),
    )
    .with_reverse(Action::sql("DROP TABLE contact_messages;"))
}
