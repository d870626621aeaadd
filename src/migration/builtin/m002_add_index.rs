//! 002: lookup indexes on the contact messages table.

use crate::migration::{Action, Migration};

pub const IDENTITY: &str = "002_add_index";

pub fn migration() -> Migration {
    Migration::new(
        IDENTITY,
        "Add indexes to contact messages table",
        Action::sql(
            "CREATE INDEX ix_contact_messages_email ON contact_messages(email);
             CREATE INDEX ix_contact_messages_created_at ON contact_messages(created_at);
             CREATE INDEX ix_contact_messages_is_processed ON contact_messages(is_processed);",
        ),
    )
    .with_reverse(Action::sql(
        "DROP INDEX ix_contact_messages_email;
         DROP INDEX ix_contact_messages_created_at;
         DROP INDEX ix_contact_messages_is_processed;",
    ))
}
