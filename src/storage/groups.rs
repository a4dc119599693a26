use anyhow::{bail, Result};
use std::sync::Arc;

use super::schema::Database;
use super::types::Group;
use crate::util::strip_control_chars;

impl Database {
    // ========================================================================
    // Group Operations
    // ========================================================================

    /// Strip control characters and surrounding whitespace from a group name,
    /// rejecting names that end up empty.
    fn sanitize_group_name(name: &str) -> Result<String> {
        let sanitized = strip_control_chars(name);
        let trimmed = sanitized.trim();
        if trimmed.is_empty() {
            bail!("Group name cannot be empty or whitespace-only");
        }
        Ok(trimmed.to_owned())
    }

    /// Create a group at the end of the display order, returning its id.
    pub async fn create_group(&self, name: &str) -> Result<i64> {
        let clean_name = Self::sanitize_group_name(name)?;

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feed_groups (name, order_index)
            VALUES (?, (SELECT COALESCE(MAX(order_index), -1) + 1 FROM feed_groups))
            RETURNING id
        "#,
        )
        .bind(&clean_name)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(group_id = row.0, name = %clean_name, "Created group");
        Ok(row.0)
    }

    pub async fn rename_group(&self, id: i64, new_name: &str) -> Result<()> {
        let clean_name = Self::sanitize_group_name(new_name)?;

        sqlx::query("UPDATE feed_groups SET name = ? WHERE id = ?")
            .bind(&clean_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a group. Member feeds drop into the ungrouped bucket via the
    /// `ON DELETE SET NULL` foreign key.
    pub async fn delete_group(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM feed_groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a feed into a group, or to the ungrouped bucket with `None`.
    pub async fn move_feed_to_group(&self, feed_id: i64, group_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE feeds SET group_id = ? WHERE id = ?")
            .bind(group_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All groups in display order.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, name, order_index FROM feed_groups ORDER BY order_index, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, order_index)| Group {
                id,
                name: Arc::from(name),
                order_index,
            })
            .collect())
    }
}
