//! Typed access to the service collections

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Document, DocumentStore, GRADES, PREDICTIONS, USERS};
use crate::error::{GradeError, Result};
use crate::inference::Prediction;
use crate::training::Neighbor;

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating or replacing a user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewUser {
    /// Trimmed name and trimmed, lowercased email; both required
    fn normalized(&self) -> Result<(String, String)> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GradeError::MissingField("name".to_string()))?;
        let email = self
            .email
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GradeError::MissingField("email".to_string()))?;
        if !email.contains('@') {
            return Err(GradeError::InvalidField {
                field: "email".to_string(),
                reason: format!("'{}' is not an email address", email),
            });
        }
        Ok((name.to_string(), email))
    }
}

/// One logged prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_email: String,
    pub target_subject: String,
    pub predicted_score: f64,
    pub predicted_grade: String,
    pub message: String,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub neighbors: Vec<Neighbor>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn from_prediction(user_email: &str, prediction: &Prediction) -> Self {
        let outcome = &prediction.outcome;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_email: user_email.trim().to_lowercase(),
            target_subject: outcome.target_label(),
            predicted_score: outcome.score(),
            predicted_grade: outcome.grade().to_string(),
            message: outcome.message().to_string(),
            recommendation: outcome.recommendation().map(str::to_string),
            neighbors: prediction.neighbors.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Typed operations over a [`DocumentStore`]
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn ping(&self) -> Result<()> {
        self.store.ping()
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.store
            .find_all(USERS)?
            .iter()
            .map(Document::decode)
            .collect()
    }

    fn email_taken(&self, email: &str, except_id: Option<&str>) -> Result<bool> {
        Ok(self
            .list_users()?
            .iter()
            .any(|u| u.email == email && Some(u.id.as_str()) != except_id))
    }

    pub fn create_user(&self, input: &NewUser) -> Result<UserRecord> {
        let (name, email) = input.normalized()?;
        if self.email_taken(&email, None)? {
            return Err(GradeError::Conflict(format!("email {} is already registered", email)));
        }
        let user = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            last_login: None,
            created_at: Utc::now(),
        };
        self.store.insert(USERS, Document::encode(&user)?)?;
        debug!(user_id = %user.id, "Created user");
        Ok(user)
    }

    /// Replace name and email; both are required.
    pub fn update_user(&self, id: &str, input: &NewUser) -> Result<UserRecord> {
        let (name, email) = input.normalized()?;
        if self.store.find_by_id(USERS, id)?.is_none() {
            return Err(GradeError::NotFound(format!("user {}", id)));
        }
        if self.email_taken(&email, Some(id))? {
            return Err(GradeError::Conflict(format!("email {} is already registered", email)));
        }

        let mut patch = Map::new();
        patch.insert("name".to_string(), Value::String(name));
        patch.insert("email".to_string(), Value::String(email));
        let doc = self
            .store
            .update(USERS, id, patch)?
            .ok_or_else(|| GradeError::NotFound(format!("user {}", id)))?;
        doc.decode()
    }

    /// Stamp `last_login` on the user registered under `email`.
    /// Returns false when no such user exists.
    pub fn touch_last_login(&self, email: &str) -> Result<bool> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.list_users()?.into_iter().find(|u| u.email == email) else {
            return Ok(false);
        };
        let mut patch = Map::new();
        patch.insert("last_login".to_string(), serde_json::to_value(Utc::now())?);
        Ok(self.store.update(USERS, &user.id, patch)?.is_some())
    }

    pub fn delete_user(&self, id: &str) -> Result<()> {
        if self.store.delete(USERS, id)? {
            debug!(user_id = %id, "Deleted user");
            Ok(())
        } else {
            Err(GradeError::NotFound(format!("user {}", id)))
        }
    }

    // ========================================================================
    // Predictions
    // ========================================================================

    pub fn log_prediction(&self, record: &PredictionRecord) -> Result<()> {
        self.store.insert(PREDICTIONS, Document::encode(record)?)
    }

    /// Newest first, optionally filtered by requester email
    pub fn list_predictions(&self, user: Option<&str>) -> Result<Vec<PredictionRecord>> {
        let wanted = user.map(|u| u.trim().to_lowercase());
        let mut records = self
            .store
            .find_all(PREDICTIONS)?
            .iter()
            .map(Document::decode::<PredictionRecord>)
            .collect::<Result<Vec<_>>>()?;
        if let Some(wanted) = wanted {
            records.retain(|r| r.user_email == wanted);
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    // ========================================================================
    // Training rows
    // ========================================================================

    pub fn insert_grades(&self, rows: Vec<Map<String, Value>>) -> Result<usize> {
        let docs = rows.into_iter().map(Document::new).collect();
        self.store.insert_many(GRADES, docs)
    }

    pub fn grade_rows(&self) -> Result<Vec<Map<String, Value>>> {
        Ok(self.store.find_all(GRADES)?.into_iter().map(|d| d.body).collect())
    }

    pub fn count_grades(&self) -> Result<usize> {
        self.store.count(GRADES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn repo() -> Repository {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    fn user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
        }
    }

    #[test]
    fn test_create_normalizes_email() {
        let repo = repo();
        let created = repo.create_user(&user(" Noa ", "  Noa@Example.COM ")).unwrap();
        assert_eq!(created.name, "Noa");
        assert_eq!(created.email, "noa@example.com");
        assert_eq!(repo.list_users().unwrap(), vec![created]);
    }

    #[test]
    fn test_email_uniqueness() {
        let repo = repo();
        let first = repo.create_user(&user("A", "a@example.com")).unwrap();
        let second = repo.create_user(&user("B", "b@example.com")).unwrap();

        assert!(matches!(
            repo.create_user(&user("A2", "A@example.com")),
            Err(GradeError::Conflict(_))
        ));
        assert!(matches!(
            repo.update_user(&second.id, &user("B", "a@example.com")),
            Err(GradeError::Conflict(_))
        ));
        // keeping your own email is fine
        let updated = repo.update_user(&first.id, &user("A renamed", "a@example.com")).unwrap();
        assert_eq!(updated.name, "A renamed");
    }

    #[test]
    fn test_update_requires_both_fields() {
        let repo = repo();
        let created = repo.create_user(&user("C", "c@example.com")).unwrap();
        let missing = NewUser { name: Some("C".into()), email: None };
        assert!(matches!(
            repo.update_user(&created.id, &missing),
            Err(GradeError::MissingField(ref f)) if f == "email"
        ));
    }

    #[test]
    fn test_delete_missing_user() {
        let repo = repo();
        assert!(matches!(repo.delete_user("nope"), Err(GradeError::NotFound(_))));
        assert!(matches!(
            repo.update_user("nope", &user("X", "x@example.com")),
            Err(GradeError::NotFound(_))
        ));
    }

    #[test]
    fn test_touch_last_login() {
        let repo = repo();
        let created = repo.create_user(&user("D", "d@example.com")).unwrap();
        assert!(created.last_login.is_none());

        assert!(repo.touch_last_login(" D@Example.com ").unwrap());
        let users = repo.list_users().unwrap();
        assert!(users[0].last_login.is_some());
        assert_eq!(users[0].created_at, created.created_at);

        assert!(!repo.touch_last_login("nobody@example.com").unwrap());
    }

    #[test]
    fn test_grade_rows_round_trip() {
        let repo = repo();
        let row = serde_json::json!({ "gender": "female", "math score": 70 })
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(repo.insert_grades(vec![row.clone(), row.clone()]).unwrap(), 2);
        assert_eq!(repo.count_grades().unwrap(), 2);
        assert_eq!(repo.grade_rows().unwrap()[0], row);
    }
}
