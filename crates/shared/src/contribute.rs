//! Community contribution records: georeferencing submissions for scanned
//! maps and label tasks whose pins name places on a map sheet.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::Millis;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeorefStatus {
    #[default]
    Open,
    InProgress,
    ReviewNeeded,
    Approved,
    Rejected,
}

impl GeorefStatus {
    /// Listed for contributors to pick up or continue.
    pub fn is_open(self) -> bool {
        matches!(self, GeorefStatus::Open | GeorefStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContributionError {
    #[error("cannot {action} a submission that is {status:?}")]
    InvalidTransition {
        action: &'static str,
        status: GeorefStatus,
    },
    #[error("submission is claimed by someone else")]
    NotClaimant,
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// A scanned map waiting to be georeferenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeorefSubmission {
    pub id: String,
    #[serde(alias = "iiifUrl")]
    pub source_url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: GeorefStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allmaps_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub created_at: Millis,
    #[serde(default)]
    pub updated_at: Millis,
}

impl GeorefSubmission {
    pub fn new(
        id: String,
        source_url: &str,
        name: &str,
        description: Option<String>,
        now: Millis,
    ) -> Result<Self, ContributionError> {
        let source_url = source_url.trim();
        let name = name.trim();
        if source_url.is_empty() {
            return Err(ContributionError::Empty("sourceUrl"));
        }
        if name.is_empty() {
            return Err(ContributionError::Empty("name"));
        }
        Ok(GeorefSubmission {
            id,
            source_url: source_url.to_string(),
            name: name.to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            status: GeorefStatus::Open,
            submitted_by: None,
            allmaps_id: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Take an open submission. Re-claiming your own is allowed.
    pub fn claim(&mut self, user_id: &str, now: Millis) -> Result<(), ContributionError> {
        match self.status {
            GeorefStatus::Open => {}
            GeorefStatus::InProgress if self.submitted_by.as_deref() == Some(user_id) => {}
            GeorefStatus::InProgress => return Err(ContributionError::NotClaimant),
            status => {
                return Err(ContributionError::InvalidTransition {
                    action: "claim",
                    status,
                })
            }
        }
        self.status = GeorefStatus::InProgress;
        self.submitted_by = Some(user_id.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Hand the finished georeference over for review.
    pub fn submit_for_review(
        &mut self,
        user_id: &str,
        allmaps_id: &str,
        now: Millis,
    ) -> Result<(), ContributionError> {
        if self.status != GeorefStatus::InProgress {
            return Err(ContributionError::InvalidTransition {
                action: "submit",
                status: self.status,
            });
        }
        if self.submitted_by.as_deref() != Some(user_id) {
            return Err(ContributionError::NotClaimant);
        }
        let allmaps_id = allmaps_id.trim();
        if allmaps_id.is_empty() {
            return Err(ContributionError::Empty("allmapsId"));
        }
        self.status = GeorefStatus::ReviewNeeded;
        self.allmaps_id = Some(allmaps_id.to_string());
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelTaskStatus {
    #[default]
    Open,
    InProgress,
    Consensus,
    Verified,
}

impl LabelTaskStatus {
    pub fn is_open(self) -> bool {
        matches!(self, LabelTaskStatus::Open | LabelTaskStatus::InProgress)
    }
}

/// Pixel rectangle on the scanned sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRegion {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && y >= self.y && x <= self.x + self.width && y <= self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelTask {
    pub id: String,
    pub map_id: String,
    #[serde(default)]
    pub allmaps_id: String,
    pub region: PixelRegion,
    #[serde(default)]
    pub status: LabelTaskStatus,
    /// Suggested place names.
    #[serde(default)]
    pub legend: Vec<String>,
    #[serde(default)]
    pub created_at: Millis,
}

/// One contributor's label placed inside a task region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPin {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub label: String,
    pub pixel_x: f64,
    pub pixel_y: f64,
    /// 0 to 1.
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    /// Free-form extras (Vietnamese name, notes).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default)]
    pub created_at: Millis,
}

fn full_confidence() -> f64 {
    1.0
}

impl LabelPin {
    /// Check a new pin against its task before storing it.
    pub fn validate(&self, task: &LabelTask) -> Result<(), String> {
        if self.label.trim().is_empty() {
            return Err("label must not be empty".into());
        }
        if !(self.pixel_x.is_finite() && self.pixel_y.is_finite()) {
            return Err("pixel position must be finite".into());
        }
        if !task.region.contains(self.pixel_x, self.pixel_y) {
            return Err("pin lies outside the task region".into());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err("confidence must be between 0 and 1".into());
        }
        Ok(())
    }
}
