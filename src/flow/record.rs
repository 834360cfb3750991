//! Lead records — the finalized snapshot of a completed flow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::session::{Field, SessionId};

/// Rendered in place of a field the session never collected.
pub const MISSING_FIELD: &str = "-";

/// Which branch produced the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadKind {
    /// A customer asking for a service.
    Service,
    /// A collaborator offering to take on a project.
    Collaborator,
}

impl LeadKind {
    /// Fields copied into the record, in display order.
    pub fn schema(&self) -> &'static [Field] {
        match self {
            Self::Service => &[Field::Category, Field::Service, Field::Phone, Field::Name],
            Self::Collaborator => &[Field::ProjectName, Field::TimeNeeded],
        }
    }
}

/// Immutable snapshot of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRecord {
    pub id: Uuid,
    pub kind: LeadKind,
    pub session_id: SessionId,
    pub values: Vec<(Field, String)>,
    pub submitted_at: DateTime<Utc>,
}

impl LeadRecord {
    /// Copy the kind's schema out of `fields`. Never fails: absent fields
    /// become [`MISSING_FIELD`].
    pub fn build(session_id: SessionId, fields: &HashMap<Field, String>, kind: LeadKind) -> Self {
        let values = kind
            .schema()
            .iter()
            .map(|field| {
                let value = fields
                    .get(field)
                    .cloned()
                    .unwrap_or_else(|| MISSING_FIELD.to_string());
                (*field, value)
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            kind,
            session_id,
            values,
            submitted_at: Utc::now(),
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    /// The record's fields as `(name, value)` pairs.
    pub fn as_pairs(&self) -> Vec<(&'static str, &str)> {
        self.values
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(Field, &str)]) -> HashMap<Field, String> {
        pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
    }

    #[test]
    fn service_record_copies_schema_in_order() {
        let record = LeadRecord::build(
            "telegram:1".into(),
            &fields(&[
                (Field::Name, "Ali"),
                (Field::Phone, "0912345678"),
                (Field::Service, "درخواست سایت فروشگاهی"),
                (Field::Category, "طراحی سایت"),
            ]),
            LeadKind::Service,
        );

        assert_eq!(
            record.as_pairs(),
            vec![
                ("category", "طراحی سایت"),
                ("service", "درخواست سایت فروشگاهی"),
                ("phone", "0912345678"),
                ("name", "Ali"),
            ]
        );
    }

    #[test]
    fn missing_fields_become_placeholder() {
        let record = LeadRecord::build(
            "telegram:1".into(),
            &fields(&[(Field::Name, "Ali")]),
            LeadKind::Service,
        );
        assert_eq!(record.get(Field::Category), Some(MISSING_FIELD));
        assert_eq!(record.get(Field::Phone), Some(MISSING_FIELD));
        assert_eq!(record.get(Field::Name), Some("Ali"));
    }

    #[test]
    fn collaborator_record_ignores_other_branch_fields() {
        let record = LeadRecord::build(
            "telegram:1".into(),
            &fields(&[
                (Field::Category, "انجام میدم (همکار)"),
                (Field::ProjectName, "Landing Page"),
                (Field::TimeNeeded, "3 days"),
            ]),
            LeadKind::Collaborator,
        );
        assert_eq!(
            record.as_pairs(),
            vec![("project_name", "Landing Page"), ("time_needed", "3 days")]
        );
        assert_eq!(record.get(Field::Category), None);
    }

    #[test]
    fn record_serializes_for_logging() {
        let record = LeadRecord::build(
            "cli:local-user".into(),
            &fields(&[(Field::ProjectName, "Logo"), (Field::TimeNeeded, "1 week")]),
            LeadKind::Collaborator,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "collaborator");
        assert_eq!(json["session_id"], "cli:local-user");
        assert_eq!(json["values"][0][0], "project_name");
        assert_eq!(json["values"][0][1], "Logo");
    }
}
