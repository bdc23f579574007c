//! Routes raw records to a typed schema by
//! `DataType` (and, for campaign finance, by `category` substring), coerces
//! fields, and drops records that fail typed validation -- never raising,
//! recording a per-record warning instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::manifest::{DataType, RawExtractionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropositionStatus {
    Pending,
    Passed,
    Failed,
    Qualified,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposition {
    pub external_id: String,
    pub title: String,
    pub summary: String,
    pub full_text: Option<String>,
    pub status: Option<PropositionStatus>,
    pub election_date: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub location: Option<String>,
    pub agenda_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Representative {
    pub external_id: String,
    pub name: String,
    pub chamber: String,
    pub district: Option<String>,
    pub party: Option<String>,
    pub photo_url: Option<String>,
    pub contact_info: Option<ContactInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitteeStatus {
    Active,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystem {
    CalAccess,
    Fec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Committee {
    pub external_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub candidate_name: Option<String>,
    pub candidate_office: Option<String>,
    pub proposition_id: Option<String>,
    pub party: Option<String>,
    pub status: Option<CommitteeStatus>,
    pub source_system: SourceSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonorType {
    Individual,
    Committee,
    Party,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub external_id: String,
    pub committee_id: Option<String>,
    pub donor_name: String,
    pub donor_type: Option<DonorType>,
    pub amount: f64,
    pub date: String,
    pub address: Option<String>,
    pub employer: Option<String>,
    pub occupation: Option<String>,
    pub source_system: SourceSystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expenditure {
    pub external_id: String,
    pub committee_id: Option<String>,
    pub payee_name: String,
    pub amount: f64,
    pub date: String,
    pub source_system: SourceSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportOrOppose {
    Support,
    Oppose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndependentExpenditure {
    pub external_id: String,
    pub committee_id: Option<String>,
    pub payee_name: Option<String>,
    pub candidate_name: Option<String>,
    pub proposition_title: Option<String>,
    pub amount: f64,
    pub date: String,
    pub support_or_oppose: Option<SupportOrOppose>,
    pub source_system: SourceSystem,
}

/// Any of the typed domain records this pipeline can produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "recordType", rename_all = "snake_case")]
pub enum DomainRecord {
    Proposition(Proposition),
    Meeting(Meeting),
    Representative(Representative),
    Committee(Committee),
    Contribution(Contribution),
    Expenditure(Expenditure),
    IndependentExpenditure(IndependentExpenditure),
}

pub struct MappingOutput {
    pub records: Vec<DomainRecord>,
    pub warnings: Vec<String>,
}

/// Map a [`RawExtractionResult`] to typed domain records for `data_type`
/// (and, for campaign finance, the source's `category`).
pub fn map(raw: &RawExtractionResult, data_type: DataType, category: Option<&str>) -> MappingOutput {
    let mut records = Vec::new();
    let mut warnings = raw.warnings.clone();

    for item in &raw.items {
        let enriched = enrich(item, category);
        match map_one(&enriched, data_type, category) {
            Ok(record) => records.push(record),
            Err(reason) => warnings.push(format!("dropped record: {reason}")),
        }
    }

    MappingOutput { records, warnings }
}

fn enrich(item: &Map<String, Value>, category: Option<&str>) -> Map<String, Value> {
    let mut item = item.clone();

    if !item.contains_key("body") {
        if let Some(category) = category {
            item.insert("body".into(), Value::String(category.to_string()));
        }
    }
    if !item.contains_key("chamber") {
        if let Some(category) = category {
            item.insert("chamber".into(), Value::String(category.to_string()));
        }
    }

    if !item.contains_key("donorName") {
        let last = str_field(&item, "donorLastName");
        let first = str_field(&item, "donorFirstName");
        if let (Some(last), Some(first)) = (last, first) {
            item.insert("donorName".into(), Value::String(format!("{first} {last}")));
        }
    }

    if !item.contains_key("sourceSystem") {
        if let Some(category) = category {
            let lower = category.to_lowercase();
            if lower.starts_with("cal-access") || lower.starts_with("cal_access") {
                item.insert("sourceSystem".into(), Value::String("cal_access".into()));
            } else if lower.starts_with("fec") {
                item.insert("sourceSystem".into(), Value::String("fec".into()));
            }
        }
    }

    item
}

fn str_field(item: &Map<String, Value>, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

fn require_field(item: &Map<String, Value>, key: &str) -> Result<String, String> {
    str_field(item, key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required field '{key}'"))
}

fn parse_f64(item: &Map<String, Value>, key: &str) -> Result<f64, String> {
    let raw = require_field(item, key)?;
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-').collect();
    cleaned.parse::<f64>().map_err(|_| format!("field '{key}' is not numeric"))
}

fn campaign_finance_bucket(category: Option<&str>) -> &'static str {
    let Some(category) = category else {
        return "contribution";
    };
    let lower = category.to_lowercase();
    if lower.contains("committee") {
        "committee"
    } else if lower.contains("independent") || lower.contains("s496") {
        "independent_expenditure"
    } else if lower.contains("expenditure") {
        "expenditure"
    } else if lower.contains("contribution") {
        "contribution"
    } else {
        "contribution"
    }
}

fn coerce_donor_type(raw: &str) -> DonorType {
    match raw.to_uppercase().as_str() {
        "IND" => DonorType::Individual,
        "COM" => DonorType::Committee,
        "PTY" => DonorType::Party,
        "SCC" => DonorType::Individual,
        _ => DonorType::Other,
    }
}

fn coerce_source_system(raw: &str) -> SourceSystem {
    match raw {
        "fec" => SourceSystem::Fec,
        _ => SourceSystem::CalAccess,
    }
}

fn coerce_support_or_oppose(raw: &str) -> Option<SupportOrOppose> {
    match raw.to_uppercase().as_str() {
        "S" | "SUPPORT" => Some(SupportOrOppose::Support),
        "O" | "OPPOSE" => Some(SupportOrOppose::Oppose),
        _ => None,
    }
}

fn map_one(item: &Map<String, Value>, data_type: DataType, category: Option<&str>) -> Result<DomainRecord, String> {
    match data_type {
        DataType::Propositions => {
            let external_id = require_field(item, "externalId")?;
            let title = require_field(item, "title")?;
            let summary = str_field(item, "summary").unwrap_or_else(|| title.clone());
            let status = str_field(item, "status").and_then(|s| match s.as_str() {
                "pending" => Some(PropositionStatus::Pending),
                "passed" => Some(PropositionStatus::Passed),
                "failed" => Some(PropositionStatus::Failed),
                "qualified" => Some(PropositionStatus::Qualified),
                "withdrawn" => Some(PropositionStatus::Withdrawn),
                _ => None,
            });
            Ok(DomainRecord::Proposition(Proposition {
                external_id,
                title,
                summary,
                full_text: str_field(item, "fullText"),
                status,
                election_date: str_field(item, "electionDate"),
                source_url: str_field(item, "sourceUrl"),
            }))
        }
        DataType::Meetings => {
            let external_id = require_field(item, "externalId")?;
            let title = require_field(item, "title")?;
            let body = str_field(item, "body").unwrap_or_else(|| "Unknown".to_string());
            let scheduled_raw = require_field(item, "scheduledAt")?;
            let scheduled_at = DateTime::parse_from_rfc3339(&scheduled_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| "scheduledAt is not a valid date".to_string())?;
            Ok(DomainRecord::Meeting(Meeting {
                external_id,
                title,
                body,
                scheduled_at,
                location: str_field(item, "location"),
                agenda_url: str_field(item, "agendaUrl"),
                video_url: str_field(item, "videoUrl"),
            }))
        }
        DataType::Representatives => {
            let external_id = require_field(item, "externalId")?;
            let name = require_field(item, "name")?;
            let chamber = str_field(item, "chamber").or_else(|| category.map(str::to_string)).unwrap_or_default();
            let contact_info = if item.contains_key("email") || item.contains_key("phone") || item.contains_key("address") || item.contains_key("website") {
                Some(ContactInfo {
                    email: str_field(item, "email"),
                    phone: str_field(item, "phone"),
                    address: str_field(item, "address"),
                    website: str_field(item, "website"),
                })
            } else {
                None
            };
            Ok(DomainRecord::Representative(Representative {
                external_id,
                name,
                chamber,
                district: str_field(item, "district"),
                party: str_field(item, "party"),
                photo_url: str_field(item, "photoUrl"),
                contact_info,
            }))
        }
        DataType::CampaignFinance => map_campaign_finance(item, category),
    }
}

fn map_campaign_finance(item: &Map<String, Value>, category: Option<&str>) -> Result<DomainRecord, String> {
    let source_system = coerce_source_system(&str_field(item, "sourceSystem").unwrap_or_default());

    match campaign_finance_bucket(category) {
        "committee" => {
            let external_id = require_field(item, "externalId")?;
            let name = require_field(item, "name")?;
            Ok(DomainRecord::Committee(Committee {
                external_id,
                name,
                kind: str_field(item, "type"),
                candidate_name: str_field(item, "candidateName"),
                candidate_office: str_field(item, "candidateOffice"),
                proposition_id: str_field(item, "propositionId"),
                party: str_field(item, "party"),
                status: str_field(item, "status").and_then(|s| match s.as_str() {
                    "active" => Some(CommitteeStatus::Active),
                    "terminated" => Some(CommitteeStatus::Terminated),
                    _ => None,
                }),
                source_system,
            }))
        }
        "independent_expenditure" => {
            let external_id = require_field(item, "externalId")?;
            let amount = parse_f64(item, "amount")?;
            let date = require_field(item, "date")?;
            Ok(DomainRecord::IndependentExpenditure(IndependentExpenditure {
                external_id,
                committee_id: str_field(item, "committeeId"),
                payee_name: str_field(item, "payeeName"),
                candidate_name: str_field(item, "candidateName"),
                proposition_title: str_field(item, "propositionTitle"),
                amount,
                date,
                support_or_oppose: str_field(item, "supportOrOppose").and_then(|s| coerce_support_or_oppose(&s)),
                source_system,
            }))
        }
        "expenditure" => {
            let external_id = require_field(item, "externalId")?;
            let payee_name = require_field(item, "payeeName")?;
            let amount = parse_f64(item, "amount")?;
            let date = require_field(item, "date")?;
            Ok(DomainRecord::Expenditure(Expenditure {
                external_id,
                committee_id: str_field(item, "committeeId"),
                payee_name,
                amount,
                date,
                source_system,
            }))
        }
        _ => {
            let external_id = require_field(item, "externalId")?;
            let donor_name = require_field(item, "donorName")?;
            let amount = parse_f64(item, "amount")?;
            let date = require_field(item, "date")?;
            Ok(DomainRecord::Contribution(Contribution {
                external_id,
                committee_id: str_field(item, "committeeId"),
                donor_name,
                donor_type: str_field(item, "donorType").map(|s| coerce_donor_type(&s)),
                amount,
                date,
                address: str_field(item, "address"),
                employer: str_field(item, "employer"),
                occupation: str_field(item, "occupation"),
                source_system,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::String(v.to_string()))).collect()
    }

    #[test]
    fn proposition_summary_defaults_to_title() {
        let raw = RawExtractionResult {
            items: vec![item(&[("externalId", "prop-1"), ("title", "Prop 1")])],
            success: true,
            warnings: vec![],
            errors: vec![],
        };
        let out = map(&raw, DataType::Propositions, None);
        assert_eq!(out.records.len(), 1);
        match &out.records[0] {
            DomainRecord::Proposition(p) => assert_eq!(p.summary, "Prop 1"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn record_missing_external_id_is_dropped_not_raised() {
        let raw = RawExtractionResult {
            items: vec![item(&[("title", "no id")])],
            success: true,
            warnings: vec![],
            errors: vec![],
        };
        let out = map(&raw, DataType::Propositions, None);
        assert_eq!(out.records.len(), 0);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn campaign_finance_routes_by_category_substring() {
        let raw = RawExtractionResult {
            items: vec![item(&[
                ("externalId", "c-1"),
                ("donorName", "Jane Doe"),
                ("amount", "$100.50"),
                ("date", "2026-01-01"),
            ])],
            success: true,
            warnings: vec![],
            errors: vec![],
        };
        let out = map(&raw, DataType::CampaignFinance, Some("cal-access-contribution"));
        match &out.records[0] {
            DomainRecord::Contribution(c) => {
                assert_eq!(c.source_system, SourceSystem::CalAccess);
                assert_eq!(c.amount, 100.50);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn donor_name_is_reconstructed_from_parts() {
        let raw = RawExtractionResult {
            items: vec![item(&[
                ("externalId", "c-1"),
                ("donorLastName", "Doe"),
                ("donorFirstName", "Jane"),
                ("amount", "100"),
                ("date", "2026-01-01"),
            ])],
            success: true,
            warnings: vec![],
            errors: vec![],
        };
        let out = map(&raw, DataType::CampaignFinance, Some("contribution"));
        match &out.records[0] {
            DomainRecord::Contribution(c) => assert_eq!(c.donor_name, "Jane Doe"),
            _ => panic!("wrong variant"),
        }
    }
}
