use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::keywords::normalize_skills;
use crate::models::requisition::{EmploymentType, RequisitionRow};

/// Fields a requisition is raised or edited with.
#[derive(Debug, Clone, Deserialize)]
pub struct RequisitionInput {
    pub department: Option<String>,
    pub position_title: String,
    pub headcount: i32,
    pub employment_type: EmploymentType,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    #[serde(default)]
    pub experience_min_years: i32,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub justification: String,
}

/// Input after validation, with the department resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRequisition {
    pub department: String,
    pub position_title: String,
    pub headcount: i32,
    pub employment_type: EmploymentType,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub experience_min_years: i32,
    pub required_skills: Vec<String>,
    pub justification: String,
}

/// Validates input; the department falls back to the raiser's own.
pub fn validate(
    input: RequisitionInput,
    raiser_department: Option<&str>,
) -> Result<ValidRequisition, AppError> {
    let department = input
        .department
        .as_deref()
        .or(raiser_department)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::Validation("department is required".to_string()))?
        .to_string();

    if input.position_title.trim().is_empty() {
        return Err(AppError::Validation("position_title is required".to_string()));
    }
    if input.justification.trim().is_empty() {
        return Err(AppError::Validation("justification is required".to_string()));
    }
    if input.headcount < 1 {
        return Err(AppError::Validation("headcount must be at least 1".to_string()));
    }
    if !(0..=60).contains(&input.experience_min_years) {
        return Err(AppError::Validation(
            "experience_min_years must be between 0 and 60".to_string(),
        ));
    }
    validate_salary_range(input.min_salary, input.max_salary)?;

    Ok(ValidRequisition {
        department,
        position_title: input.position_title.trim().to_string(),
        headcount: input.headcount,
        employment_type: input.employment_type,
        min_salary: input.min_salary,
        max_salary: input.max_salary,
        experience_min_years: input.experience_min_years,
        required_skills: normalize_skills(&input.required_skills),
        justification: input.justification.trim().to_string(),
    })
}

pub fn validate_salary_range(min: Option<i64>, max: Option<i64>) -> Result<(), AppError> {
    if min.is_some_and(|v| v < 0) || max.is_some_and(|v| v < 0) {
        return Err(AppError::Validation("salaries cannot be negative".to_string()));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(AppError::Validation(
                "min_salary cannot exceed max_salary".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn find_requisition(pool: &PgPool, id: Uuid) -> Result<RequisitionRow, AppError> {
    sqlx::query_as::<_, RequisitionRow>("SELECT * FROM requisitions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Requisition {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_input() -> RequisitionInput {
        RequisitionInput {
            department: None,
            position_title: " Backend Engineer ".to_string(),
            headcount: 2,
            employment_type: EmploymentType::FullTime,
            min_salary: Some(80_000),
            max_salary: Some(120_000),
            experience_min_years: 3,
            required_skills: vec!["Rust".to_string(), "rust".to_string(), "SQL".to_string()],
            justification: "Backfill for platform team".to_string(),
        }
    }

    #[test]
    fn test_department_falls_back_to_raiser() {
        let valid = validate(make_input(), Some("Engineering")).unwrap();
        assert_eq!(valid.department, "Engineering");
        assert_eq!(valid.position_title, "Backend Engineer");
        assert_eq!(valid.required_skills, vec!["rust", "sql"]);
    }

    #[test]
    fn test_department_required() {
        assert!(matches!(
            validate(make_input(), None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_headcount_and_salary_bounds() {
        let mut input = make_input();
        input.headcount = 0;
        assert!(validate(input, Some("Eng")).is_err());

        let mut input = make_input();
        input.min_salary = Some(200_000);
        assert!(validate(input, Some("Eng")).is_err());

        assert!(validate_salary_range(None, Some(10)).is_ok());
        assert!(validate_salary_range(Some(-1), None).is_err());
    }
}
