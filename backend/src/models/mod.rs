//! Database row types for the Dance Studio Management Platform
//!
//! Re-exports models from the shared crate and adds the `FromRow` shapes
//! that map table columns onto them.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

pub use shared::models::*;

use crate::error::AppError;

pub const STUDIO_COLUMNS: &str =
    "id, slug, name, email, phone, address, timezone, currency, created_at, updated_at";

pub const FAMILY_COLUMNS: &str = "id, studio_id, name, primary_email, primary_phone, address, \
     tags, billing_customer_id, created_at, updated_at";

pub const STUDENT_COLUMNS: &str = "id, studio_id, family_id, first_name, last_name, \
     date_of_birth, medical_notes, is_active, created_at, updated_at";

pub const CLASS_COLUMNS: &str = "id, studio_id, name, description, level, style, instructor_id, \
     day_of_week, start_time, end_time, room, capacity, monthly_tuition, starts_on, ends_on, \
     is_active, created_at, updated_at";

pub const ENROLLMENT_COLUMNS: &str = "id, studio_id, student_id, class_id, status, \
     waitlist_position, enrolled_at, ended_at, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct StudioRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub timezone: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StudioRow> for Studio {
    fn from(row: StudioRow) -> Self {
        Studio {
            id: row.id,
            slug: row.slug,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            timezone: row.timezone,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct FamilyRow {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub address: Option<String>,
    pub tags: Vec<String>,
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FamilyRow> for Family {
    fn from(row: FamilyRow) -> Self {
        Family {
            id: row.id,
            studio_id: row.studio_id,
            name: row.name,
            primary_email: row.primary_email,
            primary_phone: row.primary_phone,
            address: row.address,
            tags: row.tags,
            billing_customer_id: row.billing_customer_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub family_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub medical_notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            studio_id: row.studio_id,
            family_id: row.family_id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            medical_notes: row.medical_notes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ClassRow {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub level: Option<String>,
    pub style: Option<String>,
    pub instructor_id: Option<Uuid>,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub capacity: Option<i32>,
    pub monthly_tuition: Decimal,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClassRow> for DanceClass {
    fn from(row: ClassRow) -> Self {
        DanceClass {
            id: row.id,
            studio_id: row.studio_id,
            name: row.name,
            description: row.description,
            level: row.level,
            style: row.style,
            instructor_id: row.instructor_id,
            day_of_week: row.day_of_week,
            start_time: row.start_time,
            end_time: row.end_time,
            room: row.room,
            capacity: row.capacity,
            monthly_tuition: row.monthly_tuition,
            starts_on: row.starts_on,
            ends_on: row.ends_on,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct EnrollmentRow {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub status: String,
    pub waitlist_position: Option<i32>,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnrollmentRow {
    pub fn status(&self) -> Result<EnrollmentStatus, AppError> {
        EnrollmentStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown enrollment status '{}'", self.status)))
    }
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = AppError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        let status = row.status()?;
        Ok(Enrollment {
            id: row.id,
            studio_id: row.studio_id,
            student_id: row.student_id,
            class_id: row.class_id,
            status,
            waitlist_position: row.waitlist_position,
            enrolled_at: row.enrolled_at,
            ended_at: row.ended_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Parse a stored status column, reporting corrupt values as internal errors
pub fn parse_status<T>(value: &str, parse: fn(&str) -> Option<T>, what: &str) -> Result<T, AppError> {
    parse(value).ok_or_else(|| AppError::Internal(format!("Unknown {} status '{}'", what, value)))
}
