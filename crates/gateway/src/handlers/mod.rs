//! API handlers module

pub mod board;
pub mod comments;
pub mod health;
pub mod issues;
pub mod papers;
pub mod profiles;
pub mod qna;
pub mod versions;
pub mod volumes;

use axum::extract::{FromRequest, Multipart, Request};
use chrono::NaiveDate;
use minjok_common::{
    db::models::ReleaseStatus,
    errors::{AppError, Result},
    services::FileUpload,
};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// `?q=&page=&per_page=` shared by the list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ListQuery {
    pub fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// A buffered multipart form: text fields (repeatable) and files by name
#[derive(Debug, Default)]
pub struct FormData {
    fields: Vec<(String, String)>,
    files: HashMap<String, FileUpload>,
}

impl<S: Send + Sync> FromRequest<S> for FormData {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let multipart = Multipart::from_request(req, state).await?;
        Self::read(multipart).await
    }
}

impl FormData {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(String::from) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await?.to_vec();
                    // browsers send an empty part for an untouched file input
                    if !data.is_empty() {
                        form.files
                            .insert(name, FileUpload::new(file_name, content_type, data));
                    }
                }
                None => {
                    let value = field.text().await?;
                    form.fields.push((name, value));
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn take_file(&mut self, name: &str) -> Option<FileUpload> {
        self.files.remove(name)
    }

    /// Every value of a repeated id field, in submission order
    pub fn ids(&self, name: &str) -> Result<Vec<Uuid>> {
        self.fields
            .iter()
            .filter(|(n, v)| n == name && !v.trim().is_empty())
            .map(|(_, v)| {
                Uuid::parse_str(v.trim())
                    .map_err(|_| AppError::validation(name, format!("Invalid id: {}", v)))
            })
            .collect()
    }

    pub fn status(&self) -> Result<ReleaseStatus> {
        match self.text("status").as_deref().map(str::trim) {
            None | Some("") | Some("draft") => Ok(ReleaseStatus::Draft),
            Some("released") => Ok(ReleaseStatus::Released),
            Some(other) => Err(AppError::validation(
                "status",
                format!("Unknown status: {}", other),
            )),
        }
    }

    pub fn release_date(&self) -> Result<Option<NaiveDate>> {
        match self.text("release_date").as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse::<NaiveDate>()
                .map(Some)
                .map_err(|_| AppError::validation("release_date", "Expected a YYYY-MM-DD date")),
        }
    }
}
