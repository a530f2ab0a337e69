//! Course ownership checks. The authoritative course catalogue lives outside
//! this service; the server only needs a yes/no on "may this presenter open a
//! session for this course (and lecture)".

use std::collections::HashMap;

use crate::{config::CourseEntry, error::AppError};

pub trait CourseDirectory: Send + Sync {
    fn check_course(
        &self,
        presenter_id: &str,
        course_ref: &str,
        lecture_ref: Option<&str>,
    ) -> Result<(), AppError>;
}

/// Directory backed by the `[[courses]]` config table
#[derive(Debug, Default)]
pub struct StaticCourseDirectory {
    courses: HashMap<String, CourseEntry>,
}

impl StaticCourseDirectory {
    pub fn new(entries: &[CourseEntry]) -> Self {
        let courses = entries
            .iter()
            .map(|entry| (entry.course_ref.clone(), entry.clone()))
            .collect();
        Self { courses }
    }
}

impl CourseDirectory for StaticCourseDirectory {
    fn check_course(
        &self,
        presenter_id: &str,
        course_ref: &str,
        lecture_ref: Option<&str>,
    ) -> Result<(), AppError> {
        // Nothing configured: accept everything
        if self.courses.is_empty() {
            return Ok(());
        }

        let entry = self
            .courses
            .get(course_ref)
            .ok_or_else(|| AppError::CourseNotFound(course_ref.to_string()))?;

        if !entry.presenters.iter().any(|p| p == presenter_id) {
            return Err(AppError::Forbidden(
                "You can only create sessions for your courses".to_string(),
            ));
        }

        if let Some(lecture) = lecture_ref {
            if !entry.lectures.is_empty() && !entry.lectures.iter().any(|l| l == lecture) {
                return Err(AppError::CourseNotFound(format!("{}/{}", course_ref, lecture)));
            }
        }

        Ok(())
    }
}
